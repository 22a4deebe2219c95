pub mod toml_loader;

pub use toml_loader::{load_question_pool, load_toml_to_question_pool};
