pub mod extractor;
pub mod heuristics;
pub mod history_store;
pub mod progress_store;
pub mod prompt_builder;
pub mod question_selector;

pub use extractor::{extract, ExtractionOutcome};
pub use history_store::HistoryStore;
pub use progress_store::ProgressStore;
pub use question_selector::{select_questions, select_with};
