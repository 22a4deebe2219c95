pub mod history;
pub mod loaders;
pub mod progress;
pub mod question_pool;
pub mod result;
pub mod session;

pub use history::{AnalysisRecord, JournalEntry, LongTermContext};
pub use loaders::{load_question_pool, load_toml_to_question_pool};
pub use progress::{ProgressKind, ProgressRecord};
pub use question_pool::{Category, QuestionPool};
pub use result::{
    ActionItem, AnalysisReport, BehavioralPattern, Difficulty, Exercise, FollowUpQuestions,
    Frequency, RootCause, SchemaTag, StructuredResult, Timeline,
};
pub use session::{AnalysisStatus, FailureCause, InterviewSession, Phase, SelectedQuestion, MAX_RETRIES};
