pub mod interview_flow;
pub mod pending;

pub use interview_flow::{FlowSettings, InterviewFlow, SESSION_KEY};
pub use pending::PendingGeneration;
