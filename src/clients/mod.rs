pub mod generation_client;
pub mod rate_gate;

pub use generation_client::{
    ChatRole, ChatTurn, GenerationProfile, GenerationRequest, LlmClient, TextGenerator,
};
pub use rate_gate::RateLimitGate;
