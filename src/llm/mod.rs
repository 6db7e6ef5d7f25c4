pub mod groq;
pub mod mock;
pub mod provider;
pub mod types;

pub use groq::GroqProvider;
pub use mock::MockLlmProvider;
pub use provider::LlmProvider;
pub use types::{ChatMessage, ChatRequest, StructuredOutput};
