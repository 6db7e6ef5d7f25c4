pub mod wikipedia;

pub use wikipedia::{KnowledgeSource, MockKnowledgeSource, WikipediaSource};
