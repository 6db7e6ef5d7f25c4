//! Primary knowledge store.
//!
//! - `EmbeddingProvider`: HTTP embeddings or the deterministic hashed embedder
//! - `RagStore`: SQLite (embedded) or Astra DB (Data API)
//! - `Retriever`: embedder + store, or the canned mock
//! - `IndexingService`: writes pre-split passages into the store

pub mod astra;
pub mod embedder;
pub mod indexer;
pub mod retriever;
pub mod sqlite;
pub mod store;
pub mod vector_math;

pub use astra::AstraDbStore;
pub use embedder::{EmbeddingProvider, HashEmbedder, HttpEmbedder};
pub use indexer::{IndexReport, IndexingService, PassageInput};
pub use retriever::{MockRetriever, Passage, Retriever, VectorStoreRetriever};
pub use sqlite::SqliteRagStore;
pub use store::{ChunkSearchResult, RagStore, StoredChunk};
