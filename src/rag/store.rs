//! Abstract interface for the primary knowledge store.
//!
//! Implementations: `SqliteRagStore` (embedded) and `AstraDbStore`
//! (DataStax Astra DB Data API).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::errors::ProviderError;

/// A stored passage with metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredChunk {
    /// Unique chunk identifier.
    pub chunk_id: String,
    /// The text content of the chunk.
    pub content: String,
    /// Source identifier (URL, filename, etc.).
    pub source: String,
    /// Optional metadata (JSON object).
    pub metadata: Option<serde_json::Value>,
}

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSearchResult {
    pub chunk: StoredChunk,
    /// Similarity score in [0, 1] (higher = better).
    pub score: f32,
}

#[async_trait]
pub trait RagStore: Send + Sync {
    fn name(&self) -> &str;

    /// Insert (or replace) chunks with their embedding vectors.
    async fn insert_batch(
        &self,
        items: Vec<(StoredChunk, Vec<f32>)>,
    ) -> Result<(), ProviderError>;

    /// Chunks most similar to the query embedding, best first.
    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ProviderError>;

    async fn count(&self) -> Result<usize, ProviderError>;
}
