use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::embedder::EmbeddingProvider;
use super::store::{RagStore, StoredChunk};
use crate::core::errors::ProviderError;

/// A pre-split passage submitted for indexing.
#[derive(Debug, Clone, Deserialize)]
pub struct PassageInput {
    pub content: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IndexReport {
    /// Passages written by this call.
    pub indexed: usize,
    /// Passages in the store afterwards.
    pub total: usize,
}

/// Embeds passages and writes them to the primary store.
pub struct IndexingService {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RagStore>,
}

impl IndexingService {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn RagStore>) -> Self {
        Self { embedder, store }
    }

    pub async fn index(
        &self,
        passages: Vec<PassageInput>,
        source: &str,
    ) -> Result<IndexReport, ProviderError> {
        let passages: Vec<PassageInput> = passages
            .into_iter()
            .filter(|p| !p.content.trim().is_empty())
            .collect();
        if passages.is_empty() {
            let total = self.store.count().await?;
            return Ok(IndexReport { indexed: 0, total });
        }

        let texts: Vec<String> = passages.iter().map(|p| p.content.clone()).collect();
        let embeddings = self.embedder.embed(&texts).await?;
        if embeddings.len() != passages.len() {
            return Err(ProviderError::parse(
                self.embedder.name(),
                format!("expected {} embeddings, got {}", passages.len(), embeddings.len()),
            ));
        }

        let items: Vec<(StoredChunk, Vec<f32>)> = passages
            .into_iter()
            .zip(embeddings)
            .map(|(passage, embedding)| {
                let mut metadata = passage.metadata.unwrap_or_default();
                metadata.insert("source".to_string(), Value::String(source.to_string()));
                let chunk = StoredChunk {
                    chunk_id: chunk_id(source, &passage.content),
                    content: passage.content,
                    source: source.to_string(),
                    metadata: Some(Value::Object(metadata)),
                };
                (chunk, embedding)
            })
            .collect();

        let indexed = items.len();
        self.store.insert_batch(items).await?;
        let total = self.store.count().await?;

        tracing::info!(
            "Indexed {} passages from '{}' into {} (total {})",
            indexed,
            source,
            self.store.name(),
            total
        );
        Ok(IndexReport { indexed, total })
    }
}

/// Stable id so re-indexing the same passage replaces it.
fn chunk_id(source: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}
