use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use super::embedder::EmbeddingProvider;
use super::store::RagStore;
use crate::core::errors::ProviderError;

/// One passage of a context bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f32>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            score: None,
            metadata: Map::new(),
        }
    }

    pub fn with_score(mut self, score: f32) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Ranked passages for a query, best first.
#[async_trait]
pub trait Retriever: Send + Sync {
    fn name(&self) -> &str;

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, ProviderError>;
}

pub struct VectorStoreRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn RagStore>,
}

impl VectorStoreRetriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn RagStore>) -> Self {
        Self { embedder, store }
    }
}

#[async_trait]
impl Retriever for VectorStoreRetriever {
    fn name(&self) -> &str {
        self.store.name()
    }

    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<Passage>, ProviderError> {
        let embeddings = self.embedder.embed(&[query.to_string()]).await?;
        let query_embedding = embeddings
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::parse(self.embedder.name(), "no embedding returned"))?;

        let results = self.store.search(&query_embedding, k).await?;
        tracing::debug!(
            "{} returned {} passages for k={}",
            self.store.name(),
            results.len(),
            k
        );

        Ok(results
            .into_iter()
            .map(|result| {
                let mut metadata = match result.chunk.metadata {
                    Some(Value::Object(map)) => map,
                    _ => Map::new(),
                };
                metadata
                    .entry("source".to_string())
                    .or_insert_with(|| Value::String(result.chunk.source.clone()));
                metadata.insert("chunk_id".to_string(), Value::String(result.chunk.chunk_id));

                Passage {
                    content: result.chunk.content,
                    score: Some(result.score),
                    metadata,
                }
            })
            .collect())
    }
}

/// Canned retriever for mock mode.
#[derive(Debug, Clone, Default)]
pub struct MockRetriever;

impl MockRetriever {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Retriever for MockRetriever {
    fn name(&self) -> &str {
        "mock"
    }

    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<Passage>, ProviderError> {
        Ok(vec![Passage::new("Example matched text...")
            .with_score(0.92)
            .with_metadata("source_id", json!("doc-1"))
            .with_metadata("url", json!("/storage/docs/doc1.pdf"))])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embedder::HashEmbedder;
    use crate::rag::sqlite::SqliteRagStore;
    use crate::rag::store::StoredChunk;

    #[tokio::test]
    async fn vector_store_retriever_returns_ranked_passages_with_provenance() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            SqliteRagStore::with_path(dir.path().join("kb.db"), "kb")
                .await
                .unwrap(),
        );
        let embedder = Arc::new(HashEmbedder::new(128));

        let texts = [
            "Agent memory includes short-term and long-term memory",
            "Prompt engineering uses few-shot examples",
            "The Eiffel Tower is in Paris",
        ];
        let vectors = embedder
            .embed(&texts.iter().map(|t| t.to_string()).collect::<Vec<_>>())
            .await
            .unwrap();
        let items = texts
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (text, vector))| {
                (
                    StoredChunk {
                        chunk_id: format!("c{}", i),
                        content: text.to_string(),
                        source: "agent-post".to_string(),
                        metadata: Some(json!({ "title": "Agents" })),
                    },
                    vector,
                )
            })
            .collect();
        store.insert_batch(items).await.unwrap();

        let retriever = VectorStoreRetriever::new(embedder, store);
        let passages = retriever.retrieve("agent memory", 2).await.unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].metadata["chunk_id"], "c0");
        assert_eq!(passages[0].metadata["source"], "agent-post");
        assert_eq!(passages[0].metadata["title"], "Agents");
        let first = passages[0].score.unwrap();
        let second = passages[1].score.unwrap();
        assert!((0.0..=1.0).contains(&first));
        assert!(first >= second);
    }

    #[tokio::test]
    async fn mock_retriever_returns_canned_passage() {
        let passages = MockRetriever::new().retrieve("anything", 4).await.unwrap();
        assert_eq!(passages.len(), 1);
        assert_eq!(passages[0].content, "Example matched text...");
        assert_eq!(passages[0].score, Some(0.92));
        assert_eq!(passages[0].metadata["source_id"], "doc-1");
    }

    #[test]
    fn passage_serialization_omits_empty_fields() {
        let value = serde_json::to_value(Passage::new("text")).unwrap();
        assert_eq!(value, json!({ "content": "text" }));
    }
}
