use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::vector_math::normalize;
use crate::core::config::EmbeddingSettings;
use crate::core::errors::ProviderError;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    /// One vector per input, in input order.
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;
}

/// OpenAI-compatible `/embeddings` endpoint.
pub struct HttpEmbedder {
    base_url: String,
    api_key: String,
    model: String,
    client: Client,
}

impl HttpEmbedder {
    pub fn new(base_url: String, api_key: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            client: Client::new(),
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings, api_key: String) -> Self {
        Self::new(settings.base_url.clone(), api_key, settings.model.clone())
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn name(&self) -> &str {
        "embedding"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}/embeddings", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "model": self.model, "input": inputs }))
            .send()
            .await
            .map_err(|e| ProviderError::request(self.name(), e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: self.name().to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::parse(self.name(), e))?;
        let vectors = parse_embeddings(&payload)
            .ok_or_else(|| ProviderError::parse(self.name(), "missing data[].embedding"))?;

        if vectors.len() != inputs.len() {
            return Err(ProviderError::parse(
                self.name(),
                format!("expected {} embeddings, got {}", inputs.len(), vectors.len()),
            ));
        }
        Ok(vectors)
    }
}

fn parse_embeddings(payload: &Value) -> Option<Vec<Vec<f32>>> {
    let data = payload.get("data")?.as_array()?;
    let mut indexed: Vec<(usize, Vec<f32>)> = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|v| v.as_u64())
            .map(|v| v as usize)
            .unwrap_or(position);
        let vector = item
            .get("embedding")?
            .as_array()?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()?;
        indexed.push((index, vector));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Some(indexed.into_iter().map(|(_, v)| v).collect())
}

/// Deterministic hashed bag-of-words embedder.
///
/// Texts sharing tokens land close together, which is enough for local
/// development and tests without an embedding API key.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.to_lowercase().as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let bucket = u64::from_le_bytes(head);
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[(bucket % self.dimension as u64) as usize] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    fn name(&self) -> &str {
        "hash"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        Ok(inputs.iter().map(|text| self.embed_one(text)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::vector_math::cosine_similarity;

    #[test]
    fn parses_embeddings_in_index_order() {
        let payload = json!({
            "data": [
                { "index": 1, "embedding": [0.0, 1.0] },
                { "index": 0, "embedding": [1.0, 0.0] }
            ]
        });
        let vectors = parse_embeddings(&payload).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert!(parse_embeddings(&json!({ "error": "bad" })).is_none());
    }

    #[tokio::test]
    async fn hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::new(64);
        let inputs = vec!["agent memory".to_string(), "agent memory".to_string()];
        let vectors = embedder.embed(&inputs).await.unwrap();

        assert_eq!(vectors[0], vectors[1]);
        assert_eq!(vectors[0].len(), 64);
        let norm: f32 = vectors[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_tokens_score_higher_than_disjoint_ones() {
        let embedder = HashEmbedder::new(384);
        let query = embedder.embed_one("types of agent memory");
        let related = embedder.embed_one("Agent memory comes in short-term and long-term types");
        let unrelated = embedder.embed_one("Paris is the capital of France");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }
}
