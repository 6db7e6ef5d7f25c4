//! DataStax Astra DB store over the JSON Data API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Map, Value};
use tokio::sync::OnceCell;

use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use super::vector_math::clamp_score;
use crate::core::config::AstraSettings;
use crate::core::errors::ProviderError;

const PROVIDER: &str = "astra_db";
/// The Data API rejects `insertMany` calls with more documents than this.
const INSERT_BATCH_LIMIT: usize = 20;
const DUPLICATE_ID: &str = "DOCUMENT_ALREADY_EXISTS";

pub struct AstraDbStore {
    endpoint: String,
    token: String,
    keyspace: String,
    collection: String,
    client: Client,
    collection_ready: OnceCell<()>,
}

impl AstraDbStore {
    pub fn new(endpoint: String, token: String, keyspace: String, collection: String) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            keyspace,
            collection,
            client: Client::new(),
            collection_ready: OnceCell::new(),
        }
    }

    pub fn from_settings(settings: &AstraSettings, collection: &str) -> Option<Self> {
        let endpoint = settings.endpoint()?;
        let token = settings.application_token.clone()?;
        Some(Self::new(
            endpoint,
            token,
            settings.keyspace.clone(),
            collection.to_string(),
        ))
    }

    fn keyspace_url(&self) -> String {
        format!("{}/api/json/v1/{}", self.endpoint, self.keyspace)
    }

    fn collection_url(&self) -> String {
        format!("{}/{}", self.keyspace_url(), self.collection)
    }

    async fn command(&self, url: &str, body: Value) -> Result<Value, ProviderError> {
        let payload = self.command_raw(url, body).await?;
        check_command_errors(&payload)?;
        Ok(payload)
    }

    /// Like `command`, but leaves the `errors` array for the caller.
    async fn command_raw(&self, url: &str, body: Value) -> Result<Value, ProviderError> {
        let res = self
            .client
            .post(url)
            .header("Token", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                provider: PROVIDER.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| ProviderError::parse(PROVIDER, e))?;
        Ok(payload)
    }

    async fn replace_document(&self, id: &str, document: Value) -> Result<(), ProviderError> {
        let body = json!({
            "findOneAndReplace": {
                "filter": { "_id": id },
                "replacement": document,
                "options": { "upsert": true }
            }
        });
        self.command(&self.collection_url(), body).await?;
        Ok(())
    }

    async fn ensure_collection(&self, dimension: usize) -> Result<(), ProviderError> {
        self.collection_ready
            .get_or_try_init(|| async {
                let body = json!({
                    "createCollection": {
                        "name": self.collection,
                        "options": { "vector": { "dimension": dimension, "metric": "cosine" } }
                    }
                });
                self.command(&self.keyspace_url(), body).await?;
                tracing::info!("Astra collection '{}' ready", self.collection);
                Ok::<(), ProviderError>(())
            })
            .await
            .map(|_| ())
    }
}

fn check_command_errors(payload: &Value) -> Result<(), ProviderError> {
    let Some(errors) = payload.get("errors").and_then(|v| v.as_array()) else {
        return Ok(());
    };
    if errors.is_empty() {
        return Ok(());
    }
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
        .collect();
    Err(ProviderError::Request {
        provider: PROVIDER.to_string(),
        message: messages.join("; "),
    })
}

/// Ids from `batch_ids` that an unordered `insertMany` skipped because they
/// already exist. Any other command error fails the whole batch.
fn rejected_duplicates(payload: &Value, batch_ids: &[&str]) -> Result<Vec<String>, ProviderError> {
    let errors = payload
        .get("errors")
        .and_then(|v| v.as_array())
        .map(Vec::as_slice)
        .unwrap_or_default();
    if errors.is_empty() {
        return Ok(Vec::new());
    }

    let all_duplicates = errors
        .iter()
        .all(|e| e.get("errorCode").and_then(|c| c.as_str()) == Some(DUPLICATE_ID));
    if !all_duplicates {
        check_command_errors(payload)?;
    }

    let inserted: Vec<&str> = payload
        .get("status")
        .and_then(|s| s.get("insertedIds"))
        .and_then(|ids| ids.as_array())
        .map(|ids| ids.iter().filter_map(|id| id.as_str()).collect())
        .unwrap_or_default();

    Ok(batch_ids
        .iter()
        .filter(|id| !inserted.contains(*id))
        .map(|id| id.to_string())
        .collect())
}

fn to_document(chunk: &StoredChunk, embedding: &[f32]) -> Value {
    json!({
        "_id": chunk.chunk_id,
        "content": chunk.content,
        "source": chunk.source,
        "metadata": chunk.metadata.clone().unwrap_or_else(|| Value::Object(Map::new())),
        "$vector": embedding,
    })
}

fn parse_find_response(payload: &Value) -> Result<Vec<ChunkSearchResult>, ProviderError> {
    let documents = payload
        .get("data")
        .and_then(|d| d.get("documents"))
        .and_then(|d| d.as_array())
        .ok_or_else(|| ProviderError::parse(PROVIDER, "missing data.documents"))?;

    Ok(documents
        .iter()
        .map(|doc| {
            let text = |key: &str| {
                doc.get(key)
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()
            };
            let id = match doc.get("_id") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => String::new(),
            };
            let score = doc
                .get("$similarity")
                .and_then(|v| v.as_f64())
                .map(|v| clamp_score(v as f32))
                .unwrap_or(0.0);

            ChunkSearchResult {
                chunk: StoredChunk {
                    chunk_id: id,
                    content: text("content"),
                    source: text("source"),
                    metadata: doc.get("metadata").cloned(),
                },
                score,
            }
        })
        .collect())
}

#[async_trait]
impl RagStore for AstraDbStore {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ProviderError> {
        let Some((_, first)) = items.first() else {
            return Ok(());
        };
        self.ensure_collection(first.len()).await?;

        for batch in items.chunks(INSERT_BATCH_LIMIT) {
            let documents: Vec<Value> = batch
                .iter()
                .map(|(chunk, embedding)| to_document(chunk, embedding))
                .collect();
            let body = json!({
                "insertMany": { "documents": documents, "options": { "ordered": false } }
            });
            let payload = self.command_raw(&self.collection_url(), body).await?;

            let ids: Vec<&str> = batch.iter().map(|(c, _)| c.chunk_id.as_str()).collect();
            let existing = rejected_duplicates(&payload, &ids)?;
            if !existing.is_empty() {
                tracing::debug!("Replacing {} existing Astra documents", existing.len());
            }
            for (chunk, embedding) in batch {
                if existing.contains(&chunk.chunk_id) {
                    self.replace_document(&chunk.chunk_id, to_document(chunk, embedding))
                        .await?;
                }
            }
        }
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ProviderError> {
        let body = json!({
            "find": {
                "sort": { "$vector": query_embedding },
                "projection": { "content": 1, "source": 1, "metadata": 1 },
                "options": { "limit": limit.max(1), "includeSimilarity": true }
            }
        });
        let payload = self.command(&self.collection_url(), body).await?;
        parse_find_response(&payload)
    }

    async fn count(&self) -> Result<usize, ProviderError> {
        let body = json!({ "countDocuments": {} });
        let payload = self.command(&self.collection_url(), body).await?;
        payload
            .get("status")
            .and_then(|s| s.get("count"))
            .and_then(|c| c.as_u64())
            .map(|c| c as usize)
            .ok_or_else(|| ProviderError::parse(PROVIDER, "missing status.count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_response_preserves_order_and_scores() {
        let payload = json!({
            "data": {
                "documents": [
                    { "_id": "a", "content": "Task decomposition", "source": "agent", "metadata": { "title": "Agents" }, "$similarity": 0.91 },
                    { "_id": "b", "content": "Self-reflection", "source": "agent", "$similarity": 0.87 }
                ],
                "nextPageState": null
            }
        });

        let results = parse_find_response(&payload).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk.chunk_id, "a");
        assert!((results[0].score - 0.91).abs() < 1e-6);
        assert_eq!(results[0].chunk.metadata.as_ref().unwrap()["title"], "Agents");
        assert_eq!(results[1].chunk.content, "Self-reflection");
        assert!(results[1].chunk.metadata.is_none());
    }

    #[test]
    fn find_response_without_documents_is_a_parse_error() {
        let err = parse_find_response(&json!({ "status": {} })).unwrap_err();
        assert!(matches!(err, ProviderError::Parse { .. }));
    }

    #[test]
    fn command_errors_are_surfaced() {
        let payload = json!({ "errors": [{ "message": "Collection does not exist" }] });
        let err = check_command_errors(&payload).unwrap_err();
        assert!(err.to_string().contains("Collection does not exist"));
        assert!(check_command_errors(&json!({ "status": { "count": 3 } })).is_ok());
    }

    #[test]
    fn existing_ids_are_picked_out_for_replacement() {
        let payload = json!({
            "status": { "insertedIds": ["b"] },
            "errors": [{
                "errorCode": "DOCUMENT_ALREADY_EXISTS",
                "message": "Failed to insert document with _id 'a': Document already exists with the given _id"
            }]
        });

        let existing = rejected_duplicates(&payload, &["a", "b"]).unwrap();
        assert_eq!(existing, vec!["a".to_string()]);
    }

    #[test]
    fn clean_insert_needs_no_replacement() {
        let payload = json!({ "status": { "insertedIds": ["a", "b"] } });
        assert!(rejected_duplicates(&payload, &["a", "b"]).unwrap().is_empty());
    }

    #[test]
    fn other_insert_errors_fail_the_batch() {
        let payload = json!({
            "status": { "insertedIds": [] },
            "errors": [
                { "errorCode": "DOCUMENT_ALREADY_EXISTS", "message": "already exists" },
                { "errorCode": "SHRED_BAD_VECTOR_SIZE", "message": "vector dimension mismatch" }
            ]
        });

        let err = rejected_duplicates(&payload, &["a", "b"]).unwrap_err();
        assert!(err.to_string().contains("vector dimension mismatch"));
    }

    #[test]
    fn documents_carry_vector_and_id() {
        let chunk = StoredChunk {
            chunk_id: "abc".to_string(),
            content: "text".to_string(),
            source: "src".to_string(),
            metadata: None,
        };
        let doc = to_document(&chunk, &[0.5, 0.25]);
        assert_eq!(doc["_id"], "abc");
        assert_eq!(doc["$vector"], json!([0.5, 0.25]));
        assert_eq!(doc["metadata"], json!({}));
    }

    #[test]
    fn urls_follow_data_api_layout() {
        let store = AstraDbStore::new(
            "https://db-us-east1.apps.astra.datastax.com/".to_string(),
            "AstraCS:token".to_string(),
            "default_keyspace".to_string(),
            "intelligent_knowledge_base".to_string(),
        );
        assert_eq!(
            store.collection_url(),
            "https://db-us-east1.apps.astra.datastax.com/api/json/v1/default_keyspace/intelligent_knowledge_base"
        );
    }
}
