//! SQLite-backed knowledge store.
//!
//! In-process vector store using SQLite for passages and metadata and
//! brute-force cosine similarity for search.

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};

use super::store::{ChunkSearchResult, RagStore, StoredChunk};
use super::vector_math::{clamp_score, cosine_similarity, descending};
use crate::core::errors::ProviderError;

const PROVIDER: &str = "sqlite";

pub struct SqliteRagStore {
    pool: SqlitePool,
    table: String,
}

impl SqliteRagStore {
    pub async fn with_path(db_path: PathBuf, table: &str) -> Result<Self, ProviderError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let store = Self {
            pool,
            table: sanitize_table_name(table),
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), ProviderError> {
        sqlx::query(&format!(
            "CREATE TABLE IF NOT EXISTS {} (
                chunk_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                source TEXT NOT NULL DEFAULT '',
                metadata TEXT DEFAULT '{{}}',
                embedding BLOB,
                created_at TEXT NOT NULL DEFAULT (STRFTIME('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
            self.table
        ))
        .execute(&self.pool)
        .await
        .map_err(|e| ProviderError::request(PROVIDER, e))?;

        Ok(())
    }

    fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect()
    }

    fn row_to_chunk(row: &sqlx::sqlite::SqliteRow) -> StoredChunk {
        let metadata_str: String = row.get("metadata");
        let metadata = serde_json::from_str::<Value>(&metadata_str).ok();

        StoredChunk {
            chunk_id: row.get("chunk_id"),
            content: row.get("content"),
            source: row.get("source"),
            metadata,
        }
    }
}

/// Table names are interpolated into SQL, so only identifier characters survive.
fn sanitize_table_name(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if cleaned.is_empty() || cleaned.starts_with(|c: char| c.is_ascii_digit()) {
        format!("kb_{}", cleaned)
    } else {
        cleaned
    }
}

#[async_trait]
impl RagStore for SqliteRagStore {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn insert_batch(&self, items: Vec<(StoredChunk, Vec<f32>)>) -> Result<(), ProviderError> {
        if items.is_empty() {
            return Ok(());
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let statement = format!(
            "INSERT OR REPLACE INTO {} (chunk_id, content, source, metadata, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            self.table
        );

        for (chunk, embedding) in &items {
            let blob = Self::serialize_embedding(embedding);
            let metadata_str = chunk
                .metadata
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "{}".to_string());

            sqlx::query(&statement)
                .bind(&chunk.chunk_id)
                .bind(&chunk.content)
                .bind(&chunk.source)
                .bind(&metadata_str)
                .bind(&blob)
                .execute(&mut *tx)
                .await
                .map_err(|e| ProviderError::request(PROVIDER, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;
        Ok(())
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkSearchResult>, ProviderError> {
        let rows = sqlx::query(&format!(
            "SELECT chunk_id, content, source, metadata, embedding FROM {}",
            self.table
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| ProviderError::request(PROVIDER, e))?;

        let mut scored: Vec<ChunkSearchResult> = rows
            .iter()
            .filter_map(|row| {
                let embedding_bytes: Vec<u8> = row.get("embedding");
                if embedding_bytes.is_empty() {
                    return None;
                }
                let stored_emb = Self::deserialize_embedding(&embedding_bytes);
                let score = clamp_score(cosine_similarity(query_embedding, &stored_emb));

                Some(ChunkSearchResult {
                    chunk: Self::row_to_chunk(row),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| descending(a.score, b.score));
        scored.truncate(limit.max(1));

        Ok(scored)
    }

    async fn count(&self) -> Result<usize, ProviderError> {
        let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", self.table))
            .fetch_one(&self.pool)
            .await
            .map_err(|e| ProviderError::request(PROVIDER, e))?;

        Ok(count as usize)
    }
}
