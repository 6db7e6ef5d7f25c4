use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::core::errors::ApiError;
use crate::rag::PassageInput;
use crate::state::AppState;

const DEFAULT_SOURCE: &str = "api";

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub passages: Vec<PassageInput>,
    #[serde(default)]
    pub source: Option<String>,
}

pub async fn index_passages(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<IndexRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.passages.is_empty() {
        return Err(ApiError::Unprocessable("passages must not be empty".to_string()));
    }
    let Some(indexer) = state.indexer.as_ref() else {
        tracing::warn!("Index request rejected: primary store is in mock mode");
        return Err(ApiError::ServiceUnavailable);
    };

    let source = payload
        .source
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SOURCE)
        .to_string();

    let report = indexer.index(payload.passages, &source).await?;
    Ok(Json(report))
}
