use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::graph::{ExecutionRequest, ExecutionResult, SourceOverride, ERROR_ROUTE};
use crate::state::AppState;

const MAX_TOP_K: usize = 20;

#[derive(Debug, Deserialize)]
pub struct QueryOptions {
    #[serde(default)]
    pub top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub options: Option<QueryOptions>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub id: String,
    #[serde(flatten)]
    pub result: ExecutionResult,
    pub routing_reason: String,
}

pub async fn execute_query(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QueryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let request = validate(&payload, state.settings.app.max_query_length)?;
    let source = request.source;

    let query_id = format!("query-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    tracing::info!(
        "Query {} (user={}, source={})",
        query_id,
        payload.user_id.as_deref().unwrap_or("anonymous"),
        source.as_str()
    );

    let result = state.workflow.execute(request).await;
    let routing_reason = routing_reason(source, &result);

    Ok(Json(QueryResponse {
        id: query_id,
        result,
        routing_reason,
    }))
}

fn validate(payload: &QueryRequest, max_query_length: usize) -> Result<ExecutionRequest, ApiError> {
    if payload.query.trim().is_empty() {
        return Err(ApiError::Unprocessable("query must not be empty".to_string()));
    }
    let length = payload.query.chars().count();
    if length > max_query_length {
        return Err(ApiError::Unprocessable(format!(
            "query is {} characters; the limit is {}",
            length, max_query_length
        )));
    }

    let source = match payload.source.as_deref() {
        None => SourceOverride::Auto,
        Some(raw) => SourceOverride::parse(raw)
            .ok_or_else(|| ApiError::Unprocessable(format!("unknown source: {}", raw)))?,
    };

    let mut request = ExecutionRequest::new(payload.query.clone()).with_source(source);
    if let Some(top_k) = payload.options.as_ref().and_then(|o| o.top_k) {
        if !(1..=MAX_TOP_K).contains(&top_k) {
            return Err(ApiError::Unprocessable(format!(
                "options.top_k must be between 1 and {}",
                MAX_TOP_K
            )));
        }
        request = request.with_top_k(top_k);
    }
    Ok(request)
}

fn routing_reason(source: SourceOverride, result: &ExecutionResult) -> String {
    if result.route == ERROR_ROUTE {
        return "classifier failed; no source queried".to_string();
    }
    match source {
        SourceOverride::Auto => format!("classifier routed to {}", result.route),
        forced => format!("source={} requested; routed to {}", forced.as_str(), result.route),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(query: &str) -> QueryRequest {
        QueryRequest {
            query: query.to_string(),
            user_id: None,
            source: None,
            options: None,
        }
    }

    #[test]
    fn rejects_blank_and_overlong_queries() {
        assert!(matches!(validate(&payload("   "), 2000), Err(ApiError::Unprocessable(_))));
        assert!(matches!(
            validate(&payload(&"a".repeat(2001)), 2000),
            Err(ApiError::Unprocessable(_))
        ));
        assert!(validate(&payload(&"é".repeat(2000)), 2000).is_ok());
    }

    #[test]
    fn maps_source_aliases_and_top_k() {
        let mut request = payload("Who is Elon Musk?");
        request.source = Some("wiki".to_string());
        request.options = Some(QueryOptions { top_k: Some(7) });

        let execution = validate(&request, 2000).unwrap();
        assert_eq!(execution.source, SourceOverride::Secondary);
        assert_eq!(execution.top_k, Some(7));

        request.source = Some("web".to_string());
        assert!(validate(&request, 2000).is_err());

        request.source = None;
        request.options = Some(QueryOptions { top_k: Some(21) });
        assert!(validate(&request, 2000).is_err());
    }
}
