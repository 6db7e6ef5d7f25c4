use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("service unavailable")]
    ServiceUnavailable,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unprocessable entity: {0}")]
    Unprocessable(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            ApiError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
            ),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failure of an external collaborator (LLM, embedder, vector store, Wikipedia).
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("{provider} request failed: {message}")]
    Request { provider: String, message: String },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: String,
        status: u16,
        body: String,
    },
    #[error("{provider} returned an unexpected payload: {message}")]
    Parse { provider: String, message: String },
    #[error("no results for query: {0}")]
    NoResults(String),
    #[error("provider call timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    pub fn request(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ProviderError::Request {
            provider: provider.into(),
            message: err.to_string(),
        }
    }

    pub fn parse(provider: impl Into<String>, err: impl std::fmt::Display) -> Self {
        ProviderError::Parse {
            provider: provider.into(),
            message: err.to_string(),
        }
    }
}

impl From<ProviderError> for ApiError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NoResults(msg) => ApiError::NotFound(msg),
            ProviderError::Timeout(_) => ApiError::ServiceUnavailable,
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprocessable_maps_to_422() {
        let response = ApiError::Unprocessable("query is empty".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn internal_helper_keeps_message() {
        let err = ApiError::internal("boom");
        assert_eq!(err.to_string(), "internal error: boom");
    }

    #[test]
    fn provider_errors_map_to_http_errors() {
        let not_found: ApiError = ProviderError::NoResults("nothing".to_string()).into();
        assert!(matches!(not_found, ApiError::NotFound(_)));

        let timeout: ApiError = ProviderError::Timeout(Duration::from_secs(3)).into();
        assert!(matches!(timeout, ApiError::ServiceUnavailable));

        let status = ProviderError::Status {
            provider: "groq".to_string(),
            status: 429,
            body: "rate limited".to_string(),
        };
        assert_eq!(status.to_string(), "groq returned HTTP 429: rate limited");
    }
}
