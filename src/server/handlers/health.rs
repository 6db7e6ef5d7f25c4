use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let settings = &state.settings;
    Json(json!({
        "status": "healthy",
        "version": settings.app.version,
        "environment": settings.app.environment,
        "mock_mode": settings.mock_status(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
