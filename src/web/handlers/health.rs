//! Health check endpoint

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "vlchat-server",
            "version": env!("CARGO_PKG_VERSION"),
            "sessions": state.chat.sessions().count().await,
            "uptime_secs": state.started_at.elapsed().as_secs(),
        })),
    )
}
