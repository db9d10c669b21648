//! Health and status endpoints

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::api::server::AppState;

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "console-relay"
        })),
    )
}

/// Live link counts and the last assigned sequence
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.relay.stats();
    let status = if state.relay.is_closed() {
        "closing"
    } else {
        "running"
    };

    Json(json!({
        "status": status,
        "uptime_secs": state.started_at.elapsed().as_secs(),
        "producers": stats.producers,
        "viewers": stats.viewers,
        "last_sequence": stats.last_sequence,
    }))
}
