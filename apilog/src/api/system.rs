//! System API (health / traffic log counters).

use crate::AppState;
use axum::{extract::State, response::IntoResponse, Json};

/// GET /health
pub async fn health() -> impl IntoResponse {
    "OK"
}

/// GET /api/traffic/stats
pub async fn traffic_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.traffic_logger.writer().stats().snapshot())
}
