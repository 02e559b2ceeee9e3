use axum::{extract::State, http::header, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;

use crate::api::{state::AppState, types::HealthResponse};
use crate::domain::iso_timestamp;

/// GET /health -- liveness check
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: iso_timestamp(&Utc::now()),
    })
}

/// GET /metrics -- Prometheus text format
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        state.metrics.prometheus(state.uptime_seconds()),
    )
}
