use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::api::{state::AppState, types::ErrorResponse};
use crate::domain::{ServerEntry, Snapshot};
use crate::error::RiskAggError;

/// GET /api/risk/stats
pub async fn get_risk_stats(State(state): State<AppState>) -> Json<Arc<Snapshot>> {
    Json(state.store.snapshot().await)
}

/// GET /api/risk/stats/:server_name
pub async fn get_server_stats(
    State(state): State<AppState>,
    Path(server_name): Path<String>,
) -> std::result::Result<Json<ServerEntry>, (StatusCode, Json<ErrorResponse>)> {
    state.store.server(&server_name).await.map(Json).map_err(|e| match e {
        RiskAggError::ServerNotFound(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("Server not found")),
        ),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(other.to_string())),
        ),
    })
}
