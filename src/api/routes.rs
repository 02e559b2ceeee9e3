use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        // Risk snapshot endpoints
        .route("/api/risk/stats", get(handlers::get_risk_stats))
        .route("/api/risk/stats/:server_name", get(handlers::get_server_stats))
        // System endpoints
        .route("/health", get(handlers::health_handler))
        .route("/metrics", get(handlers::metrics_handler))
        // Add state and CORS
        .with_state(state)
        .layer(cors)
}
