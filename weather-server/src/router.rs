//! Router configuration for the forwarding endpoint.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/api/weather", get(handlers::get_weather))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
