//! API route modules.

pub mod health;
pub mod sessions;

use axum::{
    http::Method,
    routing::get,
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Preflight cache lifetime
const CORS_MAX_AGE: Duration = Duration::from_secs(86_400);

/// Create the main router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .max_age(CORS_MAX_AGE);

    Router::new()
        .route("/health", get(health::health_check))
        .merge(sessions::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
