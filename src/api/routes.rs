//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cleanup_handler, clear_handler, delete_handler, get_handler, health_handler, keys_handler,
    lookup_response_handler, set_handler, stats_handler, store_response_handler, AppState,
};
use super::middleware::rate_limit;

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - Rate limiting: every request is counted against its client's limit
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests, including rate-limited ones
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/keys", get(keys_handler))
        .route("/cleanup", post(cleanup_handler))
        .route("/clear", delete(clear_handler))
        .route("/responses", put(store_response_handler))
        .route("/responses/lookup", post(lookup_response_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
