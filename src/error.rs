//! Error types for the cache
//!
//! Misses, expiry and eviction are ordinary return values; the variants here
//! cover programmer errors, bad configuration and the HTTP-facing failures.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::ratelimit::RateLimitDecision;

// == Cache Error Enum ==
/// Unified error type for the cache, its policy layers and the HTTP surface.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key not found in cache
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Construction options out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A value could not be sized (nested too deeply to traverse)
    #[error("Size estimation failed: {0}")]
    SizeEstimation(String),

    /// Request rejected by the rate limiter
    #[error("Too many requests, retry after {} seconds", retry_after(.0))]
    RateLimited(RateLimitDecision),

    /// The rate-limit counter store could not be consulted
    #[error("Counter store unavailable: {0}")]
    StoreUnavailable(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::InvalidConfig(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CacheError::SizeEstimation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CacheError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            CacheError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = self.to_string();
        match self {
            CacheError::RateLimited(decision) => {
                let retry_after = decision.retry_after_seconds.unwrap_or(0);
                let mut response = (
                    status,
                    Json(json!({
                        "error": message,
                        "rateLimit": decision,
                    })),
                )
                    .into_response();
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                response
            }
            _ => (status, Json(json!({ "error": message }))).into_response(),
        }
    }
}

fn retry_after(decision: &RateLimitDecision) -> u64 {
    decision.retry_after_seconds.unwrap_or(0)
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
