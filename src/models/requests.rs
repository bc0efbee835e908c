//! Request DTOs for the cache server API
//!
//! Defines the structure of incoming HTTP request bodies.

use serde::Deserialize;
use serde_json::Value;

/// Longest key accepted by `PUT /set`, in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Request body for the SET operation (PUT /set)
///
/// # Fields
/// - `key`: The cache key to store the value under
/// - `value`: Any JSON value
/// - `ttl`: Optional TTL in seconds (uses the cache default if not specified)
#[derive(Debug, Clone, Deserialize)]
pub struct SetRequest {
    /// The cache key
    pub key: String,
    /// The value to store
    pub value: Value,
    /// Optional TTL in seconds
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl SetRequest {
    /// Validates the request data
    ///
    /// Returns an error message if validation fails, None if valid.
    pub fn validate(&self) -> Option<String> {
        if self.key.is_empty() {
            return Some("Key cannot be empty".to_string());
        }
        if self.key.len() > MAX_KEY_LENGTH {
            return Some(format!(
                "Key exceeds maximum length of {} characters",
                MAX_KEY_LENGTH
            ));
        }
        if self.ttl == Some(0) {
            return Some("TTL must be positive".to_string());
        }
        None
    }
}

/// Request body for caching a response (PUT /responses)
#[derive(Debug, Clone, Deserialize)]
pub struct StoreResponseRequest {
    /// The request text the response was produced for
    pub text: String,
    /// Options the response was produced with
    #[serde(default)]
    pub options: Value,
    /// The response to cache
    pub response: Value,
}

impl StoreResponseRequest {
    pub fn validate(&self) -> Option<String> {
        if self.text.is_empty() {
            return Some("Text cannot be empty".to_string());
        }
        None
    }
}

/// Request body for looking up a cached response (POST /responses/lookup)
#[derive(Debug, Clone, Deserialize)]
pub struct LookupResponseRequest {
    pub text: String,
    #[serde(default)]
    pub options: Value,
}
