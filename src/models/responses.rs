//! Response DTOs for the cache server API
//!
//! Defines the structure of outgoing HTTP response bodies.

use serde::Serialize;
use serde_json::Value;

use crate::cache::CacheStats;

/// Response body for the GET operation (GET /get/:key)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GetResponse {
    /// The requested key
    pub key: String,
    /// The stored value
    pub value: Value,
    /// Milliseconds until expiry; absent for entries without a TTL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl_remaining_ms: Option<u64>,
}

impl GetResponse {
    /// Creates a new GetResponse
    pub fn new(key: impl Into<String>, value: Value, ttl_remaining_ms: Option<u64>) -> Self {
        Self {
            key: key.into(),
            value,
            ttl_remaining_ms,
        }
    }
}

/// Response body for the SET operation (PUT /set)
#[derive(Debug, Clone, Serialize)]
pub struct SetResponse {
    /// Success message
    pub message: String,
    /// The key that was set
    pub key: String,
}

impl SetResponse {
    /// Creates a new SetResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' set successfully", key),
            key,
        }
    }
}

/// Response body for the DELETE operation (DELETE /del/:key)
#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    /// Success message
    pub message: String,
    /// The key that was deleted
    pub key: String,
}

impl DeleteResponse {
    /// Creates a new DeleteResponse
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            message: format!("Key '{}' deleted successfully", key),
            key,
        }
    }
}

/// Response body for GET /keys, most recently used first
#[derive(Debug, Clone, Serialize)]
pub struct KeysResponse {
    pub count: usize,
    pub keys: Vec<String>,
}

impl KeysResponse {
    pub fn new(keys: Vec<String>) -> Self {
        Self {
            count: keys.len(),
            keys,
        }
    }
}

/// Expired entries removed by POST /cleanup, per store
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResponse {
    pub cache: usize,
    pub responses: usize,
    pub rate_limits: usize,
    pub total: usize,
}

impl CleanupResponse {
    pub fn new(cache: usize, responses: usize, rate_limits: usize) -> Self {
        Self {
            cache,
            responses,
            rate_limits,
            total: cache + responses + rate_limits,
        }
    }
}

/// Response body for DELETE /clear
#[derive(Debug, Clone, Serialize)]
pub struct ClearResponse {
    pub message: String,
    /// Entries dropped
    pub cleared: usize,
}

impl ClearResponse {
    pub fn new(cleared: usize) -> Self {
        Self {
            message: format!("Cleared {} entries", cleared),
            cleared,
        }
    }
}

/// Response body for PUT /responses
#[derive(Debug, Clone, Serialize)]
pub struct StoredResponse {
    pub message: String,
    /// Derived response key
    pub key: String,
}

impl StoredResponse {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            message: "Response cached".to_string(),
            key: key.into(),
        }
    }
}

/// Response body for a hit on POST /responses/lookup
#[derive(Debug, Clone, Serialize)]
pub struct LookupResponse {
    pub key: String,
    pub response: Value,
}

impl LookupResponse {
    pub fn new(key: impl Into<String>, response: Value) -> Self {
        Self {
            key: key.into(),
            response,
        }
    }
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    /// General key/value cache
    pub cache: CacheStats,
    /// Response cache
    pub responses: CacheStats,
    /// Rate-limit counter store
    pub rate_limits: CacheStats,
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
