//! Cache Options Module
//!
//! Construction-time bounds for a [`Cache`](super::Cache).

use std::time::Duration;

use serde::Serialize;

use crate::error::{CacheError, Result};

/// Default entry capacity
pub const DEFAULT_CAPACITY: usize = 100;
/// Default memory bound (50 MiB)
pub const DEFAULT_MAX_SIZE_BYTES: usize = 50 * 1024 * 1024;
/// Default sweep interval (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Response cache entry capacity
pub const RESPONSE_CAPACITY: usize = 50;
/// Response cache TTL (30 minutes)
pub const RESPONSE_TTL: Duration = Duration::from_secs(30 * 60);
/// Response cache memory bound (20 MiB)
pub const RESPONSE_MAX_SIZE_BYTES: usize = 20 * 1024 * 1024;

// == Cache Options ==
/// Bounds and housekeeping settings for one cache instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheOptions {
    /// Maximum number of entries
    pub capacity: usize,
    /// TTL applied when `set` is called without one; None = never expires
    pub default_ttl: Option<Duration>,
    /// Upper bound on the sum of estimated entry sizes
    pub max_size_bytes: usize,
    /// Whether the owner should run a periodic sweep
    pub auto_cleanup: bool,
    /// Interval between sweeps
    pub cleanup_interval: Duration,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            default_ttl: None,
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            auto_cleanup: true,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
        }
    }
}

impl CacheOptions {
    /// Defaults tuned for cached AI responses: fewer, shorter-lived entries.
    pub fn response_defaults() -> Self {
        Self {
            capacity: RESPONSE_CAPACITY,
            default_ttl: Some(RESPONSE_TTL),
            max_size_bytes: RESPONSE_MAX_SIZE_BYTES,
            ..Self::default()
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn with_max_size_bytes(mut self, max_size_bytes: usize) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_auto_cleanup(mut self, auto_cleanup: bool) -> Self {
        self.auto_cleanup = auto_cleanup;
        self
    }

    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }

    // == Validate ==
    /// Rejects zero bounds and a zero sweep interval.
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be positive".to_string(),
            ));
        }
        if self.max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "max_size_bytes must be positive".to_string(),
            ));
        }
        if self.cleanup_interval.is_zero() {
            return Err(CacheError::InvalidConfig(
                "cleanup_interval must be positive".to_string(),
            ));
        }
        if self.default_ttl.is_some_and(|ttl| ttl.is_zero()) {
            return Err(CacheError::InvalidConfig(
                "default_ttl must be positive when set".to_string(),
            ));
        }
        Ok(())
    }
}
