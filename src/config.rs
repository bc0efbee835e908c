//! Configuration Module
//!
//! Handles loading server configuration from environment variables and
//! turning it into options for the caches and the rate limiter.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::cache::{
    CacheOptions, DEFAULT_CAPACITY, DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_SIZE_BYTES,
    RESPONSE_CAPACITY, RESPONSE_MAX_SIZE_BYTES, RESPONSE_TTL,
};
use crate::error::Result;
use crate::ratelimit::{FailureMode, RateLimitConfig, DEFAULT_STORE_CAPACITY};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Maximum number of entries in the general cache
    pub cache_capacity: usize,
    /// Default TTL in seconds for the general cache; 0 means entries never expire
    pub cache_default_ttl: u64,
    /// Estimated memory bound for the general cache
    pub cache_max_size_bytes: usize,
    /// Whether background sweeps run at all
    pub auto_cleanup: bool,
    /// Background sweep interval in seconds
    pub cleanup_interval: u64,
    /// Maximum number of cached responses
    pub response_capacity: usize,
    /// Response TTL in seconds
    pub response_ttl: u64,
    /// Estimated memory bound for cached responses
    pub response_max_size_bytes: usize,
    /// Limiter behavior when its store fails
    pub rate_limit_failure_mode: FailureMode,
    /// Maximum number of (client, class) counters
    pub rate_limit_store_capacity: usize,
    /// Key clients on `x-client-id`/`x-forwarded-for` rather than the peer
    /// address; set only behind a trusted proxy
    pub rate_limit_trust_proxy_headers: bool,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CACHE_CAPACITY` - General cache entries (default: 100)
    /// - `CACHE_DEFAULT_TTL` - Default TTL in seconds, 0 = none (default: 0)
    /// - `CACHE_MAX_SIZE_BYTES` - General cache memory bound (default: 50 MiB)
    /// - `CACHE_AUTO_CLEANUP` - Run background sweeps (default: true)
    /// - `CACHE_CLEANUP_INTERVAL` - Sweep frequency in seconds (default: 300)
    /// - `RESPONSE_CACHE_CAPACITY` - Cached responses (default: 50)
    /// - `RESPONSE_CACHE_TTL` - Response TTL in seconds (default: 1800)
    /// - `RESPONSE_CACHE_MAX_SIZE_BYTES` - Response memory bound (default: 20 MiB)
    /// - `RATE_LIMIT_FAILURE_MODE` - `open` or `closed` (default: open)
    /// - `RATE_LIMIT_STORE_CAPACITY` - Counter capacity (default: 10000)
    /// - `RATE_LIMIT_TRUST_PROXY_HEADERS` - Trust client id headers (default: false)
    ///
    /// Unset or unparsable values fall back to their defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            server_port: env_or("SERVER_PORT", defaults.server_port),
            cache_capacity: env_or("CACHE_CAPACITY", defaults.cache_capacity),
            cache_default_ttl: env_or("CACHE_DEFAULT_TTL", defaults.cache_default_ttl),
            cache_max_size_bytes: env_or("CACHE_MAX_SIZE_BYTES", defaults.cache_max_size_bytes),
            auto_cleanup: env_or("CACHE_AUTO_CLEANUP", defaults.auto_cleanup),
            cleanup_interval: env_or("CACHE_CLEANUP_INTERVAL", defaults.cleanup_interval),
            response_capacity: env_or("RESPONSE_CACHE_CAPACITY", defaults.response_capacity),
            response_ttl: env_or("RESPONSE_CACHE_TTL", defaults.response_ttl),
            response_max_size_bytes: env_or(
                "RESPONSE_CACHE_MAX_SIZE_BYTES",
                defaults.response_max_size_bytes,
            ),
            rate_limit_failure_mode: env_or(
                "RATE_LIMIT_FAILURE_MODE",
                defaults.rate_limit_failure_mode,
            ),
            rate_limit_store_capacity: env_or(
                "RATE_LIMIT_STORE_CAPACITY",
                defaults.rate_limit_store_capacity,
            ),
            rate_limit_trust_proxy_headers: env_or(
                "RATE_LIMIT_TRUST_PROXY_HEADERS",
                defaults.rate_limit_trust_proxy_headers,
            ),
        }
    }

    /// Options for the general-purpose cache.
    pub fn cache_options(&self) -> CacheOptions {
        let default_ttl = (self.cache_default_ttl > 0)
            .then(|| Duration::from_secs(self.cache_default_ttl));
        CacheOptions::default()
            .with_capacity(self.cache_capacity)
            .with_default_ttl(default_ttl)
            .with_max_size_bytes(self.cache_max_size_bytes)
            .with_auto_cleanup(self.auto_cleanup)
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval))
    }

    /// Options for the response cache.
    pub fn response_options(&self) -> CacheOptions {
        CacheOptions::response_defaults()
            .with_capacity(self.response_capacity)
            .with_default_ttl(Some(Duration::from_secs(self.response_ttl)))
            .with_max_size_bytes(self.response_max_size_bytes)
            .with_auto_cleanup(self.auto_cleanup)
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval))
    }

    /// Options for the limiter's counter store. Counter TTLs come from the
    /// class windows, so there is no default TTL.
    pub fn rate_limit_store_options(&self) -> CacheOptions {
        CacheOptions::default()
            .with_capacity(self.rate_limit_store_capacity)
            .with_auto_cleanup(self.auto_cleanup)
            .with_cleanup_interval(Duration::from_secs(self.cleanup_interval))
    }

    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig::default()
            .with_failure_mode(self.rate_limit_failure_mode)
            .with_trust_proxy_headers(self.rate_limit_trust_proxy_headers)
    }

    /// Rejects values no cache could be built from.
    pub fn validate(&self) -> Result<()> {
        self.cache_options().validate()?;
        self.response_options().validate()?;
        self.rate_limit_store_options().validate()?;
        self.rate_limit().validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            cache_capacity: DEFAULT_CAPACITY,
            cache_default_ttl: 0,
            cache_max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            auto_cleanup: true,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL.as_secs(),
            response_capacity: RESPONSE_CAPACITY,
            response_ttl: RESPONSE_TTL.as_secs(),
            response_max_size_bytes: RESPONSE_MAX_SIZE_BYTES,
            rate_limit_failure_mode: FailureMode::Open,
            rate_limit_store_capacity: DEFAULT_STORE_CAPACITY,
            rate_limit_trust_proxy_headers: false,
        }
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
