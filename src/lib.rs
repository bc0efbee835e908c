//! LRU TTL Cache - a bounded in-process cache and the services built on it
//!
//! Provides an LRU cache with capacity, estimated-memory and TTL bounds, a
//! response cache keyed by request hash, and a fixed-window rate limiter
//! whose counters live in the same engine.

pub mod api;
pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod ratelimit;
pub mod response;
pub mod tasks;

pub use api::AppState;
pub use cache::{Cache, CacheOptions, CacheStats, SharedCache};
pub use config::Config;
pub use error::{CacheError, Result};
pub use ratelimit::{RateLimitDecision, RateLimiter};
pub use response::ResponseCache;
pub use tasks::{spawn_cleanup_task, spawn_configured_cleanup, CleanupHandle};
