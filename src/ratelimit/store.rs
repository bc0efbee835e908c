//! Counter Store
//!
//! Fixed-window request counters kept in the cache engine. Each counter's
//! TTL is its class window, so idle clients age out on their own.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::cache::{Cache, CacheOptions, CacheStats, SharedCache, SizeEstimate};
use crate::clock::{duration_ms, SharedClock, SystemClock};
use crate::error::Result;

/// Default number of (client, class) counters kept at once.
pub const DEFAULT_STORE_CAPACITY: usize = 10_000;

// == Counter ==
/// Requests counted in the window that started at `window_start_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Counter {
    pub count: u32,
    pub window_start_ms: u64,
}

impl Counter {
    /// First request of a fresh window.
    pub fn started(now_ms: u64) -> Self {
        Self {
            count: 1,
            window_start_ms: now_ms,
        }
    }

    pub fn window_end_ms(&self, window: Duration) -> u64 {
        self.window_start_ms.saturating_add(duration_ms(window))
    }

    pub fn is_elapsed(&self, window: Duration, now_ms: u64) -> bool {
        now_ms >= self.window_end_ms(window)
    }
}

impl SizeEstimate for Counter {
    fn estimate_at(&self, depth: usize) -> Result<usize> {
        Ok(self.count.estimate_at(depth)? + self.window_start_ms.estimate_at(depth)?)
    }
}

// == Counter Store Trait ==
/// Storage behind a [`RateLimiter`](super::RateLimiter).
///
/// Both operations are a single read-modify-write: implementations must not
/// let two concurrent callers observe the same count.
pub trait CounterStore: Send + Sync {
    /// Counts one request against `key` and returns the updated counter.
    ///
    /// A missing counter, or one whose window has elapsed at `now_ms`,
    /// restarts at one.
    fn increment(
        &self,
        key: &str,
        window: Duration,
        now_ms: u64,
    ) -> impl Future<Output = Result<Counter>> + Send;

    /// Takes back one request from the window that began at
    /// `window_start_ms`. Returns false when that window is gone or the
    /// count is already zero.
    fn refund(
        &self,
        key: &str,
        window: Duration,
        window_start_ms: u64,
    ) -> impl Future<Output = Result<bool>> + Send;
}

// == Cache Counter Store ==
/// Counter store backed by a shared [`Cache`].
#[derive(Debug, Clone)]
pub struct CacheCounterStore {
    cache: SharedCache<String, Counter>,
}

impl CacheCounterStore {
    pub fn new(capacity: usize) -> Result<Self> {
        Self::with_clock(capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(capacity: usize, clock: SharedClock) -> Result<Self> {
        Self::with_options(CacheOptions::default().with_capacity(capacity), clock)
    }

    /// Counter TTLs always come from the class window, so `default_ttl` is
    /// never consulted.
    pub fn with_options(options: CacheOptions, clock: SharedClock) -> Result<Self> {
        Ok(Self {
            cache: Cache::with_clock(options, clock)?.into_shared(),
        })
    }

    /// The underlying cache, for sweeping and statistics.
    pub fn shared(&self) -> SharedCache<String, Counter> {
        self.cache.clone()
    }

    pub async fn stats(&self) -> CacheStats {
        self.cache.read().await.stats()
    }

    /// Current counter for `key` without touching recency or statistics.
    pub async fn counter(&self, key: &str) -> Option<Counter> {
        self.cache.read().await.peek(key).copied()
    }
}

impl CounterStore for CacheCounterStore {
    async fn increment(&self, key: &str, window: Duration, now_ms: u64) -> Result<Counter> {
        let mut cache = self.cache.write().await;

        let counter = match cache.get(key) {
            Some(current) if !current.is_elapsed(window, now_ms) => Counter {
                count: current.count.saturating_add(1),
                ..current
            },
            _ => Counter::started(now_ms),
        };
        cache.set(key.to_string(), counter, Some(window))?;

        Ok(counter)
    }

    async fn refund(&self, key: &str, window: Duration, window_start_ms: u64) -> Result<bool> {
        let mut cache = self.cache.write().await;

        match cache.get(key) {
            Some(current) if current.window_start_ms == window_start_ms && current.count > 0 => {
                let refunded = Counter {
                    count: current.count - 1,
                    ..current
                };
                cache.set(key.to_string(), refunded, Some(window))?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
