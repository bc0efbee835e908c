//! Cache Statistics Module
//!
//! Tracks cache performance metrics including hits, misses, evictions and
//! expirations, and carries the size figures reported by `Cache::stats`.

use serde::Serialize;

// == Cache Stats ==
/// Cache performance metrics and occupancy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    /// Maximum number of entries
    pub capacity: usize,
    /// Current number of entries
    pub size: usize,
    /// hits / (hits + misses), 0.0 before any access
    pub hit_rate: f64,
    /// Sum of estimated entry sizes in bytes
    pub total_size: usize,
    /// Memory bound in bytes
    pub max_size_bytes: usize,
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed retrievals (absent or expired)
    pub misses: u64,
    /// Entries removed by the capacity or memory bound
    pub evictions: u64,
    /// Entries removed because their TTL ran out, lazily or by sweep
    pub cleanups: u64,
    /// Number of sweeps run
    pub sweeps: u64,
}

impl CacheStats {
    // == Constructor ==
    /// Creates stats for a cache with the given bounds and all counters at zero.
    pub fn new(capacity: usize, max_size_bytes: usize) -> Self {
        Self {
            capacity,
            max_size_bytes,
            ..Self::default()
        }
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn compute_hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_expiration(&mut self) {
        self.cleanups += 1;
    }

    pub fn record_sweep(&mut self) {
        self.sweeps += 1;
    }

    // == Snapshot ==
    /// Copy of the counters with occupancy figures and hit rate filled in.
    pub fn snapshot(&self, size: usize, total_size: usize) -> Self {
        Self {
            size,
            total_size,
            hit_rate: self.compute_hit_rate(),
            ..self.clone()
        }
    }
}
