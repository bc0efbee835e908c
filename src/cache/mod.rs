//! Cache Module
//!
//! Provides a bounded in-memory cache with LRU eviction, an estimated memory
//! limit and TTL expiration.

mod entry;
mod lru;
mod options;
mod size;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheEntry, EntryInfo};
pub use lru::{Handle, LruList};
pub use options::{
    CacheOptions, DEFAULT_CAPACITY, DEFAULT_CLEANUP_INTERVAL, DEFAULT_MAX_SIZE_BYTES,
    RESPONSE_CAPACITY, RESPONSE_MAX_SIZE_BYTES, RESPONSE_TTL,
};
pub use size::{descend, estimate_entry, SizeEstimate, ENTRY_OVERHEAD, MAX_ESTIMATE_DEPTH};
pub use stats::CacheStats;
pub use store::{Cache, SharedCache};

// == Sweep ==
/// Anything that can drop its expired entries in one pass.
///
/// Implemented by the engine and by the policy layers built on it, so one
/// cleanup task drives all of them.
pub trait Sweep {
    /// Removes expired entries and returns how many were removed.
    fn sweep(&mut self) -> usize;

    /// Options whose `auto_cleanup` and `cleanup_interval` schedule the sweep.
    fn options(&self) -> &CacheOptions;
}
