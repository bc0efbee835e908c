//! Cache Store Module
//!
//! Main cache engine: a hash index into an arena-backed recency list, with
//! three independent bounds enforced on every write.
//!
//! - Capacity: before a *new* key is inserted into a full cache, the least
//!   recently used entry is evicted once.
//! - Memory: after any insert or overwrite, entries are evicted from the LRU
//!   end until the estimated total fits again (or the cache is empty).
//! - TTL: expired entries are removed lazily by `get`/`has` and in bulk by
//!   `cleanup`. Nothing expires eagerly on `set`.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::lru::{Handle, LruList};
use crate::cache::size::{estimate_entry, SizeEstimate};
use crate::cache::{CacheEntry, CacheOptions, CacheStats, EntryInfo, Sweep};
use crate::clock::{SharedClock, SystemClock};
use crate::error::Result;

/// A cache shared between tasks. Every call that can touch recency,
/// including `get`, needs the write half.
pub type SharedCache<K, V> = Arc<RwLock<Cache<K, V>>>;

#[derive(Debug, Clone, Copy)]
enum EvictionReason {
    Capacity,
    Memory,
}

// == Cache ==
/// Bounded LRU cache with TTL and estimated-memory limits.
#[derive(Debug)]
pub struct Cache<K, V> {
    /// Key -> slot in the recency list
    index: HashMap<K, Handle>,
    /// Entries ordered most to least recently used
    list: LruList<CacheEntry<K, V>>,
    /// Sum of `CacheEntry::size` over all entries
    total_size: usize,
    stats: CacheStats,
    options: CacheOptions,
    clock: SharedClock,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone + SizeEstimate,
    V: Clone + SizeEstimate,
{
    // == Constructor ==
    /// Creates an empty cache reading time from the system clock.
    pub fn new(options: CacheOptions) -> Result<Self> {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Creates an empty cache reading time from `clock`.
    pub fn with_clock(options: CacheOptions, clock: SharedClock) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            index: HashMap::new(),
            list: LruList::new(),
            total_size: 0,
            stats: CacheStats::new(options.capacity, options.max_size_bytes),
            options,
            clock,
        })
    }

    /// Wraps the cache for sharing across tasks.
    pub fn into_shared(self) -> SharedCache<K, V> {
        Arc::new(RwLock::new(self))
    }

    // == Get ==
    /// Returns a clone of the value stored under `key`.
    ///
    /// A hit moves the entry to the most recently used position. An expired
    /// entry is removed and reported as a miss.
    pub fn get<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();

        let Some(handle) = self.index.get(key).copied() else {
            self.stats.record_miss();
            return None;
        };

        if self.is_expired(handle, now) {
            self.detach(key);
            self.stats.record_expiration();
            self.stats.record_miss();
            debug!("Lazy expiry removed entry on read");
            return None;
        }

        self.list.move_to_front(handle);
        let entry = self.list.get_mut(handle)?;
        entry.touch(now);
        self.stats.record_hit();
        Some(entry.value.clone())
    }

    // == Set ==
    /// Stores `value` under `key`.
    ///
    /// `ttl` of None falls back to the configured default TTL. Overwriting an
    /// existing key refreshes its value, TTL and creation time in place.
    ///
    /// # Errors
    /// Returns `CacheError::SizeEstimation` if the key or value cannot be
    /// sized. The cache is left untouched in that case.
    pub fn set(&mut self, key: K, value: V, ttl: Option<Duration>) -> Result<()> {
        let size = estimate_entry(&key, &value)?;
        let ttl = ttl.or(self.options.default_ttl);
        let now = self.clock.now_ms();

        match self.index.get(&key).copied() {
            Some(handle) => self.overwrite(handle, value, ttl, size, now),
            None => {
                if self.index.len() >= self.options.capacity {
                    self.evict_lru(EvictionReason::Capacity);
                }
                let handle = self
                    .list
                    .push_front(CacheEntry::new(key.clone(), value, ttl, size, now));
                self.index.insert(key, handle);
                self.total_size = self.total_size.saturating_add(size);
            }
        }

        while self.total_size > self.options.max_size_bytes && !self.list.is_empty() {
            self.evict_lru(EvictionReason::Memory);
        }

        Ok(())
    }

    // == Delete ==
    /// Removes `key`. Returns whether anything was removed.
    pub fn delete<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.detach(key).is_some()
    }

    // == Has ==
    /// True if `key` is present and not expired.
    ///
    /// Does not change recency or the hit/miss counters, but does remove an
    /// entry it finds expired.
    pub fn has<Q>(&mut self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let Some(handle) = self.index.get(key).copied() else {
            return false;
        };

        if self.is_expired(handle, now) {
            self.detach(key);
            self.stats.record_expiration();
            return false;
        }
        true
    }

    // == Peek ==
    /// Borrows the live value under `key` without any bookkeeping.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let entry = self.list.get(*self.index.get(key)?)?;
        (!entry.is_expired(now)).then_some(&entry.value)
    }

    // == Entry Info ==
    /// Metadata for the live entry under `key`.
    pub fn entry_info<Q>(&self, key: &Q) -> Option<EntryInfo>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let now = self.clock.now_ms();
        let entry = self.list.get(*self.index.get(key)?)?;
        (!entry.is_expired(now)).then(|| entry.info(now))
    }

    // == Clear ==
    /// Removes every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.index.clear();
        self.list.clear();
        self.total_size = 0;
    }

    // == Keys ==
    /// Snapshot of the current keys, most recently used first.
    ///
    /// Expired entries not yet discovered are included.
    pub fn keys(&self) -> Vec<K> {
        self.list.iter().map(|entry| entry.key.clone()).collect()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.index.len(), self.total_size)
    }

    // == Cleanup ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup(&mut self) -> usize {
        let now = self.clock.now_ms();
        let expired_keys: Vec<K> = self
            .list
            .iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();

        let mut removed = 0;
        for key in &expired_keys {
            if self.detach(key).is_some() {
                self.stats.record_expiration();
                removed += 1;
            }
        }

        self.stats.record_sweep();
        removed
    }

    // == Length ==
    /// Returns the current number of entries in the cache.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Sum of estimated entry sizes in bytes.
    pub fn total_size(&self) -> usize {
        self.total_size
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Current time as seen by this cache.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    fn is_expired(&self, handle: Handle, now: u64) -> bool {
        self.list
            .get(handle)
            .map(|entry| entry.is_expired(now))
            .unwrap_or(true)
    }

    fn overwrite(&mut self, handle: Handle, value: V, ttl: Option<Duration>, size: usize, now: u64) {
        if let Some(entry) = self.list.get_mut(handle) {
            let previous = entry.refresh(value, ttl, size, now);
            self.total_size = self.total_size.saturating_sub(previous).saturating_add(size);
            self.list.move_to_front(handle);
        }
    }

    /// Removes `key` from both the index and the list.
    fn detach<Q>(&mut self, key: &Q) -> Option<CacheEntry<K, V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let handle = self.index.remove(key)?;
        let entry = self.list.remove(handle)?;
        self.total_size = self.total_size.saturating_sub(entry.size);
        Some(entry)
    }

    fn evict_lru(&mut self, reason: EvictionReason) {
        let Some(entry) = self.list.pop_back() else {
            return;
        };
        self.index.remove(&entry.key);
        self.total_size = self.total_size.saturating_sub(entry.size);
        self.stats.record_eviction();
        debug!(
            ?reason,
            size = entry.size,
            total_size = self.total_size,
            "Evicted least recently used entry"
        );
    }
}

impl<K, V> Sweep for Cache<K, V>
where
    K: Eq + Hash + Clone + SizeEstimate,
    V: Clone + SizeEstimate,
{
    fn sweep(&mut self) -> usize {
        self.cleanup()
    }

    fn options(&self) -> &CacheOptions {
        &self.options
    }
}
