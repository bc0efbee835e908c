//! Cache Entry Module
//!
//! Defines a single cache slot: the value plus the metadata the engine needs
//! for TTL expiry, access tracking and memory accounting.

use std::time::Duration;

use serde::Serialize;

use crate::clock::duration_ms;

// == Cache Entry ==
/// A single cache entry owned by the engine.
#[derive(Debug, Clone)]
pub struct CacheEntry<K, V> {
    /// The key this entry is indexed under
    pub key: K,
    /// The stored value
    pub value: V,
    /// Creation (or last overwrite) timestamp in Unix milliseconds
    pub created_at: u64,
    /// Time-to-live, None = never expires
    pub ttl: Option<Duration>,
    /// Number of reads and overwrites seen by this entry
    pub access_count: u64,
    /// Timestamp of the last read or overwrite in Unix milliseconds
    pub last_accessed_at: u64,
    /// Estimated footprint in bytes, including per-entry overhead
    pub size: usize,
}

impl<K, V> CacheEntry<K, V> {
    // == Constructor ==
    /// Creates a new cache entry stamped at `now_ms`.
    pub fn new(key: K, value: V, ttl: Option<Duration>, size: usize, now_ms: u64) -> Self {
        Self {
            key,
            value,
            created_at: now_ms,
            ttl,
            access_count: 0,
            last_accessed_at: now_ms,
            size,
        }
    }

    // == Expires At ==
    /// Absolute expiry instant in Unix milliseconds, if the entry has a TTL.
    pub fn expires_at(&self) -> Option<u64> {
        self.ttl
            .map(|ttl| self.created_at.saturating_add(duration_ms(ttl)))
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// Boundary condition: an entry is expired only once `now` is strictly
    /// past `created_at + ttl`. At exactly the expiry instant it is still live.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        match self.expires_at() {
            Some(expires) => now_ms > expires,
            None => false,
        }
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, or None if no expiration is set.
    ///
    /// # Returns
    /// - `Some(0)` if the entry has expired (TTL elapsed)
    /// - `Some(remaining_ms)` if the entry has TTL and hasn't expired
    /// - `None` if the entry has no TTL (never expires)
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at().map(|expires| expires.saturating_sub(now_ms))
    }

    // == Touch ==
    /// Records an access.
    pub fn touch(&mut self, now_ms: u64) {
        self.access_count = self.access_count.saturating_add(1);
        self.last_accessed_at = now_ms;
    }

    // == Refresh ==
    /// Overwrites value, TTL and size in place and restarts the TTL clock.
    ///
    /// Returns the previous estimated size so the caller can adjust its total.
    pub fn refresh(&mut self, value: V, ttl: Option<Duration>, size: usize, now_ms: u64) -> usize {
        self.value = value;
        self.ttl = ttl;
        self.created_at = now_ms;
        self.touch(now_ms);
        std::mem::replace(&mut self.size, size)
    }

    // == Info ==
    /// Returns a metadata snapshot, without the key or value.
    pub fn info(&self, now_ms: u64) -> EntryInfo {
        EntryInfo {
            created_at: self.created_at,
            ttl_ms: self.ttl.map(duration_ms),
            ttl_remaining_ms: self.ttl_remaining_ms(now_ms),
            access_count: self.access_count,
            last_accessed_at: self.last_accessed_at,
            size: self.size,
        }
    }
}

/// Read-only view of an entry's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryInfo {
    pub created_at: u64,
    pub ttl_ms: Option<u64>,
    pub ttl_remaining_ms: Option<u64>,
    pub access_count: u64,
    pub last_accessed_at: u64,
    pub size: usize,
}
