//! Response Cache
//!
//! A thin policy layer over [`Cache`] for AI responses. Entries are keyed by a
//! hash of the request text and its options, so long documents never turn
//! into long keys.
//!
//! Keys are not a security boundary: a collision silently serves the wrong
//! cached response. With two independent 64-bit hashes that is accepted.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::{Cache, CacheOptions, CacheStats, SizeEstimate, Sweep};
use crate::clock::{SharedClock, SystemClock};
use crate::error::{CacheError, Result};

/// Number of leading characters of the text that participate in the key.
pub const KEY_TEXT_PREFIX_CHARS: usize = 1000;

/// Length of a derived key in hex characters.
pub const KEY_LENGTH: usize = 32;

pub type SharedResponseCache<V> = Arc<RwLock<ResponseCache<V>>>;

// == Key Derivation ==
/// Derives the cache key for `(text, options)`.
///
/// The key is 32 hex characters: the xxh3 hash of the first
/// [`KEY_TEXT_PREFIX_CHARS`] characters of `text` followed by the xxh3 hash
/// of the JSON form of `options`.
pub fn derive_key<O>(text: &str, options: &O) -> Result<String>
where
    O: Serialize + ?Sized,
{
    let prefix = match text.char_indices().nth(KEY_TEXT_PREFIX_CHARS) {
        Some((end, _)) => &text[..end],
        None => text,
    };
    let options_json = serde_json::to_string(options)
        .map_err(|e| CacheError::InvalidRequest(format!("options are not serializable: {e}")))?;

    Ok(format!(
        "{:016x}{:016x}",
        xxh3_64(prefix.as_bytes()),
        xxh3_64(options_json.as_bytes())
    ))
}

// == Response Cache ==
/// Cache of responses addressed by `(text, options)`.
#[derive(Debug)]
pub struct ResponseCache<V> {
    cache: Cache<String, V>,
}

impl<V> ResponseCache<V>
where
    V: Clone + SizeEstimate,
{
    /// Creates a response cache with [`CacheOptions::response_defaults`].
    pub fn new() -> Result<Self> {
        Self::with_options(CacheOptions::response_defaults())
    }

    pub fn with_options(options: CacheOptions) -> Result<Self> {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    pub fn with_clock(options: CacheOptions, clock: SharedClock) -> Result<Self> {
        Ok(Self {
            cache: Cache::with_clock(options, clock)?,
        })
    }

    pub fn into_shared(self) -> SharedResponseCache<V> {
        Arc::new(RwLock::new(self))
    }

    /// Looks up the cached response for `(text, options)`.
    pub fn get<O>(&mut self, text: &str, options: &O) -> Result<Option<V>>
    where
        O: Serialize + ?Sized,
    {
        let key = derive_key(text, options)?;
        let value = self.cache.get(&key);
        debug!(key = %key, hit = value.is_some(), "Response cache lookup");
        Ok(value)
    }

    /// Stores `value` for `(text, options)` under the default response TTL.
    ///
    /// Returns the derived key.
    pub fn set<O>(&mut self, text: &str, options: &O, value: V) -> Result<String>
    where
        O: Serialize + ?Sized,
    {
        let key = derive_key(text, options)?;
        self.cache.set(key.clone(), value, None)?;
        debug!(key = %key, "Response cached");
        Ok(key)
    }

    pub fn delete<O>(&mut self, text: &str, options: &O) -> Result<bool>
    where
        O: Serialize + ?Sized,
    {
        let key = derive_key(text, options)?;
        Ok(self.cache.delete(&key))
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn cleanup(&mut self) -> usize {
        self.cache.cleanup()
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn options(&self) -> &CacheOptions {
        self.cache.options()
    }

    /// The underlying engine, for callers that already hold a derived key.
    pub fn engine(&mut self) -> &mut Cache<String, V> {
        &mut self.cache
    }
}

impl<V> Sweep for ResponseCache<V>
where
    V: Clone + SizeEstimate,
{
    fn sweep(&mut self) -> usize {
        self.cleanup()
    }

    fn options(&self) -> &CacheOptions {
        self.cache.options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use serde_json::json;
    use std::collections::HashSet;
    use std::time::Duration;

    fn response_cache() -> (ResponseCache<String>, ManualClock) {
        let clock = ManualClock::new(1_700_000_000_000);
        let cache =
            ResponseCache::with_clock(CacheOptions::response_defaults(), clock.shared()).unwrap();
        (cache, clock)
    }

    #[test]
    fn test_identical_inputs_give_identical_keys() {
        let options = json!({"model": "gpt", "temperature": 0.2});
        let a = derive_key("some contract text", &options).unwrap();
        let b = derive_key("some contract text", &options.clone()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_is_fixed_width_hex() {
        let long = "long ".repeat(5_000);
        for text in ["", "short", long.as_str()] {
            let key = derive_key(text, &json!({})).unwrap();
            assert_eq!(key.len(), KEY_LENGTH);
            assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn test_options_participate_in_key() {
        let a = derive_key("text", &json!({"strict": true})).unwrap();
        let b = derive_key("text", &json!({"strict": false})).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_object_key_order_does_not_matter() {
        let a = derive_key("text", &json!({"a": 1, "b": 2})).unwrap();
        let b = derive_key("text", &json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_text_beyond_prefix_is_ignored() {
        let base = "a".repeat(KEY_TEXT_PREFIX_CHARS);
        let a = derive_key(&format!("{base}tail one"), &()).unwrap();
        let b = derive_key(&format!("{base}tail two"), &()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_prefix_counts_characters_not_bytes() {
        let base = "é".repeat(KEY_TEXT_PREFIX_CHARS - 1);
        let a = derive_key(&format!("{base}x"), &()).unwrap();
        let b = derive_key(&format!("{base}y"), &()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_changing_any_prefix_character_changes_key() {
        let text: String = "abcdefghij".repeat(100);
        let original = derive_key(&text, &()).unwrap();

        let mut keys = HashSet::new();
        for position in 0..text.len() {
            let mut chars: Vec<char> = text.chars().collect();
            chars[position] = 'Z';
            let mutated: String = chars.into_iter().collect();
            let key = derive_key(&mutated, &()).unwrap();
            assert_ne!(key, original, "mutation at {position} kept the key");
            keys.insert(key);
        }
        // No collisions among the mutations either
        assert_eq!(keys.len(), text.len());
    }

    #[test]
    fn test_defaults_applied() {
        let cache: ResponseCache<String> = ResponseCache::new().unwrap();
        let options = cache.options();
        assert_eq!(options.capacity, 50);
        assert_eq!(options.default_ttl, Some(Duration::from_secs(30 * 60)));
        assert_eq!(options.max_size_bytes, 20 * 1024 * 1024);
    }

    #[test]
    fn test_set_then_get() {
        let (mut cache, _) = response_cache();
        let options = json!({"mode": "full"});

        let key = cache
            .set("document", &options, "analysis".to_string())
            .unwrap();

        assert_eq!(key, derive_key("document", &options).unwrap());
        assert_eq!(
            cache.get("document", &options).unwrap(),
            Some("analysis".to_string())
        );
        assert_eq!(cache.get("document", &json!({"mode": "quick"})).unwrap(), None);
    }

    #[test]
    fn test_responses_expire_after_thirty_minutes() {
        let (mut cache, clock) = response_cache();
        cache.set("doc", &(), "result".to_string()).unwrap();

        clock.advance(Duration::from_secs(29 * 60));
        assert!(cache.get("doc", &()).unwrap().is_some());

        clock.advance(Duration::from_secs(2 * 60));
        assert!(cache.get("doc", &()).unwrap().is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_delete_and_sweep() {
        let (mut cache, clock) = response_cache();
        cache.set("one", &(), "1".to_string()).unwrap();
        cache.set("two", &(), "2".to_string()).unwrap();

        assert!(cache.delete("one", &()).unwrap());
        assert!(!cache.delete("one", &()).unwrap());

        clock.advance(Duration::from_secs(31 * 60));
        assert_eq!(cache.sweep(), 1);
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_capacity_default_bounds_entries() {
        let (mut cache, _) = response_cache();
        for i in 0..60 {
            cache.set(&format!("doc {i}"), &(), format!("r{i}")).unwrap();
        }
        assert_eq!(cache.len(), 50);
        assert!(cache.get("doc 0", &()).unwrap().is_none());
        assert!(cache.get("doc 59", &()).unwrap().is_some());
    }
}
