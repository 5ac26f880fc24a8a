//! TTL cache for upstream responses.
//!
//! Entries are keyed by request URL. Expiry is lazy: an entry older than the
//! requested TTL reads as absent, but it stays in the map until `clear()` so
//! it can still serve as an emergency copy when every live path has failed.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Cached payload with the time it was stored
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Value,
    pub stored_at: Instant,
}

impl CacheEntry {
    /// Valid iff `now - stored_at < ttl`
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }
}

/// In-memory response cache shared by every client in the process
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    default_ttl: Duration,
}

impl TtlCache {
    /// Create a new cache
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        // Entries are plain values; a panic elsewhere cannot leave them half-written
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a fresh payload using the default TTL
    pub fn get(&self, key: &str) -> Option<Value> {
        self.get_within(key, self.default_ttl)
    }

    /// Get a payload stored less than `ttl` ago
    pub fn get_within(&self, key: &str, ttl: Duration) -> Option<Value> {
        let entries = self.entries();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(ttl) => {
                debug!(key = key, "Cache hit");
                Some(entry.payload.clone())
            }
            Some(_) => {
                debug!(key = key, "Cache entry expired");
                None
            }
            None => {
                debug!(key = key, "Cache miss");
                None
            }
        }
    }

    /// Get a payload regardless of age
    pub fn get_stale(&self, key: &str) -> Option<Value> {
        self.entries().get(key).map(|entry| entry.payload.clone())
    }

    /// Store a payload, replacing any previous entry for the key
    pub fn set(&self, key: impl Into<String>, payload: Value) {
        let key = key.into();
        debug!(key = %key, "Cache stored");
        self.entries().insert(
            key,
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Clear all entries
    pub fn clear(&self) {
        let mut entries = self.entries();
        let removed = entries.len();
        entries.clear();
        info!(removed = removed, "Cache cleared");
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries();
        CacheStats {
            total_entries: entries.len(),
            fresh_entries: entries
                .values()
                .filter(|entry| entry.is_fresh(self.default_ttl))
                .count(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    pub total_entries: usize,
    pub fresh_entries: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TTL: Duration = Duration::from_secs(600);

    #[tokio::test(start_paused = true)]
    async fn test_set_then_get() {
        let cache = TtlCache::new(TTL);
        let payload = json!({"data": [{"mal_id": 1}]});

        cache.set("https://api.jikan.moe/v4/top/anime", payload.clone());
        assert_eq!(cache.get("https://api.jikan.moe/v4/top/anime"), Some(payload));
    }

    #[tokio::test(start_paused = true)]
    async fn test_lazy_expiry() {
        let cache = TtlCache::new(TTL);
        cache.set("k", json!(1));

        tokio::time::advance(TTL - Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), Some(json!(1)));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(cache.get("k"), None);

        // Not evicted: still available as an emergency copy
        assert_eq!(cache.get_stale("k"), Some(json!(1)));
        assert_eq!(cache.stats().total_entries, 1);
        assert_eq!(cache.stats().fresh_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_ttl_and_refresh() {
        let cache = TtlCache::new(TTL);
        cache.set("k", json!("old"));

        tokio::time::advance(Duration::from_secs(400)).await;
        assert_eq!(cache.get_within("k", Duration::from_secs(300)), None);
        assert_eq!(cache.get("k"), Some(json!("old")));

        cache.set("k", json!("new"));
        assert_eq!(cache.get_within("k", Duration::from_secs(300)), Some(json!("new")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_has_no_side_effects() {
        let cache = TtlCache::new(TTL);
        assert_eq!(cache.get("nonexistent"), None);
        assert_eq!(cache.stats().total_entries, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear() {
        let cache = TtlCache::new(TTL);
        cache.set("a", json!(1));
        cache.set("b", json!(2));
        cache.clear();
        assert_eq!(cache.get_stale("a"), None);
        assert_eq!(cache.stats().total_entries, 0);
    }
}
