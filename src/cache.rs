//! TTL cache for successful GET payloads.
//!
//! This is a continuity-of-service cache, not a correctness cache:
//! staleness up to the TTL is acceptable, and every cache-served payload
//! is tagged so the UI can signal degraded freshness. Expired entries are
//! evicted lazily on read; no background sweep runs.

use crate::core::request::EndpointKey;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Configuration for [`ResponseCache`].
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// How long an entry stays valid after it is stored.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
        }
    }
}

impl CacheConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

#[derive(Debug)]
struct CacheEntry {
    payload: Value,
    stored_at: Instant,
}

/// TTL key/value store for successful responses.
#[derive(Debug)]
pub struct ResponseCache {
    entries: RwLock<HashMap<EndpointKey, CacheEntry>>,
    config: CacheConfig,
}

impl ResponseCache {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Creates a cache with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Returns the payload and its age, if a valid entry exists.
    ///
    /// Expired entries are removed on the way out and report as absent.
    pub fn get(&self, key: &EndpointKey) -> Option<(Value, Duration)> {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let age = match entries.get(key) {
            Some(entry) => entry.stored_at.elapsed(),
            None => return None,
        };

        if age < self.config.ttl {
            entries.get(key).map(|e| (e.payload.clone(), age))
        } else {
            entries.remove(key);
            None
        }
    }

    /// Stores a payload under `key`, overwriting with a fresh timestamp.
    pub fn put(&self, key: &EndpointKey, payload: Value) {
        let mut entries = self
            .entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.insert(
            key.clone(),
            CacheEntry {
                payload,
                stored_at: Instant::now(),
            },
        );
    }

    /// Returns the number of entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes all entries.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::request::Method;
    use serde_json::json;

    fn key() -> EndpointKey {
        EndpointKey::new(Method::Get, "/settings")
    }

    #[test]
    fn test_put_and_get() {
        let cache = ResponseCache::with_defaults();
        let key = key();

        assert!(cache.get(&key).is_none());
        cache.put(&key, json!({"currency": "EUR"}));

        let (payload, age) = cache.get(&key).unwrap();
        assert_eq!(payload, json!({"currency": "EUR"}));
        assert!(age < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_expired_entries_are_absent() {
        let cache = ResponseCache::new(CacheConfig::new().with_ttl(Duration::from_millis(20)));
        let key = key();

        cache.put(&key, json!({"currency": "EUR"}));
        assert!(cache.get(&key).is_some());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(cache.get(&key).is_none());
        // Lazy eviction removed the entry on read.
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_put_refreshes_timestamp() {
        let cache = ResponseCache::new(CacheConfig::new().with_ttl(Duration::from_millis(40)));
        let key = key();

        cache.put(&key, json!(1));
        tokio::time::sleep(Duration::from_millis(25)).await;
        cache.put(&key, json!(2));
        tokio::time::sleep(Duration::from_millis(25)).await;

        // The rewrite reset the clock, so the entry is still valid.
        let (payload, _) = cache.get(&key).unwrap();
        assert_eq!(payload, json!(2));
    }

    #[test]
    fn test_clear() {
        let cache = ResponseCache::with_defaults();
        cache.put(&key(), json!({}));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
