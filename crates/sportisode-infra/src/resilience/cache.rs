use lru::LruCache;
use serde_json::Value;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_fresh(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.stored_at) < self.ttl
    }
}

/// Bounded response cache with per-entry TTL.
///
/// Expired entries are not evicted on read; they stay available through
/// [`ResponseCache::get_stale`] until the LRU pushes them out. All operations are
/// best-effort: a poisoned lock behaves like an empty cache.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn get_fresh(&self, key: &str) -> Option<Value> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        let now = Instant::now();
        entries
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .map(|entry| entry.value.clone())
    }

    /// Last stored value for `key`, fresh or not.
    pub fn get_stale(&self, key: &str) -> Option<Value> {
        let Ok(mut entries) = self.entries.lock() else {
            return None;
        };
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: String, value: Value, ttl: Duration) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.put(
                key,
                CacheEntry {
                    value,
                    stored_at: Instant::now(),
                    ttl,
                },
            );
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
