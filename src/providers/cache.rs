//! In-process TTL cache for provider responses and generated forecasts.
//!
//! Backed by a concurrent map; entries carry their own TTL and are
//! evicted lazily on read. Callers that cache documents with intrinsic
//! expiry (forecasts) must still check document validity after a hit.

use dashmap::DashMap;
use std::time::{Duration, Instant};

struct CacheEntry<T> {
    value: T,
    stored_at: Instant,
    ttl: Duration,
}

/// A keyed TTL cache. Values are cloned out on read.
pub struct TtlCache<T> {
    entries: DashMap<String, CacheEntry<T>>,
    default_ttl: Duration,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    /// Insert with the cache's default TTL.
    pub fn put(&self, key: impl Into<String>, value: T) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    /// Insert with an explicit TTL.
    pub fn put_with_ttl(&self, key: impl Into<String>, value: T, ttl: Duration) {
        self.entries.insert(
            key.into(),
            CacheEntry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Get a live entry (evict on read when expired).
    pub fn get(&self, key: &str) -> Option<T> {
        self.entries.get(key).and_then(|entry| {
            if entry.stored_at.elapsed() > entry.ttl {
                drop(entry); // Drop the read lock before removing
                self.entries.remove(key);
                None
            } else {
                Some(entry.value.clone())
            }
        })
    }

    /// Remove a key regardless of freshness.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of entries, counting not-yet-evicted stale ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
