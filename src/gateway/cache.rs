//! TTL response cache for idempotent reads.
//!
//! Entries are visible only while `now < stored_at + ttl`. Expired entries
//! are evicted lazily on read and in bulk by the periodic sweeper.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::debug;

use crate::time::Clock;

struct CacheEntry {
    value: Value,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.stored_at + self.ttl
    }
}

/// Hit/miss counters for observability.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evicted: u64,
}

/// In-memory key/value store with per-entry TTL.
///
/// All mutations go through a single mutex held only for the duration of the
/// map operation, so concurrent requests for the same key cannot observe a
/// torn entry.
pub struct TtlCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
    hits: AtomicU64,
    misses: AtomicU64,
    evicted: AtomicU64,
}

impl TtlCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Look up a key. Expired entries are treated as absent and removed.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();

        let live = match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => None,
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };

        match live {
            Some(value) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            None => {
                entries.remove(key);
                self.evicted.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a value with the given TTL, replacing any previous entry.
    pub fn insert(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: self.clock.now(),
            ttl,
        };
        self.entries.lock().unwrap().insert(key.into(), entry);
    }

    /// Drop all expired entries. Called by the background sweeper.
    pub fn sweep(&self) {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        let swept = before - entries.len();
        if swept > 0 {
            self.evicted.fetch_add(swept as u64, Ordering::Relaxed);
            debug!(swept, remaining = entries.len(), "cache sweep");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualClock;
    use serde_json::json;

    fn cache_with_clock() -> (TtlCache, ManualClock) {
        let clock = ManualClock::new();
        let cache = TtlCache::new(Arc::new(clock.clone()));
        (cache, clock)
    }

    #[test]
    fn test_visible_before_ttl_absent_after() {
        let (cache, clock) = cache_with_clock();
        cache.insert("k", json!({"v": 1}), Duration::from_secs(60));

        clock.advance(Duration::from_secs(59));
        assert_eq!(cache.get("k"), Some(json!({"v": 1})));

        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn test_expired_entry_lazily_evicted_on_read() {
        let (cache, clock) = cache_with_clock();
        cache.insert("k", json!(1), Duration::from_secs(10));

        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.get("k"), None);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_sweep_drops_only_expired() {
        let (cache, clock) = cache_with_clock();
        cache.insert("old", json!(1), Duration::from_secs(10));
        cache.insert("fresh", json!(2), Duration::from_secs(120));

        clock.advance(Duration::from_secs(30));
        cache.sweep();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("fresh"), Some(json!(2)));
    }

    #[test]
    fn test_insert_replaces_and_refreshes_ttl() {
        let (cache, clock) = cache_with_clock();
        cache.insert("k", json!(1), Duration::from_secs(10));

        clock.advance(Duration::from_secs(8));
        cache.insert("k", json!(2), Duration::from_secs(10));

        clock.advance(Duration::from_secs(8));
        assert_eq!(cache.get("k"), Some(json!(2)));
    }

    #[test]
    fn test_stats_track_hits_and_misses() {
        let (cache, _clock) = cache_with_clock();
        cache.insert("k", json!(1), Duration::from_secs(10));

        cache.get("k");
        cache.get("absent");

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }
}
