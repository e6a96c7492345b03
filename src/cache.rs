//! Content-keyed memoization of extraction results.
//!
//! Entries expire after a TTL and are evicted lazily on the next lookup of the
//! same key. There is no size bound: a long-running process that sees many
//! distinct documents will grow the map until those keys are looked up again.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    pub fn new(value: T, ttl: Duration) -> Self {
        Self {
            value,
            timestamp: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.timestamp.elapsed() >= self.ttl
    }
}

/// Cache seam used by the extractor. Implementations must be safe to share
/// between extraction workers.
pub trait ResultCache<T>: Send + Sync {
    fn get(&self, key: &str) -> Option<T>;
    fn set(&self, key: String, value: T);

    fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }
}

pub struct TtlCache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
    ttl: Duration,
}

impl<T> TtlCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl<T: Clone + Send> ResultCache<T> for TtlCache<T> {
    fn get(&self, key: &str) -> Option<T> {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        if expired {
            log::debug!("Evicting expired cache entry ({} bytes key)", key.len());
            entries.remove(key);
        }
        None
    }

    fn set(&self, key: String, value: T) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(key, CacheEntry::new(value, self.ttl));
    }
}

/// Cache that never retains anything. Used when caching is disabled.
pub struct NoopCache;

impl<T> ResultCache<T> for NoopCache {
    fn get(&self, _key: &str) -> Option<T> {
        None
    }

    fn set(&self, _key: String, _value: T) {}
}
