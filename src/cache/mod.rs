//! Bounded response cache with genuine least-recently-used eviction.
//!
//! [`ResponseCache`] stores computed responses keyed on a content hash of
//! the normalized payload. Both `get` and `put` are O(1) amortized: the
//! backing store is `lru::LruCache`, a hash map combined with a doubly
//! linked recency list. A `get` on a hit promotes the entry to the
//! most-recently-used position; a `put` on a full cache evicts exactly
//! the single least-recently-used entry — never a bulk trim.
//!
//! # Concurrency
//!
//! A single `std::sync::Mutex` guards the combined structure. Both
//! operations only touch in-memory state, so the critical section is
//! short; correctness under concurrent workers (no lost updates, no
//! duplicate keys) takes priority over shaving contention. A poisoned
//! lock is treated as a miss, never a crash.
//!
//! # Reload snapshots
//!
//! [`export_recent`](ResponseCache::export_recent) and
//! [`restore`](ResponseCache::restore) let the reload controller carry a
//! bounded, recency-ordered subset of entries across a pipeline swap.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;
use tracing::warn;

use crate::telemetry;

/// Configuration for the response cache.
///
/// ```rust
/// # use muninn::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .capacity(10_000)
///     .ttl(Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 10,000.
    pub capacity: usize,
    /// Optional time-to-live; entries older than this count as misses.
    /// Default: none (entries live until evicted).
    pub ttl: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl: None,
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn capacity(mut self, n: usize) -> Self {
        self.capacity = n;
        self
    }

    /// Set a time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// A cached response plus its bookkeeping times.
#[derive(Debug, Clone)]
pub struct CachedAnswer {
    /// The response text.
    pub text: String,
    /// When the entry was first computed.
    pub inserted_at: Instant,
    /// When the entry was last served.
    pub last_access: Instant,
}

/// Bounded LRU store for computed responses.
pub struct ResponseCache {
    inner: Mutex<LruCache<u64, CachedAnswer>>,
    ttl: Option<Duration>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    ///
    /// A zero capacity is clamped to one entry.
    pub fn new(config: &CacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
            ttl: config.ttl,
        }
    }

    /// Look up a cached response, promoting the entry to MRU on a hit.
    ///
    /// Returns `None` on a miss, on an expired entry, or on any
    /// unexpected cache state. Emits cache hit/miss metrics.
    pub fn get(&self, key: u64) -> Option<String> {
        let Ok(mut inner) = self.inner.lock() else {
            warn!(key, "cache lock poisoned; treating lookup as miss");
            metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
            return None;
        };

        if let Some(ttl) = self.ttl
            && inner.peek(&key).is_some_and(|e| e.inserted_at.elapsed() > ttl)
        {
            inner.pop(&key);
        }

        match inner.get_mut(&key) {
            Some(entry) => {
                entry.last_access = Instant::now();
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some(entry.text.clone())
            }
            None => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Insert (or overwrite) a response.
    ///
    /// On a full cache this evicts exactly the least-recently-used entry
    /// before inserting.
    pub fn put(&self, key: u64, text: String) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!(key, "cache lock poisoned; dropping insert");
            return;
        };
        let now = Instant::now();
        inner.put(
            key,
            CachedAnswer {
                text,
                inserted_at: now,
                last_access: now,
            },
        );
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict all entries.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.clear();
        }
    }

    /// Copy out up to `limit` entries in MRU→LRU order, for snapshots.
    pub(crate) fn export_recent(&self, limit: usize) -> Vec<(u64, CachedAnswer)> {
        match self.inner.lock() {
            Ok(inner) => inner
                .iter()
                .take(limit)
                .map(|(k, v)| (*k, v.clone()))
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Load snapshotted entries, preserving their recency order.
    ///
    /// `entries` is expected in MRU→LRU order as produced by
    /// [`export_recent`](Self::export_recent); inserting in reverse keeps
    /// the most recent entry at the MRU position.
    pub(crate) fn restore(&self, entries: Vec<(u64, CachedAnswer)>) {
        let Ok(mut inner) = self.inner.lock() else {
            warn!("cache lock poisoned; skipping restore");
            return;
        };
        for (key, entry) in entries.into_iter().rev() {
            inner.put(key, entry);
        }
    }
}

/// Compute a cache key from a normalized payload.
///
/// Uses `DefaultHasher` (SipHash) for a reasonable collision-resistance /
/// performance trade-off. The hash is deterministic within a process
/// lifetime, which is sufficient for an in-memory cache; a shared
/// backend would need a stable cross-process hash instead.
pub(crate) fn cache_key(normalized: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    normalized.hash(&mut hasher);
    hasher.finish()
}
