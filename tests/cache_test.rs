//! Tests for [`ResponseCache`] — bounded, genuinely-LRU response store.

use std::time::Duration;

use muninn::{CacheConfig, ResponseCache};

fn small_cache(capacity: usize) -> ResponseCache {
    ResponseCache::new(&CacheConfig::new().capacity(capacity))
}

// =========================================================================
// CacheConfig
// =========================================================================

#[test]
fn cache_config_defaults() {
    let config = CacheConfig::default();
    assert_eq!(config.capacity, 10_000);
    assert!(config.ttl.is_none());
}

#[test]
fn cache_config_builder() {
    let config = CacheConfig::new()
        .capacity(500)
        .ttl(Duration::from_secs(60));
    assert_eq!(config.capacity, 500);
    assert_eq!(config.ttl, Some(Duration::from_secs(60)));
}

// =========================================================================
// Hit / miss basics
// =========================================================================

#[test]
fn miss_then_hit() {
    let cache = small_cache(8);

    assert!(cache.get(42).is_none());

    cache.put(42, "the answer".into());
    assert_eq!(cache.get(42).as_deref(), Some("the answer"));
    assert_eq!(cache.len(), 1);
}

#[test]
fn overwrite_replaces_text_without_growing() {
    let cache = small_cache(8);

    cache.put(1, "first".into());
    cache.put(1, "second".into());

    assert_eq!(cache.get(1).as_deref(), Some("second"));
    assert_eq!(cache.len(), 1);
}

// =========================================================================
// LRU eviction
// =========================================================================

#[test]
fn full_cache_evicts_exactly_the_lru_entry() {
    let cache = small_cache(3);
    cache.put(1, "one".into());
    cache.put(2, "two".into());
    cache.put(3, "three".into());

    // Key 1 is least recently used.
    cache.put(4, "four".into());

    assert_eq!(cache.len(), 3);
    assert!(cache.get(1).is_none());
    assert!(cache.get(2).is_some());
    assert!(cache.get(3).is_some());
    assert!(cache.get(4).is_some());
}

#[test]
fn get_promotes_entry_past_eviction() {
    let cache = small_cache(3);
    cache.put(1, "one".into());
    cache.put(2, "two".into());
    cache.put(3, "three".into());

    // Touch key 1; key 2 becomes the LRU victim.
    assert!(cache.get(1).is_some());
    cache.put(4, "four".into());

    assert!(cache.get(1).is_some());
    assert!(cache.get(2).is_none());
    assert!(cache.get(3).is_some());
    assert!(cache.get(4).is_some());
}

#[test]
fn put_promotes_existing_key() {
    let cache = small_cache(2);
    cache.put(1, "one".into());
    cache.put(2, "two".into());

    // Overwriting key 1 makes it MRU; inserting key 3 evicts key 2.
    cache.put(1, "one again".into());
    cache.put(3, "three".into());

    assert_eq!(cache.get(1).as_deref(), Some("one again"));
    assert!(cache.get(2).is_none());
    assert!(cache.get(3).is_some());
}

// =========================================================================
// TTL
// =========================================================================

#[test]
fn expired_entry_counts_as_miss() {
    let cache = ResponseCache::new(
        &CacheConfig::new().capacity(8).ttl(Duration::from_millis(30)),
    );
    cache.put(1, "stale soon".into());

    std::thread::sleep(Duration::from_millis(50));

    assert!(cache.get(1).is_none());
    assert_eq!(cache.len(), 0);
}

#[test]
fn fresh_entry_survives_ttl_window() {
    let cache = ResponseCache::new(
        &CacheConfig::new().capacity(8).ttl(Duration::from_secs(3600)),
    );
    cache.put(1, "fresh".into());
    assert!(cache.get(1).is_some());
}

// =========================================================================
// Housekeeping
// =========================================================================

#[test]
fn clear_empties_the_cache() {
    let cache = small_cache(8);
    cache.put(1, "one".into());
    cache.put(2, "two".into());
    assert!(!cache.is_empty());

    cache.clear();

    assert!(cache.is_empty());
    assert!(cache.get(1).is_none());
}
