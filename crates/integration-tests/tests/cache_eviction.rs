//! With `max_count=100` and LRU eviction, inserting 200 distinct
//! identifiers and then re-touching the last 50 keeps the cache at or
//! under its bound while retaining every re-touched entry.

use std::time::Duration;

use verify_cache::{CacheConfig, EvictionStrategy, VerificationCache, VerifyInput};

#[test]
fn lru_eviction_retains_recently_accessed_entries() {
    let cache = VerificationCache::new(CacheConfig {
        max_count: 100,
        eviction_strategy: EvictionStrategy::Lru,
        expiry: Duration::from_secs(3600),
        ..Default::default()
    });

    for i in 0..200 {
        cache.mark_verified(&format!("Type{i}"), VerifyInput::default());
    }

    for i in 150..200 {
        cache.is_verified(&format!("Type{i}"));
    }

    assert!(cache.len() <= 100);
    for i in 150..200 {
        assert!(cache.is_verified(&format!("Type{i}")), "Type{i} was recently accessed and must survive eviction");
    }
}
