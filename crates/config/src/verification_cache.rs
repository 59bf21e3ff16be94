//! `[verification_cache]`: bounds and eviction policy for the identifier
//! verification cache.

use serde::Deserialize;

/// Mirrors `verify_cache::EvictionStrategy`; kept separate for the same
/// reason as `tokens::SafetyMode` — see that module's doc comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EvictionStrategy {
    #[default]
    Lru,
    Lfu,
    Fifo,
    Random,
}

/// Verification-cache bounds and eviction policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationCacheConfig {
    /// Hours after which a verified entry expires even without file change.
    pub expiry_hours: f64,
    /// Maximum number of entries before eviction triggers.
    pub max_count: usize,
    /// Maximum estimated total bytes before eviction triggers.
    pub max_bytes: usize,
    /// Strategy used to pick eviction victims.
    pub eviction_strategy: EvictionStrategy,
    /// Fraction of the cache evicted at minimum once eviction triggers.
    pub eviction_percent: f64,
    /// Whether a filesystem watcher invalidates entries on write/delete.
    pub watch_files: bool,
}

impl Default for VerificationCacheConfig {
    fn default() -> Self {
        Self {
            expiry_hours: 24.0,
            max_count: 10_000,
            max_bytes: 50 * 1024 * 1024,
            eviction_strategy: EvictionStrategy::default(),
            eviction_percent: 0.1,
            watch_files: true,
        }
    }
}
