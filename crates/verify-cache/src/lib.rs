//! Identifier → verification-state cache with expiry, file-mtime
//! invalidation, bounded eviction, and a source-scanning helper for finding
//! unverified type references.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{
        Arc, Weak,
        atomic::{AtomicI64, AtomicU64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use dashmap::DashMap;
use parking_lot::Mutex;
use regex::Regex;

/// Info about one member (method/field) of a verified type.
#[derive(Debug, Clone, Default)]
pub struct MemberInfo {
    pub name: String,
    pub kind: Option<String>,
}

/// Per-identifier verification record.
#[derive(Debug)]
pub struct VerificationState {
    pub name: String,
    pub file_path: Option<PathBuf>,
    pub namespace: Option<String>,
    pub verified_at: i64,
    pub expires_at: Option<i64>,
    pub file_mtime_ticks: Option<i64>,
    pub method: String,
    pub members: HashMap<String, MemberInfo>,
    pub metadata: HashMap<String, String>,
    access_count: AtomicU64,
    /// A strictly increasing sequence number stamped on insert and on every
    /// `is_verified` hit, not a wall-clock time. `next_access_seq` hands out
    /// one value per access cache-wide, so LRU eviction has a total order to
    /// sort by even when many entries are touched within the same second.
    last_access: AtomicI64,
    insertion_seq: u64,
}

impl VerificationState {
    pub fn access_count(&self) -> u64 {
        self.access_count.load(Ordering::Relaxed)
    }

    /// The access-sequence value of this entry's most recent touch. Lower is
    /// older; used as the LRU sort key, not a timestamp.
    pub fn last_access(&self) -> i64 {
        self.last_access.load(Ordering::Relaxed)
    }
}

/// Returns a strictly increasing sequence value, used instead of a
/// wall-clock timestamp to order LRU victims: many accesses can land in the
/// same wall-clock second, which would make `sort_by_key` ties arbitrary
/// (DashMap iteration order is unspecified).
fn next_access_seq(counter: &AtomicU64) -> i64 {
    counter.fetch_add(1, Ordering::Relaxed) as i64
}

/// Input to `mark_verified`.
#[derive(Debug, Clone, Default)]
pub struct VerifyInput {
    pub file_path: Option<PathBuf>,
    pub namespace: Option<String>,
    pub method: String,
    pub members: HashMap<String, MemberInfo>,
    pub metadata: HashMap<String, String>,
}

/// Strategy used to pick victims when the cache is over budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionStrategy {
    #[default]
    Lru,
    Lfu,
    Fifo,
    Random,
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub expiry: Duration,
    pub max_count: usize,
    pub max_bytes: usize,
    pub eviction_strategy: EvictionStrategy,
    pub eviction_percent: f64,
    pub watch_files: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(24 * 3600),
            max_count: 10_000,
            max_bytes: 32 * 1024 * 1024,
            eviction_strategy: EvictionStrategy::Lru,
            eviction_percent: 0.1,
            watch_files: false,
        }
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

fn mtime_ticks(path: &Path) -> Option<i64> {
    let metadata = std::fs::metadata(path).ok()?;
    let modified = metadata.modified().ok()?;
    Some(modified.duration_since(UNIX_EPOCH).ok()?.as_secs() as i64)
}

fn approx_bytes(name: &str, state: &VerifyInput) -> i64 {
    let mut size = name.len();
    size += state.method.len();
    size += state.namespace.as_ref().map(String::len).unwrap_or(0);
    size += state.file_path.as_ref().map(|p| p.as_os_str().len()).unwrap_or(0);
    size += state.members.keys().map(String::len).sum::<usize>();
    size += state.metadata.iter().map(|(k, v)| k.len() + v.len()).sum::<usize>();
    size as i64
}

/// Lock-free-read, single-mutex-eviction verification cache.
pub struct VerificationCache {
    entries: DashMap<String, VerificationState>,
    config: CacheConfig,
    eviction_lock: Mutex<()>,
    bytes_estimate: AtomicI64,
    hits: AtomicU64,
    misses: AtomicU64,
    insert_seq: AtomicU64,
    access_seq: AtomicU64,
    watched_dirs: DashMap<PathBuf, notify::RecommendedWatcher>,
}

impl VerificationCache {
    pub fn new(config: CacheConfig) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            config,
            eviction_lock: Mutex::new(()),
            bytes_estimate: AtomicI64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            insert_seq: AtomicU64::new(0),
            access_seq: AtomicU64::new(0),
            watched_dirs: DashMap::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Looks up `name`. Lock-free on the hot path: a single entry read plus
    /// an atomic access-count bump. Expiry and file-mtime checks remove the
    /// entry and report a miss rather than returning stale data.
    pub fn is_verified(&self, name: &str) -> bool {
        let Some(entry) = self.entries.get(name) else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        };

        let now = now_unix();

        if let Some(expires_at) = entry.expires_at
            && now > expires_at
        {
            drop(entry);
            self.remove(name);
            self.misses.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        if let Some(path) = &entry.file_path {
            let disk_mtime = mtime_ticks(path);
            let stale = match (disk_mtime, entry.file_mtime_ticks) {
                (Some(disk), Some(snapshot)) => disk > snapshot,
                (None, _) => true,
                _ => false,
            };

            if stale {
                drop(entry);
                self.remove(name);
                self.misses.fetch_add(1, Ordering::Relaxed);
                return false;
            }
        }

        entry.access_count.fetch_add(1, Ordering::Relaxed);
        entry.last_access.store(next_access_seq(&self.access_seq), Ordering::Relaxed);
        self.hits.fetch_add(1, Ordering::Relaxed);

        true
    }

    /// Marks `name` as verified, merging with any existing entry by keeping
    /// the newer `verified_at`. Triggers eviction if the cache is now over
    /// budget; refuses the insert outright if eviction cannot bring a brand
    /// new entry back under budget.
    pub fn mark_verified(self: &Arc<Self>, name: &str, input: VerifyInput) {
        let now = now_unix();
        let is_new = !self.entries.contains_key(name);

        if is_new && self.entries.len() >= self.config.max_count {
            self.evict();

            if self.entries.len() >= self.config.max_count {
                log::error!(
                    "verification cache at capacity ({} entries); refusing insert for '{name}'",
                    self.entries.len()
                );
                return;
            }
        }

        let expires_at = Some(now + self.config.expiry.as_secs() as i64);
        let file_mtime_ticks = input.file_path.as_deref().and_then(mtime_ticks);
        let size_delta = approx_bytes(name, &input);

        let seq = self.insert_seq.fetch_add(1, Ordering::Relaxed);

        self.entries
            .entry(name.to_string())
            .and_modify(|existing| {
                if now >= existing.verified_at {
                    existing.verified_at = now;
                    existing.expires_at = expires_at;
                    existing.file_mtime_ticks = file_mtime_ticks;
                    existing.namespace = input.namespace.clone();
                    existing.method = input.method.clone();
                    existing.members = input.members.clone();
                    existing.metadata = input.metadata.clone();
                    existing.file_path = input.file_path.clone();
                }
                existing.last_access.store(next_access_seq(&self.access_seq), Ordering::Relaxed);
            })
            .or_insert_with(|| VerificationState {
                name: name.to_string(),
                file_path: input.file_path.clone(),
                namespace: input.namespace.clone(),
                verified_at: now,
                expires_at,
                file_mtime_ticks,
                method: input.method.clone(),
                members: input.members.clone(),
                metadata: input.metadata.clone(),
                access_count: AtomicU64::new(0),
                last_access: AtomicI64::new(next_access_seq(&self.access_seq)),
                insertion_seq: seq,
            });

        if is_new {
            self.bytes_estimate.fetch_add(size_delta, Ordering::Relaxed);
        }

        if self.config.watch_files
            && let Some(path) = &input.file_path
        {
            self.watch(path);
        }

        if self.over_budget() {
            self.evict();
        }
    }

    fn over_budget(&self) -> bool {
        self.entries.len() > self.config.max_count
            || self.bytes_estimate.load(Ordering::Relaxed) as usize > self.config.max_bytes
    }

    fn remove(&self, name: &str) {
        self.entries.remove(name);
    }

    /// Selects and removes eviction victims in one pass. Holds the eviction
    /// mutex only around victim selection; removal itself uses dashmap's
    /// lock-free entry API.
    fn evict(&self) {
        let _guard = self.eviction_lock.lock();

        let size = self.entries.len();
        if size == 0 {
            return;
        }

        let excess_count = size.saturating_sub(self.config.max_count);
        let percent_target = (size as f64 * self.config.eviction_percent).ceil() as usize;

        let bytes_over = (self.bytes_estimate.load(Ordering::Relaxed) as usize)
            .saturating_sub(self.config.max_bytes);
        let avg_bytes = (self.bytes_estimate.load(Ordering::Relaxed) as usize / size.max(1)).max(1);
        let memory_excess_estimate = ((bytes_over as f64 / avg_bytes as f64) * 1.2).ceil() as usize;

        let target = excess_count
            .max(percent_target)
            .max(memory_excess_estimate)
            .min(size / 2)
            .max(1)
            .min(size);

        let mut candidates: Vec<(String, i64, u64, u64)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.last_access(), e.access_count(), e.insertion_seq))
            .collect();

        let mut strategy = self.config.eviction_strategy;

        let victims: Vec<String> = match strategy {
            EvictionStrategy::Lru => {
                candidates.sort_by_key(|(_, last_access, _, _)| *last_access);
                candidates.into_iter().take(target).map(|(name, ..)| name).collect()
            }
            EvictionStrategy::Lfu => {
                candidates.sort_by_key(|(_, _, access_count, _)| *access_count);
                candidates.into_iter().take(target).map(|(name, ..)| name).collect()
            }
            EvictionStrategy::Fifo => {
                candidates.sort_by_key(|(_, _, _, seq)| *seq);
                candidates.into_iter().take(target).map(|(name, ..)| name).collect()
            }
            EvictionStrategy::Random => {
                use rand::seq::SliceRandom;
                let mut rng = rand::rng();
                candidates.shuffle(&mut rng);
                candidates.into_iter().take(target).map(|(name, ..)| name).collect()
            }
        };

        // A strategy that somehow selects nothing (e.g. empty candidate
        // list after a race) falls back to LRU.
        let victims = if victims.is_empty() && !candidates.is_empty() {
            strategy = EvictionStrategy::Lru;
            log::warn!("eviction strategy {strategy:?} selected no victims, falling back to LRU");
            let mut fallback = candidates;
            fallback.sort_by_key(|(_, last_access, _, _)| *last_access);
            fallback.into_iter().take(target).map(|(name, ..)| name).collect()
        } else {
            victims
        };

        let mut removed_bytes = 0i64;
        for name in victims {
            const MAX_RETRIES: u8 = 3;
            for _ in 0..MAX_RETRIES {
                if let Some((_, state)) = self.entries.remove(&name) {
                    removed_bytes += approx_bytes(
                        &state.name,
                        &VerifyInput {
                            file_path: state.file_path,
                            namespace: state.namespace,
                            method: state.method,
                            members: state.members,
                            metadata: state.metadata,
                        },
                    );
                    break;
                }
                // Already removed by a concurrent caller; nothing to retry.
                break;
            }
        }

        self.bytes_estimate.fetch_sub(removed_bytes, Ordering::Relaxed);

        if self.over_budget() {
            log::error!(
                "verification cache still over budget after eviction ({} entries, ~{} bytes)",
                self.entries.len(),
                self.bytes_estimate.load(Ordering::Relaxed)
            );
        }
    }

    fn watch(self: &Arc<Self>, path: &Path) {
        let Some(dir) = path.parent() else { return };
        if dir.as_os_str().is_empty() || self.watched_dirs.contains_key(dir) {
            return;
        }

        let weak: Weak<VerificationCache> = Arc::downgrade(self);
        let (tx, rx) = std::sync::mpsc::channel::<notify::Result<notify::Event>>();

        let watcher = match notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        }) {
            Ok(mut watcher) => {
                use notify::Watcher;
                if watcher.watch(dir, notify::RecursiveMode::NonRecursive).is_err() {
                    return;
                }
                watcher
            }
            Err(err) => {
                log::warn!("failed to watch {}: {err}", dir.display());
                return;
            }
        };

        self.watched_dirs.insert(dir.to_path_buf(), watcher);

        std::thread::spawn(move || {
            for res in rx {
                let Ok(event) = res else { continue };
                let is_invalidating =
                    matches!(event.kind, notify::EventKind::Modify(_) | notify::EventKind::Remove(_));

                if !is_invalidating {
                    continue;
                }

                let Some(cache) = weak.upgrade() else { break };
                for changed_path in &event.paths {
                    cache.invalidate_path(changed_path);
                }
            }
        });
    }

    fn invalidate_path(&self, path: &Path) {
        self.entries.retain(|_, state| state.file_path.as_deref() != Some(path));
    }
}

/// A reference to a type (and optionally one of its members) found in
/// source text by `unverified_types_in`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeReference {
    pub type_name: String,
    pub member_name: Option<String>,
}

const PRIMITIVE_KEYWORDS: &[&str] = &[
    "String", "Int", "Integer", "Boolean", "Bool", "Number", "Object", "Array", "Void", "Float", "Double", "Char",
    "Long", "Short", "Byte", "Any", "Unknown",
];

fn c_family_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bnew\s+([A-Z][A-Za-z0-9_]*)\s*\(|\b([A-Z][A-Za-z0-9_]*)::([A-Za-z_][A-Za-z0-9_]*)\b").unwrap()
    })
}

fn ts_family_pattern() -> &'static Regex {
    static RE: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\bnew\s+([A-Z][A-Za-z0-9_]*)\s*\(|\b([A-Z][A-Za-z0-9_]*)\.([A-Za-z_][A-Za-z0-9_]*)\b").unwrap()
    })
}

fn is_ts_family(file_path: &str) -> bool {
    matches!(
        Path::new(file_path).extension().and_then(|e| e.to_str()),
        Some("ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs")
    )
}

/// Scans `code` for references to types that are not primitive keywords,
/// selecting a pattern bank by `file_path`'s extension.
pub fn unverified_types_in(code: &str, file_path: &str) -> Vec<TypeReference> {
    let pattern = if is_ts_family(file_path) { ts_family_pattern() } else { c_family_pattern() };

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();

    for caps in pattern.captures_iter(code) {
        let (type_name, member_name) = if let Some(ctor) = caps.get(1) {
            (ctor.as_str(), None)
        } else {
            let type_name = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let member_name = caps.get(3).map(|m| m.as_str().to_string());
            (type_name, member_name)
        };

        if type_name.is_empty() || PRIMITIVE_KEYWORDS.contains(&type_name) {
            continue;
        }

        let key = (type_name.to_string(), member_name.clone());
        if seen.insert(key) {
            out.push(TypeReference { type_name: type_name.to_string(), member_name });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(max_count: usize) -> Arc<VerificationCache> {
        VerificationCache::new(CacheConfig {
            max_count,
            expiry: Duration::from_secs(3600),
            ..Default::default()
        })
    }

    #[test]
    fn unknown_identifier_is_not_verified() {
        let cache = cache(100);
        assert!(!cache.is_verified("DoesNotExist"));
    }

    #[test]
    fn marking_verified_makes_it_verified() {
        let cache = cache(100);
        cache.mark_verified("Widget", VerifyInput { method: "scan".into(), ..Default::default() });
        assert!(cache.is_verified("Widget"));
    }

    #[test]
    fn expired_entries_are_not_verified() {
        let cache = VerificationCache::new(CacheConfig {
            expiry: Duration::from_secs(0),
            ..Default::default()
        });
        cache.mark_verified("Widget", VerifyInput::default());
        std::thread::sleep(Duration::from_millis(1100));
        assert!(!cache.is_verified("Widget"));
    }

    #[test]
    fn file_mtime_change_invalidates_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("widget.rs");
        std::fs::write(&path, "struct Widget;").unwrap();

        let cache = cache(100);
        cache.mark_verified(
            "Widget",
            VerifyInput { file_path: Some(path.clone()), method: "scan".into(), ..Default::default() },
        );
        assert!(cache.is_verified("Widget"));

        std::thread::sleep(Duration::from_secs(1));
        std::fs::write(&path, "struct Widget { x: i32 }").unwrap();

        assert!(!cache.is_verified("Widget"));
    }

    #[test]
    fn eviction_keeps_size_under_max_count() {
        let cache = cache(100);

        for i in 0..200 {
            cache.mark_verified(&format!("Type{i}"), VerifyInput::default());
        }

        for i in 150..200 {
            cache.is_verified(&format!("Type{i}"));
        }

        assert!(cache.len() <= 100);
        for i in 150..200 {
            assert!(cache.is_verified(&format!("Type{i}")), "Type{i} should survive LRU eviction");
        }
    }

    #[test]
    fn unverified_types_in_finds_constructor_and_static_member() {
        let code = "let w = new Widget(); Helper::compute(w); let s: String = \"x\".to_string();";
        let refs = unverified_types_in(code, "main.cs");

        assert!(refs.iter().any(|r| r.type_name == "Widget"));
        assert!(refs.iter().any(|r| r.type_name == "Helper" && r.member_name.as_deref() == Some("compute")));
        assert!(!refs.iter().any(|r| r.type_name == "String"));
    }

    #[test]
    fn unverified_types_in_dedupes_by_type_and_member() {
        let code = "Helper.run(); Helper.run(); Helper.run();";
        let refs = unverified_types_in(code, "main.ts");
        assert_eq!(refs.len(), 1);
    }
}
