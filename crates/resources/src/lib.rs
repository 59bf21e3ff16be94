//! Append-only, content-addressed blob store. `mcp://<category>/<id>` URIs,
//! immutable blobs, optional TTL eviction via a background sweep task.

use std::{
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use dashmap::DashMap;
use sha2::{Digest, Sha256};

/// A stored blob.
#[derive(Debug, Clone)]
pub struct Resource {
    pub uri: String,
    pub mime_type: String,
    pub content: Arc<Vec<u8>>,
    pub created_at: i64,
    pub ttl: Option<Duration>,
}

/// Pluggable storage backend for the resource store.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Stores `bytes` under `category`, returning its `mcp://` URI. The id
    /// component is a content hash, so storing identical bytes under the
    /// same category is idempotent.
    async fn store(&self, category: &str, bytes: Vec<u8>, mime_type: Option<&str>) -> String;

    /// Retrieves a previously stored blob's bytes, if present and not
    /// expired.
    async fn retrieve(&self, uri: &str) -> Option<Arc<Vec<u8>>>;

    /// Returns whether `uri` currently resolves to a live blob.
    async fn exists(&self, uri: &str) -> bool {
        self.retrieve(uri).await.is_some()
    }

    /// Lists currently live resources' metadata (no content), for
    /// `resources/list`. Backends that can't enumerate cheaply may leave
    /// this empty.
    async fn list(&self) -> Vec<Resource> {
        Vec::new()
    }
}

fn now_unix() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

/// Content hash used for the `<id>` component of a resource URI (truncated
/// hex-encoded Sha256 digest).
fn content_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex_encode(&digest)[..32].to_string()
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

/// In-memory `ResourceStore` implementation, the default for this framework.
pub struct MemoryResourceStore {
    blobs: DashMap<String, Resource>,
    default_ttl: Option<Duration>,
    sweeper: std::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    stats_evicted: AtomicI64,
}

impl MemoryResourceStore {
    /// Creates a store with no default TTL; entries live until the process
    /// ends or are explicitly evicted by a caller-driven sweep.
    pub fn new() -> Arc<Self> {
        Self::with_default_ttl(None)
    }

    /// Creates a store where every entry without an explicit TTL inherits
    /// `default_ttl`.
    pub fn with_default_ttl(default_ttl: Option<Duration>) -> Arc<Self> {
        Arc::new(Self {
            blobs: DashMap::new(),
            default_ttl,
            sweeper: std::sync::Mutex::new(None),
            stats_evicted: AtomicI64::new(0),
        })
    }

    /// Spawns a background sweep task that evicts expired blobs every
    /// `interval`. Returns the owned handle's store so callers can await
    /// cancellation; the handle itself is kept inside `self` and joined on
    /// `shutdown`.
    pub fn spawn_ttl_sweep(self: &Arc<Self>, interval: Duration) {
        let store = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.sweep_expired();
            }
        });

        *self.sweeper.lock().unwrap() = Some(handle);
    }

    /// Aborts the background sweep task, if one was spawned. The handle is
    /// kept rather than discarded so the task can be cancelled on shutdown
    /// instead of running forever in the background.
    pub fn shutdown(&self) {
        if let Some(handle) = self.sweeper.lock().unwrap().take() {
            handle.abort();
        }
    }

    fn sweep_expired(&self) {
        let now = now_unix();
        let mut evicted = 0i64;

        self.blobs.retain(|_, resource| {
            let alive = match resource.ttl {
                Some(ttl) => (now - resource.created_at) < ttl.as_secs() as i64,
                None => true,
            };
            if !alive {
                evicted += 1;
            }
            alive
        });

        if evicted > 0 {
            self.stats_evicted.fetch_add(evicted, Ordering::Relaxed);
            log::debug!("resource store TTL sweep evicted {evicted} blobs");
        }
    }

    /// Total blobs evicted by the TTL sweep since this store was created.
    pub fn evicted_count(&self) -> i64 {
        self.stats_evicted.load(Ordering::Relaxed)
    }
}

impl Default for MemoryResourceStore {
    fn default() -> Self {
        Self {
            blobs: DashMap::new(),
            default_ttl: None,
            sweeper: std::sync::Mutex::new(None),
            stats_evicted: AtomicI64::new(0),
        }
    }
}

#[async_trait]
impl ResourceStore for MemoryResourceStore {
    async fn store(&self, category: &str, bytes: Vec<u8>, mime_type: Option<&str>) -> String {
        let id = content_id(&bytes);
        let uri = format!("mcp://{category}/{id}");

        self.blobs.entry(uri.clone()).or_insert_with(|| Resource {
            uri: uri.clone(),
            mime_type: mime_type.unwrap_or("application/octet-stream").to_string(),
            content: Arc::new(bytes),
            created_at: now_unix(),
            ttl: self.default_ttl,
        });

        uri
    }

    async fn retrieve(&self, uri: &str) -> Option<Arc<Vec<u8>>> {
        let resource = self.blobs.get(uri)?;

        if let Some(ttl) = resource.ttl
            && now_unix() - resource.created_at >= ttl.as_secs() as i64
        {
            drop(resource);
            self.blobs.remove(uri);
            return None;
        }

        Some(Arc::clone(&resource.content))
    }

    async fn list(&self) -> Vec<Resource> {
        let now = now_unix();
        self.blobs
            .iter()
            .filter(|entry| match entry.value().ttl {
                Some(ttl) => (now - entry.value().created_at) < ttl.as_secs() as i64,
                None => true,
            })
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn store_and_retrieve_round_trips() {
        let store = MemoryResourceStore::new();
        let uri = store.store("logs", b"hello".to_vec(), Some("text/plain")).await;

        assert!(uri.starts_with("mcp://logs/"));
        assert_eq!(store.retrieve(&uri).await.unwrap().as_slice(), b"hello");
        assert!(store.exists(&uri).await);
    }

    #[tokio::test]
    async fn storing_identical_bytes_is_idempotent() {
        let store = MemoryResourceStore::new();
        let a = store.store("logs", b"same".to_vec(), None).await;
        let b = store.store("logs", b"same".to_vec(), None).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn missing_uri_returns_none() {
        let store = MemoryResourceStore::new();
        assert!(store.retrieve("mcp://logs/does-not-exist").await.is_none());
        assert!(!store.exists("mcp://logs/does-not-exist").await);
    }

    #[tokio::test]
    async fn list_returns_only_live_blobs() {
        let store = MemoryResourceStore::with_default_ttl(Some(Duration::from_millis(10)));
        store.store("tmp", b"short-lived".to_vec(), None).await;
        let persistent = MemoryResourceStore::new();
        persistent.store("logs", b"hello".to_vec(), None).await;

        assert_eq!(persistent.list().await.len(), 1);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.list().await.is_empty());
    }

    #[tokio::test]
    async fn ttl_sweep_evicts_expired_blobs() {
        let store = MemoryResourceStore::with_default_ttl(Some(Duration::from_millis(10)));
        let uri = store.store("tmp", b"short-lived".to_vec(), None).await;

        tokio::time::sleep(Duration::from_millis(30)).await;
        store.sweep_expired();

        assert!(store.retrieve(&uri).await.is_none());
        assert_eq!(store.evicted_count(), 1);
    }
}
