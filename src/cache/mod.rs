//! TTL-bound cache for rate-limited providers
//!
//! One `CacheStore<T>` type over two backends, chosen by configuration:
//!
//! | Mode | Backend | Concurrency |
//! |------|---------|-------------|
//! | in-memory | expiring map | internal locking, single process |
//! | file | one JSON document | advisory lock file, many processes |
//!
//! Both backends share the same TTL check: an entry whose `expires_at` has
//! passed is reported as a miss, whether or not it has been evicted yet.
//! The payload `T` is opaque; the owning provider decides what it holds and
//! how long it stays fresh.

mod file;
pub mod lock;
mod memory;

pub use file::Table;
pub use lock::{lock_path_for, FileLock, LockMode, LockOptions};

use crate::context::Context;
use crate::error::GridResult;
use chrono::{DateTime, Utc};
use file::FileBackend;
use memory::MemoryBackend;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Shortest lifetime given to an entry whose upstream expiry already passed
const MIN_REFRESH: Duration = Duration::from_secs(1);

/// A cached payload and the instant it stops being servable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    /// Provider-defined payload
    pub data: T,

    /// When the entry must start being treated as a miss
    #[serde(rename = "ttl", alias = "expires_at")]
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, expires_at: DateTime<Utc>) -> Self {
        Self { data, expires_at }
    }

    /// Check if the entry is past its deadline
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Time left before expiry, zero once expired
    pub fn time_to_live(&self) -> Duration {
        (self.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Compute an expiry that is never already in the past.
///
/// `candidate` usually comes from upstream metadata (the end of the data's
/// validity window). When it has already passed, the entry is given one full
/// `refresh` interval from now instead. Intervals too large to represent
/// saturate at the latest representable time.
pub fn fresh_expiry(candidate: DateTime<Utc>, refresh: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    if candidate > now {
        return candidate;
    }

    chrono::Duration::from_std(refresh.max(MIN_REFRESH))
        .ok()
        .and_then(|refresh| now.checked_add_signed(refresh))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Backend selection
#[derive(Debug, Clone, Default)]
pub struct CacheConfig {
    /// JSON cache file. `None` selects the in-memory backend.
    pub cache_file: Option<PathBuf>,

    /// Lock acquisition bounds for the file backend
    pub lock: LockOptions,
}

enum Backend<T>
where
    T: Clone + Send + Sync + 'static,
{
    Memory(MemoryBackend<T>),
    File(FileBackend),
}

/// Key to payload cache with per-entry expiry
pub struct CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    backend: Backend<T>,
}

impl<T> CacheStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Create a store for the given configuration
    pub fn new(config: CacheConfig) -> Self {
        let backend = match config.cache_file {
            Some(path) => Backend::File(FileBackend::new(path, config.lock)),
            None => Backend::Memory(MemoryBackend::new()),
        };
        Self { backend }
    }

    /// Single-process store
    pub fn in_memory() -> Self {
        Self::new(CacheConfig::default())
    }

    /// Store backed by a JSON file shared across processes
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(CacheConfig {
            cache_file: Some(path.into()),
            lock: LockOptions::default(),
        })
    }

    /// Path of the cache file, for file-backed stores
    pub fn cache_file(&self) -> Option<&Path> {
        match &self.backend {
            Backend::File(file) => Some(file.cache_file()),
            Backend::Memory(_) => None,
        }
    }

    /// Look up a fresh payload.
    ///
    /// `Ok(None)` covers both a miss and an expired entry. An `Err` means the
    /// cache itself could not be consulted (lock timeout, I/O, corrupt file).
    pub async fn get(&self, ctx: &Context, key: &str) -> GridResult<Option<T>> {
        let entry = match &self.backend {
            Backend::Memory(memory) => memory.get(key).await,
            Backend::File(file) => file.load::<T>(ctx).await?.remove(key),
        };

        Ok(entry.filter(|e| !e.is_expired()).map(|e| e.data))
    }

    /// Store `data` under `key` until `expires_at`, replacing any prior entry
    pub async fn set(
        &self,
        ctx: &Context,
        key: &str,
        data: T,
        expires_at: DateTime<Utc>,
    ) -> GridResult<()> {
        let entry = CacheEntry::new(data, expires_at);

        match &self.backend {
            Backend::Memory(memory) => {
                memory.insert(key.to_string(), entry).await;
                Ok(())
            }
            Backend::File(file) => {
                file.update(ctx, |table: &mut Table<T>| {
                    table.retain(|_, e| !e.is_expired());
                    table.insert(key.to_string(), entry);
                })
                .await
            }
        }
    }

    /// Every stored entry, expired ones included, sorted by key
    pub async fn entries(&self, ctx: &Context) -> GridResult<Vec<(String, CacheEntry<T>)>> {
        let mut entries: Vec<_> = match &self.backend {
            Backend::Memory(memory) => memory.entries(),
            Backend::File(file) => file.load::<T>(ctx).await?.into_iter().collect(),
        };
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    /// Drop every entry
    pub async fn clear(&self, ctx: &Context) -> GridResult<()> {
        match &self.backend {
            Backend::Memory(memory) => {
                memory.clear().await;
                Ok(())
            }
            Backend::File(file) => file.remove(ctx).await,
        }
    }
}

impl<T> fmt::Debug for CacheStore<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.backend {
            Backend::Memory(_) => f.debug_struct("CacheStore").field("mode", &"memory").finish(),
            Backend::File(file) => f
                .debug_struct("CacheStore")
                .field("mode", &"file")
                .field("cache_file", &file.cache_file())
                .field("lock_file", &file.lock_file())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn in_five_minutes() -> DateTime<Utc> {
        Utc::now() + chrono::Duration::minutes(5)
    }

    fn file_store(path: &Path) -> CacheStore<f64> {
        CacheStore::new(CacheConfig {
            cache_file: Some(path.to_path_buf()),
            lock: LockOptions {
                timeout: Duration::from_secs(10),
                retry_delay: Duration::from_millis(5),
            },
        })
    }

    #[test]
    fn fresh_expiry_keeps_future_candidate() {
        let candidate = in_five_minutes();
        assert_eq!(fresh_expiry(candidate, Duration::from_secs(300)), candidate);
    }

    #[test]
    fn fresh_expiry_clamps_past_candidate() {
        let candidate = Utc::now() - chrono::Duration::hours(2);
        let expiry = fresh_expiry(candidate, Duration::from_secs(300));

        assert!(expiry > Utc::now());
        assert!(expiry <= Utc::now() + chrono::Duration::seconds(300));
    }

    #[test]
    fn fresh_expiry_zero_refresh_is_still_future() {
        let candidate = Utc::now() - chrono::Duration::hours(2);
        let expiry = fresh_expiry(candidate, Duration::ZERO);

        assert!(expiry > Utc::now());
    }

    #[test]
    fn fresh_expiry_saturates_huge_refresh() {
        let candidate = Utc::now() - chrono::Duration::hours(2);

        assert_eq!(fresh_expiry(candidate, Duration::MAX), DateTime::<Utc>::MAX_UTC);
        assert_eq!(
            fresh_expiry(candidate, Duration::from_secs(9_000_000_000_000)),
            DateTime::<Utc>::MAX_UTC
        );
    }

    #[test]
    fn entry_serializes_ttl_field() {
        let entry = CacheEntry::new(312.0f64, in_five_minutes());
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["data"], 312.0);
        assert!(json["ttl"].is_string());

        let parsed: CacheEntry<f64> = serde_json::from_value(serde_json::json!({
            "data": 1.5,
            "expires_at": "2030-01-01T00:00:00Z",
        }))
        .unwrap();
        assert_eq!(parsed.data, 1.5);
    }

    #[tokio::test]
    async fn memory_set_overwrites() {
        let store = CacheStore::<f64>::in_memory();
        let ctx = Context::background();

        store.set(&ctx, "IN-KA", 312.0, in_five_minutes()).await.unwrap();
        store.set(&ctx, "IN-KA", 315.0, in_five_minutes()).await.unwrap();

        assert_eq!(store.get(&ctx, "IN-KA").await.unwrap(), Some(315.0));
        assert!(store.cache_file().is_none());
    }

    #[tokio::test]
    async fn memory_expired_entry_is_never_served() {
        let store = CacheStore::<f64>::in_memory();
        let ctx = Context::background();

        store
            .set(&ctx, "IN-KA", 312.0, Utc::now() - chrono::Duration::seconds(5))
            .await
            .unwrap();

        assert_eq!(store.get(&ctx, "IN-KA").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn memory_concurrent_distinct_keys() {
        let store = Arc::new(CacheStore::<f64>::in_memory());
        let ctx = Context::background();

        let handles: Vec<_> = (0..64)
            .map(|i| {
                let store = Arc::clone(&store);
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    store
                        .set(&ctx, &format!("region-{i}"), i as f64, in_five_minutes())
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        for i in 0..64 {
            let value = store.get(&ctx, &format!("region-{i}")).await.unwrap();
            assert_eq!(value, Some(i as f64));
        }
    }

    #[tokio::test]
    async fn file_round_trip_and_miss() {
        let dir = TempDir::new().unwrap();
        let store = file_store(&dir.path().join("cache.json"));
        let ctx = Context::background();

        assert_eq!(store.get(&ctx, "IN-KA").await.unwrap(), None);

        store.set(&ctx, "IN-KA", 312.0, in_five_minutes()).await.unwrap();

        assert_eq!(store.get(&ctx, "IN-KA").await.unwrap(), Some(312.0));
        assert_eq!(store.get(&ctx, "IN-AP").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_expired_entry_is_never_served() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let ctx = Context::background();

        // Written by hand so the stale entry is really on disk.
        std::fs::write(
            &path,
            r#"{"IN-KA":{"data":312.0,"ttl":"2001-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let store = file_store(&path);
        assert_eq!(store.get(&ctx, "IN-KA").await.unwrap(), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn two_stores_same_file_keep_both_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("shared").join("cache.json");
        let first = Arc::new(file_store(&path));
        let second = Arc::new(file_store(&path));
        let ctx = Context::background();

        let mut handles = Vec::new();
        for i in 0..20 {
            let store = if i % 2 == 0 {
                Arc::clone(&first)
            } else {
                Arc::clone(&second)
            };
            let ctx = ctx.clone();
            handles.push(tokio::spawn(async move {
                store
                    .set(&ctx, &format!("key-{i}"), i as f64, in_five_minutes())
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let raw = std::fs::read_to_string(&path).unwrap();
        let table: Table<f64> = serde_json::from_str(&raw).unwrap();
        assert_eq!(table.len(), 20);

        for i in 0..20 {
            assert_eq!(second.get(&ctx, &format!("key-{i}")).await.unwrap(), Some(i as f64));
        }
    }

    #[tokio::test]
    async fn file_set_prunes_expired_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(
            &path,
            r#"{"OLD":{"data":1.0,"ttl":"2001-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let store = file_store(&path);
        let ctx = Context::background();
        store.set(&ctx, "NEW", 2.0, in_five_minutes()).await.unwrap();

        let entries = store.entries(&ctx).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, "NEW");
    }

    #[tokio::test]
    async fn file_clear_removes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let store = file_store(&path);
        let ctx = Context::background();

        store.set(&ctx, "IN-KA", 312.0, in_five_minutes()).await.unwrap();
        assert!(path.exists());

        store.clear(&ctx).await.unwrap();
        assert!(!path.exists());
        assert_eq!(store.get(&ctx, "IN-KA").await.unwrap(), None);
    }

    #[tokio::test]
    async fn file_lock_held_elsewhere_is_cache_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let ctx = Context::background();

        let _held = FileLock::acquire(
            &ctx,
            &lock_path_for(&path),
            LockMode::Exclusive,
            LockOptions::default(),
        )
        .await
        .unwrap();

        let store = CacheStore::<f64>::new(CacheConfig {
            cache_file: Some(path),
            lock: LockOptions {
                timeout: Duration::from_millis(50),
                retry_delay: Duration::from_millis(10),
            },
        });

        let err = store.get(&ctx, "IN-KA").await.unwrap_err();
        assert!(err.is_cache_unavailable());
    }
}
