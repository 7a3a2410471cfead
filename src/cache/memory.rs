//! In-process expiring map backend

use super::CacheEntry;
use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

/// Expires each entry at its own `expires_at`
struct EntryExpiry;

impl<T> Expiry<String, CacheEntry<T>> for EntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CacheEntry<T>,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.time_to_live())
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CacheEntry<T>,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.time_to_live())
    }
}

pub(crate) struct MemoryBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    cache: Cache<String, CacheEntry<T>>,
}

impl<T> MemoryBackend<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            cache: Cache::builder().expire_after(EntryExpiry).build(),
        }
    }

    pub(crate) async fn get(&self, key: &str) -> Option<CacheEntry<T>> {
        let entry = self.cache.get(key).await?;

        // Eviction runs on moka's schedule, so an entry can outlive its
        // deadline by a little.
        if entry.is_expired() {
            self.cache.invalidate(key).await;
            return None;
        }

        Some(entry)
    }

    pub(crate) async fn insert(&self, key: String, entry: CacheEntry<T>) {
        self.cache.insert(key, entry).await;
    }

    pub(crate) fn entries(&self) -> Vec<(String, CacheEntry<T>)> {
        self.cache
            .iter()
            .map(|(k, v)| (k.as_ref().clone(), v))
            .collect()
    }

    pub(crate) async fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
    }
}
