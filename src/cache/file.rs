//! JSON file backend shared between processes
//!
//! The whole table lives in one JSON object keyed by cache key. Reads take
//! a shared lock on the sidecar lock file; writes take an exclusive lock and
//! re-read, merge and rewrite the table before releasing it. Nothing is kept
//! in memory between calls because another process may have changed the file.

use super::lock::{lock_path_for, FileLock, LockMode, LockOptions};
use super::CacheEntry;
use crate::context::Context;
use crate::error::{GridError, GridResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

/// On-disk table: key to entry
pub type Table<T> = BTreeMap<String, CacheEntry<T>>;

#[derive(Debug, Clone)]
pub(crate) struct FileBackend {
    cache_file: PathBuf,
    lock_file: PathBuf,
    lock: LockOptions,
}

impl FileBackend {
    pub(crate) fn new(cache_file: PathBuf, lock: LockOptions) -> Self {
        let lock_file = lock_path_for(&cache_file);
        Self {
            cache_file,
            lock_file,
            lock,
        }
    }

    pub(crate) fn cache_file(&self) -> &Path {
        &self.cache_file
    }

    pub(crate) fn lock_file(&self) -> &Path {
        &self.lock_file
    }

    /// Read the full table under a shared lock
    pub(crate) async fn load<T: DeserializeOwned>(&self, ctx: &Context) -> GridResult<Table<T>> {
        self.ensure_dir().await?;

        let _lock = FileLock::acquire(ctx, &self.lock_file, LockMode::Shared, self.lock).await?;
        self.read_table().await
    }

    /// Read-modify-write the table under an exclusive lock
    pub(crate) async fn update<T, F>(&self, ctx: &Context, apply: F) -> GridResult<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Table<T>),
    {
        self.ensure_dir().await?;

        let _lock =
            FileLock::acquire(ctx, &self.lock_file, LockMode::Exclusive, self.lock).await?;

        let mut table = self.read_table().await?;
        apply(&mut table);

        let data = serde_json::to_vec(&table)?;
        fs::write(&self.cache_file, data).await.map_err(|e| {
            GridError::io(format!("writing cache file {}", self.cache_file.display()), e)
        })
    }

    /// Delete the cache file under an exclusive lock
    pub(crate) async fn remove(&self, ctx: &Context) -> GridResult<()> {
        self.ensure_dir().await?;

        let _lock =
            FileLock::acquire(ctx, &self.lock_file, LockMode::Exclusive, self.lock).await?;

        match fs::remove_file(&self.cache_file).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GridError::io(
                format!("removing cache file {}", self.cache_file.display()),
                e,
            )),
        }
    }

    // Caller must hold the lock.
    async fn read_table<T: DeserializeOwned>(&self) -> GridResult<Table<T>> {
        let data = match fs::read(&self.cache_file).await {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => {
                return Err(GridError::io(
                    format!("reading cache file {}", self.cache_file.display()),
                    e,
                ))
            }
        };

        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Table::new());
        }

        Ok(serde_json::from_slice(&data)?)
    }

    // The lock file lives next to the cache file, so the directory has to
    // exist before the first lock attempt.
    async fn ensure_dir(&self) -> GridResult<()> {
        if let Some(parent) = self.cache_file.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await.map_err(|e| {
                    GridError::io(format!("creating cache directory {}", parent.display()), e)
                })?;
            }
        }
        Ok(())
    }
}
