//! Advisory lock file with an acquire-with-timeout contract
//!
//! The lock file is a zero-length sentinel next to the cache file. It is
//! never read; its only purpose is to carry an OS advisory lock (`flock` on
//! Unix, `LockFileEx` on Windows) so separate processes sharing one cache
//! file serialize their access.

use crate::context::Context;
use crate::error::{GridError, GridResult};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::trace;

/// Suffix appended to the cache file path to derive the lock file path
pub const LOCK_SUFFIX: &str = ".lock";

/// Lock mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Many readers at once
    Shared,
    /// A single writer, no readers
    Exclusive,
}

/// Bounds on how long an acquisition may wait
#[derive(Debug, Clone, Copy)]
pub struct LockOptions {
    /// Overall bound on waiting for the lock
    pub timeout: Duration,
    /// Pause between attempts while the lock is contended
    pub retry_delay: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry_delay: Duration::from_secs(1),
        }
    }
}

/// Derive the lock file path for a cache file
pub fn lock_path_for(cache_file: &Path) -> PathBuf {
    let mut path = cache_file.as_os_str().to_owned();
    path.push(LOCK_SUFFIX);
    PathBuf::from(path)
}

/// A held advisory lock. Released on drop.
#[derive(Debug)]
pub struct FileLock {
    file: File,
    path: PathBuf,
    mode: LockMode,
}

impl FileLock {
    /// Acquire `mode` on the lock file at `path`.
    ///
    /// Retries every `retry_delay` while another holder has a conflicting
    /// lock. Gives up with `GridError::LockTimeout` once `opts.timeout`
    /// elapses or `ctx` is done, whichever comes first.
    pub async fn acquire(
        ctx: &Context,
        path: &Path,
        mode: LockMode,
        opts: LockOptions,
    ) -> GridResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| GridError::io(format!("opening lock file {}", path.display()), e))?;

        let lock_ctx = ctx.with_timeout(opts.timeout);

        loop {
            match try_lock(&file, mode) {
                Ok(()) => {
                    trace!("Acquired {:?} lock on {}", mode, path.display());
                    return Ok(Self {
                        file,
                        path: path.to_path_buf(),
                        mode,
                    });
                }
                Err(e) if is_contended(&e) => {
                    trace!("Lock on {} is contended, retrying", path.display());
                }
                Err(e) => {
                    return Err(GridError::io(
                        format!("locking {}", path.display()),
                        e,
                    ))
                }
            }

            tokio::select! {
                biased;

                _ = lock_ctx.done() => {
                    return Err(GridError::LockTimeout {
                        path: path.to_path_buf(),
                    })
                }
                _ = tokio::time::sleep(opts.retry_delay) => {}
            }
        }
    }

    /// Mode this lock was acquired with
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Path of the lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

// Fully qualified so the fs2 trait wins over the std inherent methods of the
// same name on newer toolchains.
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
    match mode {
        LockMode::Shared => FileExt::try_lock_shared(file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
