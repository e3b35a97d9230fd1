//! Single-writer advisory lock per codebase
//!
//! The metrics document and the version ledger are rewritten whole on every
//! mutation, so two writers on the same codebase would clobber each other.
//! Every mutating entry point holds this lock for its duration.

use super::layout::StorageLayout;
use crate::error::{IoContext, LifecycleError, LifecycleResult};
use std::fs::{File, OpenOptions, TryLockError};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_RETRIES: usize = 10;
const RETRY_SLEEP: Duration = Duration::from_millis(100);

/// Held exclusive lock; released on drop
#[derive(Debug)]
pub struct CodebaseLock {
    file: File,
    path: PathBuf,
}

impl CodebaseLock {
    /// Acquire the lock, retrying briefly before giving up with `LockContended`
    pub fn acquire(layout: &StorageLayout) -> LifecycleResult<Self> {
        let (file, path) = Self::open(layout)?;
        for attempt in 0..MAX_RETRIES {
            if Self::try_take(&file, &path)? {
                return Ok(Self::held(layout, file, path));
            }
            if attempt + 1 < MAX_RETRIES {
                std::thread::sleep(RETRY_SLEEP);
            }
        }
        Err(LifecycleError::LockContended(layout.codebase().to_string()))
    }

    /// Same retry policy as `acquire`, waiting on the tokio timer between attempts
    pub async fn acquire_async(layout: &StorageLayout) -> LifecycleResult<Self> {
        let (file, path) = Self::open(layout)?;
        for attempt in 0..MAX_RETRIES {
            if Self::try_take(&file, &path)? {
                return Ok(Self::held(layout, file, path));
            }
            if attempt + 1 < MAX_RETRIES {
                tokio::time::sleep(RETRY_SLEEP).await;
            }
        }
        Err(LifecycleError::LockContended(layout.codebase().to_string()))
    }

    /// Single attempt, no waiting
    pub fn try_acquire(layout: &StorageLayout) -> LifecycleResult<Self> {
        let (file, path) = Self::open(layout)?;
        if Self::try_take(&file, &path)? {
            return Ok(Self::held(layout, file, path));
        }
        Err(LifecycleError::LockContended(layout.codebase().to_string()))
    }

    fn open(layout: &StorageLayout) -> LifecycleResult<(File, PathBuf)> {
        std::fs::create_dir_all(layout.codebase_dir()).at_path(layout.codebase_dir())?;

        let path = layout.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .at_path(&path)?;
        Ok((file, path))
    }

    /// `Ok(false)` when another holder has it
    fn try_take(file: &File, path: &Path) -> LifecycleResult<bool> {
        match file.try_lock() {
            Ok(()) => Ok(true),
            Err(TryLockError::WouldBlock) => Ok(false),
            Err(TryLockError::Error(e)) => Err(LifecycleError::io(path, e)),
        }
    }

    fn held(layout: &StorageLayout, file: File, path: PathBuf) -> Self {
        tracing::debug!(codebase = layout.codebase(), "acquired codebase lock");
        Self { file, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CodebaseLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release codebase lock");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_writer_is_rejected() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path(), "docs").unwrap();

        let held = CodebaseLock::try_acquire(&layout).unwrap();
        assert!(held.path().exists());

        let err = CodebaseLock::try_acquire(&layout).unwrap_err();
        assert!(matches!(err, LifecycleError::LockContended(ref name) if name == "docs"));
    }

    #[test]
    fn test_lock_released_on_drop() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path(), "docs").unwrap();

        drop(CodebaseLock::try_acquire(&layout).unwrap());
        assert!(CodebaseLock::try_acquire(&layout).is_ok());
    }

    #[test]
    fn test_codebases_lock_independently() {
        let temp = TempDir::new().unwrap();
        let docs = StorageLayout::new(temp.path(), "docs").unwrap();
        let api = StorageLayout::new(temp.path(), "api").unwrap();

        let _docs_lock = CodebaseLock::try_acquire(&docs).unwrap();
        assert!(CodebaseLock::try_acquire(&api).is_ok());
    }

    #[tokio::test]
    async fn test_async_acquire_waits_for_release() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path(), "docs").unwrap();

        let held = CodebaseLock::try_acquire(&layout).unwrap();
        let releaser = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            drop(held);
        });

        let lock = CodebaseLock::acquire_async(&layout).await.unwrap();
        assert!(lock.path().exists());
        releaser.await.unwrap();
    }

    #[tokio::test]
    async fn test_async_acquire_gives_up_when_contended() {
        let temp = TempDir::new().unwrap();
        let layout = StorageLayout::new(temp.path(), "docs").unwrap();

        let _held = CodebaseLock::try_acquire(&layout).unwrap();
        let err = CodebaseLock::acquire_async(&layout).await.unwrap_err();
        assert!(matches!(err, LifecycleError::LockContended(_)));
    }
}
