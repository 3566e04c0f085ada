//! core::ops::lock
//!
//! Exclusive lock on the history data directory.
//!
//! Only one history engine may own a pair of journals at a time. The lock
//! is an OS-level exclusive lock on `<data_dir>/lock`, acquired without
//! blocking and released when the guard is dropped.
//!
//! # Example
//!
//! ```no_run
//! use rewind::core::ops::lock::HistoryLock;
//! use rewind::core::paths::RewindPaths;
//! use std::path::PathBuf;
//!
//! let paths = RewindPaths::new(PathBuf::from("/tmp/rewind"), PathBuf::from("/tmp/Trash"));
//! let lock = HistoryLock::acquire(&paths).unwrap();
//! assert!(lock.is_held());
//! drop(lock);
//! ```

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::RewindPaths;

/// Errors from locking operations.
#[derive(Debug, Error)]
pub enum LockError {
    /// Another process or engine already holds the lock.
    #[error("history at '{0}' is in use by another process")]
    AlreadyLocked(PathBuf),

    #[error("failed to create lock: {0}")]
    CreateFailed(String),

    #[error("failed to acquire lock: {0}")]
    AcquireFailed(String),

    #[error("failed to release lock: {0}")]
    ReleaseFailed(String),
}

/// Guard holding the exclusive history lock.
#[derive(Debug)]
pub struct HistoryLock {
    path: PathBuf,
    /// `Some` while the lock is held.
    file: Option<File>,
}

impl HistoryLock {
    /// Acquire the lock for `paths.data_dir`, failing fast if it is taken.
    ///
    /// # Errors
    ///
    /// - [`LockError::AlreadyLocked`] if another holder exists
    /// - [`LockError::CreateFailed`] if the lock file cannot be created
    /// - [`LockError::AcquireFailed`] if the OS lock call fails
    pub fn acquire(paths: &RewindPaths) -> Result<Self, LockError> {
        let data_dir = paths.data_dir();
        fs::create_dir_all(data_dir).map_err(|e| {
            LockError::CreateFailed(format!("cannot create {}: {}", data_dir.display(), e))
        })?;

        let path = paths.lock_path();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                LockError::CreateFailed(format!("cannot open {}: {}", path.display(), e))
            })?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                path,
                file: Some(file),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                Err(LockError::AlreadyLocked(data_dir.to_path_buf()))
            }
            Err(e) => Err(LockError::AcquireFailed(e.to_string())),
        }
    }

    /// Like [`HistoryLock::acquire`], but `Ok(None)` when already held.
    pub fn try_acquire(paths: &RewindPaths) -> Result<Option<Self>, LockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(LockError::AlreadyLocked(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the lock before the guard is dropped. Idempotent.
    pub fn release(&mut self) -> Result<(), LockError> {
        if let Some(file) = self.file.take() {
            file.unlock()
                .map_err(|e| LockError::ReleaseFailed(e.to_string()))?;
        }
        Ok(())
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.unlock();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths(temp: &TempDir) -> RewindPaths {
        RewindPaths::new(temp.path().join("data"), temp.path().join("Trash"))
    }

    #[test]
    fn acquire_creates_data_dir_and_lock_file() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(&temp);
        assert!(!paths.data_dir().exists());

        let lock = HistoryLock::acquire(&paths).expect("acquire lock");

        assert!(lock.is_held());
        assert_eq!(lock.path(), paths.lock_path());
        assert!(lock.path().exists());
    }

    #[test]
    fn second_acquire_fails() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(&temp);

        let _first = HistoryLock::acquire(&paths).expect("first acquire");

        let result = HistoryLock::acquire(&paths);
        assert!(matches!(result, Err(LockError::AlreadyLocked(_))));
        assert!(HistoryLock::try_acquire(&paths).expect("try_acquire").is_none());
    }

    #[test]
    fn released_on_drop() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(&temp);

        drop(HistoryLock::acquire(&paths).expect("first acquire"));

        let again = HistoryLock::acquire(&paths).expect("second acquire");
        assert!(again.is_held());
    }

    #[test]
    fn explicit_release_is_idempotent() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = test_paths(&temp);

        let mut lock = HistoryLock::acquire(&paths).expect("acquire");
        lock.release().expect("first release");
        lock.release().expect("second release");
        assert!(!lock.is_held());

        let again = HistoryLock::try_acquire(&paths)
            .expect("try_acquire")
            .expect("lock should be free");
        assert!(again.is_held());
    }

    #[test]
    fn error_mentions_directory() {
        let err = LockError::AlreadyLocked(PathBuf::from("/srv/rewind"));
        assert!(err.to_string().contains("/srv/rewind"));
    }
}
