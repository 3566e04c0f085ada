//! core::paths
//!
//! Centralized path routing for rewind storage locations.
//!
//! # Architecture
//!
//! All storage locations are routed through [`RewindPaths`]. No other
//! module joins journal, lock or trash file names onto a directory.
//! A `RewindPaths` value is the explicit context object handed to
//! [`TrashStore::open`](crate::core::trash::TrashStore::open) and
//! [`HistoryEngine::open`](crate::engine::history::HistoryEngine::open).
//!
//! # Storage Layout
//!
//! History data lives under `<data_dir>/`:
//! - `history.jsonl` - Journal backing the done-stack
//! - `redo.jsonl` - Journal backing the undone-stack
//! - `lock` - Exclusive owner lock
//!
//! Trashed items live under `<trash_dir>/` (freedesktop layout):
//! - `info/<name>.trashinfo` - Sidecar with original path and deletion date
//! - `files/<name>` - The moved content
//!
//! # Example
//!
//! ```
//! use rewind::core::paths::RewindPaths;
//! use std::path::PathBuf;
//!
//! let paths = RewindPaths::new(
//!     PathBuf::from("/home/me/.local/share/rewind"),
//!     PathBuf::from("/home/me/.local/share/Trash"),
//! );
//!
//! assert_eq!(
//!     paths.history_journal_path(),
//!     PathBuf::from("/home/me/.local/share/rewind/history.jsonl")
//! );
//! assert_eq!(
//!     paths.trash_info_dir(),
//!     PathBuf::from("/home/me/.local/share/Trash/info")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Centralized path routing for rewind storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewindPaths {
    /// Directory holding the journals and the lock file.
    pub data_dir: PathBuf,

    /// Root of the freedesktop-style trash directory.
    pub trash_dir: PathBuf,
}

impl RewindPaths {
    /// Create a new RewindPaths from a data directory and a trash root.
    pub fn new(data_dir: PathBuf, trash_dir: PathBuf) -> Self {
        Self {
            data_dir,
            trash_dir,
        }
    }

    /// Platform defaults: `<data_dir>/rewind` and `<data_dir>/Trash`.
    ///
    /// On Linux this resolves to `~/.local/share/rewind` and
    /// `~/.local/share/Trash`. Returns `None` if no data directory
    /// can be determined for the current user.
    pub fn platform_default() -> Option<Self> {
        let base = dirs::data_dir()?;
        Some(Self::new(base.join("rewind"), base.join("Trash")))
    }

    // =========================================================================
    // History storage
    // =========================================================================

    /// Get the path to the journal backing the done-stack.
    ///
    /// This is `<data_dir>/history.jsonl`.
    pub fn history_journal_path(&self) -> PathBuf {
        self.data_dir.join("history.jsonl")
    }

    /// Get the path to the journal backing the undone-stack.
    ///
    /// This is `<data_dir>/redo.jsonl`.
    pub fn redo_journal_path(&self) -> PathBuf {
        self.data_dir.join("redo.jsonl")
    }

    /// Get the path to the exclusive owner lock.
    ///
    /// This is `<data_dir>/lock`.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("lock")
    }

    // =========================================================================
    // Trash storage
    // =========================================================================

    /// Get the directory holding `.trashinfo` sidecars.
    ///
    /// This is `<trash_dir>/info`.
    pub fn trash_info_dir(&self) -> PathBuf {
        self.trash_dir.join("info")
    }

    /// Get the directory holding trashed content.
    ///
    /// This is `<trash_dir>/files`.
    pub fn trash_files_dir(&self) -> PathBuf {
        self.trash_dir.join("files")
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Get the data_dir as a Path reference.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the trash_dir as a Path reference.
    pub fn trash_dir(&self) -> &Path {
        &self.trash_dir
    }

    /// Ensure the directory structure exists.
    ///
    /// Creates `<data_dir>/`, `<trash_dir>/info/` and `<trash_dir>/files/`.
    ///
    /// # Errors
    ///
    /// Returns an IO error if directory creation fails.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.trash_info_dir())?;
        std::fs::create_dir_all(self.trash_files_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_paths() -> RewindPaths {
        RewindPaths::new(PathBuf::from("/data/rewind"), PathBuf::from("/data/Trash"))
    }

    #[test]
    fn new_creates_paths() {
        let paths = test_paths();
        assert_eq!(paths.data_dir, PathBuf::from("/data/rewind"));
        assert_eq!(paths.trash_dir, PathBuf::from("/data/Trash"));
    }

    #[test]
    fn journal_paths() {
        let paths = test_paths();
        assert_eq!(
            paths.history_journal_path(),
            PathBuf::from("/data/rewind/history.jsonl")
        );
        assert_eq!(
            paths.redo_journal_path(),
            PathBuf::from("/data/rewind/redo.jsonl")
        );
    }

    #[test]
    fn lock_path() {
        assert_eq!(test_paths().lock_path(), PathBuf::from("/data/rewind/lock"));
    }

    #[test]
    fn trash_dirs() {
        let paths = test_paths();
        assert_eq!(paths.trash_info_dir(), PathBuf::from("/data/Trash/info"));
        assert_eq!(paths.trash_files_dir(), PathBuf::from("/data/Trash/files"));
    }

    #[test]
    fn path_accessors() {
        let paths = test_paths();
        assert_eq!(paths.data_dir(), Path::new("/data/rewind"));
        assert_eq!(paths.trash_dir(), Path::new("/data/Trash"));
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let temp = TempDir::new().expect("create temp dir");
        let paths = RewindPaths::new(temp.path().join("data"), temp.path().join("Trash"));

        paths.ensure_dirs().expect("ensure dirs");

        assert!(paths.data_dir().is_dir());
        assert!(paths.trash_info_dir().is_dir());
        assert!(paths.trash_files_dir().is_dir());
    }
}
