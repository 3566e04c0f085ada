//! core::trash
//!
//! Soft-delete and restore using a freedesktop-compatible trash layout.
//!
//! # Layout
//!
//! ```text
//! <trash_dir>/
//!   info/<name>.trashinfo   sidecar: original path + deletion date
//!   files/<name>            the moved content
//! ```
//!
//! `<name>` is the base name of the trashed file, possibly carrying a
//! `_N` collision suffix. The sidecar format is:
//!
//! ```text
//! [Trash Info]
//! Path=/absolute/original/path
//! DeletionDate=2024-03-01T12:30:05
//! ```
//!
//! Each component of `Path=` is percent-encoded, so names containing
//! line breaks, leading or trailing spaces, or `%` survive the round trip.
//!
//! # Invariants
//!
//! - A content entry never exists without its sidecar, and vice versa,
//!   once a `trash`/`restore` call has returned (success or error).
//! - The sidecar is created with `create_new` before the content is
//!   moved, so two trash calls never claim the same name.
//! - Moves use `rename`, which is atomic within one filesystem. A move
//!   across filesystems is refused with [`TrashError::CrossDevice`].
//!
//! Paths must be valid UTF-8: the sidecar and the journal are text.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::paths::RewindPaths;
use crate::core::types::DeletionDate;

/// Extension of sidecar files in `info/`.
pub const TRASHINFO_EXTENSION: &str = "trashinfo";

/// First line of every sidecar.
const TRASHINFO_HEADER: &str = "[Trash Info]";

/// Errors from trash operations.
#[derive(Debug, Error)]
pub enum TrashError {
    /// The file to trash does not exist.
    #[error("file not found: {0}")]
    NotFound(PathBuf),

    /// No trashed item records this original path.
    #[error("no trashed item for {0}")]
    NoTrashedItem(PathBuf),

    /// Restoring would overwrite an existing file.
    #[error("restore destination already exists: {0}")]
    DestinationExists(PathBuf),

    /// The path cannot be represented in a sidecar.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Rename across filesystems is not supported.
    #[error("cannot move '{from}' to '{to}': different filesystems")]
    CrossDevice { from: PathBuf, to: PathBuf },

    /// I/O error on a specific path.
    #[error("trash i/o error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A sidecar could not be parsed.
    #[error("invalid trashinfo '{path}': {message}")]
    InvalidInfo { path: PathBuf, message: String },

    /// A partial effect could not be reverted.
    #[error("partial restore of '{path}' could not be reverted: {message}")]
    RollbackFailed { path: PathBuf, message: String },
}

impl TrashError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        TrashError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Map a failed rename to the most specific error.
    fn rename(from: &Path, to: &Path, source: std::io::Error) -> Self {
        match source.kind() {
            ErrorKind::NotFound => TrashError::NotFound(from.to_path_buf()),
            ErrorKind::CrossesDevices => TrashError::CrossDevice {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            },
            _ => TrashError::io(from, source),
        }
    }
}

/// Parsed contents of a `.trashinfo` sidecar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashInfo {
    /// Absolute original path.
    pub path: PathBuf,
    /// When the item was trashed.
    pub deletion_date: DeletionDate,
}

impl TrashInfo {
    /// Render the sidecar text.
    pub fn render(&self) -> String {
        format!(
            "{}\nPath={}\nDeletionDate={}\n",
            TRASHINFO_HEADER,
            encode_path(&self.path),
            self.deletion_date
        )
    }

    /// Parse sidecar text. The first `Path=` and `DeletionDate=` win.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut lines = text.lines();
        if lines.next().map(str::trim_end) != Some(TRASHINFO_HEADER) {
            return Err(format!("missing '{}' header", TRASHINFO_HEADER));
        }

        let mut path = None;
        let mut date = None;
        for line in lines {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if path.is_none() {
                if let Some(value) = line.strip_prefix("Path=") {
                    path = Some(decode_path(value)?);
                    continue;
                }
            }
            if date.is_none() {
                if let Some(value) = line.strip_prefix("DeletionDate=") {
                    date = Some(DeletionDate::parse(value).map_err(|e| e.to_string())?);
                }
            }
        }

        match (path, date) {
            (Some(path), Some(deletion_date)) => Ok(Self {
                path,
                deletion_date,
            }),
            (None, _) => Err("missing Path=".to_string()),
            (_, None) => Err("missing DeletionDate=".to_string()),
        }
    }
}

/// Percent-encode every component of `path`, keeping the separators.
fn encode_path(path: &Path) -> String {
    path.to_string_lossy()
        .split('/')
        .map(|part| urlencoding::encode(part).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn decode_path(value: &str) -> Result<PathBuf, String> {
    urlencoding::decode(value)
        .map(|decoded| PathBuf::from(decoded.into_owned()))
        .map_err(|e| format!("Path= is not valid percent-encoded UTF-8: {e}"))
}

/// Remove a sidecar left behind by a failed trash call.
fn discard_sidecar(info_path: &Path) {
    if let Err(e) = fs::remove_file(info_path) {
        warn!(path = %info_path.display(), error = %e, "failed to remove unused trashinfo");
    }
}

/// An entry currently held in the trash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrashedItem {
    /// Shared base name of content and sidecar (with collision suffix).
    pub name: String,
    /// Sidecar contents.
    pub info: TrashInfo,
    /// `info/<name>.trashinfo`
    pub info_path: PathBuf,
    /// `files/<name>`
    pub content_path: PathBuf,
}

impl TrashedItem {
    /// The `N` of a `_N` collision suffix, or 0 for the plain base name.
    pub fn collision_index(&self) -> u64 {
        let Some(base) = self.info.path.file_name().and_then(|n| n.to_str()) else {
            return 0;
        };
        self.name
            .strip_prefix(base)
            .and_then(|rest| rest.strip_prefix('_'))
            .and_then(|n| n.parse().ok())
            .unwrap_or(0)
    }
}

/// Candidate name for the `n`-th allocation attempt.
fn candidate_name(base: &str, n: u64) -> String {
    if n == 0 {
        base.to_string()
    } else {
        format!("{}_{}", base, n)
    }
}

/// Absolute, UTF-8 form of a caller-supplied path.
fn absolute_utf8(path: &Path) -> Result<PathBuf, TrashError> {
    let abs = std::path::absolute(path).map_err(|e| TrashError::io(path, e))?;
    if abs.to_str().is_none() {
        return Err(TrashError::InvalidPath(abs.to_string_lossy().into_owned()));
    }
    Ok(abs)
}

fn exists_no_follow(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Filesystem-level soft-delete store.
#[derive(Debug, Clone)]
pub struct TrashStore {
    info_dir: PathBuf,
    files_dir: PathBuf,
}

impl TrashStore {
    /// Open the trash rooted at `paths.trash_dir`, creating the storage
    /// layout if needed.
    pub fn open(paths: &RewindPaths) -> Result<Self, TrashError> {
        paths
            .ensure_dirs()
            .map_err(|e| TrashError::io(paths.trash_dir(), e))?;
        Ok(Self {
            info_dir: paths.trash_info_dir(),
            files_dir: paths.trash_files_dir(),
        })
    }

    pub fn info_dir(&self) -> &Path {
        &self.info_dir
    }

    pub fn files_dir(&self) -> &Path {
        &self.files_dir
    }

    fn info_path(&self, name: &str) -> PathBuf {
        self.info_dir
            .join(format!("{}.{}", name, TRASHINFO_EXTENSION))
    }

    /// Move `path` into the trash under a collision-free name and write
    /// its sidecar.
    ///
    /// # Errors
    ///
    /// - [`TrashError::NotFound`] if `path` does not exist
    /// - [`TrashError::CrossDevice`] if the trash is on another filesystem
    /// - [`TrashError::Io`] for any other failure
    ///
    /// On error no sidecar or content entry is left behind.
    pub fn trash(&self, path: &Path) -> Result<TrashedItem, TrashError> {
        let source = absolute_utf8(path)?;
        if !exists_no_follow(&source) {
            return Err(TrashError::NotFound(source));
        }

        let base = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TrashError::InvalidPath(source.display().to_string()))?
            .to_string();

        let info = TrashInfo {
            path: source.clone(),
            deletion_date: DeletionDate::now(),
        };

        let mut n: u64 = 0;
        loop {
            let name = candidate_name(&base, n);
            n += 1;

            let info_path = self.info_path(&name);
            let content_path = self.files_dir.join(&name);

            // Claim the name by creating the sidecar exclusively.
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&info_path)
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(TrashError::io(&info_path, e)),
            };

            if exists_no_follow(&content_path) {
                drop(file);
                fs::remove_file(&info_path).map_err(|e| TrashError::io(&info_path, e))?;
                continue;
            }

            let written = file
                .write_all(info.render().as_bytes())
                .and_then(|()| file.sync_all());
            drop(file);
            if let Err(e) = written {
                discard_sidecar(&info_path);
                return Err(TrashError::io(&info_path, e));
            }

            if let Err(e) = fs::rename(&source, &content_path) {
                discard_sidecar(&info_path);
                return Err(TrashError::rename(&source, &content_path, e));
            }

            debug!(name = %name, path = %source.display(), "trashed");
            return Ok(TrashedItem {
                name,
                info,
                info_path,
                content_path,
            });
        }
    }

    /// Move the most recently trashed copy of `path` back to `path` and
    /// delete its sidecar.
    ///
    /// Among several sidecars recording the same original path, the one
    /// with the latest deletion date wins; equal dates fall back to the
    /// larger collision index.
    ///
    /// # Errors
    ///
    /// - [`TrashError::NoTrashedItem`] if nothing in the trash records `path`
    /// - [`TrashError::DestinationExists`] if `path` is occupied
    /// - [`TrashError::CrossDevice`] / [`TrashError::Io`] if the move fails
    /// - [`TrashError::RollbackFailed`] if the sidecar could not be removed
    ///   and the content could not be moved back either
    pub fn restore(&self, path: &Path) -> Result<TrashedItem, TrashError> {
        let target = absolute_utf8(path)?;
        let item = self
            .find_latest(&target)?
            .ok_or_else(|| TrashError::NoTrashedItem(target.clone()))?;

        if exists_no_follow(&target) {
            return Err(TrashError::DestinationExists(target));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| TrashError::io(parent, e))?;
        }

        fs::rename(&item.content_path, &target)
            .map_err(|e| TrashError::rename(&item.content_path, &target, e))?;

        if let Err(remove_err) = fs::remove_file(&item.info_path) {
            // Put the content back so the sidecar is not orphaned.
            return match fs::rename(&target, &item.content_path) {
                Ok(()) => Err(TrashError::io(&item.info_path, remove_err)),
                Err(back_err) => Err(TrashError::RollbackFailed {
                    path: target,
                    message: format!(
                        "removing sidecar failed ({}), moving content back failed ({})",
                        remove_err, back_err
                    ),
                }),
            };
        }

        debug!(name = %item.name, path = %target.display(), "restored");
        Ok(item)
    }

    /// List every valid item in the trash.
    ///
    /// Sidecars that cannot be read or parsed, or whose content entry is
    /// missing, are skipped with a warning.
    pub fn list(&self) -> Result<Vec<TrashedItem>, TrashError> {
        let entries = fs::read_dir(&self.info_dir).map_err(|e| TrashError::io(&self.info_dir, e))?;

        let mut items = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TrashError::io(&self.info_dir, e))?;
            let info_path = entry.path();

            if info_path.extension().and_then(|e| e.to_str()) != Some(TRASHINFO_EXTENSION) {
                continue;
            }
            let Some(name) = info_path.file_stem().and_then(|s| s.to_str()) else {
                warn!(path = %info_path.display(), "skipping trashinfo with non UTF-8 name");
                continue;
            };

            let text = match fs::read_to_string(&info_path) {
                Ok(text) => text,
                Err(e) => {
                    warn!(path = %info_path.display(), error = %e, "skipping unreadable trashinfo");
                    continue;
                }
            };

            let info = match TrashInfo::parse(&text) {
                Ok(info) => info,
                Err(message) => {
                    warn!(path = %info_path.display(), %message, "skipping invalid trashinfo");
                    continue;
                }
            };

            let content_path = self.files_dir.join(name);
            if !exists_no_follow(&content_path) {
                warn!(path = %content_path.display(), "trashed content does not exist");
                continue;
            }

            items.push(TrashedItem {
                name: name.to_string(),
                info,
                info_path,
                content_path,
            });
        }

        Ok(items)
    }

    /// Find the entry a restore of `path` would pick.
    pub fn find_latest(&self, path: &Path) -> Result<Option<TrashedItem>, TrashError> {
        let target = absolute_utf8(path)?;
        Ok(self
            .list()?
            .into_iter()
            .filter(|item| item.info.path == target)
            .max_by_key(|item| (item.info.deletion_date, item.collision_index())))
    }

    /// Check whether any trashed item records `path`.
    pub fn contains(&self, path: &Path) -> Result<bool, TrashError> {
        Ok(self.find_latest(path)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        store: TrashStore,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().expect("create temp dir");
            let paths = RewindPaths::new(temp.path().join("data"), temp.path().join("Trash"));
            let store = TrashStore::open(&paths).expect("open trash");
            Self { temp, store }
        }

        fn file(&self, rel: &str, content: &[u8]) -> PathBuf {
            let path = self.temp.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn write_info(&self, name: &str, original: &Path, date: &str) {
            let info = TrashInfo {
                path: original.to_path_buf(),
                deletion_date: DeletionDate::parse(date).unwrap(),
            };
            fs::write(self.store.info_path(name), info.render()).unwrap();
            fs::write(self.store.files_dir().join(name), name.as_bytes()).unwrap();
        }
    }

    mod trash_info {
        use super::*;

        #[test]
        fn render_and_parse() {
            let info = TrashInfo {
                path: PathBuf::from("/a/1.jpg"),
                deletion_date: DeletionDate::parse("2024-01-02T03:04:05").unwrap(),
            };
            let text = info.render();
            assert_eq!(
                text,
                "[Trash Info]\nPath=/a/1.jpg\nDeletionDate=2024-01-02T03:04:05\n"
            );
            assert_eq!(TrashInfo::parse(&text).unwrap(), info);
        }

        #[test]
        fn parse_requires_header() {
            assert!(TrashInfo::parse("Path=/a\nDeletionDate=2024-01-02T03:04:05\n").is_err());
        }

        #[test]
        fn parse_requires_fields() {
            assert!(TrashInfo::parse("[Trash Info]\nPath=/a\n").is_err());
            assert!(TrashInfo::parse("[Trash Info]\nDeletionDate=2024-01-02T03:04:05\n").is_err());
        }

        #[test]
        fn path_is_percent_encoded() {
            let info = TrashInfo {
                path: PathBuf::from("/a b/100%/x\ny.jpg "),
                deletion_date: DeletionDate::parse("2024-01-02T03:04:05").unwrap(),
            };
            let text = info.render();

            assert!(text.contains("Path=/a%20b/100%25/x%0Ay.jpg%20\n"));
            assert_eq!(text.lines().count(), 3);
            assert_eq!(TrashInfo::parse(&text).unwrap(), info);
        }

        #[test]
        fn parse_rejects_bad_escape() {
            let text = "[Trash Info]\nPath=/a/%FF.jpg\nDeletionDate=2024-01-02T03:04:05\n";
            assert!(TrashInfo::parse(text).is_err());
        }

        #[test]
        fn parse_first_value_wins() {
            let info = TrashInfo::parse(
                "[Trash Info]\nPath=/first\nPath=/second\nDeletionDate=2024-01-02T03:04:05\n",
            )
            .unwrap();
            assert_eq!(info.path, PathBuf::from("/first"));
        }
    }

    mod trash_and_restore {
        use super::*;

        #[test]
        fn trash_moves_file_and_writes_sidecar() {
            let fx = Fixture::new();
            let file = fx.file("a/1.jpg", b"pixels");

            let item = fx.store.trash(&file).unwrap();

            assert!(!file.exists());
            assert_eq!(item.name, "1.jpg");
            assert_eq!(fs::read(&item.content_path).unwrap(), b"pixels");
            let text = fs::read_to_string(&item.info_path).unwrap();
            assert!(text.starts_with("[Trash Info]\n"));
            assert!(text.contains(&format!("Path={}\n", file.display())));
            assert!(text.contains("DeletionDate="));
        }

        #[test]
        fn trash_then_restore_is_identity() {
            let fx = Fixture::new();
            let file = fx.file("a/1.jpg", b"pixels");

            let trashed = fx.store.trash(&file).unwrap();
            let restored = fx.store.restore(&file).unwrap();

            assert_eq!(trashed.name, restored.name);
            assert_eq!(fs::read(&file).unwrap(), b"pixels");
            assert!(!trashed.info_path.exists());
            assert!(!trashed.content_path.exists());
            assert!(fx.store.list().unwrap().is_empty());
        }

        #[test]
        fn awkward_names_restore() {
            let fx = Fixture::new();
            for name in ["a\nb.jpg", "photo.jpg ", " lead.jpg", "50%.jpg"] {
                let file = fx.file(name, name.as_bytes());

                fx.store.trash(&file).unwrap();
                assert!(!file.exists());
                fx.store.restore(&file).unwrap();

                assert_eq!(fs::read(&file).unwrap(), name.as_bytes());
            }
            assert!(fx.store.list().unwrap().is_empty());
        }

        #[test]
        fn trash_missing_file_is_not_found() {
            let fx = Fixture::new();
            let missing = fx.temp.path().join("missing.jpg");

            let result = fx.store.trash(&missing);
            assert!(matches!(result, Err(TrashError::NotFound(_))));
            assert_eq!(fs::read_dir(fx.store.info_dir()).unwrap().count(), 0);
        }

        #[test]
        fn same_base_name_gets_collision_suffix() {
            let fx = Fixture::new();
            let first = fx.file("a/1.jpg", b"first");
            let second = fx.file("b/1.jpg", b"second");

            let item1 = fx.store.trash(&first).unwrap();
            let item2 = fx.store.trash(&second).unwrap();

            assert_eq!(item1.name, "1.jpg");
            assert_eq!(item2.name, "1.jpg_1");
            assert_eq!(item2.collision_index(), 1);

            fx.store.restore(&first).unwrap();
            fx.store.restore(&second).unwrap();
            assert_eq!(fs::read(&first).unwrap(), b"first");
            assert_eq!(fs::read(&second).unwrap(), b"second");
        }

        #[test]
        fn orphan_content_is_skipped_when_naming() {
            let fx = Fixture::new();
            fs::write(fx.store.files_dir().join("1.jpg"), b"orphan").unwrap();
            let file = fx.file("a/1.jpg", b"pixels");

            let item = fx.store.trash(&file).unwrap();

            assert_eq!(item.name, "1.jpg_1");
            assert!(!fx.store.info_path("1.jpg").exists());
            assert_eq!(fs::read(fx.store.files_dir().join("1.jpg")).unwrap(), b"orphan");
        }

        #[test]
        fn restore_without_sidecar_is_no_trashed_item() {
            let fx = Fixture::new();
            let path = fx.temp.path().join("never.jpg");

            let result = fx.store.restore(&path);
            assert!(matches!(result, Err(TrashError::NoTrashedItem(_))));
        }

        #[test]
        fn restore_refuses_to_overwrite() {
            let fx = Fixture::new();
            let file = fx.file("a/1.jpg", b"old");
            let item = fx.store.trash(&file).unwrap();
            fs::write(&file, b"new").unwrap();

            let result = fx.store.restore(&file);

            assert!(matches!(result, Err(TrashError::DestinationExists(_))));
            assert_eq!(fs::read(&file).unwrap(), b"new");
            assert!(item.info_path.exists());
            assert!(item.content_path.exists());
        }

        #[test]
        fn restore_recreates_parent_directory() {
            let fx = Fixture::new();
            let file = fx.file("roll/clip.mp4", b"frames");
            fx.store.trash(&file).unwrap();
            fs::remove_dir(file.parent().unwrap()).unwrap();

            fx.store.restore(&file).unwrap();
            assert_eq!(fs::read(&file).unwrap(), b"frames");
        }
    }

    mod selection {
        use super::*;

        #[test]
        fn latest_deletion_date_wins() {
            let fx = Fixture::new();
            let original = fx.temp.path().join("a/1.jpg");
            fx.write_info("1.jpg", &original, "2024-01-01T00:00:00");
            fx.write_info("1.jpg_1", &original, "2024-06-01T00:00:00");
            fx.write_info("1.jpg_2", &original, "2024-03-01T00:00:00");

            let latest = fx.store.find_latest(&original).unwrap().unwrap();
            assert_eq!(latest.name, "1.jpg_1");
        }

        #[test]
        fn equal_dates_prefer_higher_suffix() {
            let fx = Fixture::new();
            let original = fx.temp.path().join("a/1.jpg");
            fx.write_info("1.jpg", &original, "2024-01-01T00:00:00");
            fx.write_info("1.jpg_3", &original, "2024-01-01T00:00:00");

            let latest = fx.store.find_latest(&original).unwrap().unwrap();
            assert_eq!(latest.name, "1.jpg_3");
        }

        #[test]
        fn restore_only_removes_chosen_sidecar() {
            let fx = Fixture::new();
            let original = fx.temp.path().join("a/1.jpg");
            fx.write_info("1.jpg", &original, "2024-01-01T00:00:00");
            fx.write_info("1.jpg_1", &original, "2024-02-01T00:00:00");

            fx.store.restore(&original).unwrap();

            assert_eq!(fs::read(&original).unwrap(), b"1.jpg_1");
            assert!(fx.store.info_path("1.jpg").exists());
            assert!(!fx.store.info_path("1.jpg_1").exists());
        }

        #[test]
        fn other_paths_are_ignored() {
            let fx = Fixture::new();
            let original = fx.temp.path().join("a/1.jpg");
            let other = fx.temp.path().join("b/1.jpg");
            fx.write_info("1.jpg", &other, "2024-01-01T00:00:00");

            assert!(!fx.store.contains(&original).unwrap());
            assert!(fx.store.contains(&other).unwrap());
        }
    }

    mod listing {
        use super::*;

        #[test]
        fn invalid_sidecars_are_skipped() {
            let fx = Fixture::new();
            let original = fx.temp.path().join("a/1.jpg");
            fx.write_info("good", &original, "2024-01-01T00:00:00");
            fs::write(fx.store.info_path("noheader"), "Path=/x\n").unwrap();
            fs::write(fx.store.files_dir().join("noheader"), b"").unwrap();
            fs::write(
                fx.store.info_path("nocontent"),
                "[Trash Info]\nPath=/y\nDeletionDate=2024-01-01T00:00:00\n",
            )
            .unwrap();
            fs::write(fx.store.info_dir().join("README"), "not a sidecar").unwrap();

            let items = fx.store.list().unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].name, "good");
        }
    }
}
