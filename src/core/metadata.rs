//! core::metadata
//!
//! Per-file rating metadata.
//!
//! Each media file may carry a YAML sidecar next to it, named
//! `<file>.metadata`:
//!
//! ```yaml
//! rating: 3
//! rejected: false
//! ```
//!
//! A missing sidecar means the default (`rating: 0`, `rejected: false`).
//! Writes are atomic: temp file, fsync, rename.

use std::ffi::OsString;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::core::types::Rating;

/// Suffix appended to a media file name to form its sidecar name.
pub const METADATA_SUFFIX: &str = ".metadata";

/// Errors from metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// The media file the metadata belongs to does not exist.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error reading or writing the sidecar.
    #[error("metadata i/o error for '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The sidecar exists but is not valid YAML for this schema.
    #[error("invalid metadata in '{path}': {message}")]
    Parse { path: PathBuf, message: String },
}

/// Rating state of a single file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingMetadata {
    /// Star rating.
    pub rating: Rating,
    /// Whether the file is flagged as rejected.
    pub rejected: bool,
}

impl RatingMetadata {
    pub fn new(rejected: bool, rating: Rating) -> Self {
        Self { rating, rejected }
    }

    /// Sidecar path for a media file: `<file>.metadata`.
    pub fn sidecar_path(file: &Path) -> PathBuf {
        let mut name = OsString::from(file.as_os_str());
        name.push(METADATA_SUFFIX);
        PathBuf::from(name)
    }

    /// Load the metadata for `file`, or the default if no sidecar exists.
    pub fn load(file: &Path) -> Result<Self, MetadataError> {
        let path = Self::sidecar_path(file);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(MetadataError::Io { path, source: e }),
        };

        serde_yaml::from_str(&contents).map_err(|e| MetadataError::Parse {
            path,
            message: e.to_string(),
        })
    }

    /// Persist the metadata for `file`.
    ///
    /// # Errors
    ///
    /// - [`MetadataError::FileNotFound`] if `file` itself does not exist
    /// - [`MetadataError::Io`] if the sidecar cannot be written
    pub fn save(&self, file: &Path) -> Result<(), MetadataError> {
        if !file.exists() {
            return Err(MetadataError::FileNotFound(file.to_path_buf()));
        }

        let path = Self::sidecar_path(file);
        let contents = serde_yaml::to_string(self).map_err(|e| MetadataError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        let mut temp_name = OsString::from(path.as_os_str());
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        let io_err = |source| MetadataError::Io {
            path: path.clone(),
            source,
        };

        let written = fs::File::create(&temp_path).and_then(|mut temp| {
            temp.write_all(contents.as_bytes())?;
            temp.sync_all()
        });

        if let Err(e) = written.and_then(|()| fs::rename(&temp_path, &path)) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp_path.display(), error = %cleanup, "failed to remove metadata temp file");
                }
            }
            return Err(io_err(e));
        }

        Ok(())
    }
}
