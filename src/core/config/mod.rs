//! core::config
//!
//! Configuration schema and loading.
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values (platform data directory)
//! 2. Global config file
//! 3. Caller overrides (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$REWIND_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/rewind/config.toml`
//! 3. `~/.rewind/config.toml` (canonical write location)
//!
//! # Example
//!
//! ```no_run
//! use rewind::core::config::Config;
//!
//! let config = Config::load().unwrap();
//! let paths = config.paths().unwrap();
//! println!("journals in {}", paths.data_dir.display());
//! println!("trash in {}", paths.trash_dir.display());
//! ```

pub mod schema;

pub use schema::{GlobalConfig, LogConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::core::paths::RewindPaths;

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "REWIND_CONFIG";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,

    #[error("no platform data directory; set data_dir and trash_dir explicitly")]
    NoDataDir,
}

/// Loaded configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Path to the global config file (if loaded)
    global_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default locations.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed or
    /// fails validation. A missing config file is not an error.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::locate_global();
        Self::load_from(path.as_deref())
    }

    /// Load configuration from an explicit file, or defaults if `None`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (global, global_path) = match path {
            Some(path) => (Self::read_global_config(path)?, Some(path.to_path_buf())),
            None => (GlobalConfig::default(), None),
        };

        global.validate()?;

        Ok(Config {
            global,
            global_path,
        })
    }

    /// Wrap an in-memory configuration, e.g. one built by an embedding
    /// application.
    pub fn from_global(global: GlobalConfig) -> Result<Self, ConfigError> {
        global.validate()?;
        Ok(Config {
            global,
            global_path: None,
        })
    }

    /// Find the first existing global config file.
    fn locate_global() -> Option<PathBuf> {
        // 1. Check $REWIND_CONFIG
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        // 2. Check $XDG_CONFIG_HOME/rewind/config.toml
        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("rewind/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        // 3. Check ~/.rewind/config.toml
        if let Some(home) = dirs::home_dir() {
            let path = home.join(".rewind/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        None
    }

    /// Read and parse a global config file.
    fn read_global_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.rewind/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".rewind/config.toml"))
    }

    /// Write global config atomically to the canonical location.
    pub fn write_global(config: &GlobalConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::global_config_path()?;
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write a config file atomically.
    ///
    /// Creates parent directories if needed, writes to a temp file in the
    /// same directory, fsyncs it, then renames it over the destination.
    pub fn write_config_atomic(path: &Path, config: &GlobalConfig) -> Result<(), ConfigError> {
        config.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with defaults
    // =========================================================================

    /// Resolve the storage paths, filling gaps with platform defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoDataDir` if a directory is not configured
    /// and the platform has no data directory.
    pub fn paths(&self) -> Result<RewindPaths, ConfigError> {
        let defaults = RewindPaths::platform_default();

        let data_dir = match &self.global.data_dir {
            Some(dir) => dir.clone(),
            None => defaults
                .as_ref()
                .map(|d| d.data_dir.clone())
                .ok_or(ConfigError::NoDataDir)?,
        };

        let trash_dir = match &self.global.trash_dir {
            Some(dir) => dir.clone(),
            None => defaults
                .as_ref()
                .map(|d| d.trash_dir.clone())
                .ok_or(ConfigError::NoDataDir)?,
        };

        Ok(RewindPaths::new(data_dir, trash_dir))
    }

    /// Get the configured log level.
    ///
    /// Defaults to "info" if not configured.
    pub fn log_level(&self) -> &str {
        self.global
            .log
            .as_ref()
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_from_none_uses_defaults() {
        let config = Config::load_from(None).unwrap();

        assert!(config.global_config_loaded_from().is_none());
        assert_eq!(config.log_level(), "info");
    }

    #[test]
    fn load_from_file() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
            data_dir = "/srv/rewind"
            trash_dir = "/srv/Trash"

            [log]
            level = "debug"
            "#,
        )
        .unwrap();

        let config = Config::load_from(Some(&config_path)).unwrap();
        let paths = config.paths().unwrap();

        assert_eq!(paths.data_dir, PathBuf::from("/srv/rewind"));
        assert_eq!(paths.trash_dir, PathBuf::from("/srv/Trash"));
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.global_config_loaded_from(), Some(config_path.as_path()));
    }

    #[test]
    fn unknown_fields_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "unknown_field = true\n").unwrap();

        let result = Config::load_from(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn invalid_values_rejected() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("config.toml");
        fs::write(&config_path, "data_dir = \"relative\"\n").unwrap();

        let result = Config::load_from(Some(&config_path));
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let result = Config::load_from(Some(&temp.path().join("absent.toml")));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn write_config_atomic_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/config.toml");

        let config = GlobalConfig {
            data_dir: Some(PathBuf::from("/srv/rewind")),
            ..Default::default()
        };

        Config::write_config_atomic(&path, &config).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("toml.tmp").exists());
        let loaded = Config::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.global, config);
    }

    #[test]
    fn partial_config_falls_back_for_trash() {
        let config = Config {
            global: GlobalConfig {
                data_dir: Some(PathBuf::from("/srv/rewind")),
                ..Default::default()
            },
            global_path: None,
        };

        // trash_dir comes from the platform default when one exists
        if let Ok(paths) = config.paths() {
            assert_eq!(paths.data_dir, PathBuf::from("/srv/rewind"));
            assert!(paths.trash_dir.ends_with("Trash"));
        }
    }
}
