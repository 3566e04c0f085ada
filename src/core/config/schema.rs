//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$REWIND_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/rewind/config.toml`
//! 3. `~/.rewind/config.toml` (canonical write location)
//!
//! # Validation
//!
//! Config values are validated after parsing: directories must be
//! absolute and distinct, and the log level must be one `tracing` knows.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// data_dir = "/home/me/.local/share/rewind"
/// trash_dir = "/home/me/.local/share/Trash"
///
/// [log]
/// level = "debug"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Directory holding the history journals and lock file
    pub data_dir: Option<PathBuf>,

    /// Trash root (contains `info/` and `files/`)
    pub trash_dir: Option<PathBuf>,

    /// Logging settings
    pub log: Option<LogConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(dir) = &self.data_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue(format!(
                    "data_dir must be an absolute path, got '{}'",
                    dir.display()
                )));
            }
        }

        if let Some(dir) = &self.trash_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::InvalidValue(format!(
                    "trash_dir must be an absolute path, got '{}'",
                    dir.display()
                )));
            }
        }

        if let (Some(data), Some(trash)) = (&self.data_dir, &self.trash_dir) {
            if data == trash {
                return Err(ConfigError::InvalidValue(
                    "data_dir and trash_dir must differ".to_string(),
                ));
            }
        }

        if let Some(log) = &self.log {
            log.validate()?;
        }

        Ok(())
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Level for the `rewind` target ("error", "warn", "info", "debug", "trace")
    pub level: Option<String>,
}

impl LogConfig {
    /// Valid log levels.
    pub const VALID_LEVELS: &'static [&'static str] = &["error", "warn", "info", "debug", "trace"];

    /// Validate the logging configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.level {
            if !Self::VALID_LEVELS.contains(&level.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid log level '{}', must be one of: {}",
                    level,
                    Self::VALID_LEVELS.join(", ")
                )));
            }
        }
        Ok(())
    }
}
