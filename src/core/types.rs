//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`GroupId`] - Identifier shared by all actions submitted together
//! - [`Rating`] - Validated star rating (0..=5)
//! - [`DeletionDate`] - Second-precision trash deletion timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use rewind::core::types::{DeletionDate, GroupId, Rating};
//!
//! let group = GroupId::new();
//! assert_eq!(group.as_str().len(), 32);
//!
//! let rating = Rating::new(4).unwrap();
//! assert_eq!(rating.value(), 4);
//! assert!(Rating::new(6).is_err());
//!
//! let date = DeletionDate::parse("2024-03-01T12:30:05").unwrap();
//! assert_eq!(date.to_string(), "2024-03-01T12:30:05");
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid group id: {0}")]
    InvalidGroupId(String),

    #[error("invalid rating: {0}")]
    InvalidRating(String),

    #[error("invalid deletion date: {0}")]
    InvalidDeletionDate(String),
}

/// Identifier tying together every action submitted in one `apply()` call.
///
/// Group ids are plain values, compared by content. Undo and redo always
/// consume a whole contiguous run of records carrying the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId(String);

impl GroupId {
    /// Generate a new unique group id (32 lowercase hex characters).
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create a group id from an existing string.
    ///
    /// Used when reading journals from disk.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidGroupId` if the string is empty or
    /// contains whitespace or control characters.
    pub fn from_string(s: impl Into<String>) -> Result<Self, TypeError> {
        let s = s.into();
        if s.is_empty() {
            return Err(TypeError::InvalidGroupId(
                "group id cannot be empty".into(),
            ));
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidGroupId(format!(
                "group id '{}' contains whitespace or control characters",
                s.escape_debug()
            )));
        }
        Ok(Self(s))
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for GroupId {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<String> for GroupId {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_string(value)
    }
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

impl std::fmt::Display for GroupId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A star rating between 0 and [`Rating::MAX`] inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    /// Highest representable rating.
    pub const MAX: u8 = 5;

    /// Create a validated rating.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRating` if `value > Rating::MAX`.
    pub fn new(value: u8) -> Result<Self, TypeError> {
        if value > Self::MAX {
            return Err(TypeError::InvalidRating(format!(
                "{} is out of range 0..={}",
                value,
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    /// Get the numeric value.
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = TypeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(rating: Rating) -> Self {
        rating.0
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deletion timestamp as recorded in a trashinfo sidecar.
///
/// Local wall-clock time with second precision, formatted as
/// `YYYY-MM-DDTHH:MM:SS` per the freedesktop Trash specification.
/// Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeletionDate(chrono::NaiveDateTime);

impl DeletionDate {
    /// Format used in `DeletionDate=` lines.
    pub const FORMAT: &'static str = "%Y-%m-%dT%H:%M:%S";

    /// The current local time, truncated to whole seconds.
    pub fn now() -> Self {
        use chrono::Timelike;

        let now = chrono::Local::now().naive_local();
        Self(now.with_nanosecond(0).unwrap_or(now))
    }

    /// Parse a `DeletionDate=` value.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidDeletionDate` if the value does not match
    /// [`DeletionDate::FORMAT`].
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        chrono::NaiveDateTime::parse_from_str(s.trim(), Self::FORMAT)
            .map(Self)
            .map_err(|e| TypeError::InvalidDeletionDate(format!("'{}': {}", s, e)))
    }
}

impl std::fmt::Display for DeletionDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format(Self::FORMAT))
    }
}
