//! core::action
//!
//! Reversible actions.
//!
//! # Kinds
//!
//! | Tag | Effect | Inverse | Reload hint |
//! |-----|--------|---------|-------------|
//! | `Trash` | move file into the trash, write sidecar | `RestoreFromTrash` | reload |
//! | `RestoreFromTrash` | move latest trashed copy back | `Trash` | reload |
//! | `SetRating` | write new rating metadata | `SetRating` with old/new swapped | refresh |
//!
//! # Wire format
//!
//! Each action is one JSON array, `[tag, group_id, args...]`:
//!
//! ```text
//! ["Trash","3f2a...","/a/1.jpg"]
//! ["RestoreFromTrash","3f2a...","/a/1.jpg"]
//! ["SetRating","3f2a...","/a/1.jpg",false,0,true,3]
//! ```
//!
//! `SetRating` arguments are `path, old_reject, old_rating, new_reject,
//! new_rating`. Tags map to decoders through the closed [`ActionTag`]
//! registry; an unknown tag or a malformed record is a decode error.
//!
//! # Example
//!
//! ```
//! use rewind::core::action::{Action, ActionTag};
//! use rewind::core::types::GroupId;
//!
//! let group = GroupId::from_string("g1").unwrap();
//! let trash = Action::trash(group, "/a/1.jpg");
//!
//! let line = serde_json::to_string(&trash).unwrap();
//! assert_eq!(line, r#"["Trash","g1","/a/1.jpg"]"#);
//!
//! let undo = trash.inverse();
//! assert_eq!(undo.tag(), ActionTag::RestoreFromTrash);
//! assert_eq!(undo.inverse(), trash);
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::de::{self, SeqAccess, Visitor};
use serde::ser::{self, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::info;

use crate::core::metadata::{MetadataError, RatingMetadata};
use crate::core::target::Target;
use crate::core::trash::{TrashError, TrashStore};
use crate::core::types::{GroupId, Rating};

/// Category of an action failure, for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Something the action needs does not exist.
    NotFound,
    /// A rename, write or read failed.
    IoFailure,
    /// The action was attempted but the environment prevented it.
    ActionFailed,
    /// A multi-step effect was left partially applied.
    ActionIncomplete,
    /// The caller passed something the engine cannot accept.
    InvalidInput,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::IoFailure => "i/o failure",
            ErrorKind::ActionFailed => "action failed",
            ErrorKind::ActionIncomplete => "action incomplete",
            ErrorKind::InvalidInput => "invalid input",
        };
        f.write_str(name)
    }
}

/// Error raised by running an action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ActionError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ActionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl ErrorKind {
    /// Classify a trash store failure.
    pub fn of_trash_error(err: &TrashError) -> ErrorKind {
        match err {
            TrashError::NotFound(_) | TrashError::NoTrashedItem(_) => ErrorKind::NotFound,
            TrashError::DestinationExists(_) => ErrorKind::ActionFailed,
            TrashError::InvalidPath(_) => ErrorKind::InvalidInput,
            TrashError::CrossDevice { .. } | TrashError::Io { .. } | TrashError::InvalidInfo { .. } => {
                ErrorKind::IoFailure
            }
            TrashError::RollbackFailed { .. } => ErrorKind::ActionIncomplete,
        }
    }
}

impl From<TrashError> for ActionError {
    fn from(err: TrashError) -> Self {
        ActionError::new(ErrorKind::of_trash_error(&err), err.to_string())
    }
}

impl From<MetadataError> for ActionError {
    fn from(err: MetadataError) -> Self {
        let kind = match &err {
            MetadataError::FileNotFound(_) => ErrorKind::NotFound,
            MetadataError::Io { .. } => ErrorKind::IoFailure,
            MetadataError::Parse { .. } => ErrorKind::ActionFailed,
        };
        ActionError::new(kind, err.to_string())
    }
}

/// Whether the view must be rebuilt or can be refreshed in place.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReloadHint {
    /// Refresh only the affected items.
    #[default]
    Refresh,
    /// The working set changed; rebuild the view.
    Reload,
}

impl ReloadHint {
    /// Aggregate two hints; a reload wins over a refresh.
    pub fn combine(self, other: ReloadHint) -> ReloadHint {
        self.max(other)
    }

    pub fn needs_reload(self) -> bool {
        self == ReloadHint::Reload
    }
}

/// Stable journal tag of an action kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionTag {
    Trash,
    RestoreFromTrash,
    SetRating,
}

impl ActionTag {
    pub const ALL: [ActionTag; 3] = [
        ActionTag::Trash,
        ActionTag::RestoreFromTrash,
        ActionTag::SetRating,
    ];

    /// Every tag string, in [`ActionTag::ALL`] order.
    pub const NAMES: &'static [&'static str] = &["Trash", "RestoreFromTrash", "SetRating"];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionTag::Trash => "Trash",
            ActionTag::RestoreFromTrash => "RestoreFromTrash",
            ActionTag::SetRating => "SetRating",
        }
    }

    /// Look a tag up by its journal string.
    pub fn from_name(name: &str) -> Option<ActionTag> {
        Self::ALL.into_iter().find(|tag| tag.as_str() == name)
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Soft-delete a file into the trash.
    Trash { path: PathBuf },

    /// Move the latest trashed copy of a file back.
    RestoreFromTrash { path: PathBuf },

    /// Rewrite a file's rating metadata.
    SetRating {
        path: PathBuf,
        old: RatingMetadata,
        new: RatingMetadata,
    },
}

impl ActionKind {
    pub fn path(&self) -> &Path {
        match self {
            ActionKind::Trash { path }
            | ActionKind::RestoreFromTrash { path }
            | ActionKind::SetRating { path, .. } => path,
        }
    }

    pub fn tag(&self) -> ActionTag {
        match self {
            ActionKind::Trash { .. } => ActionTag::Trash,
            ActionKind::RestoreFromTrash { .. } => ActionTag::RestoreFromTrash,
            ActionKind::SetRating { .. } => ActionTag::SetRating,
        }
    }
}

/// One reversible operation, tagged with the group it was submitted in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    group: GroupId,
    kind: ActionKind,
}

impl Action {
    pub fn new(group: GroupId, kind: ActionKind) -> Self {
        Self { group, kind }
    }

    pub fn trash(group: GroupId, path: impl Into<PathBuf>) -> Self {
        Self::new(group, ActionKind::Trash { path: path.into() })
    }

    pub fn restore(group: GroupId, path: impl Into<PathBuf>) -> Self {
        Self::new(group, ActionKind::RestoreFromTrash { path: path.into() })
    }

    pub fn set_rating(
        group: GroupId,
        path: impl Into<PathBuf>,
        old: RatingMetadata,
        new: RatingMetadata,
    ) -> Self {
        Self::new(
            group,
            ActionKind::SetRating {
                path: path.into(),
                old,
                new,
            },
        )
    }

    pub fn group(&self) -> &GroupId {
        &self.group
    }

    pub fn kind(&self) -> &ActionKind {
        &self.kind
    }

    pub fn tag(&self) -> ActionTag {
        self.kind.tag()
    }

    pub fn path(&self) -> &Path {
        self.kind.path()
    }

    /// The action that reverts this one, in the same group.
    pub fn inverse(&self) -> Action {
        let kind = match &self.kind {
            ActionKind::Trash { path } => ActionKind::RestoreFromTrash { path: path.clone() },
            ActionKind::RestoreFromTrash { path } => ActionKind::Trash { path: path.clone() },
            ActionKind::SetRating { path, old, new } => ActionKind::SetRating {
                path: path.clone(),
                old: *new,
                new: *old,
            },
        };
        Action::new(self.group.clone(), kind)
    }

    /// Perform the action against the filesystem and notify `target`.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] whose kind tells the caller whether the
    /// input was missing, the filesystem failed, or the effect is partial.
    /// No partial effect is left behind unless the kind is
    /// [`ErrorKind::ActionIncomplete`].
    pub fn run(&self, trash: &TrashStore, target: &mut dyn Target) -> Result<ReloadHint, ActionError> {
        info!(group = %self.group, "{}", self);
        match &self.kind {
            ActionKind::Trash { path } => {
                trash.trash(path)?;
                target.removed(path);
                Ok(ReloadHint::Reload)
            }
            ActionKind::RestoreFromTrash { path } => {
                trash.restore(path)?;
                Ok(ReloadHint::Reload)
            }
            ActionKind::SetRating { path, new, .. } => {
                new.save(path)?;
                target.rating_changed(path, *new);
                Ok(ReloadHint::Refresh)
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::Trash { path } => write!(f, "Trashing {}", path.display()),
            ActionKind::RestoreFromTrash { path } => write!(f, "Restoring {}", path.display()),
            ActionKind::SetRating { path, old, new } => write!(
                f,
                "{}: rejected ({} -> {}), rating ({} -> {})",
                path.display(),
                old.rejected,
                new.rejected,
                old.rating,
                new.rating
            ),
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let path = self
            .path()
            .to_str()
            .ok_or_else(|| ser::Error::custom("action path is not valid UTF-8"))?;

        match &self.kind {
            ActionKind::Trash { .. } | ActionKind::RestoreFromTrash { .. } => {
                let mut seq = serializer.serialize_seq(Some(3))?;
                seq.serialize_element(self.tag().as_str())?;
                seq.serialize_element(&self.group)?;
                seq.serialize_element(path)?;
                seq.end()
            }
            ActionKind::SetRating { old, new, .. } => {
                let mut seq = serializer.serialize_seq(Some(7))?;
                seq.serialize_element(self.tag().as_str())?;
                seq.serialize_element(&self.group)?;
                seq.serialize_element(path)?;
                seq.serialize_element(&old.rejected)?;
                seq.serialize_element(&old.rating)?;
                seq.serialize_element(&new.rejected)?;
                seq.serialize_element(&new.rating)?;
                seq.end()
            }
        }
    }
}

/// Next array element, or an `invalid_length` error naming its index.
fn element<'de, A, T>(seq: &mut A, index: usize) -> Result<T, A::Error>
where
    A: SeqAccess<'de>,
    T: Deserialize<'de>,
{
    seq.next_element()?
        .ok_or_else(|| de::Error::invalid_length(index, &"a complete journal record"))
}

struct ActionVisitor;

impl<'de> Visitor<'de> for ActionVisitor {
    type Value = Action;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a journal record [kind, group_id, args...]")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Action, A::Error> {
        let name: String = element(&mut seq, 0)?;
        let tag = ActionTag::from_name(&name)
            .ok_or_else(|| de::Error::unknown_variant(&name, ActionTag::NAMES))?;
        let group: GroupId = element(&mut seq, 1)?;
        let path: PathBuf = element(&mut seq, 2)?;

        let (kind, len) = match tag {
            ActionTag::Trash => (ActionKind::Trash { path }, 3),
            ActionTag::RestoreFromTrash => (ActionKind::RestoreFromTrash { path }, 3),
            ActionTag::SetRating => {
                let old_rejected: bool = element(&mut seq, 3)?;
                let old_rating: Rating = element(&mut seq, 4)?;
                let new_rejected: bool = element(&mut seq, 5)?;
                let new_rating: Rating = element(&mut seq, 6)?;
                let kind = ActionKind::SetRating {
                    path,
                    old: RatingMetadata::new(old_rejected, old_rating),
                    new: RatingMetadata::new(new_rejected, new_rating),
                };
                (kind, 7)
            }
        };

        if seq.next_element::<de::IgnoredAny>()?.is_some() {
            return Err(de::Error::invalid_length(
                len + 1,
                &"no arguments beyond the action's own",
            ));
        }

        Ok(Action::new(group, kind))
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Action, D::Error> {
        deserializer.deserialize_seq(ActionVisitor)
    }
}
