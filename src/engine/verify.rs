//! engine::verify
//!
//! Read-only reconciliation of the done-stack against the filesystem.
//!
//! An action's effect happens before its record is journaled, so a crash
//! between the two, or outside interference, can leave the journal
//! describing a state the disk is not in. [`verify_history`] reports such
//! drift for the latest recorded effect on each path:
//!
//! - `Trash`: the trash holds an entry for the path and the path is free
//! - `RestoreFromTrash`: the path exists
//! - `SetRating`: the file exists and its sidecar holds the new values
//!
//! # Invariants
//!
//! - Never mutates the filesystem or the journals
//! - Deterministic: issues are reported in done-stack order

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::action::{Action, ActionKind};
use crate::core::metadata::RatingMetadata;
use crate::engine::history::HistoryEngine;

/// A disagreement between the journal and the filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyIssue {
    #[error("{0} is recorded as trashed but has no trash entry")]
    MissingTrashEntry(PathBuf),

    #[error("{0} is recorded as trashed but still exists")]
    StillPresent(PathBuf),

    #[error("{0} is recorded as present but does not exist")]
    MissingFile(PathBuf),

    #[error("{path} rating is {found:?}, journal expects {expected:?}")]
    RatingMismatch {
        path: PathBuf,
        expected: RatingMetadata,
        found: RatingMetadata,
    },

    #[error("could not check {path}: {message}")]
    Unreadable { path: PathBuf, message: String },
}

/// Result of a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyResult {
    /// Whether no issues were found
    pub ok: bool,
    pub issues: Vec<VerifyIssue>,
}

impl VerifyResult {
    pub fn success() -> Self {
        Self {
            ok: true,
            issues: vec![],
        }
    }

    pub fn from_issues(issues: Vec<VerifyIssue>) -> Self {
        Self {
            ok: issues.is_empty(),
            issues,
        }
    }
}

/// Check the latest recorded effect on every path in the done-stack.
pub fn verify_history(engine: &HistoryEngine) -> VerifyResult {
    let done = engine.done();

    // Index of the last record per path; earlier effects were superseded.
    let mut latest: HashMap<&Path, usize> = HashMap::new();
    for (i, action) in done.iter().enumerate() {
        latest.insert(action.path(), i);
    }

    let issues = done
        .iter()
        .enumerate()
        .filter(|(i, action)| latest.get(action.path()) == Some(i))
        .filter_map(|(_, action)| check(engine, action))
        .collect();

    VerifyResult::from_issues(issues)
}

fn check(engine: &HistoryEngine, action: &Action) -> Option<VerifyIssue> {
    let path = action.path().to_path_buf();
    match action.kind() {
        ActionKind::Trash { .. } => match engine.trash_store().contains(&path) {
            Err(e) => Some(VerifyIssue::Unreadable {
                path,
                message: e.to_string(),
            }),
            Ok(false) => Some(VerifyIssue::MissingTrashEntry(path)),
            Ok(true) if path.exists() => Some(VerifyIssue::StillPresent(path)),
            Ok(true) => None,
        },
        ActionKind::RestoreFromTrash { .. } => {
            (!path.exists()).then_some(VerifyIssue::MissingFile(path))
        }
        ActionKind::SetRating { new, .. } => {
            if !path.exists() {
                return Some(VerifyIssue::MissingFile(path));
            }
            match RatingMetadata::load(&path) {
                Ok(found) if found == *new => None,
                Ok(found) => Some(VerifyIssue::RatingMismatch {
                    path,
                    expected: *new,
                    found,
                }),
                Err(e) => Some(VerifyIssue::Unreadable {
                    path,
                    message: e.to_string(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::RewindPaths;
    use crate::core::target::NullTarget;
    use crate::core::types::{GroupId, Rating};
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, HistoryEngine) {
        let temp = TempDir::new().expect("create temp dir");
        let paths = RewindPaths::new(temp.path().join("data"), temp.path().join("Trash"));
        let engine = HistoryEngine::open(&paths).expect("open engine");
        (temp, engine)
    }

    fn file(temp: &TempDir, name: &str) -> PathBuf {
        let path = temp.path().join(name);
        fs::write(&path, b"x").unwrap();
        path
    }

    #[test]
    fn empty_history_is_ok() {
        let (_temp, engine) = setup();
        assert_eq!(verify_history(&engine), VerifyResult::success());
    }

    #[test]
    fn consistent_history_is_ok() {
        let (temp, mut engine) = setup();
        let a = file(&temp, "a.jpg");
        let b = file(&temp, "b.jpg");
        let rated = RatingMetadata::new(false, Rating::new(5).unwrap());

        engine
            .apply(&mut NullTarget, vec![Action::trash(GroupId::new(), &a)])
            .unwrap();
        engine
            .apply(
                &mut NullTarget,
                vec![Action::set_rating(GroupId::new(), &b, RatingMetadata::default(), rated)],
            )
            .unwrap();

        assert!(verify_history(&engine).ok);
    }

    #[test]
    fn recreated_file_is_reported() {
        let (temp, mut engine) = setup();
        let a = file(&temp, "a.jpg");
        engine
            .apply(&mut NullTarget, vec![Action::trash(GroupId::new(), &a)])
            .unwrap();

        fs::write(&a, b"again").unwrap();

        let result = verify_history(&engine);
        assert!(!result.ok);
        assert_eq!(result.issues, vec![VerifyIssue::StillPresent(a)]);
    }

    #[test]
    fn edited_rating_is_reported() {
        let (temp, mut engine) = setup();
        let a = file(&temp, "a.jpg");
        let rated = RatingMetadata::new(true, Rating::new(1).unwrap());
        engine
            .apply(
                &mut NullTarget,
                vec![Action::set_rating(GroupId::new(), &a, RatingMetadata::default(), rated)],
            )
            .unwrap();

        RatingMetadata::default().save(&a).unwrap();

        let result = verify_history(&engine);
        assert_eq!(
            result.issues,
            vec![VerifyIssue::RatingMismatch {
                path: a,
                expected: rated,
                found: RatingMetadata::default(),
            }]
        );
    }

    #[test]
    fn only_latest_effect_per_path_counts() {
        let (temp, mut engine) = setup();
        let a = file(&temp, "a.jpg");
        engine
            .apply(&mut NullTarget, vec![Action::trash(GroupId::new(), &a)])
            .unwrap();
        engine
            .apply(&mut NullTarget, vec![Action::restore(GroupId::new(), &a)])
            .unwrap();

        assert!(verify_history(&engine).ok);
    }

    #[test]
    fn purged_trash_entry_is_reported() {
        let (temp, mut engine) = setup();
        let a = file(&temp, "a.jpg");
        engine
            .apply(&mut NullTarget, vec![Action::trash(GroupId::new(), &a)])
            .unwrap();

        let item = engine.trash_store().find_latest(&a).unwrap().unwrap();
        fs::remove_file(&item.info_path).unwrap();
        fs::remove_file(&item.content_path).unwrap();

        assert_eq!(
            verify_history(&engine).issues,
            vec![VerifyIssue::MissingTrashEntry(a)]
        );
    }
}
