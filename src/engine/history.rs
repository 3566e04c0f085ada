//! engine::history
//!
//! The undo/redo engine.
//!
//! # Architecture
//!
//! [`HistoryEngine`] owns two [`Journal`]s: the done-stack (actions applied
//! or redone) and the undone-stack (actions undone). Each record carries
//! the group id it was submitted with; a group is a contiguous run of
//! records with the same id, and undo/redo always move whole groups.
//!
//! ```text
//!            apply(group)                undo()
//! caller ───────────────────► done ───────────────► undone
//!                              ▲                      │
//!                              └──────── redo() ──────┘
//! ```
//!
//! # Transfer protocol
//!
//! Undo and redo share one loop. For the group at the top of the source
//! stack, repeatedly:
//!
//! 1. Peek the top record; stop at a different group id.
//! 2. Run it (undo runs its inverse, redo runs it forward).
//! 3. On success pop it from the source journal and append the original
//!    record to the destination journal.
//! 4. On failure stop. The failing record and every record below it are
//!    still on the source stack in their original order; the error is
//!    returned.
//!
//! If a journal write fails in step 3, the record is put back on the source
//! journal and its effect is reverted before the error is returned. The
//! same holds in `apply`: an effect whose record cannot be appended is
//! reverted. Every record is therefore on exactly one stack after each
//! step. Only a crash between the pop and the append can lose a record.
//!
//! # Invariants
//!
//! - `apply` empties the undone-stack
//! - Groups on the done-stack never interleave; a group id is never reused
//! - The target is told to reload if any processed action asked for it,
//!   otherwise to refresh exactly the affected paths
//!
//! # Example
//!
//! ```no_run
//! use rewind::core::action::Action;
//! use rewind::core::paths::RewindPaths;
//! use rewind::core::target::NullTarget;
//! use rewind::core::types::GroupId;
//! use rewind::engine::history::HistoryEngine;
//! use std::path::PathBuf;
//!
//! let paths = RewindPaths::new(PathBuf::from("/tmp/rewind"), PathBuf::from("/tmp/Trash"));
//! let mut engine = HistoryEngine::open(&paths).unwrap();
//! let mut view = NullTarget;
//!
//! let group = GroupId::new();
//! engine
//!     .apply(&mut view, vec![Action::trash(group, "/tmp/photos/1.jpg")])
//!     .unwrap();
//!
//! engine.undo(&mut view).unwrap();
//! engine.redo(&mut view).unwrap();
//! engine.close().unwrap();
//! ```

use std::path::PathBuf;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::action::{Action, ActionError, ErrorKind, ReloadHint};
use crate::core::ops::journal::{Journal, JournalError};
use crate::core::ops::lock::{HistoryLock, LockError};
use crate::core::paths::RewindPaths;
use crate::core::target::Target;
use crate::core::trash::{TrashError, TrashStore};
use crate::core::types::GroupId;

/// Errors from history operations.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// An action (or an inverse) failed to run.
    #[error("{0}")]
    Action(#[from] ActionError),

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Trash(#[from] TrashError),

    /// The submitted group cannot be recorded as one contiguous group.
    #[error("invalid group: {0}")]
    InvalidGroup(String),
}

impl HistoryError {
    /// Classify the error, whatever layer it came from.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HistoryError::Action(e) => e.kind(),
            HistoryError::Journal(_) => ErrorKind::IoFailure,
            HistoryError::Lock(LockError::AlreadyLocked(_)) => ErrorKind::ActionFailed,
            HistoryError::Lock(_) => ErrorKind::IoFailure,
            HistoryError::Trash(e) => ErrorKind::of_trash_error(e),
            HistoryError::InvalidGroup(_) => ErrorKind::InvalidInput,
        }
    }
}

/// What a successful apply, undo or redo did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryOutcome {
    /// The group that was processed.
    pub group: GroupId,
    /// Aggregated hint; the target has already been notified with it.
    pub hint: ReloadHint,
    /// Paths touched, in processing order, without duplicates.
    pub affected: Vec<PathBuf>,
    /// Number of records processed.
    pub processed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    /// The action that moves `record` in this direction.
    fn step(self, record: &Action) -> Action {
        match self {
            Direction::Undo => record.inverse(),
            Direction::Redo => record.clone(),
        }
    }
}

/// Accumulates the effects of one apply/undo/redo call.
#[derive(Debug, Default)]
struct Progress {
    hint: ReloadHint,
    affected: Vec<PathBuf>,
    processed: usize,
}

impl Progress {
    fn record(&mut self, action: &Action, hint: ReloadHint) {
        self.hint = self.hint.combine(hint);
        if !self.affected.iter().any(|p| p == action.path()) {
            self.affected.push(action.path().to_path_buf());
        }
        self.processed += 1;
    }

    /// Tell the target what changed. Nothing is sent if nothing ran.
    fn notify(&self, target: &mut dyn Target) {
        if self.processed == 0 {
            return;
        }
        if self.hint.needs_reload() {
            target.reload();
        } else {
            target.refresh(&self.affected);
        }
    }

    fn into_outcome(self, group: GroupId) -> HistoryOutcome {
        HistoryOutcome {
            group,
            hint: self.hint,
            affected: self.affected,
            processed: self.processed,
        }
    }
}

/// Journaled undo/redo over trash and rating actions.
#[derive(Debug)]
pub struct HistoryEngine {
    done: Journal,
    undone: Journal,
    trash: TrashStore,
    // Declared last so the journals are closed before the lock is released.
    lock: HistoryLock,
}

impl HistoryEngine {
    /// Lock the data directory and load both stacks from disk.
    ///
    /// # Errors
    ///
    /// - [`HistoryError::Lock`] if another engine owns the data directory
    /// - [`HistoryError::Journal`] if a journal is unreadable or corrupt
    /// - [`HistoryError::Trash`] if the trash directories cannot be created
    pub fn open(paths: &RewindPaths) -> Result<Self, HistoryError> {
        let lock = HistoryLock::acquire(paths)?;
        let trash = TrashStore::open(paths)?;
        let done = Journal::open(paths.history_journal_path())?;
        let undone = Journal::open(paths.redo_journal_path())?;

        info!(
            data_dir = %paths.data_dir().display(),
            done = done.len(),
            undone = undone.len(),
            "opened history"
        );

        Ok(Self {
            done,
            undone,
            trash,
            lock,
        })
    }

    /// Close both journals, then release the data directory lock.
    pub fn close(self) -> Result<(), HistoryError> {
        let Self {
            done,
            undone,
            mut lock,
            ..
        } = self;
        drop(done);
        drop(undone);
        lock.release()?;
        debug!("closed history");
        Ok(())
    }

    /// Run a group of actions and record them on the done-stack.
    ///
    /// Every action must carry the same group id, and that id must not
    /// already be on the done-stack. The undone-stack is emptied first.
    ///
    /// Actions run in submission order. If one fails, the actions that
    /// already ran stay journaled (there is no compensation) and the error
    /// is returned after the target has been notified of their effects.
    pub fn apply(
        &mut self,
        target: &mut dyn Target,
        actions: Vec<Action>,
    ) -> Result<HistoryOutcome, HistoryError> {
        let group = self.validate_group(&actions)?;

        self.undone.clear()?;

        let mut progress = Progress::default();
        let result = self.apply_all(target, actions, &mut progress);
        progress.notify(target);
        result?;

        Ok(progress.into_outcome(group))
    }

    fn apply_all(
        &mut self,
        target: &mut dyn Target,
        actions: Vec<Action>,
        progress: &mut Progress,
    ) -> Result<(), HistoryError> {
        for action in actions {
            let hint = action.run(&self.trash, target)?;
            progress.record(&action, hint);
            if let Err(e) = self.done.append(action.clone()) {
                revert(&action, &self.trash, target);
                return Err(e.into());
            }
        }
        Ok(())
    }

    fn validate_group(&self, actions: &[Action]) -> Result<GroupId, HistoryError> {
        let first = actions
            .first()
            .ok_or_else(|| HistoryError::InvalidGroup("no actions submitted".into()))?;
        let group = first.group().clone();

        if let Some(stray) = actions.iter().find(|a| a.group() != &group) {
            return Err(HistoryError::InvalidGroup(format!(
                "mixed group ids {} and {}",
                group,
                stray.group()
            )));
        }
        if self.done.contains_group(&group) {
            return Err(HistoryError::InvalidGroup(format!(
                "group id {group} is already recorded"
            )));
        }
        // Anything that cannot be journaled must not run.
        for action in actions {
            if let Err(e) = serde_json::to_vec(action) {
                return Err(ActionError::new(
                    ErrorKind::InvalidInput,
                    format!("cannot record {}: {e}", action.path().display()),
                )
                .into());
            }
        }
        Ok(group)
    }

    /// Revert the most recent group.
    ///
    /// Returns `Ok(None)` when there is nothing to undo.
    pub fn undo(&mut self, target: &mut dyn Target) -> Result<Option<HistoryOutcome>, HistoryError> {
        self.transfer(target, Direction::Undo)
    }

    /// Re-apply the most recently undone group.
    ///
    /// Returns `Ok(None)` when there is nothing to redo.
    pub fn redo(&mut self, target: &mut dyn Target) -> Result<Option<HistoryOutcome>, HistoryError> {
        self.transfer(target, Direction::Redo)
    }

    fn transfer(
        &mut self,
        target: &mut dyn Target,
        direction: Direction,
    ) -> Result<Option<HistoryOutcome>, HistoryError> {
        let source = match direction {
            Direction::Undo => &self.done,
            Direction::Redo => &self.undone,
        };
        let Some(group) = source.last().map(|a| a.group().clone()) else {
            return Ok(None);
        };

        debug!(?direction, %group, "moving group");

        let mut progress = Progress::default();
        let result = self.transfer_group(target, direction, &group, &mut progress);
        progress.notify(target);

        if let Err(e) = result {
            warn!(
                ?direction,
                %group,
                processed = progress.processed,
                error = %e,
                "group stopped partway"
            );
            return Err(e);
        }

        Ok(Some(progress.into_outcome(group)))
    }

    fn transfer_group(
        &mut self,
        target: &mut dyn Target,
        direction: Direction,
        group: &GroupId,
        progress: &mut Progress,
    ) -> Result<(), HistoryError> {
        let (source, destination) = match direction {
            Direction::Undo => (&mut self.done, &mut self.undone),
            Direction::Redo => (&mut self.undone, &mut self.done),
        };

        while let Some(record) = source.last().filter(|a| a.group() == group).cloned() {
            let step = direction.step(&record);
            let hint = step.run(&self.trash, target)?;
            progress.record(&record, hint);

            if let Err(e) = move_record(source, destination, group, record) {
                revert(&step, &self.trash, target);
                return Err(e);
            }
        }
        Ok(())
    }

    /// Forget all history. Files and trash entries are left as they are.
    pub fn clear(&mut self) -> Result<(), HistoryError> {
        self.done.clear()?;
        self.undone.clear()?;
        info!("cleared history");
        Ok(())
    }

    /// The done-stack, oldest record first.
    pub fn done(&self) -> &[Action] {
        self.done.records()
    }

    /// The undone-stack, in stack order (next redo last).
    pub fn undone(&self) -> &[Action] {
        self.undone.records()
    }

    pub fn can_undo(&self) -> bool {
        !self.done.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.undone.is_empty()
    }

    /// The records the next [`undo`](Self::undo) would process, in stack order.
    pub fn peek_undo(&self) -> Option<&[Action]> {
        top_group(self.done.records())
    }

    /// The records the next [`redo`](Self::redo) would process, in stack order.
    pub fn peek_redo(&self) -> Option<&[Action]> {
        top_group(self.undone.records())
    }

    pub fn trash_store(&self) -> &TrashStore {
        &self.trash
    }
}

/// Move the top record of `source` onto `destination`.
///
/// If the append fails the record is appended back to `source`, so on any
/// error it is still on `source` alone.
fn move_record(
    source: &mut Journal,
    destination: &mut Journal,
    group: &GroupId,
    record: Action,
) -> Result<(), HistoryError> {
    source.pop(Some(group))?;
    if let Err(e) = destination.append(record.clone()) {
        if let Err(restore) = source.append(record) {
            warn!(error = %restore, "record lost while moving between journals");
        }
        return Err(e.into());
    }
    Ok(())
}

/// Undo the effect of `step` after its record could not be journaled.
fn revert(step: &Action, trash: &TrashStore, target: &mut dyn Target) {
    if let Err(e) = step.inverse().run(trash, target) {
        warn!(action = %step, error = %e, "could not revert unrecorded effect");
    }
}

/// The contiguous run of same-group records at the end of `records`.
fn top_group(records: &[Action]) -> Option<&[Action]> {
    let group = records.last()?.group();
    let start = records
        .iter()
        .rposition(|a| a.group() != group)
        .map_or(0, |i| i + 1);
    Some(&records[start..])
}
