//! core::target
//!
//! The external view that actions affect.
//!
//! # Design
//!
//! The target is a collaborator owned by the caller: typically a list
//! model in a viewer. Actions notify it about per-item changes while they
//! run, and the history engine asks it to either fully reload or refresh
//! the affected items once an apply/undo/redo call is over.
//!
//! [`RecordingTarget`] records every notification in order, for tests and
//! for callers that want to batch updates themselves.

use std::path::{Path, PathBuf};

use crate::core::metadata::RatingMetadata;

/// A mutable view of the files actions operate on.
pub trait Target {
    /// An item left the working set (it was trashed).
    fn removed(&mut self, _path: &Path) {}

    /// An item's rating metadata was rewritten.
    fn rating_changed(&mut self, _path: &Path, _metadata: RatingMetadata) {}

    /// Rebuild the whole view from disk.
    fn reload(&mut self);

    /// Refresh only the listed items in place.
    fn refresh(&mut self, paths: &[PathBuf]);
}

/// A target that ignores every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTarget;

impl Target for NullTarget {
    fn reload(&mut self) {}

    fn refresh(&mut self, _paths: &[PathBuf]) {}
}

/// A notification received by a [`RecordingTarget`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetEvent {
    Removed(PathBuf),
    RatingChanged(PathBuf, RatingMetadata),
    Reload,
    Refresh(Vec<PathBuf>),
}

/// A target that records notifications in arrival order.
#[derive(Debug, Clone, Default)]
pub struct RecordingTarget {
    pub events: Vec<TargetEvent>,
}

impl RecordingTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last reload/refresh request, if any.
    pub fn last_update(&self) -> Option<&TargetEvent> {
        self.events
            .iter()
            .rev()
            .find(|e| matches!(e, TargetEvent::Reload | TargetEvent::Refresh(_)))
    }

    /// Number of full reloads requested.
    pub fn reload_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, TargetEvent::Reload))
            .count()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

impl Target for RecordingTarget {
    fn removed(&mut self, path: &Path) {
        self.events.push(TargetEvent::Removed(path.to_path_buf()));
    }

    fn rating_changed(&mut self, path: &Path, metadata: RatingMetadata) {
        self.events
            .push(TargetEvent::RatingChanged(path.to_path_buf(), metadata));
    }

    fn reload(&mut self) {
        self.events.push(TargetEvent::Reload);
    }

    fn refresh(&mut self, paths: &[PathBuf]) {
        self.events.push(TargetEvent::Refresh(paths.to_vec()));
    }
}
