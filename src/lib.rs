//! rewind - a durable undo/redo journal for destructive file operations
//!
//! rewind lets an application trash files, restore them and change their
//! ratings while keeping every change reversible, one group at a time,
//! across process restarts.
//!
//! # Architecture
//!
//! - [`core`] - Strong types, paths, config, the trash store, actions and
//!   the append-only journals
//! - [`engine`] - The history engine (apply/undo/redo) and reconciliation
//! - [`logging`] - Optional `tracing` subscriber setup for embedders
//!
//! # Correctness Invariants
//!
//! 1. Undo and redo move whole groups, never part of one
//! 2. Every record lives on exactly one of the done/undone stacks
//! 3. Applying new actions empties the undone stack
//! 4. Reopening the journals reproduces the in-memory stacks
//!
//! # Example
//!
//! ```no_run
//! use rewind::core::config::Config;
//! use rewind::core::target::NullTarget;
//! use rewind::{Action, GroupId, HistoryEngine};
//!
//! let config = Config::load().unwrap();
//! let mut engine = HistoryEngine::open(&config.paths().unwrap()).unwrap();
//!
//! let group = GroupId::new();
//! engine
//!     .apply(&mut NullTarget, vec![Action::trash(group, "/home/me/photos/blurry.jpg")])
//!     .unwrap();
//! engine.undo(&mut NullTarget).unwrap();
//! ```

pub mod core;
pub mod engine;
pub mod logging;

pub use crate::core::action::{Action, ActionError, ActionKind, ErrorKind, ReloadHint};
pub use crate::core::types::{GroupId, Rating};
pub use crate::engine::{HistoryEngine, HistoryError, HistoryOutcome};
