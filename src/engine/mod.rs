//! engine
//!
//! Undo/redo orchestration over the core layer.
//!
//! # Modules
//!
//! - [`history`] - The history engine: apply, undo, redo
//! - [`verify`] - Read-only reconciliation of history against the disk
//!
//! # Invariants
//!
//! - Only the engine appends to or pops from the journals
//! - Errors are returned after the stacks are consistent again
//! - Verification never mutates anything

pub mod history;
pub mod verify;

pub use history::{HistoryEngine, HistoryError, HistoryOutcome};
pub use verify::{verify_history, VerifyIssue, VerifyResult};
