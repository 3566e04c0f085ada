//! core::ops
//!
//! Durable history storage.
//!
//! # Modules
//!
//! - [`journal`] - Append-only action journal with fsync per record
//! - [`lock`] - Exclusive lock on the history data directory
//!
//! # Architecture
//!
//! A history engine:
//! 1. Acquires the exclusive history lock
//! 2. Opens the done and undone journals, recovering any torn tail
//! 3. Appends one record per successfully run action
//! 4. Pops records from the tail as actions are undone or redone

pub mod journal;
pub mod lock;

pub use journal::{Journal, JournalError};
pub use lock::{HistoryLock, LockError};
