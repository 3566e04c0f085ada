//! core
//!
//! Domain types, storage and actions for rewind.
//!
//! # Modules
//!
//! - [`types`] - Strong types: GroupId, Rating, DeletionDate
//! - [`paths`] - Centralized path routing for rewind storage
//! - [`config`] - Configuration schema and loading
//! - [`metadata`] - Per-file rating sidecar
//! - [`trash`] - Freedesktop-style soft-delete store
//! - [`target`] - The external view actions report to
//! - [`action`] - Reversible actions and their journal encoding
//! - [`ops`] - Durable journals and the history lock
//!
//! # Design Principles
//!
//! - Strong typing rejects invalid ratings and group ids at the boundary
//! - Storage locations come from an explicit [`paths::RewindPaths`] value
//! - Every filesystem effect either completes or leaves nothing behind

pub mod action;
pub mod config;
pub mod metadata;
pub mod ops;
pub mod paths;
pub mod target;
pub mod trash;
pub mod types;
