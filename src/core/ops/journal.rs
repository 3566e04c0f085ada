//! core::ops::journal
//!
//! Append-only action journals.
//!
//! # Format
//!
//! One action per line, each line a JSON array (see
//! [`crate::core::action`] for the record layout). The newest record is
//! the last line.
//!
//! # Crash Safety Contract
//!
//! 1. **Per-record persistence:** [`Journal::append`] issues a single
//!    write of the full line followed by `sync_data` before returning. A
//!    failed write is truncated back to the previous length.
//!
//! 2. **Tail-only mutation:** [`Journal::pop`] scans backwards from the end
//!    of the file for the previous line break and truncates there. Earlier
//!    records are never rewritten.
//!
//! 3. **Torn-tail recovery:** on load, an unterminated final fragment (a
//!    write interrupted by a crash) is truncated away with a warning. A
//!    terminated line that fails to decode is a [`JournalError::Corrupt`].
//!
//! # Usage
//!
//! ```no_run
//! use rewind::core::action::Action;
//! use rewind::core::ops::journal::Journal;
//! use rewind::core::types::GroupId;
//!
//! let mut journal = Journal::open("/tmp/history.jsonl").unwrap();
//! let group = GroupId::new();
//! journal.append(Action::trash(group.clone(), "/a/1.jpg")).unwrap();
//!
//! let popped = journal.pop(Some(&group)).unwrap();
//! assert!(popped.is_some());
//! ```

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::action::Action;
use crate::core::types::GroupId;

/// Bytes read per step while scanning backwards for a line break.
const SCAN_CHUNK: usize = 4096;

/// Errors from journal operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// I/O error reading or writing the journal file.
    #[error("journal i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("journal json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A complete line on disk is not a valid record.
    #[error("corrupt journal '{path}' at line {line}: {message}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

/// A journal file together with its decoded records.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    file: File,
    records: Vec<Action>,
}

impl Journal {
    /// Open (creating if needed) the journal at `path` and load it.
    ///
    /// # Errors
    ///
    /// - [`JournalError::Io`] if the file cannot be opened or read
    /// - [`JournalError::Corrupt`] if a complete line does not decode
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut journal = Self {
            path,
            file,
            records: Vec::new(),
        };
        journal.load()?;
        Ok(journal)
    }

    /// Re-read every record from disk, replacing the in-memory list.
    pub fn load(&mut self) -> Result<(), JournalError> {
        let mut bytes = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut bytes)?;

        let complete = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None => 0,
        };
        if complete < bytes.len() {
            warn!(
                path = %self.path.display(),
                dropped = bytes.len() - complete,
                "truncating unterminated journal tail"
            );
            self.file.set_len(complete as u64)?;
            self.file.sync_data()?;
            bytes.truncate(complete);
        }

        let mut records = Vec::new();
        for (index, line) in bytes.split(|&b| b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let action = serde_json::from_slice(line).map_err(|e| JournalError::Corrupt {
                path: self.path.clone(),
                line: index + 1,
                message: e.to_string(),
            })?;
            records.push(action);
        }

        debug!(path = %self.path.display(), records = records.len(), "loaded journal");
        self.records = records;
        Ok(())
    }

    /// Persist `action` as the new last record.
    ///
    /// On failure the file is truncated back to its previous length and the
    /// in-memory list is unchanged.
    pub fn append(&mut self, action: Action) -> Result<(), JournalError> {
        let mut line = serde_json::to_vec(&action)?;
        line.push(b'\n');

        let len = self.file.seek(SeekFrom::End(0))?;
        if let Err(e) = self.write_line(&line) {
            if let Err(rollback) = self.file.set_len(len) {
                warn!(path = %self.path.display(), error = %rollback, "failed to roll back journal append");
            }
            return Err(e);
        }

        self.records.push(action);
        Ok(())
    }

    fn write_line(&mut self, line: &[u8]) -> Result<(), JournalError> {
        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_crash() {
            return Err(JournalError::Io(std::io::Error::other(
                "simulated crash for fault injection testing",
            )));
        }

        self.file.write_all(line)?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Remove and return the last record.
    ///
    /// With `expected` set, the record is only removed when it belongs to
    /// that group; otherwise `Ok(None)` is returned and nothing changes.
    /// Returns `Ok(None)` on an empty journal.
    pub fn pop(&mut self, expected: Option<&GroupId>) -> Result<Option<Action>, JournalError> {
        let Some(last) = self.records.last() else {
            return Ok(None);
        };
        if expected.is_some_and(|group| last.group() != group) {
            return Ok(None);
        }

        #[cfg(any(test, feature = "fault_injection"))]
        if fault_injection::should_crash() {
            return Err(JournalError::Io(std::io::Error::other(
                "simulated crash for fault injection testing",
            )));
        }

        // Blank lines carry no record; drop them together with the last one.
        loop {
            let end = self.file.seek(SeekFrom::End(0))?;
            let start = self.last_line_start(end)?;
            let blank = self.is_blank(start, end)?;
            self.file.set_len(start)?;
            if !blank || start == 0 {
                break;
            }
        }
        self.file.sync_data()?;

        Ok(self.records.pop())
    }

    /// Offset of the first byte of the last line in a file of length `end`.
    fn last_line_start(&mut self, end: u64) -> Result<u64, JournalError> {
        if end == 0 {
            return Ok(0);
        }

        // Skip the terminator of the last line.
        let mut end = end - 1;
        let mut buf = [0u8; SCAN_CHUNK];
        while end > 0 {
            let start = end.saturating_sub(SCAN_CHUNK as u64);
            let n = (end - start) as usize;
            self.file.seek(SeekFrom::Start(start))?;
            self.file.read_exact(&mut buf[..n])?;
            if let Some(pos) = buf[..n].iter().rposition(|&b| b == b'\n') {
                return Ok(start + pos as u64 + 1);
            }
            end = start;
        }
        Ok(0)
    }

    fn is_blank(&mut self, start: u64, end: u64) -> Result<bool, JournalError> {
        let mut line = vec![0u8; (end - start) as usize];
        self.file.seek(SeekFrom::Start(start))?;
        self.file.read_exact(&mut line)?;
        Ok(line.iter().all(u8::is_ascii_whitespace))
    }

    /// Drop every record.
    pub fn clear(&mut self) -> Result<(), JournalError> {
        self.file.set_len(0)?;
        self.file.sync_data()?;
        self.records.clear();
        Ok(())
    }

    /// Records in append order, oldest first.
    pub fn records(&self) -> &[Action] {
        &self.records
    }

    pub fn last(&self) -> Option<&Action> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether any record belongs to `group`.
    pub fn contains_group(&self, group: &GroupId) -> bool {
        self.records.iter().any(|a| a.group() == group)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Fault injection support for testing crash recovery.
///
/// # Usage
///
/// ```ignore
/// use rewind::core::ops::journal::fault_injection;
///
/// // Fail the second write
/// fault_injection::set_crash_after(2);
///
/// journal.append(first)?;
/// assert!(journal.append(second).is_err());
/// journal.append(second)?;
///
/// fault_injection::reset();
/// ```
#[cfg(any(test, feature = "fault_injection"))]
pub mod fault_injection {
    use std::cell::Cell;

    // Thread-local so parallel tests do not see each other's settings.
    thread_local! {
        /// Fail the Nth journal write (append or pop). 0 disables injection.
        static CRASH_AFTER_WRITES: Cell<usize> = const { Cell::new(0) };

        static WRITE_COUNT: Cell<usize> = const { Cell::new(0) };
    }

    /// Make the `n`th journal write from now on fail.
    ///
    /// Only that write fails, with a simulated I/O error; the writes before
    /// and after it succeed.
    pub fn set_crash_after(n: usize) {
        CRASH_AFTER_WRITES.with(|c| c.set(n));
        WRITE_COUNT.with(|c| c.set(0));
    }

    /// Count a write and report whether it should fail.
    pub fn should_crash() -> bool {
        CRASH_AFTER_WRITES.with(|threshold_cell| {
            let threshold = threshold_cell.get();
            if threshold == 0 {
                return false;
            }
            WRITE_COUNT.with(|count_cell| {
                let count = count_cell.get() + 1;
                count_cell.set(count);
                count == threshold
            })
        })
    }

    pub fn reset() {
        CRASH_AFTER_WRITES.with(|c| c.set(0));
        WRITE_COUNT.with(|c| c.set(0));
    }

    pub fn write_count() -> usize {
        WRITE_COUNT.with(|c| c.get())
    }
}
