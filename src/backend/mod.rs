//! Storage backend primitives
//!
//! The sink needs only a handful of operations from the filesystem it writes
//! to: open-or-create for append, append, truncate-to-offset, sync, and
//! rename/list for recovery-index replacement and directory scans. Backends
//! are opaque byte stores; they know nothing about records or transactions.
//!
//! # Implementors
//!
//! - [`LocalBackend`] - local disk via `std::fs`
//! - [`MemoryBackend`] - in-process store that can simulate crashes and
//!   inject faults, for testing

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::{FaultOp, MemoryBackend};

use std::fmt;
use std::io;
use std::path::Path;

/// An open data file.
///
/// Appends always land at the end of the file, including after a truncate.
pub trait DataFile: Send + fmt::Debug {
    /// Append bytes at the end of the file
    fn append(&mut self, data: &[u8]) -> io::Result<()>;

    /// Cut the file down to `len` bytes
    fn truncate(&mut self, len: u64) -> io::Result<()>;

    /// Make all appended and truncated state durable
    fn sync(&mut self) -> io::Result<()>;

    /// Current length in bytes
    fn len(&self) -> io::Result<u64>;
}

/// Filesystem abstraction consumed by the sink.
pub trait StorageBackend: Send + Sync + fmt::Debug {
    /// Open a file for appending, creating it if missing
    fn open_append(&self, path: &Path) -> io::Result<Box<dyn DataFile>>;

    /// Replace the whole content of `path` and sync it before returning
    fn write_synced(&self, path: &Path, data: &[u8]) -> io::Result<()>;

    /// Read the whole file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Whether a file exists at `path`
    fn exists(&self, path: &Path) -> bool;

    /// Names of the regular files directly inside `dir`.
    ///
    /// A missing directory lists as empty.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    /// Length of the file at `path`
    fn file_len(&self, path: &Path) -> io::Result<u64>;

    /// Atomically rename `from` to `to`, replacing `to` if present
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Create a directory and its parents
    fn create_dir_all(&self, dir: &Path) -> io::Result<()>;

    /// Make directory entries (creates, renames) durable
    fn sync_dir(&self, dir: &Path) -> io::Result<()>;
}
