//! Durable single-slot recovery index
//!
//! One file per stream partition, `.index.<stream>.<partition>`, next to the
//! data files. The hidden prefix keeps it apart from data file names.
//!
//! Writes are atomic and durable before they return:
//! 1. Write the envelope to `<index>.tmp` and sync it
//! 2. Rename the temp file over the index
//! 3. Sync the directory so the rename survives a crash

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::record::{self, RecoveryRecord};
use crate::backend::StorageBackend;
use crate::errors::{SinkError, SinkResult};
use crate::observability::{Event, Logger};

/// Hidden prefix of every recovery index file
pub const INDEX_FILE_PREFIX: &str = ".index.";

const TEMP_SUFFIX: &str = ".tmp";

/// Read-then-overwrite store for one stream's [`RecoveryRecord`].
#[derive(Debug)]
pub struct RecoveryIndex {
    backend: Arc<dyn StorageBackend>,
    dir: PathBuf,
    path: PathBuf,
    temp_path: PathBuf,
}

impl RecoveryIndex {
    /// Index file name for a stream partition
    pub fn file_name(stream: &str, partition: u32) -> String {
        format!("{}{}.{}", INDEX_FILE_PREFIX, stream, partition)
    }

    /// Index for `stream`/`partition` stored in `dir`
    pub fn new(
        backend: Arc<dyn StorageBackend>,
        dir: impl Into<PathBuf>,
        stream: &str,
        partition: u32,
    ) -> Self {
        let dir = dir.into();
        let name = Self::file_name(stream, partition);
        Self {
            backend,
            path: dir.join(&name),
            temp_path: dir.join(format!("{}{}", name, TEMP_SUFFIX)),
            dir,
        }
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the persisted record, if any.
    ///
    /// A leftover temp file means a write was interrupted before its rename;
    /// the previous record (or none) is still authoritative and the next
    /// write overwrites the temp file.
    pub fn read(&self) -> SinkResult<Option<RecoveryRecord>> {
        if !self.backend.exists(&self.path) {
            return Ok(None);
        }

        let bytes = self.backend.read(&self.path).map_err(|e| {
            SinkError::storage_io(
                format!("Failed to read recovery index: {}", self.path.display()),
                e,
            )
        })?;

        record::decode(&bytes).map(Some)
    }

    /// Persist `record`, replacing the previous one.
    pub fn write(&self, record: &RecoveryRecord) -> SinkResult<()> {
        let bytes = record::encode(record).map_err(|e| {
            SinkError::storage_io(
                "Failed to encode recovery record",
                io::Error::new(io::ErrorKind::InvalidData, e),
            )
        })?;

        self.backend
            .write_synced(&self.temp_path, &bytes)
            .map_err(|e| {
                SinkError::storage_io(
                    format!("Failed to write recovery index: {}", self.temp_path.display()),
                    e,
                )
            })?;

        self.backend
            .rename(&self.temp_path, &self.path)
            .map_err(|e| {
                SinkError::storage_io(
                    format!("Failed to commit recovery index: {}", self.path.display()),
                    e,
                )
            })?;

        self.backend.sync_dir(&self.dir).map_err(|e| {
            SinkError::storage_io(
                format!("Failed to sync index directory: {}", self.dir.display()),
                e,
            )
        })?;

        Logger::emit(
            Event::RecoveryIndexWritten,
            &[
                ("data_file", record.data_file.as_str()),
                ("offset", record.offset.to_string().as_str()),
                ("txid", record.txid.to_string().as_str()),
            ],
        );

        Ok(())
    }
}
