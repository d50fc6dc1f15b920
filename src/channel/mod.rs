//! Output channel
//!
//! Owns exactly one open data file at a time. The channel appends formatted
//! bytes, counts what was written since the last rotation, cuts the current
//! file back to a recorded offset, and rotates to a fresh file when the
//! rotation policy asks for it.
//!
//! Rules:
//! - Rotation is decided before the pending bytes are written, never mid-record
//! - An empty file is never rotated
//! - Truncation only targets the currently open file
//! - Rotation sequence numbers only grow

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use crate::backend::{DataFile, StorageBackend};
use crate::crash_point::{maybe_crash, points};
use crate::errors::{SinkError, SinkResult};
use crate::naming::FileNameFormat;
use crate::observability::{Event, Logger, SinkMetrics};
use crate::rotation::{RotationAction, RotationCheck, RotationPolicy};

/// File the channel should reopen instead of starting at rotation 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub rotation: u64,
    pub file_name: String,
}

/// Append-only writer over a sequence of rotated data files.
#[derive(Debug)]
pub struct OutputChannel {
    backend: Arc<dyn StorageBackend>,
    dir: PathBuf,
    naming: Box<dyn FileNameFormat>,
    policy: Box<dyn RotationPolicy>,
    actions: Vec<Box<dyn RotationAction>>,
    metrics: Arc<SinkMetrics>,

    file: Option<Box<dyn DataFile>>,
    file_name: String,
    rotation: u64,
    offset: u64,
    bytes_since_rotation: u64,
    records_since_rotation: u64,
    opened_at: Instant,
    last_rotated: Option<String>,
}

impl OutputChannel {
    /// Open the current data file in `dir`, creating the directory if needed.
    ///
    /// Without a resume point the channel starts at rotation 0 with a freshly
    /// named file. A resumed file keeps its bytes, and they count toward the
    /// size threshold.
    pub fn open(
        backend: Arc<dyn StorageBackend>,
        dir: impl Into<PathBuf>,
        naming: Box<dyn FileNameFormat>,
        policy: Box<dyn RotationPolicy>,
        actions: Vec<Box<dyn RotationAction>>,
        resume: Option<ResumePoint>,
        metrics: Arc<SinkMetrics>,
    ) -> SinkResult<Self> {
        let dir = dir.into();
        backend.create_dir_all(&dir).map_err(|e| {
            SinkError::storage_io(
                format!("Failed to create data directory: {}", dir.display()),
                e,
            )
        })?;

        let (rotation, file_name) = match resume {
            Some(point) => (point.rotation, point.file_name),
            None => (0, naming.name(0, now_ms())),
        };

        let mut channel = Self {
            backend,
            dir,
            naming,
            policy,
            actions,
            metrics,
            file: None,
            file_name,
            rotation,
            offset: 0,
            bytes_since_rotation: 0,
            records_since_rotation: 0,
            opened_at: Instant::now(),
            last_rotated: None,
        };
        channel.open_current()?;
        channel.bytes_since_rotation = channel.offset;
        Ok(channel)
    }

    fn open_current(&mut self) -> SinkResult<()> {
        let (file, len) = self.create_file(&self.file_name)?;
        self.file = Some(file);
        self.offset = len;
        self.opened_at = Instant::now();
        Ok(())
    }

    /// Open or create `name` in the data directory and make its entry durable.
    fn create_file(&self, name: &str) -> SinkResult<(Box<dyn DataFile>, u64)> {
        let path = self.dir.join(name);
        let file = self.backend.open_append(&path).map_err(|e| {
            SinkError::storage_io(format!("Failed to open data file: {}", path.display()), e)
        })?;
        self.backend.sync_dir(&self.dir).map_err(|e| {
            SinkError::storage_io(format!("Failed to sync directory: {}", self.dir.display()), e)
        })?;
        let len = file.len().map_err(|e| {
            SinkError::storage_io(format!("Failed to stat data file: {}", path.display()), e)
        })?;
        Ok((file, len))
    }

    fn file_mut(&mut self) -> SinkResult<&mut Box<dyn DataFile>> {
        self.file
            .as_mut()
            .ok_or_else(|| SinkError::invalid_transition("Output channel is closed"))
    }

    /// Byte offset at the end of the current file
    pub fn current_offset(&self) -> u64 {
        self.offset
    }

    /// Append one record's bytes, returning the new end offset
    pub fn append(&mut self, bytes: &[u8]) -> SinkResult<u64> {
        let path = self.file_path();
        self.file_mut()?.append(bytes).map_err(|e| {
            SinkError::storage_io(format!("Failed to append to {}", path.display()), e)
        })?;

        let len = bytes.len() as u64;
        self.offset += len;
        self.bytes_since_rotation += len;
        self.records_since_rotation += 1;
        self.metrics.record_append(len);
        Ok(self.offset)
    }

    /// Cut the current file back to `offset` and make the cut durable.
    ///
    /// # Errors
    ///
    /// `TXSINK_CORRUPTED_RECOVERY_STATE` if `offset` lies beyond the file's
    /// actual length.
    pub fn truncate(&mut self, offset: u64) -> SinkResult<()> {
        let path = self.file_path();
        let file = self.file_mut()?;
        let len = file.len().map_err(|e| {
            SinkError::storage_io(format!("Failed to stat {}", path.display()), e)
        })?;
        if offset > len {
            return Err(SinkError::corrupted_at_offset(
                offset,
                format!("{} is only {} bytes long", path.display(), len),
            ));
        }

        file.truncate(offset).map_err(|e| {
            SinkError::storage_io(format!("Failed to truncate {}", path.display()), e)
        })?;

        // The cut is visible even if the sync below fails
        let removed = len - offset;
        self.offset = offset;
        self.bytes_since_rotation = self.bytes_since_rotation.saturating_sub(removed);
        self.metrics.add_truncated_bytes(removed);

        self.file_mut()?.sync().map_err(|e| {
            SinkError::storage_io(format!("Failed to sync {}", path.display()), e)
        })?;

        Logger::emit(
            Event::ChannelTruncate,
            &[
                ("file", self.file_name.as_str()),
                ("offset", offset.to_string().as_str()),
                ("removed_bytes", removed.to_string().as_str()),
            ],
        );
        maybe_crash(points::CHANNEL_AFTER_TRUNCATE);
        Ok(())
    }

    /// Make everything written to the current file durable
    pub fn flush(&mut self) -> SinkResult<()> {
        let path = self.file_path();
        self.file_mut()?
            .sync()
            .map_err(|e| SinkError::storage_io(format!("Failed to sync {}", path.display()), e))
    }

    /// Ask the rotation policy whether `incoming` more bytes should go to a
    /// new file, and rotate if so.
    pub fn rotate_if_needed(&mut self, incoming: u64) -> SinkResult<bool> {
        if self.offset == 0 {
            return Ok(false);
        }

        let check = RotationCheck {
            bytes_written: self.bytes_since_rotation,
            age: self.opened_at.elapsed(),
            incoming,
        };
        if !self.policy.should_rotate(&check) {
            return Ok(false);
        }

        self.rotate()?;
        Ok(true)
    }

    /// Switch to the next rotation.
    ///
    /// The old file is synced and the new one created before anything is
    /// committed, so a failure up to that point leaves the channel on the old
    /// file. Rotation actions run next; if one fails while the old file is
    /// still in place, the new file is discarded as well. Only an action that
    /// fails after another one already moved the file leaves the rotation
    /// committed.
    fn rotate(&mut self) -> SinkResult<()> {
        let closed_path = self.file_path();
        self.file_mut()?.sync().map_err(|e| {
            SinkError::storage_io(format!("Failed to sync {}", closed_path.display()), e)
        })?;

        let next_rotation = self.rotation + 1;
        let next_name = self.naming.name(next_rotation, now_ms());
        let (next_file, next_len) = match self.create_file(&next_name) {
            Ok(created) => created,
            Err(e) => {
                self.discard(&next_name);
                return Err(e);
            }
        };

        let mut pending = None;
        if let Err(error) = self.run_actions(&closed_path) {
            if self.backend.exists(&closed_path) {
                drop(next_file);
                self.discard(&next_name);
                Logger::emit(
                    Event::ChannelRotateAborted,
                    &[
                        ("error", error.to_string().as_str()),
                        ("file", self.file_name.as_str()),
                    ],
                );
                return Err(error);
            }
            // The old file is gone; commit the rotation and report afterwards
            pending = Some(error);
        }

        let previous = std::mem::replace(&mut self.file_name, next_name);
        self.file = Some(next_file);
        self.rotation = next_rotation;
        self.offset = next_len;
        self.opened_at = Instant::now();
        self.bytes_since_rotation = self.offset;
        self.records_since_rotation = 0;
        self.policy.reset();
        self.metrics.increment_rotations();

        Logger::emit(
            Event::ChannelRotate,
            &[
                ("from", previous.as_str()),
                ("rotation", self.rotation.to_string().as_str()),
                ("to", self.file_name.as_str()),
            ],
        );
        self.last_rotated = Some(previous);

        if let Some(error) = pending {
            return Err(error);
        }
        maybe_crash(points::CHANNEL_AFTER_ROTATE);
        Ok(())
    }

    fn run_actions(&self, closed_path: &Path) -> SinkResult<()> {
        for action in &self.actions {
            action
                .execute(self.backend.as_ref(), closed_path)
                .map_err(|e| {
                    SinkError::storage_io(
                        format!("Rotation action failed for {}", closed_path.display()),
                        e,
                    )
                })?;
        }
        Ok(())
    }

    /// Best-effort removal of the empty file created for a rotation that did
    /// not happen
    fn discard(&self, name: &str) {
        let path = self.dir.join(name);
        if !self.backend.exists(&path) || self.backend.file_len(&path).map_or(true, |len| len > 0) {
            return;
        }
        if let Err(e) = self.backend.remove(&path) {
            Logger::emit(
                Event::ChannelDiscardFailed,
                &[
                    ("error", e.to_string().as_str()),
                    ("file", name),
                ],
            );
        }
    }

    /// Flush and release the current file. Safe to call repeatedly.
    ///
    /// The handle is dropped even when the final sync fails.
    pub fn close(&mut self) -> SinkResult<()> {
        match self.file.take() {
            Some(mut file) => {
                let path = self.file_path();
                file.sync().map_err(|e| {
                    SinkError::storage_io(format!("Failed to sync {}", path.display()), e)
                })
            }
            None => Ok(()),
        }
    }

    /// Whether a data file is currently open
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Name of the current data file
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Full path of the current data file
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Rotation sequence number of the current file
    pub fn rotation(&self) -> u64 {
        self.rotation
    }

    /// Records appended since the last rotation (or since open)
    pub fn records_since_rotation(&self) -> u64 {
        self.records_since_rotation
    }

    /// Bytes in the current file counted toward the rotation threshold
    pub fn bytes_since_rotation(&self) -> u64 {
        self.bytes_since_rotation
    }

    /// Name of the file most recently rotated out
    pub fn last_rotated(&self) -> Option<&str> {
        self.last_rotated.as_deref()
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
