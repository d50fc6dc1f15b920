//! Transaction coordinator
//!
//! Drives one output stream through `begin -> apply* -> commit` cycles and
//! keeps replays idempotent:
//!
//! - `begin(t)` persists `{t, offset before t's first write}` before
//!   returning, so an attempt interrupted at any point can be undone.
//! - `begin(t)` for the most recently started `t` cuts the current file back
//!   to that offset, removing every byte of the earlier attempt.
//! - `commit(t)` syncs the data file. Once it returns, `t`'s records survive
//!   a crash.
//!
//! State machine:
//!
//! ```text
//! initialize -> Ready -> begin -> AttemptOpen -> apply* -> commit -> Ready
//!                 |                    |
//!                 +------ close -------+-----> Closed
//! ```
//!
//! A fatal error moves the sink to `Failed`; only `close` is accepted there.

use std::path::{Component, PathBuf};
use std::sync::Arc;

use crate::backend::StorageBackend;
use crate::channel::{OutputChannel, ResumePoint};
use crate::crash_point::{maybe_crash, points};
use crate::errors::{SinkError, SinkResult};
use crate::format::{Record, RecordFormat};
use crate::naming::FileNameFormat;
use crate::observability::{Event, Logger, MetricsSnapshot, SinkMetrics};
use crate::recovery::{RecoveryIndex, RecoveryRecord};

use super::options::SinkOptions;

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    /// Initialized, no attempt open
    Ready,
    /// An attempt for `txid` has begun and not yet committed
    AttemptOpen { txid: u64, pre_attempt_offset: u64 },
    /// Closed; terminal
    Closed,
    /// A fatal error was detected; only `close` is accepted
    Failed,
}

/// What one `apply` call wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub records: u64,
    pub bytes: u64,
    pub rotations: u64,
}

/// Transactional, rotation-aware writer for one stream partition.
#[derive(Debug)]
pub struct TransactionalSink {
    stream: String,
    partition: u32,
    channel: OutputChannel,
    index: RecoveryIndex,
    format: Box<dyn RecordFormat>,
    started: Option<RecoveryRecord>,
    last_committed: Option<u64>,
    state: SinkState,
    metrics: Arc<SinkMetrics>,
}

impl TransactionalSink {
    /// Validate `options`, read the recovery index and open the current data
    /// file.
    ///
    /// Nothing is created on storage unless every collaborator is valid.
    pub fn initialize(options: SinkOptions) -> SinkResult<Self> {
        options.validate()?;
        let root = options.root_dir()?;

        let SinkOptions {
            stream,
            partition,
            rotation_policy,
            file_name_format,
            record_format,
            backend,
            rotation_actions,
            ..
        } = options;

        let (Some(policy), Some(mut naming), Some(format)) =
            (rotation_policy, file_name_format, record_format)
        else {
            return Err(SinkError::configuration(
                "Rotation policy, file name format and record format are required",
            ));
        };

        naming.prepare(&stream, partition);
        let dir = data_dir(&root, naming.as_ref());

        let index = RecoveryIndex::new(Arc::clone(&backend), &dir, &stream, partition);
        let started = index.read().map_err(|e| report_corruption(&stream, partition, e))?;

        if let Some(record) = &started {
            Logger::emit(
                Event::RecoveryRecordLoaded,
                &[
                    ("data_file", record.data_file.as_str()),
                    ("offset", record.offset.to_string().as_str()),
                    ("stream", stream.as_str()),
                    ("txid", record.txid.to_string().as_str()),
                ],
            );
        }

        let resume = resume_point(backend.as_ref(), &dir, naming.as_ref(), started.as_ref())?;
        let metrics = Arc::new(SinkMetrics::new());
        let channel = OutputChannel::open(
            backend,
            dir,
            naming,
            policy,
            rotation_actions,
            resume,
            Arc::clone(&metrics),
        )?;

        if let Some(record) = &started {
            if record.data_file == channel.file_name() && record.offset > channel.current_offset() {
                return Err(report_corruption(
                    &stream,
                    partition,
                    SinkError::corrupted_at_offset(
                        record.offset,
                        format!(
                            "recorded offset is beyond {} ({} bytes)",
                            record.data_file,
                            channel.current_offset()
                        ),
                    ),
                ));
            }
        }

        Logger::emit(
            Event::SinkInitialized,
            &[
                ("file", channel.file_name()),
                ("offset", channel.current_offset().to_string().as_str()),
                ("partition", partition.to_string().as_str()),
                ("rotation", channel.rotation().to_string().as_str()),
                ("stream", stream.as_str()),
            ],
        );

        Ok(Self {
            stream,
            partition,
            channel,
            index,
            format,
            started,
            last_committed: None,
            state: SinkState::Ready,
            metrics,
        })
    }

    /// Start an attempt for `txid`.
    ///
    /// - `txid` equal to the most recently started txid: replay. The current
    ///   file is cut back to where that attempt began.
    /// - `txid` greater: new attempt. An attempt still open in this process
    ///   is abandoned (its bytes are removed) first.
    /// - `txid` smaller: `TXSINK_INVALID_TRANSITION`.
    ///
    /// The recovery record is durable before this returns.
    pub fn begin(&mut self, txid: u64) -> SinkResult<()> {
        self.ensure_usable()?;
        let result = self.begin_attempt(txid);
        self.track(result)
    }

    fn begin_attempt(&mut self, txid: u64) -> SinkResult<()> {
        let previous = self.started.clone();
        let replay = match &previous {
            Some(record) if txid < record.txid => {
                return Err(SinkError::invalid_transition_for(
                    txid,
                    format!(
                        "txid is older than the most recently started txid {}",
                        record.txid
                    ),
                ));
            }
            Some(record) => txid == record.txid,
            None => false,
        };

        let pre_attempt_offset = match (&previous, self.state) {
            (Some(record), _) if replay => {
                self.rewind_to(record)?;
                self.metrics.increment_replays();
                Logger::emit(
                    Event::AttemptReplay,
                    &[
                        ("offset", record.offset.to_string().as_str()),
                        ("stream", self.stream.as_str()),
                        ("txid", txid.to_string().as_str()),
                    ],
                );
                record.offset
            }
            (Some(record), SinkState::AttemptOpen { txid: open, .. }) => {
                self.rewind_to(record)?;
                self.metrics.increment_abandoned();
                Logger::emit(
                    Event::AttemptAbandoned,
                    &[
                        ("abandoned_txid", open.to_string().as_str()),
                        ("stream", self.stream.as_str()),
                        ("txid", txid.to_string().as_str()),
                    ],
                );
                self.channel.current_offset()
            }
            _ => self.channel.current_offset(),
        };
        // Any earlier attempt is gone from the file at this point
        self.state = SinkState::Ready;

        let record = RecoveryRecord::new(
            txid,
            self.channel.rotation(),
            self.channel.file_name(),
            pre_attempt_offset,
        );
        self.index.write(&record)?;
        maybe_crash(points::SINK_AFTER_INDEX_WRITE);

        self.started = Some(record);
        self.state = SinkState::AttemptOpen {
            txid,
            pre_attempt_offset,
        };
        self.metrics.increment_attempts();

        Logger::emit(
            Event::AttemptBegin,
            &[
                ("file", self.channel.file_name()),
                ("offset", pre_attempt_offset.to_string().as_str()),
                ("replay", if replay { "true" } else { "false" }),
                ("stream", self.stream.as_str()),
                ("txid", txid.to_string().as_str()),
            ],
        );
        Ok(())
    }

    /// Cut the current file back to where `record`'s attempt began.
    fn rewind_to(&mut self, record: &RecoveryRecord) -> SinkResult<()> {
        if record.data_file != self.channel.file_name() || record.rotation != self.channel.rotation()
        {
            return Err(SinkError::corrupted(format!(
                "Attempt {} began in {} (rotation {}) but the open file is {} (rotation {}); \
                 truncation cannot cross a rotation boundary",
                record.txid,
                record.data_file,
                record.rotation,
                self.channel.file_name(),
                self.channel.rotation()
            )));
        }
        self.channel.truncate(record.offset)
    }

    /// Format and append `records` to the open attempt.
    ///
    /// Rotation is checked before each record is written. Nothing is synced;
    /// durability comes from `commit`.
    pub fn apply(&mut self, records: &[Record]) -> SinkResult<ApplySummary> {
        self.ensure_usable()?;
        if !matches!(self.state, SinkState::AttemptOpen { .. }) {
            return Err(SinkError::invalid_transition(
                "apply called without an open attempt",
            ));
        }

        let result = self.append_records(records);
        self.track(result)
    }

    fn append_records(&mut self, records: &[Record]) -> SinkResult<ApplySummary> {
        let mut summary = ApplySummary::default();
        for record in records {
            let bytes = self.format.format(record);
            if self.channel.rotate_if_needed(bytes.len() as u64)? {
                summary.rotations += 1;
            }
            self.channel.append(&bytes)?;
            summary.records += 1;
            summary.bytes += bytes.len() as u64;
        }

        if !records.is_empty() {
            maybe_crash(points::SINK_AFTER_APPLY);
        }
        Ok(summary)
    }

    /// Sync everything written by the open attempt for `txid`.
    pub fn commit(&mut self, txid: u64) -> SinkResult<()> {
        self.ensure_usable()?;
        match self.state {
            SinkState::AttemptOpen { txid: open, .. } if open == txid => {}
            SinkState::AttemptOpen { txid: open, .. } => {
                return Err(SinkError::out_of_order_commit(
                    txid,
                    format!("open attempt is for txid {}", open),
                ));
            }
            _ => {
                return Err(SinkError::out_of_order_commit(
                    txid,
                    "commit called without a matching begin",
                ));
            }
        }

        maybe_crash(points::SINK_BEFORE_COMMIT_FLUSH);
        let result = self.channel.flush();
        self.track(result)?;
        maybe_crash(points::SINK_AFTER_COMMIT_FLUSH);

        self.state = SinkState::Ready;
        self.last_committed = Some(txid);
        self.metrics.increment_commits();

        Logger::emit(
            Event::AttemptCommit,
            &[
                ("file", self.channel.file_name()),
                ("offset", self.channel.current_offset().to_string().as_str()),
                ("stream", self.stream.as_str()),
                ("txid", txid.to_string().as_str()),
            ],
        );
        Ok(())
    }

    /// Flush and release the data file. Idempotent.
    ///
    /// The file is released even if the final flush fails or the sink has
    /// failed.
    pub fn close(&mut self) -> SinkResult<()> {
        if self.state == SinkState::Closed {
            return Ok(());
        }
        let result = self.channel.close();
        self.state = SinkState::Closed;

        let snapshot = self.metrics.snapshot();
        Logger::emit(
            Event::SinkClosed,
            &[
                ("commits", snapshot.commits.to_string().as_str()),
                ("records_written", snapshot.records_written.to_string().as_str()),
                ("stream", self.stream.as_str()),
            ],
        );
        result
    }

    fn ensure_usable(&self) -> SinkResult<()> {
        match self.state {
            SinkState::Closed => Err(SinkError::invalid_transition("sink is closed")),
            SinkState::Failed => Err(SinkError::corrupted(
                "sink stopped after a fatal error; external intervention required",
            )),
            _ => Ok(()),
        }
    }

    /// Move to `Failed` on fatal errors.
    fn track<T>(&mut self, result: SinkResult<T>) -> SinkResult<T> {
        result.map_err(|e| {
            if e.is_fatal() && self.state != SinkState::Failed {
                self.state = SinkState::Failed;
                report_corruption(&self.stream, self.partition, e)
            } else {
                e
            }
        })
    }

    pub fn state(&self) -> SinkState {
        self.state
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Path of the data file currently being written
    pub fn current_file_path(&self) -> PathBuf {
        self.channel.file_path()
    }

    /// Rotation sequence number of the current data file
    pub fn current_rotation(&self) -> u64 {
        self.channel.rotation()
    }

    /// Txid of the most recently started attempt, including from a previous run
    pub fn last_started(&self) -> Option<u64> {
        self.started.as_ref().map(|r| r.txid)
    }

    /// Txid most recently committed by this instance
    pub fn last_committed(&self) -> Option<u64> {
        self.last_committed
    }

    /// Persisted recovery record as of the last `begin`
    pub fn recovery_record(&self) -> Option<&RecoveryRecord> {
        self.started.as_ref()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

fn report_corruption(stream: &str, partition: u32, error: SinkError) -> SinkError {
    if error.is_fatal() {
        Logger::emit(
            Event::RecoveryStateCorrupted,
            &[
                ("error", error.to_string().as_str()),
                ("partition", partition.to_string().as_str()),
                ("stream", stream),
            ],
        );
    }
    error
}

/// Output root joined with the naming strategy's relative path
pub(crate) fn data_dir(root: &std::path::Path, naming: &dyn FileNameFormat) -> PathBuf {
    let relative: PathBuf = naming
        .path()
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();
    root.join(relative)
}

/// Pick the file to reopen: the newest of the file named in the recovery
/// record and the highest rotation found in the data directory.
///
/// If the recorded file is gone (moved by a rotation action) and nothing newer
/// exists, a fresh file is started past the recorded rotation.
fn resume_point(
    backend: &dyn StorageBackend,
    dir: &std::path::Path,
    naming: &dyn FileNameFormat,
    started: Option<&RecoveryRecord>,
) -> SinkResult<Option<ResumePoint>> {
    let listed = backend.list(dir).map_err(|e| {
        SinkError::storage_io(format!("Failed to list {}", dir.display()), e)
    })?;

    let mut best: Option<ResumePoint> = listed
        .into_iter()
        .filter_map(|name| {
            naming.rotation_of(&name).map(|rotation| ResumePoint {
                rotation,
                file_name: name,
            })
        })
        .max_by(|a, b| {
            a.rotation
                .cmp(&b.rotation)
                .then_with(|| a.file_name.cmp(&b.file_name))
        });

    if let Some(record) = started {
        let recorded_exists = backend.exists(&dir.join(&record.data_file));
        let newer_listed = best.as_ref().map_or(false, |b| b.rotation > record.rotation);
        if recorded_exists && !newer_listed {
            best = Some(ResumePoint {
                rotation: record.rotation,
                file_name: record.data_file.clone(),
            });
        } else if best.as_ref().map_or(true, |b| b.rotation <= record.rotation) {
            let rotation = record.rotation + 1;
            best = Some(ResumePoint {
                rotation,
                file_name: naming.name(rotation, chrono::Utc::now().timestamp_millis()),
            });
        }
    }

    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FaultOp, MemoryBackend};
    use crate::errors::SinkErrorCode;
    use crate::format::DelimitedRecordFormat;
    use crate::naming::DefaultFileNameFormat;
    use crate::rotation::{FileSizeRotationPolicy, NoRotationPolicy};

    fn options(backend: &MemoryBackend) -> SinkOptions {
        SinkOptions::new()
            .with_output_uri("/out")
            .with_stream("orders")
            .with_backend(Arc::new(backend.clone()))
            .with_file_name_format(DefaultFileNameFormat::new().with_path("/data"))
            .with_record_format(DelimitedRecordFormat::new().with_fields(["id"]))
            .with_rotation_policy(NoRotationPolicy)
    }

    fn batch(range: std::ops::Range<u32>) -> Vec<Record> {
        range.map(|i| Record::new().with("id", i)).collect()
    }

    fn contents(backend: &MemoryBackend, sink: &TransactionalSink) -> String {
        String::from_utf8(backend.read(&sink.current_file_path()).unwrap()).unwrap()
    }

    #[test]
    fn test_initialize_opens_data_file_under_naming_path() {
        let backend = MemoryBackend::new();
        let sink = TransactionalSink::initialize(options(&backend)).unwrap();

        assert_eq!(sink.state(), SinkState::Ready);
        assert!(sink.current_file_path().starts_with("/out/data"));
        assert!(backend.exists(&sink.current_file_path()));
        assert_eq!(sink.last_started(), None);
    }

    #[test]
    fn test_invalid_options_touch_nothing() {
        let backend = MemoryBackend::new();
        let options = options(&backend).with_rotation_policy(FileSizeRotationPolicy::from_bytes(0));

        let err = TransactionalSink::initialize(options).unwrap_err();
        assert_eq!(err.code(), SinkErrorCode::Configuration);
        assert!(backend.paths().is_empty());
    }

    #[test]
    fn test_begin_persists_recovery_record() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();
        sink.begin(1).unwrap();
        sink.apply(&batch(0..3)).unwrap();
        sink.commit(1).unwrap();
        sink.begin(2).unwrap();

        let record = sink.recovery_record().unwrap();
        assert_eq!((record.txid, record.offset), (2, 6));
        assert!(backend.exists(std::path::Path::new("/out/data/.index.orders.0")));
        assert_eq!(
            sink.state(),
            SinkState::AttemptOpen {
                txid: 2,
                pre_attempt_offset: 6
            }
        );
    }

    #[test]
    fn test_replay_discards_previous_attempt() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();

        sink.begin(1).unwrap();
        sink.apply(&batch(0..5)).unwrap();
        sink.begin(1).unwrap();
        sink.apply(&batch(7..9)).unwrap();
        sink.commit(1).unwrap();

        assert_eq!(contents(&backend, &sink), "7\n8\n");
        assert_eq!(sink.metrics().replays, 1);
    }

    #[test]
    fn test_newer_txid_abandons_open_attempt() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();

        sink.begin(1).unwrap();
        sink.apply(&batch(0..1)).unwrap();
        sink.commit(1).unwrap();
        sink.begin(2).unwrap();
        sink.apply(&batch(1..4)).unwrap();
        sink.begin(3).unwrap();
        sink.apply(&batch(9..10)).unwrap();
        sink.commit(3).unwrap();

        assert_eq!(contents(&backend, &sink), "0\n9\n");
        assert_eq!(sink.metrics().abandoned_attempts, 1);
    }

    #[test]
    fn test_stale_txid_rejected() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();
        sink.begin(5).unwrap();
        sink.commit(5).unwrap();

        let err = sink.begin(4).unwrap_err();
        assert_eq!(err.code(), SinkErrorCode::InvalidTransition);
        assert!(err.is_transition_error());
        assert_eq!(sink.state(), SinkState::Ready);
    }

    #[test]
    fn test_commit_requires_matching_begin() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();

        assert_eq!(
            sink.commit(1).unwrap_err().code(),
            SinkErrorCode::OutOfOrderCommit
        );
        sink.begin(1).unwrap();
        assert_eq!(
            sink.commit(2).unwrap_err().code(),
            SinkErrorCode::OutOfOrderCommit
        );
        sink.commit(1).unwrap();
        assert_eq!(
            sink.commit(1).unwrap_err().code(),
            SinkErrorCode::OutOfOrderCommit
        );
    }

    #[test]
    fn test_apply_requires_open_attempt() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();

        let err = sink.apply(&batch(0..1)).unwrap_err();
        assert_eq!(err.code(), SinkErrorCode::InvalidTransition);

        sink.begin(1).unwrap();
        assert_eq!(sink.apply(&[]).unwrap(), ApplySummary::default());
    }

    #[test]
    fn test_closed_sink_refuses_operations() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();
        sink.close().unwrap();
        sink.close().unwrap();

        assert_eq!(sink.state(), SinkState::Closed);
        assert_eq!(sink.begin(1).unwrap_err().code(), SinkErrorCode::InvalidTransition);
    }

    #[test]
    fn test_commit_flush_failure_keeps_attempt_open() {
        let backend = MemoryBackend::new();
        let mut sink = TransactionalSink::initialize(options(&backend)).unwrap();
        sink.begin(1).unwrap();
        sink.apply(&batch(0..2)).unwrap();

        backend.fail_next(FaultOp::Sync);
        assert_eq!(sink.commit(1).unwrap_err().code(), SinkErrorCode::StorageIo);
        assert!(matches!(sink.state(), SinkState::AttemptOpen { txid: 1, .. }));
        sink.commit(1).unwrap();
    }

    #[test]
    fn test_replay_across_rotation_fails_sink() {
        let backend = MemoryBackend::new();
        let options = options(&backend).with_rotation_policy(FileSizeRotationPolicy::from_bytes(4));
        let mut sink = TransactionalSink::initialize(options).unwrap();

        sink.begin(1).unwrap();
        let summary = sink.apply(&batch(0..4)).unwrap();
        assert!(summary.rotations > 0);

        let err = sink.begin(1).unwrap_err();
        assert_eq!(err.code(), SinkErrorCode::CorruptedRecoveryState);
        assert_eq!(sink.state(), SinkState::Failed);

        let err = sink.apply(&batch(0..1)).unwrap_err();
        assert_eq!(err.code(), SinkErrorCode::CorruptedRecoveryState);
        sink.close().unwrap();
        assert_eq!(sink.state(), SinkState::Closed);
    }

    #[test]
    fn test_data_dir_strips_root() {
        let naming = DefaultFileNameFormat::new().with_path("/trident/out");
        assert_eq!(
            data_dir(std::path::Path::new("/srv"), &naming),
            PathBuf::from("/srv/trident/out")
        );
        let naming = DefaultFileNameFormat::new();
        assert_eq!(
            data_dir(std::path::Path::new("/srv"), &naming),
            PathBuf::from("/srv")
        );
    }
}
