//! Per-sink metrics
//!
//! - Counters only, monotonic
//! - One registry per output stream; nothing process-wide
//! - Atomics with Relaxed ordering, so the channel and coordinator can share
//!   one registry behind an `Arc`

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for one output stream
#[derive(Debug, Default)]
pub struct SinkMetrics {
    records_written: AtomicU64,
    bytes_written: AtomicU64,
    bytes_truncated: AtomicU64,
    rotations: AtomicU64,
    attempts_started: AtomicU64,
    replays: AtomicU64,
    abandoned_attempts: AtomicU64,
    commits: AtomicU64,
}

impl SinkMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one appended record of `bytes` bytes
    pub fn record_append(&self, bytes: u64) {
        self.records_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written.fetch_add(bytes, Ordering::Relaxed);
    }

    /// Record bytes removed by a truncation
    pub fn add_truncated_bytes(&self, bytes: u64) {
        self.bytes_truncated.fetch_add(bytes, Ordering::Relaxed);
    }

    pub fn increment_rotations(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_attempts(&self) {
        self.attempts_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_replays(&self) {
        self.replays.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_abandoned(&self) {
        self.abandoned_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written: self.records_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            bytes_truncated: self.bytes_truncated.load(Ordering::Relaxed),
            rotations: self.rotations.load(Ordering::Relaxed),
            attempts_started: self.attempts_started.load(Ordering::Relaxed),
            replays: self.replays.load(Ordering::Relaxed),
            abandoned_attempts: self.abandoned_attempts.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of a sink's counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub records_written: u64,
    pub bytes_written: u64,
    pub bytes_truncated: u64,
    pub rotations: u64,
    pub attempts_started: u64,
    pub replays: u64,
    pub abandoned_attempts: u64,
    pub commits: u64,
}
