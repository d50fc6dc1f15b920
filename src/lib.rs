//! txsink - A transactional, rotation-aware, file-backed state sink
//!
//! Persists one ordered batch of formatted records per transaction id,
//! keeps replays of the most recent transaction from duplicating data, and
//! rotates output across files under a pluggable policy.

pub mod backend;
pub mod channel;
pub mod cli;
pub mod config;
pub mod crash_point;
pub mod errors;
pub mod format;
pub mod naming;
pub mod observability;
pub mod recovery;
pub mod rotation;
pub mod sink;

pub use errors::{SinkError, SinkErrorCode, SinkResult};
pub use format::Record;
pub use sink::{ApplySummary, SinkOptions, SinkState, TransactionalSink};
