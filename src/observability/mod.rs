//! Observability for the sink
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed lifecycle events
//! - Per-sink counters
//!
//! Observability is read-only: it never changes what the sink does, and a
//! failed log write never fails an operation.
//!
//! ```ignore
//! use txsink::observability::{Event, Logger};
//!
//! Logger::emit(Event::AttemptBegin, &[("txid", "42")]);
//! ```

mod events;
mod logger;
mod metrics;

pub use events::Event;
pub use logger::{Logger, Severity, LOG_LEVEL_ENV};
pub use metrics::{MetricsSnapshot, SinkMetrics};
