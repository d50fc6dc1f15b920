//! Observable sink events
//!
//! Events are explicit and typed; each carries a default severity.

use std::fmt;

use super::logger::Severity;

/// Observable events in a sink's lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Lifecycle
    /// Stream opened and ready for batches
    SinkInitialized,
    /// A recovery record from a previous run was found
    RecoveryRecordLoaded,
    /// Stream closed
    SinkClosed,

    // Transactions
    /// A new attempt started
    AttemptBegin,
    /// The most recent attempt is being replayed
    AttemptReplay,
    /// An open attempt was discarded in favour of a newer txid
    AttemptAbandoned,
    /// Attempt committed and flushed
    AttemptCommit,

    // Channel
    /// Output rotated to a new file
    ChannelRotate,
    /// Current file cut back to a recorded offset
    ChannelTruncate,
    /// Rotation failed and the channel stayed on the old file
    ChannelRotateAborted,
    /// A file created for an aborted rotation could not be removed
    ChannelDiscardFailed,

    // Recovery index
    /// Recovery record persisted
    RecoveryIndexWritten,
    /// Recovery record does not match the data files (FATAL)
    RecoveryStateCorrupted,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SinkInitialized => "SINK_INITIALIZED",
            Event::RecoveryRecordLoaded => "SINK_RECOVERY_RECORD_LOADED",
            Event::SinkClosed => "SINK_CLOSED",

            Event::AttemptBegin => "ATTEMPT_BEGIN",
            Event::AttemptReplay => "ATTEMPT_REPLAY",
            Event::AttemptAbandoned => "ATTEMPT_ABANDONED",
            Event::AttemptCommit => "ATTEMPT_COMMIT",

            Event::ChannelRotate => "CHANNEL_ROTATE",
            Event::ChannelTruncate => "CHANNEL_TRUNCATE",
            Event::ChannelRotateAborted => "CHANNEL_ROTATE_ABORTED",
            Event::ChannelDiscardFailed => "CHANNEL_DISCARD_FAILED",

            Event::RecoveryIndexWritten => "RECOVERY_INDEX_WRITTEN",
            Event::RecoveryStateCorrupted => "RECOVERY_STATE_CORRUPTED",
        }
    }

    /// Severity used by [`super::Logger::emit`]
    pub fn severity(&self) -> Severity {
        match self {
            Event::RecoveryIndexWritten => Severity::Trace,
            Event::AttemptReplay
            | Event::AttemptAbandoned
            | Event::ChannelRotateAborted
            | Event::ChannelDiscardFailed => Severity::Warn,
            Event::RecoveryStateCorrupted => Severity::Fatal,
            _ => Severity::Info,
        }
    }

    /// Returns true if this event indicates a fatal condition
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::RecoveryStateCorrupted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_names() {
        assert_eq!(Event::AttemptBegin.as_str(), "ATTEMPT_BEGIN");
        assert_eq!(Event::ChannelRotate.to_string(), "CHANNEL_ROTATE");
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::RecoveryStateCorrupted.is_fatal());
        assert_eq!(Event::RecoveryStateCorrupted.severity(), Severity::Fatal);
        assert!(!Event::AttemptReplay.is_fatal());
        assert_eq!(Event::AttemptReplay.severity(), Severity::Warn);
    }
}
