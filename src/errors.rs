//! Sink error types
//!
//! Error codes:
//! - TXSINK_INVALID_TRANSITION (ERROR severity)
//! - TXSINK_OUT_OF_ORDER_COMMIT (ERROR severity)
//! - TXSINK_CORRUPTED_RECOVERY_STATE (FATAL severity)
//! - TXSINK_STORAGE_IO (ERROR severity)
//! - TXSINK_CONFIGURATION (ERROR severity)
//!
//! Errors are reported synchronously from the operation that detected them.
//! Nothing here is retried internally.

use std::fmt;
use std::io;

use crate::config::ConfigError;

/// Severity levels for sink errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the stream may continue
    Error,
    /// The stream must not continue without external intervention
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Sink error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkErrorCode {
    /// `begin`/`apply` called with a txid or in a state inconsistent with recorded state
    InvalidTransition,
    /// `commit` called without a matching open attempt
    OutOfOrderCommit,
    /// Recovery record cannot be reconciled with the data files
    CorruptedRecoveryState,
    /// Backend append/truncate/flush/open failure
    StorageIo,
    /// Invalid construction-time configuration
    Configuration,
}

impl SinkErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SinkErrorCode::InvalidTransition => "TXSINK_INVALID_TRANSITION",
            SinkErrorCode::OutOfOrderCommit => "TXSINK_OUT_OF_ORDER_COMMIT",
            SinkErrorCode::CorruptedRecoveryState => "TXSINK_CORRUPTED_RECOVERY_STATE",
            SinkErrorCode::StorageIo => "TXSINK_STORAGE_IO",
            SinkErrorCode::Configuration => "TXSINK_CONFIGURATION",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SinkErrorCode::CorruptedRecoveryState => Severity::Fatal,
            SinkErrorCode::InvalidTransition
            | SinkErrorCode::OutOfOrderCommit
            | SinkErrorCode::StorageIo
            | SinkErrorCode::Configuration => Severity::Error,
        }
    }
}

impl fmt::Display for SinkErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sink error type with full context
#[derive(Debug)]
pub struct SinkError {
    /// Error code
    code: SinkErrorCode,
    /// Human-readable message
    message: String,
    /// Optional details about the error context
    details: Option<String>,
    /// Underlying IO error if applicable
    source: Option<io::Error>,
}

impl SinkError {
    fn new(code: SinkErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new(SinkErrorCode::InvalidTransition, message)
    }

    /// Create an invalid transition error with txid context
    pub fn invalid_transition_for(txid: u64, message: impl Into<String>) -> Self {
        Self::invalid_transition(message).with_details(format!("txid: {}", txid))
    }

    /// Create an out-of-order commit error
    pub fn out_of_order_commit(txid: u64, message: impl Into<String>) -> Self {
        Self::new(SinkErrorCode::OutOfOrderCommit, message)
            .with_details(format!("txid: {}", txid))
    }

    /// Create a corrupted recovery state error (FATAL)
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::new(SinkErrorCode::CorruptedRecoveryState, message)
    }

    /// Create a corrupted recovery state error with byte offset context
    pub fn corrupted_at_offset(offset: u64, reason: impl Into<String>) -> Self {
        Self::corrupted(reason).with_details(format!("byte_offset: {}", offset))
    }

    /// Create a storage I/O error
    pub fn storage_io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: SinkErrorCode::StorageIo,
            message: message.into(),
            details: None,
            source: Some(source),
        }
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(SinkErrorCode::Configuration, message)
    }

    fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the error code
    pub fn code(&self) -> SinkErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns additional error details
    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    /// Returns whether this error is fatal (the stream must halt)
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Returns whether this error rejects a lifecycle transition
    pub fn is_transition_error(&self) -> bool {
        matches!(
            self.code,
            SinkErrorCode::InvalidTransition | SinkErrorCode::OutOfOrderCommit
        )
    }
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        if let Some(ref source) = self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl From<ConfigError> for SinkError {
    fn from(err: ConfigError) -> Self {
        SinkError::configuration(err.to_string())
    }
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;
