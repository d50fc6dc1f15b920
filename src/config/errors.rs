//! # Configuration Errors

use thiserror::Error;

/// Result type for configuration validation
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Construction-time configuration errors.
///
/// These are raised before any file is opened, so a rejected configuration
/// never leaves partial state behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Missing collaborator: {0} is required")]
    MissingCollaborator(&'static str),

    #[error("Stream name must not be empty")]
    EmptyStreamName,

    #[error("Invalid stream name: {0}")]
    InvalidStreamName(String),

    #[error("Non-positive {policy} rotation threshold: {value}")]
    NonPositiveThreshold { policy: &'static str, value: String },

    #[error("Composite rotation policy needs at least one member policy")]
    EmptyCompositePolicy,

    #[error("Record format needs at least one field")]
    EmptyFieldList,

    #[error("Invalid delimiter: {0}")]
    InvalidDelimiter(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Unsupported output URI: {0}")]
    UnsupportedOutputUri(String),

    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config JSON: {0}")]
    Parse(String),
}
