//! Sink construction options

use std::path::PathBuf;
use std::sync::Arc;

use crate::backend::{LocalBackend, StorageBackend};
use crate::config::{ConfigError, ConfigResult};
use crate::format::RecordFormat;
use crate::naming::FileNameFormat;
use crate::rotation::{RotationAction, RotationPolicy};

/// Everything needed to open one output stream.
///
/// ```ignore
/// let options = SinkOptions::new()
///     .with_output_uri("file:///var/lib/txsink")
///     .with_stream("orders")
///     .with_file_name_format(DefaultFileNameFormat::new().with_path("/data"))
///     .with_record_format(DelimitedRecordFormat::new().with_fields(["id", "amount"]))
///     .with_rotation_policy(FileSizeRotationPolicy::new(5.0, SizeUnits::Mb));
/// ```
#[derive(Debug)]
pub struct SinkOptions {
    pub(crate) output_uri: Option<String>,
    pub(crate) stream: String,
    pub(crate) partition: u32,
    pub(crate) rotation_policy: Option<Box<dyn RotationPolicy>>,
    pub(crate) file_name_format: Option<Box<dyn FileNameFormat>>,
    pub(crate) record_format: Option<Box<dyn RecordFormat>>,
    pub(crate) backend: Arc<dyn StorageBackend>,
    pub(crate) rotation_actions: Vec<Box<dyn RotationAction>>,
}

impl Default for SinkOptions {
    fn default() -> Self {
        Self {
            output_uri: None,
            stream: String::new(),
            partition: 0,
            rotation_policy: None,
            file_name_format: None,
            record_format: None,
            backend: Arc::new(LocalBackend::new()),
            rotation_actions: Vec::new(),
        }
    }
}

impl SinkOptions {
    /// Empty options backed by the local filesystem
    pub fn new() -> Self {
        Self::default()
    }

    /// Destination root: `file:///abs/path` or a bare path
    pub fn with_output_uri(mut self, uri: impl Into<String>) -> Self {
        self.output_uri = Some(uri.into());
        self
    }

    /// Logical stream name, used in file names and the index name
    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    pub fn with_partition(mut self, partition: u32) -> Self {
        self.partition = partition;
        self
    }

    pub fn with_rotation_policy(mut self, policy: impl RotationPolicy + 'static) -> Self {
        self.rotation_policy = Some(Box::new(policy));
        self
    }

    pub fn with_file_name_format(mut self, naming: impl FileNameFormat + 'static) -> Self {
        self.file_name_format = Some(Box::new(naming));
        self
    }

    pub fn with_record_format(mut self, format: impl RecordFormat + 'static) -> Self {
        self.record_format = Some(Box::new(format));
        self
    }

    /// Storage backend; defaults to [`LocalBackend`]
    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Run `action` on every file after it is rotated out
    pub fn add_rotation_action(mut self, action: impl RotationAction + 'static) -> Self {
        self.rotation_actions.push(Box::new(action));
        self
    }

    /// Stream name
    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn partition(&self) -> u32 {
        self.partition
    }

    /// Check every collaborator without consuming the options.
    pub fn validate(&self) -> ConfigResult<()> {
        self.root_dir()?;
        validate_stream_name(&self.stream)?;

        self.rotation_policy
            .as_ref()
            .ok_or(ConfigError::MissingCollaborator("rotation_policy"))?
            .validate()?;
        self.file_name_format
            .as_ref()
            .ok_or(ConfigError::MissingCollaborator("file_name_format"))?
            .validate()?;
        self.record_format
            .as_ref()
            .ok_or(ConfigError::MissingCollaborator("record_format"))?
            .validate()?;
        Ok(())
    }

    /// Local directory the output URI points at
    pub fn root_dir(&self) -> ConfigResult<PathBuf> {
        let uri = self
            .output_uri
            .as_deref()
            .ok_or(ConfigError::MissingCollaborator("output_uri"))?;
        parse_output_uri(uri)
    }
}

/// Resolve `file://` URIs and bare paths to a directory.
pub fn parse_output_uri(uri: &str) -> ConfigResult<PathBuf> {
    let path = match uri.strip_prefix("file://") {
        Some(rest) => rest,
        None if uri.contains("://") => {
            return Err(ConfigError::UnsupportedOutputUri(uri.to_string()))
        }
        None => uri,
    };
    if path.is_empty() {
        return Err(ConfigError::UnsupportedOutputUri(uri.to_string()));
    }
    Ok(PathBuf::from(path))
}

fn validate_stream_name(stream: &str) -> ConfigResult<()> {
    if stream.is_empty() {
        return Err(ConfigError::EmptyStreamName);
    }
    if stream.contains('/') || stream.contains('\\') || stream.chars().any(char::is_whitespace) {
        return Err(ConfigError::InvalidStreamName(stream.to_string()));
    }
    Ok(())
}
