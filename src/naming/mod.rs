//! Data file naming
//!
//! A naming strategy maps `(rotation, timestamp)` to a data file name inside a
//! fixed base path. Names must be deterministic for a given pair: the channel
//! supplies the timestamp at rotation time and never recomputes it.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, ConfigResult};
use crate::recovery::INDEX_FILE_PREFIX;

/// Produces data file names for each rotation.
pub trait FileNameFormat: Send + fmt::Debug {
    /// Called once when the sink is initialized for a stream partition
    fn prepare(&mut self, _stream: &str, _partition: u32) {}

    /// File name for a rotation sequence number and millisecond timestamp
    fn name(&self, rotation: u64, timestamp_ms: i64) -> String;

    /// Directory, relative to the output root, holding the data files
    fn path(&self) -> &Path;

    /// Path and file name together
    fn name_for(&self, rotation: u64, timestamp_ms: i64) -> (PathBuf, String) {
        (self.path().to_path_buf(), self.name(rotation, timestamp_ms))
    }

    /// Rotation sequence number encoded in a file name produced by this
    /// strategy, if it can be recovered.
    ///
    /// Used at initialization to locate the newest data file by listing the
    /// data directory. Strategies that cannot invert their names return `None`.
    fn rotation_of(&self, _file_name: &str) -> Option<u64> {
        None
    }

    /// Check the configuration before the sink opens any file
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Default naming: `{prefix}{stream}-{partition}-{rotation}-{timestamp}{extension}`
///
/// For example `orders-0-3-1700000000000.txt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultFileNameFormat {
    path: PathBuf,
    prefix: String,
    extension: String,
    stream: String,
    partition: u32,
}

impl Default for DefaultFileNameFormat {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/"),
            prefix: String::new(),
            extension: ".txt".to_string(),
            stream: String::new(),
            partition: 0,
        }
    }
}

impl DefaultFileNameFormat {
    /// Create a naming strategy with default path `/` and extension `.txt`
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory under the output root
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = path.into();
        self
    }

    /// Prefix placed before the stream name
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Extension appended after the timestamp (include the leading dot)
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    fn stem(&self) -> String {
        format!("{}{}-{}-", self.prefix, self.stream, self.partition)
    }
}

impl FileNameFormat for DefaultFileNameFormat {
    fn prepare(&mut self, stream: &str, partition: u32) {
        self.stream = stream.to_string();
        self.partition = partition;
    }

    fn name(&self, rotation: u64, timestamp_ms: i64) -> String {
        format!("{}{}-{}{}", self.stem(), rotation, timestamp_ms, self.extension)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn rotation_of(&self, file_name: &str) -> Option<u64> {
        let rest = file_name.strip_prefix(&self.stem())?;
        let rest = rest.strip_suffix(&self.extension)?;
        let (rotation, timestamp) = rest.split_once('-')?;
        timestamp.parse::<i64>().ok()?;
        rotation.parse().ok()
    }

    fn validate(&self) -> ConfigResult<()> {
        for part in [&self.prefix, &self.extension] {
            if part.contains('/') || part.contains('\\') {
                return Err(ConfigError::InvalidFileName(format!(
                    "{:?} must not contain a path separator",
                    part
                )));
            }
        }
        if self.prefix.starts_with(INDEX_FILE_PREFIX) {
            return Err(ConfigError::InvalidFileName(format!(
                "prefix {:?} collides with recovery index names",
                self.prefix
            )));
        }
        Ok(())
    }
}
