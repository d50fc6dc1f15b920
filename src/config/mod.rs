//! Sink configuration
//!
//! A JSON file describing one output stream, for example:
//!
//! ```json
//! {
//!   "output_uri": "file:///var/lib/txsink",
//!   "stream_name": "orders",
//!   "partition": 0,
//!   "naming": { "path": "/trident", "extension": ".txt" },
//!   "format": { "type": "delimited", "fields": ["id", "amount"] },
//!   "rotation": { "type": "size", "count": 5.0, "units": "MB" },
//!   "move_rotated_to": "/var/lib/txsink/done"
//! }
//! ```
//!
//! Omitted optional fields take their defaults. `load` validates everything
//! before returning, so a config that loads can always be turned into
//! [`SinkOptions`].

mod errors;

pub use errors::{ConfigError, ConfigResult};

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::format::{
    DelimitedRecordFormat, JsonLinesRecordFormat, RecordFormat, DEFAULT_FIELD_DELIMITER,
    DEFAULT_RECORD_DELIMITER,
};
use crate::naming::DefaultFileNameFormat;
use crate::rotation::{
    CompositeRotationPolicy, FileSizeRotationPolicy, MoveFileAction, NoRotationPolicy,
    RotationPolicy, SizeUnits, TimeUnits, TimedRotationPolicy,
};
use crate::sink::SinkOptions;

/// Configuration file model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Destination root, `file://` URI or bare path (required)
    pub output_uri: String,

    /// Logical stream name (required)
    pub stream_name: String,

    /// Partition of the stream (default 0)
    #[serde(default)]
    pub partition: u32,

    #[serde(default)]
    pub naming: NamingConfig,

    pub format: FormatConfig,

    pub rotation: RotationConfig,

    /// Directory rotated files are moved into (optional)
    #[serde(default)]
    pub move_rotated_to: Option<String>,
}

/// Settings for [`DefaultFileNameFormat`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "default_naming_path")]
    pub path: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default = "default_extension")]
    pub extension: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            path: default_naming_path(),
            prefix: String::new(),
            extension: default_extension(),
        }
    }
}

fn default_naming_path() -> String {
    "/".to_string()
}
fn default_extension() -> String {
    ".txt".to_string()
}
fn default_field_delimiter() -> String {
    DEFAULT_FIELD_DELIMITER.to_string()
}
fn default_record_delimiter() -> String {
    DEFAULT_RECORD_DELIMITER.to_string()
}

/// Record format selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormatConfig {
    Delimited {
        fields: Vec<String>,
        #[serde(default = "default_field_delimiter")]
        field_delimiter: String,
        #[serde(default = "default_record_delimiter")]
        record_delimiter: String,
    },
    JsonLines,
}

impl FormatConfig {
    pub fn build(&self) -> Box<dyn RecordFormat> {
        match self {
            FormatConfig::Delimited {
                fields,
                field_delimiter,
                record_delimiter,
            } => Box::new(
                DelimitedRecordFormat::new()
                    .with_fields(fields.iter().cloned())
                    .with_field_delimiter(field_delimiter.clone())
                    .with_record_delimiter(record_delimiter.clone()),
            ),
            FormatConfig::JsonLines => Box::new(JsonLinesRecordFormat),
        }
    }
}

/// Rotation policy selection; `composite` nests other policies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RotationConfig {
    Size { count: f64, units: SizeUnits },
    Timed { count: f64, units: TimeUnits },
    None,
    Composite { policies: Vec<RotationConfig> },
}

impl RotationConfig {
    pub fn build(&self) -> Box<dyn RotationPolicy> {
        match self {
            RotationConfig::Size { count, units } => {
                Box::new(FileSizeRotationPolicy::new(*count, *units))
            }
            RotationConfig::Timed { count, units } => {
                Box::new(TimedRotationPolicy::new(*count, *units))
            }
            RotationConfig::None => Box::new(NoRotationPolicy),
            RotationConfig::Composite { policies } => {
                let mut composite = CompositeRotationPolicy::new();
                for policy in policies {
                    composite.push(policy.build());
                }
                Box::new(composite)
            }
        }
    }
}

impl SinkConfig {
    /// Load and validate configuration from a file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse and validate configuration text
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: SinkConfig =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate every collaborator this config describes
    pub fn validate(&self) -> ConfigResult<()> {
        self.to_options().validate()
    }

    /// Naming strategy described by `naming`
    pub fn file_name_format(&self) -> DefaultFileNameFormat {
        DefaultFileNameFormat::new()
            .with_path(&self.naming.path)
            .with_prefix(self.naming.prefix.clone())
            .with_extension(self.naming.extension.clone())
    }

    /// Build sink options backed by the local filesystem
    pub fn to_options(&self) -> SinkOptions {
        let mut options = SinkOptions::new()
            .with_output_uri(self.output_uri.clone())
            .with_stream(self.stream_name.clone())
            .with_partition(self.partition)
            .with_file_name_format(self.file_name_format());
        options.record_format = Some(self.format.build());
        options.rotation_policy = Some(self.rotation.build());

        if let Some(dir) = &self.move_rotated_to {
            options = options.add_rotation_action(MoveFileAction::to_destination(dir));
        }
        options
    }
}
