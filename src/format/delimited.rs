//! Delimited text record format
//!
//! Writes the configured fields in order, joined by the field delimiter and
//! terminated by the record delimiter:
//!
//! ```text
//! f1,f2,f3\n
//! ```

use serde_json::Value;

use super::{Record, RecordFormat};
use crate::config::{ConfigError, ConfigResult};

/// Default field delimiter
pub const DEFAULT_FIELD_DELIMITER: &str = ",";

/// Default record delimiter
pub const DEFAULT_RECORD_DELIMITER: &str = "\n";

/// Formats a record as delimited text over a fixed list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedRecordFormat {
    fields: Vec<String>,
    field_delimiter: String,
    record_delimiter: String,
}

impl Default for DelimitedRecordFormat {
    fn default() -> Self {
        Self {
            fields: Vec::new(),
            field_delimiter: DEFAULT_FIELD_DELIMITER.to_string(),
            record_delimiter: DEFAULT_RECORD_DELIMITER.to_string(),
        }
    }
}

impl DelimitedRecordFormat {
    /// Create a format with default delimiters and no fields
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ordered list of fields to write
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the delimiter placed between fields
    pub fn with_field_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.field_delimiter = delimiter.into();
        self
    }

    /// Set the delimiter placed after each record
    pub fn with_record_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.record_delimiter = delimiter.into();
        self
    }

    /// Configured fields
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    fn push_value(out: &mut String, value: Option<&Value>) {
        match value {
            None | Some(Value::Null) => {}
            Some(Value::String(s)) => out.push_str(s),
            Some(other) => out.push_str(&other.to_string()),
        }
    }
}

impl RecordFormat for DelimitedRecordFormat {
    fn format(&self, record: &Record) -> Vec<u8> {
        let mut out = String::with_capacity(64);
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push_str(&self.field_delimiter);
            }
            Self::push_value(&mut out, record.get(field));
        }
        out.push_str(&self.record_delimiter);
        out.into_bytes()
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.fields.is_empty() {
            return Err(ConfigError::EmptyFieldList);
        }
        if self.fields.len() > 1 && self.field_delimiter.is_empty() {
            return Err(ConfigError::InvalidDelimiter(
                "field delimiter must not be empty".to_string(),
            ));
        }
        if self.field_delimiter == self.record_delimiter && !self.field_delimiter.is_empty() {
            return Err(ConfigError::InvalidDelimiter(format!(
                "field and record delimiter are both {:?}",
                self.field_delimiter
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_field_line() {
        let format = DelimitedRecordFormat::new().with_fields(["f1"]);
        let record = Record::new().with("f1", "data");
        assert_eq!(format.format(&record), b"data\n");
    }

    #[test]
    fn test_field_order_follows_configuration() {
        let format = DelimitedRecordFormat::new()
            .with_fields(["b", "a", "c"])
            .with_field_delimiter("|");
        let record = Record::new().with("a", 1).with("b", true).with("c", "x");
        assert_eq!(format.format(&record), b"true|1|x\n");
    }

    #[test]
    fn test_missing_and_null_fields_are_empty() {
        let format = DelimitedRecordFormat::new().with_fields(["a", "b", "c"]);
        let record = Record::new().with("b", serde_json::Value::Null).with("c", 2.5);
        assert_eq!(format.format(&record), b",,2.5\n");
    }

    #[test]
    fn test_custom_record_delimiter() {
        let format = DelimitedRecordFormat::new()
            .with_fields(["a"])
            .with_record_delimiter("\r\n");
        assert_eq!(format.format(&Record::new().with("a", "x")), b"x\r\n");
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        assert_eq!(
            DelimitedRecordFormat::new().validate(),
            Err(ConfigError::EmptyFieldList)
        );
    }

    #[test]
    fn test_validate_rejects_ambiguous_delimiters() {
        let format = DelimitedRecordFormat::new()
            .with_fields(["a", "b"])
            .with_field_delimiter("\n");
        assert!(matches!(format.validate(), Err(ConfigError::InvalidDelimiter(_))));

        let format = DelimitedRecordFormat::new()
            .with_fields(["a", "b"])
            .with_field_delimiter("");
        assert!(matches!(format.validate(), Err(ConfigError::InvalidDelimiter(_))));
    }
}
