//! Record formatting
//!
//! A formatter turns one structured [`Record`] into the bytes appended to the
//! current data file. Formatters are pure: no I/O, no state beyond their
//! configuration.

mod delimited;
mod record;

pub use delimited::{DelimitedRecordFormat, DEFAULT_FIELD_DELIMITER, DEFAULT_RECORD_DELIMITER};
pub use record::Record;

use std::fmt;

use crate::config::ConfigResult;

/// Converts a record into its on-disk byte form.
pub trait RecordFormat: Send + fmt::Debug {
    /// Format one record
    fn format(&self, record: &Record) -> Vec<u8>;

    /// Check the configuration before the sink opens any file
    fn validate(&self) -> ConfigResult<()> {
        Ok(())
    }
}

/// Writes each record as one compact JSON object followed by a newline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JsonLinesRecordFormat;

impl RecordFormat for JsonLinesRecordFormat {
    fn format(&self, record: &Record) -> Vec<u8> {
        let mut out = serde_json::to_vec(record.fields())
            .expect("Map<String, Value> serialization cannot fail");
        out.push(b'\n');
        out
    }
}
