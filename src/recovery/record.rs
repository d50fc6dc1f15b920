//! Recovery record and its on-disk envelope
//!
//! The record is stored as one JSON line:
//!
//! ```text
//! {"version":1,"checksum":<crc32 of record JSON>,"record":{...}}
//! ```
//!
//! The checksum covers the compact JSON encoding of `record`, which is
//! deterministic because field order is fixed by the struct.

use serde::{Deserialize, Serialize};

use crate::errors::{SinkError, SinkResult};

/// Current envelope version
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Anchor for truncate-and-retry of the most recently started attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryRecord {
    /// Txid whose attempt most recently began
    pub txid: u64,
    /// Rotation sequence number of the data file the attempt started in
    pub rotation: u64,
    /// Name of that data file
    pub data_file: String,
    /// Length of that file immediately before the attempt's first write
    pub offset: u64,
    /// Wall-clock time the record was written, informational only
    pub written_at_ms: i64,
}

impl RecoveryRecord {
    /// Create a record stamped with the current time
    pub fn new(txid: u64, rotation: u64, data_file: impl Into<String>, offset: u64) -> Self {
        Self {
            txid,
            rotation,
            data_file: data_file.into(),
            offset,
            written_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexEnvelope {
    version: u32,
    checksum: u32,
    record: RecoveryRecord,
}

fn checksum_of(record: &RecoveryRecord) -> serde_json::Result<u32> {
    let body = serde_json::to_vec(record)?;
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&body);
    Ok(hasher.finalize())
}

/// Serialize a record into its envelope bytes
pub fn encode(record: &RecoveryRecord) -> serde_json::Result<Vec<u8>> {
    let envelope = IndexEnvelope {
        version: INDEX_FORMAT_VERSION,
        checksum: checksum_of(record)?,
        record: record.clone(),
    };
    let mut bytes = serde_json::to_vec(&envelope)?;
    bytes.push(b'\n');
    Ok(bytes)
}

/// Parse and verify envelope bytes.
///
/// # Errors
///
/// `TXSINK_CORRUPTED_RECOVERY_STATE` if the bytes do not parse, carry an
/// unknown version, or fail the checksum.
pub fn decode(bytes: &[u8]) -> SinkResult<RecoveryRecord> {
    let envelope: IndexEnvelope = serde_json::from_slice(bytes)
        .map_err(|e| SinkError::corrupted(format!("Unparsable recovery index: {}", e)))?;

    if envelope.version != INDEX_FORMAT_VERSION {
        return Err(SinkError::corrupted(format!(
            "Unsupported recovery index version {}",
            envelope.version
        )));
    }

    let expected = checksum_of(&envelope.record)
        .map_err(|e| SinkError::corrupted(format!("Unencodable recovery record: {}", e)))?;
    if expected != envelope.checksum {
        return Err(SinkError::corrupted(format!(
            "Recovery index checksum mismatch: stored {:#010x}, computed {:#010x}",
            envelope.checksum, expected
        )));
    }

    Ok(envelope.record)
}
