//! Shared helpers for sink integration tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use txsink::backend::MemoryBackend;
use txsink::format::DelimitedRecordFormat;
use txsink::naming::FileNameFormat;
use txsink::rotation::{FileSizeRotationPolicy, SizeUnits};
use txsink::{Record, SinkOptions, TransactionalSink};

pub const TEST_STREAM: &str = "test-topology";
pub const FILE_NAME_PREFIX: &str = "hdfs-data-";
pub const INDEX_FILE_NAME: &str = ".index.test-topology.0";
pub const PAYLOAD: &str = "data";

/// Memory backend root used by the `memory_*` helpers
pub const MEMORY_ROOT: &str = "/out";

/// Names files `hdfs-data-<rotation>` so tests can find them without
/// knowing the rotation timestamp.
#[derive(Debug, Clone)]
pub struct RotationNaming {
    path: PathBuf,
}

impl Default for RotationNaming {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/"),
        }
    }
}

impl FileNameFormat for RotationNaming {
    fn name(&self, rotation: u64, _timestamp_ms: i64) -> String {
        format!("{}{}", FILE_NAME_PREFIX, rotation)
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn rotation_of(&self, file_name: &str) -> Option<u64> {
        file_name.strip_prefix(FILE_NAME_PREFIX)?.parse().ok()
    }
}

/// Options writing one `f1` field per line into `out_dir`, rotating at 5 MB
pub fn local_options(out_dir: &Path) -> SinkOptions {
    SinkOptions::new()
        .with_output_uri(format!("file://{}", out_dir.display()))
        .with_stream(TEST_STREAM)
        .with_file_name_format(RotationNaming::default())
        .with_record_format(DelimitedRecordFormat::new().with_fields(["f1"]))
        .with_rotation_policy(FileSizeRotationPolicy::new(5.0, SizeUnits::Mb))
}

/// Same as [`local_options`] over an in-memory backend rooted at `/out`
pub fn memory_options(backend: &MemoryBackend) -> SinkOptions {
    SinkOptions::new()
        .with_output_uri(MEMORY_ROOT)
        .with_stream(TEST_STREAM)
        .with_backend(Arc::new(backend.clone()))
        .with_file_name_format(RotationNaming::default())
        .with_record_format(DelimitedRecordFormat::new().with_fields(["f1"]))
        .with_rotation_policy(FileSizeRotationPolicy::new(5.0, SizeUnits::Mb))
}

pub fn open(options: SinkOptions) -> TransactionalSink {
    TransactionalSink::initialize(options).expect("Failed to initialize sink")
}

/// `count` records whose single field is `value`
pub fn records_of(value: &str, count: usize) -> Vec<Record> {
    (0..count).map(|_| Record::new().with("f1", value)).collect()
}

/// `count` copies of the test payload record
pub fn data_records(count: usize) -> Vec<Record> {
    records_of(PAYLOAD, count)
}

/// Run one full `begin -> apply -> commit` cycle
pub fn commit_batch(sink: &mut TransactionalSink, txid: u64, records: &[Record]) {
    sink.begin(txid).expect("begin failed");
    sink.apply(records).expect("apply failed");
    sink.commit(txid).expect("commit failed");
}

pub fn data_file(out_dir: &Path, rotation: u64) -> PathBuf {
    out_dir.join(format!("{}{}", FILE_NAME_PREFIX, rotation))
}

pub fn memory_data_file(rotation: u64) -> PathBuf {
    data_file(Path::new(MEMORY_ROOT), rotation)
}

pub fn read_lines(path: &Path) -> Vec<String> {
    fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e))
        .lines()
        .map(str::to_string)
        .collect()
}

pub fn memory_lines(backend: &MemoryBackend, path: &Path) -> Vec<String> {
    use txsink::backend::StorageBackend;
    let bytes = backend.read(path).expect("missing data file");
    String::from_utf8(bytes)
        .expect("data file is not UTF-8")
        .lines()
        .map(str::to_string)
        .collect()
}
