//! CLI command implementations
//!
//! Each command loads the config, does one thing, and prints one JSON
//! response. `write` drives a full `begin -> apply -> commit -> close`
//! cycle, so re-running it with the same txid replays that batch.

use std::path::Path;
use std::sync::Arc;

use serde_json::{json, Value};

use crate::backend::{LocalBackend, StorageBackend};
use crate::config::SinkConfig;
use crate::naming::FileNameFormat;
use crate::recovery::{RecoveryIndex, INDEX_FILE_PREFIX};
use crate::sink::{data_dir, parse_output_uri, TransactionalSink};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_stdin_records, write_error, write_response};

/// Parse arguments, run the command, and report failures on stdout
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    let result = run_command(cli.command).and_then(write_response);
    if let Err(e) = &result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Init { config } => init(&config),
        Command::Write { config, txid } => {
            let records = read_stdin_records()?;
            write(&config, txid, records)
        }
        Command::Inspect { config } => inspect(&config),
    }
}

/// Open the stream once and close it again.
///
/// Creates the data directory and the first data file. Running it on an
/// existing stream is harmless.
pub fn init(config_path: &Path) -> CliResult<Value> {
    let config = SinkConfig::load(config_path)?;
    let mut sink = TransactionalSink::initialize(config.to_options())?;

    let data = json!({
        "stream": sink.stream(),
        "partition": sink.partition(),
        "data_file": sink.current_file_path(),
        "rotation": sink.current_rotation(),
        "last_started_txid": sink.last_started(),
    });
    sink.close()?;
    Ok(data)
}

/// Write `records` as the batch for `txid`.
pub fn write(
    config_path: &Path,
    txid: u64,
    records: Vec<crate::format::Record>,
) -> CliResult<Value> {
    let config = SinkConfig::load(config_path)?;
    let mut sink = TransactionalSink::initialize(config.to_options())?;

    let outcome = sink
        .begin(txid)
        .and_then(|_| sink.apply(&records))
        .and_then(|summary| sink.commit(txid).map(|_| summary));
    // The file is released on every path
    let closed = sink.close();
    let summary = outcome?;
    closed?;

    Ok(json!({
        "txid": txid,
        "records": summary.records,
        "bytes": summary.bytes,
        "rotations": summary.rotations,
        "data_file": sink.current_file_path(),
        "metrics": sink.metrics(),
    }))
}

/// Report the recovery record and data files without opening the stream.
pub fn inspect(config_path: &Path) -> CliResult<Value> {
    let config = SinkConfig::load(config_path)?;
    let root = parse_output_uri(&config.output_uri)?;
    let naming = config.file_name_format();
    let dir = data_dir(&root, &naming);

    let backend: Arc<dyn StorageBackend> = Arc::new(LocalBackend::new());
    let index = RecoveryIndex::new(
        Arc::clone(&backend),
        &dir,
        &config.stream_name,
        config.partition,
    );
    let record = index.read()?;

    let mut files = Vec::new();
    for name in backend.list(&dir)? {
        if name.starts_with(INDEX_FILE_PREFIX) {
            continue;
        }
        let size = backend.file_len(&dir.join(&name))?;
        files.push(json!({
            "name": name,
            "size": size,
            "rotation": naming_rotation(&config, &name),
        }));
    }

    Ok(json!({
        "data_dir": dir,
        "index_file": index.path(),
        "recovery_record": record,
        "files": files,
    }))
}

fn naming_rotation(config: &SinkConfig, file_name: &str) -> Option<u64> {
    let mut naming = config.file_name_format();
    naming.prepare(&config.stream_name, config.partition);
    naming.rotation_of(file_name)
}
