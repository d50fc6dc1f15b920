//! Crash Recovery Tests
//!
//! Drives the `txsink` binary with `TXSINK_CRASH_POINT` set so the process
//! aborts at a chosen point, then runs it again and checks the on-disk
//! result. Nothing is cleaned up between the two runs.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;
use txsink::crash_point::{points, CRASH_POINT_ENV};

const BIN: &str = env!("CARGO_BIN_EXE_txsink");

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    temp_dir: TempDir,
    config: PathBuf,
}

impl Harness {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = temp_dir.path().join("txsink.json");
        let body = serde_json::json!({
            "output_uri": format!("file://{}", temp_dir.path().join("out").display()),
            "stream_name": "orders",
            "format": { "type": "delimited", "fields": ["id"] },
            "rotation": { "type": "size", "count": 5, "units": "MB" }
        });
        fs::write(&config, body.to_string()).unwrap();
        Self { temp_dir, config }
    }

    fn out_dir(&self) -> PathBuf {
        self.temp_dir.path().join("out")
    }

    /// Run `txsink write` with one `{"id": n}` line per id
    fn write(&self, txid: u64, ids: &[u32], crash_point: Option<&str>) -> Output {
        let mut command = Command::new(BIN);
        command
            .args(["write", "--config"])
            .arg(&self.config)
            .args(["--txid", &txid.to_string()])
            .env("TXSINK_LOG", "off")
            .env_remove(CRASH_POINT_ENV)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(point) = crash_point {
            command.env(CRASH_POINT_ENV, point);
        }

        let mut child = command.spawn().expect("Failed to spawn txsink");
        {
            let mut stdin = child.stdin.take().unwrap();
            for id in ids {
                writeln!(stdin, "{{\"id\": {}}}", id).unwrap();
            }
        }
        child.wait_with_output().expect("Failed to wait for txsink")
    }

    fn write_ok(&self, txid: u64, ids: &[u32]) {
        let output = self.write(txid, ids, None);
        assert!(
            output.status.success(),
            "txsink write failed: {}",
            String::from_utf8_lossy(&output.stdout)
        );
    }

    fn crash_at(&self, txid: u64, ids: &[u32], point: &str) {
        let output = self.write(txid, ids, Some(point));
        assert!(!output.status.success(), "expected a crash at {}", point);
        assert!(String::from_utf8_lossy(&output.stderr).contains(point));
    }

    /// Lines of every data file, in rotation order
    fn lines(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.out_dir())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| !name.starts_with(".index."))
            .collect();
        names.sort_by_key(|name| rotation_of(name));

        names
            .iter()
            .flat_map(|name| {
                fs::read_to_string(self.out_dir().join(name))
                    .unwrap()
                    .lines()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

/// `orders-0-<rotation>-<timestamp>.txt`
fn rotation_of(name: &str) -> u64 {
    name.split('-').nth(2).and_then(|r| r.parse().ok()).unwrap_or(0)
}

fn ids(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Crash Points
// =============================================================================

/// Crash after the batch was appended but before commit: rerunning the same
/// txid leaves only the rerun's records.
#[test]
fn test_crash_after_apply_then_replay() {
    let harness = Harness::new();
    harness.write_ok(1, &[1, 2]);

    harness.crash_at(2, &[10, 11, 12], points::SINK_AFTER_APPLY);
    harness.write_ok(2, &[20]);

    assert_eq!(harness.lines(), ids(&["1", "2", "20"]));
}

/// Crash right after the recovery record was written: nothing of the
/// attempt reached the data file, and the rerun proceeds normally.
#[test]
fn test_crash_after_index_write_then_replay() {
    let harness = Harness::new();
    harness.write_ok(1, &[1]);

    harness.crash_at(2, &[5, 6], points::SINK_AFTER_INDEX_WRITE);
    harness.write_ok(2, &[7]);

    assert_eq!(harness.lines(), ids(&["1", "7"]));
}

/// Crash before the commit flush: the batch is replayed cleanly.
#[test]
fn test_crash_before_commit_flush_then_replay() {
    let harness = Harness::new();

    harness.crash_at(1, &[1, 2, 3], points::SINK_BEFORE_COMMIT_FLUSH);
    harness.write_ok(1, &[4]);

    assert_eq!(harness.lines(), ids(&["4"]));
}

/// Crash after the commit flush: the batch is durable, and the next txid
/// appends after it.
#[test]
fn test_crash_after_commit_flush_keeps_batch() {
    let harness = Harness::new();

    harness.crash_at(1, &[1, 2], points::SINK_AFTER_COMMIT_FLUSH);
    harness.write_ok(2, &[3]);

    assert_eq!(harness.lines(), ids(&["1", "2", "3"]));
}

/// Crash right after a replay truncated the file: the second rerun
/// truncates again to the same offset.
#[test]
fn test_crash_after_truncate_then_replay() {
    let harness = Harness::new();
    harness.write_ok(1, &[1]);
    harness.write_ok(2, &[2, 2]);

    harness.crash_at(2, &[9], points::CHANNEL_AFTER_TRUNCATE);
    assert_eq!(harness.lines(), ids(&["1"]));

    harness.write_ok(2, &[3]);
    assert_eq!(harness.lines(), ids(&["1", "3"]));
}

// =============================================================================
// CLI Responses
// =============================================================================

/// Errors are reported as one JSON object on stdout with a non-zero exit.
#[test]
fn test_stale_txid_reported_as_json() {
    let harness = Harness::new();
    harness.write_ok(3, &[1]);

    let output = harness.write(2, &[1], None);
    assert!(!output.status.success());

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], "error");
    assert_eq!(response["code"], "TXSINK_INVALID_TRANSITION");
}

/// inspect reads the recovery record without opening the stream.
#[test]
fn test_inspect_reports_recovery_record() {
    let harness = Harness::new();
    harness.crash_at(4, &[1, 2], points::SINK_AFTER_APPLY);

    let output = Command::new(BIN)
        .args(["inspect", "--config"])
        .arg(&harness.config)
        .env("TXSINK_LOG", "off")
        .env_remove(CRASH_POINT_ENV)
        .output()
        .unwrap();
    assert!(output.status.success());

    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["status"], "ok");
    assert_eq!(response["data"]["recovery_record"]["txid"], 4);
    assert_eq!(response["data"]["files"][0]["size"], 4);
    assert!(Path::new(response["data"]["index_file"].as_str().unwrap()).is_file());
}
