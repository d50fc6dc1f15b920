//! JSON I/O handling for CLI
//!
//! - Input: one JSON object per stdin line
//! - Output: one JSON response object on stdout
//! - Logs go to stderr and never mix with responses

use std::io::{self, BufRead, Write};

use serde_json::Value;

use super::errors::{CliError, CliResult};
use crate::format::Record;

/// Parse JSON-object lines into records. Blank lines are skipped.
pub fn read_records<R: BufRead>(reader: R) -> CliResult<Vec<Record>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(&line) {
            Ok(Value::Object(fields)) => records.push(Record::from(fields)),
            Ok(_) => return Err(CliError::invalid_input(i + 1, "expected a JSON object")),
            Err(e) => return Err(CliError::invalid_input(i + 1, e.to_string())),
        }
    }
    Ok(records)
}

/// Read all records from stdin
pub fn read_stdin_records() -> CliResult<Vec<Record>> {
    read_records(io::stdin().lock())
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });
    write_line(&response)
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });
    write_line(&response)
}

fn write_line(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
