//! CLI module for txsink
//!
//! Provides command-line interface for:
//! - init: Open a stream and create its first data file
//! - write: Write one transactional batch from stdin
//! - inspect: Show the recovery record and data files

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{init, inspect, run, run_command, write};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_records, write_error, write_response};
