//! txsink CLI entry point
//!
//! Parses arguments and dispatches to the CLI module. The JSON response
//! (or error) is already on stdout when `run` returns; this only sets the
//! exit code.

use txsink::cli;

fn main() {
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
