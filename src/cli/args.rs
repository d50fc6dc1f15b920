//! CLI argument definitions using clap
//!
//! Commands:
//! - txsink init --config <path>
//! - txsink write --config <path> --txid <n>
//! - txsink inspect --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// txsink - transactional, rotation-aware file sink
#[derive(Parser, Debug)]
#[command(name = "txsink")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the stream once, creating its directory and first data file
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./txsink.json")]
        config: PathBuf,
    },

    /// Write one batch read from stdin (one JSON object per line) as txid
    Write {
        /// Path to configuration file
        #[arg(long, default_value = "./txsink.json")]
        config: PathBuf,

        /// Transaction id of the batch
        #[arg(long)]
        txid: u64,
    },

    /// Show the recovery record and data files without opening the stream
    Inspect {
        /// Path to configuration file
        #[arg(long, default_value = "./txsink.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
