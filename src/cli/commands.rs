//! CLI arguments

use clap::Parser;
use std::path::PathBuf;

/// Load JSON-lines change streams from stdin into a warehouse
#[derive(Parser, Debug)]
#[command(name = "redshift-loader")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long)]
    pub config: PathBuf,

    /// Also write every emitted state message to this file
    #[arg(short, long)]
    pub state_file: Option<PathBuf>,

    /// Validate the configuration and exit
    #[arg(long)]
    pub check_config: bool,

    /// Verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Default log filter for the chosen verbosity
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}
