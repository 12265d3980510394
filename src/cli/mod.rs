//! CLI module
//!
//! Command-line interface for running the loader.
//!
//! ```text
//! tap-something | redshift-loader --config config.json >> state.jsonl
//! ```
//!
//! Messages are read from stdin, state messages are written to stdout and
//! logs go to stderr.

mod commands;
mod runner;

pub use commands::Cli;
pub use runner::{load, Runner};
