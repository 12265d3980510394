// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Redshift Loader
//!
//! Loads JSON-lines change streams (schemas, records, state checkpoints) into
//! a columnar warehouse: Amazon Redshift, or PostgreSQL and embedded DuckDB as
//! local substitutes.
//!
//! ## Features
//!
//! - **Flattening**: Nested records become `parent__child` columns
//! - **Schema Evolution**: Missing columns are added, incompatible ones versioned
//! - **Batched Loads**: Rows are staged as CSV in S3 or a local directory and bulk-copied
//! - **Upserts**: Primary-key merges, optional skip-updates and hard deletes
//! - **Checkpoints**: State is emitted only after the data it covers is merged
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use redshift_loader::{cli, LoaderConfig, Result};
//! use redshift_loader::state::StateEmitter;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = LoaderConfig::from_value(&serde_json::json!({
//!         "warehouse_type": "duckdb",
//!         "dbname": "warehouse.duckdb",
//!         "use_local_copy": true,
//!         "default_target_schema": "analytics"
//!     }))?;
//!
//!     let input = tokio::io::BufReader::new(tokio::io::stdin());
//!     let stats = cli::load(config, input, StateEmitter::stdout()).await?;
//!     eprintln!("{} rows loaded", stats.rows_loaded);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! stdin ──► engine (StreamDispatchLoop) ──► state (checkpoints) ──► stdout
//!               │
//!               ▼  one flush per stream, bounded parallelism
//!           sync (TableSyncCoordinator)
//!     ┌─────────┼──────────────┬─────────────────┐
//!     ▼         ▼              ▼                 ▼
//!  schema     sql           staging          warehouse
//!  (flatten,  (identifiers, (S3 / local     (Redshift, PostgreSQL,
//!   types)     statements)   CSV objects)     DuckDB)
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the loader
pub mod error;

/// Common types and type aliases
pub mod types;

/// Loader configuration
pub mod config;

/// Stream schemas: type mapping, flattening, validation
pub mod schema;

/// Identifiers, dialects and SQL statements
pub mod sql;

/// Staging store for batch files
pub mod staging;

/// Warehouse connections
pub mod warehouse;

/// Table synchronization
pub mod sync;

/// Checkpoint tracking and output
pub mod state;

/// Main read loop
pub mod engine;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use config::LoaderConfig;
pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
