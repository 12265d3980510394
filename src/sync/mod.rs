//! Table synchronization
//!
//! Keeps one warehouse table per stream in step with the stream's schema and
//! merges batches of rows into it.
//!
//! # Overview
//!
//! - `diff` - Column drift between a stream schema and a live table
//! - `csv` - Row serialization for bulk loads
//! - `TableSyncCoordinator` - Schema, staging, load and merge for one batch
//! - `TableCache` - Schemas known to exist, loaded once per session

mod cache;
mod coordinator;
mod csv;
mod diff;
mod types;

pub use cache::TableCache;
pub use coordinator::TableSyncCoordinator;
pub use csv::{normalize_date_time, record_primary_key_string, record_to_csv_line};
pub use diff::{diff_columns, version_suffix, DdlAction};
pub use types::{FlushReport, StreamSchema, SyncPhase};
