//! Sync types

use crate::schema::{ColumnSchema, FlattenedSchema};
use crate::sql::primary_column_names;

/// Latest schema of a stream, as used for loading
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSchema {
    /// Stream name as sent by the source
    pub stream: String,
    /// Schema as sent, including any metadata properties
    pub schema: ColumnSchema,
    /// Flattened column set
    pub flatten_schema: FlattenedSchema,
    /// Source field names forming the primary key
    pub key_properties: Vec<String>,
}

impl StreamSchema {
    /// Quoted primary key column names
    pub fn primary_column_names(&self) -> Vec<String> {
        primary_column_names(&self.key_properties)
    }

    /// Column names in load order
    pub fn column_names(&self) -> Vec<String> {
        self.flatten_schema.keys().cloned().collect()
    }

    /// Whether the stream declares a primary key
    pub fn has_primary_key(&self) -> bool {
        !self.key_properties.is_empty()
    }
}

/// Last step a table sync completed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncPhase {
    #[default]
    Idle,
    SchemaEnsured,
    Staged,
    Loaded,
    Merged,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncPhase::Idle => write!(f, "idle"),
            SyncPhase::SchemaEnsured => write!(f, "schema_ensured"),
            SyncPhase::Staged => write!(f, "staged"),
            SyncPhase::Loaded => write!(f, "loaded"),
            SyncPhase::Merged => write!(f, "merged"),
        }
    }
}

/// Outcome of one successful table sync
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushReport {
    /// Target table
    pub table: String,
    /// Rows handed to the bulk load
    pub rows: usize,
    /// DDL statements applied before loading
    pub ddl_statements: usize,
}
