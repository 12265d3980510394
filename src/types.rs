//! Common types used throughout the loader
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Warehouse Type
// ============================================================================

/// Which warehouse the loader writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseType {
    /// Amazon Redshift (COPY from S3)
    #[default]
    Redshift,
    /// PostgreSQL, used as a local Redshift substitute
    Postgres,
    /// Embedded DuckDB database file
    Duckdb,
}

impl std::fmt::Display for WarehouseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WarehouseType::Redshift => write!(f, "redshift"),
            WarehouseType::Postgres => write!(f, "postgres"),
            WarehouseType::Duckdb => write!(f, "duckdb"),
        }
    }
}

// ============================================================================
// Error Handling Strategy
// ============================================================================

/// What to do with a record that fails validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidRecordStrategy {
    /// Stop on first invalid record
    #[default]
    Fail,
    /// Log and drop the invalid record, continue
    Skip,
}

// ============================================================================
// Utilities
// ============================================================================

/// Extension trait for Option<String> to handle empty strings
pub trait OptionStringExt {
    /// Returns None if the string is empty
    fn none_if_empty(self) -> Option<String>;
}

impl OptionStringExt for Option<String> {
    fn none_if_empty(self) -> Option<String> {
        self.filter(|s| !s.is_empty())
    }
}

impl OptionStringExt for String {
    fn none_if_empty(self) -> Option<String> {
        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}
