//! Error types for the loader
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the loader
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Protocol Errors
    // ============================================================================
    #[error("Invalid message on line {line}: {message}")]
    Protocol { line: usize, message: String },

    #[error("Primary key is set to mandatory but not defined in the [{stream}] stream")]
    MissingPrimaryKey { stream: String },

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Duplicate column name produced in schema: {column}")]
    SchemaCollision { column: String },

    #[error("Record failed validation for stream '{stream}': {message}")]
    RecordValidation { stream: String, message: String },

    #[error("Cannot find {keys:?} primary key(s) in record")]
    MissingKeyValues { keys: Vec<String> },

    // ============================================================================
    // Sync Errors
    // ============================================================================
    #[error("DDL failed on {table}: {message}")]
    Ddl { table: String, message: String },

    #[error("Bulk load into {table} failed: {message}")]
    Load { table: String, message: String },

    #[error("Merge into {table} failed: {message}")]
    Merge { table: String, message: String },

    #[error("Warehouse error: {message}")]
    Warehouse { message: String },

    #[error("Staging error: {message}")]
    Staging { message: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create a protocol error for the given input line
    pub fn protocol(line: usize, message: impl Into<String>) -> Self {
        Self::Protocol {
            line,
            message: message.into(),
        }
    }

    /// Create a schema collision error
    pub fn collision(column: impl Into<String>) -> Self {
        Self::SchemaCollision {
            column: column.into(),
        }
    }

    /// Create a record validation error
    pub fn validation(stream: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordValidation {
            stream: stream.into(),
            message: message.into(),
        }
    }

    /// Create a DDL error
    pub fn ddl(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Ddl {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a bulk load error
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a merge error
    pub fn merge(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Merge {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a warehouse error
    pub fn warehouse(message: impl Into<String>) -> Self {
        Self::Warehouse {
            message: message.into(),
        }
    }

    /// Create a staging error
    pub fn staging(message: impl Into<String>) -> Self {
        Self::Staging {
            message: message.into(),
        }
    }

    /// Check if this error invalidates the configuration rather than a single flush
    pub fn is_fatal_before_start(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::MissingConfigField { .. } | Error::InvalidConfigValue { .. }
        )
    }
}

/// Result type alias for the loader
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("host");
        assert_eq!(err.to_string(), "Missing required config field: host");

        let err = Error::collision("a__b");
        assert_eq!(
            err.to_string(),
            "Duplicate column name produced in schema: a__b"
        );

        let err = Error::MissingPrimaryKey {
            stream: "users".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Primary key is set to mandatory but not defined in the [users] stream"
        );
    }

    #[test]
    fn test_is_fatal_before_start() {
        assert!(Error::config("bad").is_fatal_before_start());
        assert!(Error::missing_field("host").is_fatal_before_start());
        assert!(!Error::ddl("t", "denied").is_fatal_before_start());
        assert!(!Error::merge("t", "conflict").is_fatal_before_start());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}
