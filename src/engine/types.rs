//! Engine types
//!
//! Inbound protocol messages, per-stream record batches and run statistics.

use crate::error::{Error, Result};
use crate::schema::ColumnSchema;
use crate::types::{JsonObject, JsonValue};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Metadata column holding the source extraction time
pub const EXTRACTED_AT_COLUMN: &str = "_sdc_extracted_at";

/// Metadata column holding the time the loader batched the record
pub const BATCHED_AT_COLUMN: &str = "_sdc_batched_at";

/// A message read from the input stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Schema of a stream, replacing any earlier one
    Schema {
        stream: String,
        schema: ColumnSchema,
        #[serde(default, deserialize_with = "null_as_empty")]
        key_properties: Vec<String>,
    },
    /// One record of a stream
    Record {
        stream: String,
        record: JsonObject,
        #[serde(default)]
        time_extracted: Option<String>,
    },
    /// Opaque source checkpoint
    State { value: JsonValue },
    /// Table version switch, not supported
    ActivateVersion {
        stream: String,
        #[serde(default)]
        version: Option<i64>,
    },
}

impl Message {
    /// Parse one input line.
    ///
    /// The line is read into a [`JsonValue`] first so numbers keep their
    /// exact source text on the way into the message.
    pub fn parse(line: &str, line_number: usize) -> Result<Self> {
        let value: JsonValue = serde_json::from_str(line)
            .map_err(|e| Error::protocol(line_number, e.to_string()))?;
        serde_json::from_value(value).map_err(|e| Error::protocol(line_number, e.to_string()))
    }

    /// Create a schema message
    pub fn schema(stream: impl Into<String>, schema: ColumnSchema, key_properties: &[&str]) -> Self {
        Self::Schema {
            stream: stream.into(),
            schema,
            key_properties: key_properties.iter().map(|k| k.to_string()).collect(),
        }
    }

    /// Create a record message
    pub fn record(stream: impl Into<String>, record: JsonObject) -> Self {
        Self::Record {
            stream: stream.into(),
            record,
            time_extracted: None,
        }
    }

    /// Create a state message
    pub fn state(value: JsonValue) -> Self {
        Self::State { value }
    }

    /// Message type as sent on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Schema { .. } => "SCHEMA",
            Message::Record { .. } => "RECORD",
            Message::State { .. } => "STATE",
            Message::ActivateVersion { .. } => "ACTIVATE_VERSION",
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Buffered CSV rows of one stream.
///
/// Rows with a primary key replace an earlier row with the same key in place.
#[derive(Debug, Clone, Default)]
pub struct RecordBatch {
    rows: Vec<String>,
    positions: HashMap<String, usize>,
}

impl RecordBatch {
    /// Create an empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row, replacing the row with the same key if there is one
    pub fn push(&mut self, row: String, key: Option<String>) {
        match key {
            Some(key) => match self.positions.get(&key) {
                Some(&idx) => self.rows[idx] = row,
                None => {
                    self.positions.insert(key, self.rows.len());
                    self.rows.push(row);
                }
            },
            None => self.rows.push(row),
        }
    }

    /// Number of buffered rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Buffered rows in arrival order
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    /// Remove and return all rows
    pub fn take(&mut self) -> Vec<String> {
        self.positions.clear();
        std::mem::take(&mut self.rows)
    }
}

/// Statistics for a loader run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    /// Messages read
    pub messages: usize,
    /// Records accepted into batches
    pub records: usize,
    /// Records dropped by validation
    pub skipped_records: usize,
    /// Successful table flushes
    pub flushes: usize,
    /// Rows handed to bulk loads
    pub rows_loaded: usize,
    /// Checkpoints emitted
    pub states_emitted: usize,
}
