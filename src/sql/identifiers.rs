//! Identifier sanitizing and stream name parsing

use crate::schema::{truncate_bytes, MAX_IDENTIFIER_LENGTH};
use uuid::Uuid;

/// Default separator between the parts of a stream name
pub const STREAM_NAME_SEPARATOR: char = '-';

/// Marker between the target table name and the per-flush token of a
/// staging table. Contains `-`, which `table_name` never produces.
pub const STAGE_TABLE_MARKER: &str = "-STAGE-";

/// Quote a column name, upper-cased
pub fn safe_column_name(name: &str) -> String {
    format!("\"{}\"", name.to_uppercase().replace('"', "\"\""))
}

/// Upper-cased, unquoted form used to compare against catalog names
pub fn column_name_key(name: &str) -> String {
    name.to_uppercase()
}

/// Quote a string literal
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Quoted key column names
pub fn primary_column_names(key_properties: &[String]) -> Vec<String> {
    key_properties.iter().map(|k| safe_column_name(k)).collect()
}

/// Parts of a stream name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamName {
    pub catalog_name: Option<String>,
    pub schema_name: Option<String>,
    pub table_name: String,
}

/// Split a stream name into catalog, schema and table.
///
/// `table` gives `table`, `schema-table` gives `schema.table`, and anything
/// with more separators gives `catalog.schema.table` where the table absorbs
/// the remaining segments joined with `_`.
pub fn stream_name_to_dict(stream_name: &str, separator: char) -> StreamName {
    let segments: Vec<&str> = stream_name.split(separator).collect();
    match segments.as_slice() {
        [schema, table] => StreamName {
            catalog_name: None,
            schema_name: Some((*schema).to_string()),
            table_name: (*table).to_string(),
        },
        [catalog, schema, rest @ ..] if !rest.is_empty() => StreamName {
            catalog_name: Some((*catalog).to_string()),
            schema_name: Some((*schema).to_string()),
            table_name: rest.join("_"),
        },
        _ => StreamName {
            catalog_name: None,
            schema_name: None,
            table_name: stream_name.to_string(),
        },
    }
}

/// Fully qualified warehouse table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    /// Target schema, lower-cased
    pub schema: String,
    /// Table name, upper-cased
    pub table: String,
}

impl TableRef {
    /// Target table of a stream inside `schema`
    pub fn for_stream(schema: &str, stream_name: &str) -> Self {
        Self {
            schema: schema.to_lowercase(),
            table: table_name(stream_name, ""),
        }
    }

    /// Fresh staging table next to this table, unique per call
    pub fn stage(&self) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        self.stage_with(&token[..12].to_uppercase())
    }

    /// Staging table next to this table, named `<TABLE>-STAGE-<token>`.
    ///
    /// The name can never equal the target table of any stream.
    pub fn stage_with(&self, token: &str) -> Self {
        let suffix = format!("{STAGE_TABLE_MARKER}{token}");
        let room = (MAX_IDENTIFIER_LENGTH - 1).saturating_sub(suffix.len());
        Self {
            schema: self.schema.clone(),
            table: format!("{}{}", truncate_bytes(&self.table, room), suffix),
        }
    }

    /// Quoted schema name
    pub fn quoted_schema(&self) -> String {
        quote_identifier(&self.schema)
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{}",
            quote_identifier(&self.schema),
            quote_identifier(&self.table)
        )
    }
}

/// Quote an identifier as is
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Upper-cased, unquoted table name of a stream with an optional suffix
pub fn table_name(stream_name: &str, suffix: &str) -> String {
    let parts = stream_name_to_dict(stream_name, STREAM_NAME_SEPARATOR);
    let name = format!(
        "{}{}",
        parts.table_name.replace(['.', '-'], "_").to_lowercase(),
        suffix
    )
    .to_uppercase();
    truncate_bytes(&name, MAX_IDENTIFIER_LENGTH - 1)
}
