//! Mapping from JSON Schema properties to warehouse column types

use super::types::{ColumnSchema, JsonType};
use crate::sql::identifiers::safe_column_name;

/// Length used for plain string columns
pub const DEFAULT_VARCHAR_LENGTH: u32 = 10000;

/// Length used for `time` formatted strings
pub const SHORT_VARCHAR_LENGTH: u32 = 256;

/// Length used for JSON text and ambiguous unions
pub const LONG_VARCHAR_LENGTH: u32 = 65535;

/// A warehouse column type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnType {
    /// `character varying(N)`
    Varchar(Option<u32>),
    /// `timestamp without time zone`
    Timestamp,
    /// `numeric`
    Numeric,
    /// `double precision`
    DoublePrecision,
    /// `boolean`
    Boolean,
    /// `super`
    Super,
    /// Any catalog type the loader never creates itself
    Other(String),
}

impl ColumnType {
    /// Canonical Redshift name, optionally without the length qualifier
    pub fn sql_name(&self, with_length: bool) -> String {
        match self {
            ColumnType::Varchar(Some(len)) if with_length => {
                format!("character varying({len})")
            }
            ColumnType::Varchar(_) => "character varying".to_string(),
            ColumnType::Timestamp => "timestamp without time zone".to_string(),
            ColumnType::Numeric => "numeric".to_string(),
            ColumnType::DoublePrecision => "double precision".to_string(),
            ColumnType::Boolean => "boolean".to_string(),
            ColumnType::Super => "super".to_string(),
            ColumnType::Other(raw) => raw.to_lowercase(),
        }
    }

    /// Compare types ignoring length qualifiers
    pub fn same_kind(&self, other: &ColumnType) -> bool {
        match (self, other) {
            (ColumnType::Varchar(_), ColumnType::Varchar(_)) => true,
            (ColumnType::Other(a), ColumnType::Other(b)) => a.eq_ignore_ascii_case(b),
            (a, b) => a == b,
        }
    }

    /// Types whose changes are not versioned
    pub fn is_unversioned(&self) -> bool {
        matches!(self, ColumnType::Timestamp | ColumnType::Super)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.sql_name(true))
    }
}

/// Value transformation applied when a column is loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColumnTransform {
    /// Loaded as is
    #[default]
    None,
    /// Column holds serialized JSON text
    JsonText,
}

impl ColumnTransform {
    /// Transformation tag, empty when none applies
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnTransform::None => "",
            ColumnTransform::JsonText => "parse_json",
        }
    }
}

/// Resolve the warehouse type of a property.
///
/// Never fails: anything that is not a single recognizable scalar ends up as
/// long text.
pub fn resolve_column_type(schema: &ColumnSchema) -> ColumnType {
    if schema.is_super() {
        return ColumnType::Super;
    }
    if schema.is_date_time() {
        return ColumnType::Timestamp;
    }
    if schema.is_time() {
        return ColumnType::Varchar(Some(SHORT_VARCHAR_LENGTH));
    }

    match schema.non_null_types().as_slice() {
        [JsonType::String] => ColumnType::Varchar(Some(DEFAULT_VARCHAR_LENGTH)),
        [JsonType::Number] => ColumnType::DoublePrecision,
        [JsonType::Integer] => ColumnType::Numeric,
        [JsonType::Boolean] => ColumnType::Boolean,
        _ => ColumnType::Varchar(Some(LONG_VARCHAR_LENGTH)),
    }
}

/// Warehouse type name of a property
pub fn column_type(schema: &ColumnSchema, with_length: bool) -> String {
    resolve_column_type(schema).sql_name(with_length)
}

/// Load-time transformation of a property
pub fn column_trans(schema: &ColumnSchema) -> ColumnTransform {
    if schema.is_container() && !schema.is_super() {
        ColumnTransform::JsonText
    } else {
        ColumnTransform::None
    }
}

/// Column definition for CREATE/ALTER TABLE
pub fn column_clause(name: &str, schema: &ColumnSchema) -> String {
    format!("{} {}", safe_column_name(name), column_type(schema, true))
}
