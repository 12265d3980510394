//! Stream schema handling
//!
//! Turns the JSON Schema sent with every stream into warehouse columns.
//!
//! # Features
//!
//! - **Type Mapping**: JSON Schema types and formats to warehouse column types
//! - **Flattening**: Nested objects become `parent__child` columns up to a depth
//! - **Normalization**: `anyOf`/`oneOf` properties collapse to a nullable type
//! - **Validation**: Optional per-record type checks

mod flatten;
mod mapping;
mod types;
mod validation;

pub use flatten::{
    flatten_key, flatten_record, flatten_schema, to_json_text, FlatRecord, FlattenedSchema,
    FLATTEN_SEPARATOR, MAX_IDENTIFIER_LENGTH,
};
pub(crate) use flatten::truncate_bytes;
pub use mapping::{
    column_clause, column_trans, column_type, resolve_column_type, ColumnTransform, ColumnType,
    DEFAULT_VARCHAR_LENGTH, LONG_VARCHAR_LENGTH, SHORT_VARCHAR_LENGTH,
};
pub use types::{
    ColumnSchema, JsonType, JsonTypeOrArray, SchemaNode, FORMAT_DATE_TIME, FORMAT_SUPER,
    FORMAT_TIME,
};
pub(crate) use validation::is_date_time;
pub use validation::{validate_record, RecordViolation};

#[cfg(test)]
mod tests;
