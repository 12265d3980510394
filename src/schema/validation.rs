//! Record validation against a stream schema

use super::types::{ColumnSchema, JsonType};
use crate::types::{JsonObject, JsonValue};
use chrono::{DateTime, NaiveDateTime};

/// A single way a record does not match its schema
#[derive(Debug, Clone, PartialEq)]
pub enum RecordViolation {
    /// Value has a JSON type the property does not allow
    TypeMismatch {
        field: String,
        expected: Vec<JsonType>,
        found: &'static str,
    },
    /// String in a `date-time` property that is not a timestamp
    InvalidDateTime { field: String, value: String },
}

impl std::fmt::Display for RecordViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordViolation::TypeMismatch {
                field,
                expected,
                found,
            } => {
                let expected: Vec<String> = expected.iter().map(ToString::to_string).collect();
                write!(
                    f,
                    "'{field}' is {found}, expected one of [{}]",
                    expected.join(", ")
                )
            }
            RecordViolation::InvalidDateTime { field, value } => {
                write!(f, "'{field}' is not a valid date-time: '{value}'")
            }
        }
    }
}

/// Check a record against the stream schema.
///
/// Properties missing from the record and record fields missing from the
/// schema are both accepted.
pub fn validate_record(
    record: &JsonObject,
    schema: &ColumnSchema,
) -> std::result::Result<(), Vec<RecordViolation>> {
    let mut violations = Vec::new();
    check_object(record, schema, "", &mut violations);
    if violations.is_empty() {
        Ok(())
    } else {
        Err(violations)
    }
}

fn check_object(
    record: &JsonObject,
    schema: &ColumnSchema,
    path: &str,
    violations: &mut Vec<RecordViolation>,
) {
    let Some(properties) = &schema.properties else {
        return;
    };

    for (name, property) in properties {
        let Some(value) = record.get(name) else {
            continue;
        };
        let Some(property) = property.normalized() else {
            continue;
        };
        let field = if path.is_empty() {
            name.clone()
        } else {
            format!("{path}.{name}")
        };
        check_value(value, &property, &field, violations);
    }
}

fn check_value(
    value: &JsonValue,
    property: &ColumnSchema,
    field: &str,
    violations: &mut Vec<RecordViolation>,
) {
    let allowed = property.types();
    if allowed.is_empty() || allowed.contains(&JsonType::Super) {
        return;
    }

    let matches = match value {
        JsonValue::Null => allowed.contains(&JsonType::Null),
        JsonValue::Bool(_) => allowed.contains(&JsonType::Boolean),
        JsonValue::Number(n) => {
            allowed.contains(&JsonType::Number)
                || (allowed.contains(&JsonType::Integer) && is_integral(n))
        }
        JsonValue::String(_) => allowed.contains(&JsonType::String),
        JsonValue::Array(_) => allowed.contains(&JsonType::Array),
        JsonValue::Object(_) => allowed.contains(&JsonType::Object),
    };

    if !matches {
        violations.push(RecordViolation::TypeMismatch {
            field: field.to_string(),
            expected: allowed.into_iter().collect(),
            found: json_kind(value),
        });
        return;
    }

    match value {
        JsonValue::String(s) if property.is_date_time() && !is_date_time(s) => {
            violations.push(RecordViolation::InvalidDateTime {
                field: field.to_string(),
                value: s.clone(),
            });
        }
        JsonValue::Object(children) => check_object(children, property, field, violations),
        _ => {}
    }
}

fn is_integral(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_i64() || n.is_u64() => "integer",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Accepts RFC 3339 and the common ISO variants without an offset
pub(crate) fn is_date_time(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").is_ok()
}
