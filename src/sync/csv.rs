//! CSV rendering of flattened records for bulk loads

use crate::error::{Error, Result};
use crate::schema::{to_json_text, ColumnSchema, FlatRecord, FlattenedSchema};
use crate::types::JsonValue;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Render a record as one CSV line with columns in `schema` order
pub fn record_to_csv_line(record: &FlatRecord, schema: &FlattenedSchema) -> String {
    schema
        .iter()
        .map(|(name, column)| render_field(record.get(name), column))
        .collect::<Vec<_>>()
        .join(",")
}

/// Deduplication key of a record, from its primary key values
pub fn record_primary_key_string(record: &FlatRecord, key_properties: &[String]) -> Result<String> {
    let mut values = Vec::with_capacity(key_properties.len());
    for key in key_properties {
        match record.get(key) {
            None | Some(JsonValue::Null) => {
                return Err(Error::MissingKeyValues {
                    keys: key_properties.to_vec(),
                })
            }
            Some(JsonValue::String(s)) => values.push(s.clone()),
            Some(other) => values.push(other.to_string()),
        }
    }
    Ok(values.join(","))
}

fn render_field(value: Option<&JsonValue>, column: &ColumnSchema) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) if s.is_empty() => "\"\"".to_string(),
        Some(JsonValue::String(s)) if column.is_date_time() => escape(&normalize_date_time(s)),
        Some(JsonValue::String(s)) => escape(s),
        Some(JsonValue::Bool(b)) => b.to_string(),
        Some(JsonValue::Number(n)) => render_number(n),
        Some(nested) => escape(&to_json_text(nested)),
    }
}

/// Numbers keep the digits they arrived with. Exponents are expanded so the
/// warehouse never sees scientific notation.
fn render_number(n: &serde_json::Number) -> String {
    let text = n.to_string();
    match text.split_once(['e', 'E']) {
        Some((mantissa, exponent)) => expand_exponent(mantissa, exponent).unwrap_or(text),
        None => text,
    }
}

/// Largest exponent that is expanded into plain digits
const MAX_EXPANDED_EXPONENT: i64 = 400;

fn expand_exponent(mantissa: &str, exponent: &str) -> Option<String> {
    let exponent: i64 = exponent.parse().ok()?;
    if exponent.abs() > MAX_EXPANDED_EXPONENT {
        return None;
    }

    let (sign, unsigned) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let (whole, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    let digits = format!("{whole}{fraction}");
    let point = whole.len() as i64 + exponent;

    let (whole, fraction) = if point <= 0 {
        (String::new(), format!("{}{digits}", "0".repeat((-point) as usize)))
    } else if point as usize >= digits.len() {
        let padding = "0".repeat(point as usize - digits.len());
        (format!("{digits}{padding}"), String::new())
    } else {
        let (w, f) = digits.split_at(point as usize);
        (w.to_string(), f.to_string())
    };

    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        Some(format!("{sign}{whole}"))
    } else {
        Some(format!("{sign}{whole}.{fraction}"))
    }
}

/// Timestamps are loaded as UTC without an offset
pub fn normalize_date_time(value: &str) -> String {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return parsed.with_timezone(&Utc).format(TIMESTAMP_FORMAT).to_string();
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return parsed.format(TIMESTAMP_FORMAT).to_string();
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.format("%Y-%m-%d 00:00:00.000000").to_string();
    }
    value.to_string()
}

fn escape(value: &str) -> String {
    if value.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
