//! Flattening of nested schemas and records into a single level of columns

use super::types::ColumnSchema;
use super::mapping::{column_trans, ColumnTransform};
use crate::error::{Error, Result};
use crate::sql::column_name_key;
use crate::types::{JsonObject, JsonValue};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::io;

/// Identifier length limit of the warehouse (exclusive)
pub const MAX_IDENTIFIER_LENGTH: usize = 127;

/// Separator between ancestor and child names
pub const FLATTEN_SEPARATOR: &str = "__";

/// Column name to column schema, ordered by name
pub type FlattenedSchema = BTreeMap<String, ColumnSchema>;

/// Single-level record keyed by column name
pub type FlatRecord = JsonObject;

/// Flatten the `properties` of a stream schema into columns.
///
/// Two properties that end up as the same warehouse column, such as `Id` and
/// `id`, are a collision.
pub fn flatten_schema(schema: &ColumnSchema, max_level: usize) -> Result<FlattenedSchema> {
    let mut flattener = SchemaFlattener {
        max_level,
        columns: FlattenedSchema::new(),
        column_keys: HashSet::new(),
    };
    if let Some(properties) = &schema.properties {
        flattener.flatten_properties(properties, &mut Vec::new(), 0)?;
    }
    Ok(flattener.columns)
}

struct SchemaFlattener {
    max_level: usize,
    columns: FlattenedSchema,
    /// Sanitized names of the columns so far
    column_keys: HashSet<String>,
}

impl SchemaFlattener {
    fn flatten_properties(
        &mut self,
        properties: &BTreeMap<String, ColumnSchema>,
        ancestors: &mut Vec<String>,
        level: usize,
    ) -> Result<()> {
        for (name, property) in properties {
            let Some(property) = property.normalized() else {
                tracing::debug!("Dropping property without type information: {}", name);
                continue;
            };

            let children = match property.classify() {
                super::types::SchemaNode::Object(children) if level < self.max_level => {
                    Some(children)
                }
                _ => None,
            };

            if let Some(children) = children {
                ancestors.push(name.clone());
                self.flatten_properties(children, ancestors, level + 1)?;
                ancestors.pop();
                continue;
            }

            let key = flatten_key(name, ancestors, FLATTEN_SEPARATOR);
            if !self.column_keys.insert(column_name_key(&key)) {
                return Err(Error::collision(key));
            }
            self.columns.insert(key, property);
        }
        Ok(())
    }
}

/// Flatten a record to the same column names `flatten_schema` produces.
///
/// Objects nested less than `max_level` deep are inlined. Anything else that is
/// a container is stored as JSON text. When `schema` is given, values of
/// columns whose transform is [`ColumnTransform::JsonText`] are always stored
/// as JSON text.
pub fn flatten_record(
    record: &JsonObject,
    schema: Option<&FlattenedSchema>,
    max_level: usize,
) -> FlatRecord {
    let mut flat = FlatRecord::new();
    flatten_values(record, schema, &mut Vec::new(), 0, max_level, &mut flat);
    flat
}

fn flatten_values(
    record: &JsonObject,
    schema: Option<&FlattenedSchema>,
    ancestors: &mut Vec<String>,
    level: usize,
    max_level: usize,
    flat: &mut FlatRecord,
) {
    for (name, value) in record {
        let key = flatten_key(name, ancestors, FLATTEN_SEPARATOR);
        let declared_container = schema
            .and_then(|s| s.get(&key))
            .is_some_and(|column| column_trans(column) == ColumnTransform::JsonText);

        match value {
            JsonValue::Object(children) if level < max_level && !declared_container => {
                ancestors.push(name.clone());
                flatten_values(children, schema, ancestors, level + 1, max_level, flat);
                ancestors.pop();
            }
            JsonValue::Object(_) | JsonValue::Array(_) => {
                flat.insert(key, JsonValue::String(to_json_text(value)));
            }
            JsonValue::Null => {
                flat.insert(key, JsonValue::Null);
            }
            _ if declared_container => {
                flat.insert(key, JsonValue::String(to_json_text(value)));
            }
            _ => {
                flat.insert(key, value.clone());
            }
        }
    }
}

/// Join a property name with its ancestors, keeping the result under the
/// identifier length limit
pub fn flatten_key(name: &str, ancestors: &[String], separator: &str) -> String {
    let mut segments: Vec<String> = ancestors.to_vec();
    segments.push(name.to_string());

    let leaf = segments.len() - 1;
    let mut next = 0;
    while joined_len(&segments, separator) >= MAX_IDENTIFIER_LENGTH && next < leaf {
        segments[next] = abbreviate(&segments[next]);
        next += 1;
    }

    while joined_len(&segments, separator) >= MAX_IDENTIFIER_LENGTH && segments.len() > 1 {
        segments.remove(0);
    }

    let key = segments.join(separator);
    if key.len() < MAX_IDENTIFIER_LENGTH {
        return key;
    }
    truncate_bytes(&key, MAX_IDENTIFIER_LENGTH - 1)
}

fn joined_len(segments: &[String], separator: &str) -> usize {
    let names: usize = segments.iter().map(String::len).sum();
    names + separator.len() * segments.len().saturating_sub(1)
}

/// Shorten a name to the capitals of its camel-cased form (`my_long_name` to
/// `mln`), or to its first three characters when that leaves one letter or less
fn abbreviate(segment: &str) -> String {
    let capitals: String = camelize(segment)
        .chars()
        .filter(|c| !c.is_ascii_lowercase())
        .collect();

    if capitals.chars().count() > 1 {
        capitals.to_lowercase()
    } else {
        segment.chars().take(3).collect::<String>().to_lowercase()
    }
}

fn camelize(segment: &str) -> String {
    segment
        .split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// Longest prefix of `s` that fits in `max` bytes
pub(crate) fn truncate_bytes(s: &str, max: usize) -> String {
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        if idx + c.len_utf8() > max {
            break;
        }
        end = idx + c.len_utf8();
    }
    s[..end].to_string()
}

/// JSON formatter writing `", "` and `": "` separators
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize a value to JSON text with spaced separators
pub fn to_json_text(value: &JsonValue) -> String {
    let mut buf = Vec::new();
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, SpacedFormatter);
    match value.serialize(&mut serializer) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| value.to_string()),
        Err(_) => value.to_string(),
    }
}
