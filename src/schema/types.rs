//! Schema types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// JSON Schema type tag, extended with the warehouse-native `super` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Super,
}

impl std::fmt::Display for JsonType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JsonType::Null => write!(f, "null"),
            JsonType::String => write!(f, "string"),
            JsonType::Integer => write!(f, "integer"),
            JsonType::Number => write!(f, "number"),
            JsonType::Boolean => write!(f, "boolean"),
            JsonType::Object => write!(f, "object"),
            JsonType::Array => write!(f, "array"),
            JsonType::Super => write!(f, "super"),
        }
    }
}

/// JSON type can be a single type or array of types (for nullable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonTypeOrArray {
    Single(JsonType),
    Multiple(Vec<JsonType>),
}

impl JsonTypeOrArray {
    /// Create a nullable type in `["null", T]` form
    pub fn nullable(t: JsonType) -> Self {
        if t == JsonType::Null {
            JsonTypeOrArray::Single(JsonType::Null)
        } else {
            JsonTypeOrArray::Multiple(vec![JsonType::Null, t])
        }
    }

    /// All type tags as a set
    pub fn tags(&self) -> BTreeSet<JsonType> {
        match self {
            JsonTypeOrArray::Single(t) => BTreeSet::from([*t]),
            JsonTypeOrArray::Multiple(types) => types.iter().copied().collect(),
        }
    }
}

/// Format hints the loader acts on
pub const FORMAT_DATE_TIME: &str = "date-time";
pub const FORMAT_TIME: &str = "time";
pub const FORMAT_SUPER: &str = "super";

/// Schema of a single property (and, for the stream itself, of the whole record)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Type tag(s)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub json_type: Option<JsonTypeOrArray>,

    /// Format hint (e.g., "date-time", "time", "super")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Nested properties (for objects)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ColumnSchema>>,

    /// Alternative representations, normalized away before use
    #[serde(rename = "anyOf", default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<ColumnSchema>>,

    #[serde(rename = "oneOf", default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<ColumnSchema>>,

    /// Accepted on input and ignored by type mapping
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
}

/// Structural view of a property used while flattening
#[derive(Debug)]
pub enum SchemaNode<'a> {
    /// Becomes a single column
    Leaf,
    /// Object with named children that can be descended into
    Object(&'a BTreeMap<String, ColumnSchema>),
}

impl ColumnSchema {
    /// Create a property with a single type
    pub fn new(json_type: JsonType) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::Single(json_type)),
            ..Self::default()
        }
    }

    /// Create a property with the given type tags
    pub fn with_types(types: &[JsonType]) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::Multiple(types.to_vec())),
            ..Self::default()
        }
    }

    /// Create a `["null", T]` property
    pub fn nullable(json_type: JsonType) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::nullable(json_type)),
            ..Self::default()
        }
    }

    /// Create an object property with nested properties
    pub fn object(properties: BTreeMap<String, ColumnSchema>) -> Self {
        Self {
            json_type: Some(JsonTypeOrArray::nullable(JsonType::Object)),
            properties: Some(properties),
            ..Self::default()
        }
    }

    /// Set format hint
    #[must_use]
    pub fn with_format(mut self, format: &str) -> Self {
        self.format = Some(format.to_string());
        self
    }

    /// All declared type tags
    pub fn types(&self) -> BTreeSet<JsonType> {
        self.json_type
            .as_ref()
            .map(JsonTypeOrArray::tags)
            .unwrap_or_default()
    }

    /// Declared type tags without `null`
    pub fn non_null_types(&self) -> Vec<JsonType> {
        self.types()
            .into_iter()
            .filter(|t| *t != JsonType::Null)
            .collect()
    }

    /// Check for a specific type tag
    pub fn has_type(&self, json_type: JsonType) -> bool {
        self.types().contains(&json_type)
    }

    /// Check if nullable
    pub fn is_nullable(&self) -> bool {
        self.has_type(JsonType::Null)
    }

    /// Check if the property is the warehouse-native semi-structured type
    pub fn is_super(&self) -> bool {
        self.has_type(JsonType::Super) || self.format.as_deref() == Some(FORMAT_SUPER)
    }

    /// Check for the date-time format
    pub fn is_date_time(&self) -> bool {
        self.format.as_deref() == Some(FORMAT_DATE_TIME)
    }

    /// Check for the time format
    pub fn is_time(&self) -> bool {
        self.format.as_deref() == Some(FORMAT_TIME)
    }

    /// Check whether values of this property are JSON containers
    pub fn is_container(&self) -> bool {
        self.has_type(JsonType::Object) || self.has_type(JsonType::Array)
    }

    /// Classify the property for flattening
    pub fn classify(&self) -> SchemaNode<'_> {
        match &self.properties {
            Some(children) if self.has_type(JsonType::Object) && !children.is_empty() => {
                SchemaNode::Object(children)
            }
            _ => SchemaNode::Leaf,
        }
    }

    /// Return the canonical form of this property.
    ///
    /// A property with an explicit `type` is returned unchanged. A property
    /// described only through `anyOf`/`oneOf` is rewritten to
    /// `{"type": ["null", T]}` from its first non-null alternative. Returns
    /// `None` when no type information exists at all.
    pub fn normalized(&self) -> Option<ColumnSchema> {
        if self.json_type.is_some() {
            return Some(self.clone());
        }

        let alternatives = self.any_of.as_ref().or(self.one_of.as_ref())?;
        let (alternative, json_type) = alternatives.iter().find_map(|alt| {
            let alt = alt.normalized()?;
            let concrete = alt.non_null_types().into_iter().next()?;
            Some((alt, concrete))
        })?;

        Some(ColumnSchema {
            json_type: Some(JsonTypeOrArray::nullable(json_type)),
            format: alternative.format,
            properties: alternative.properties,
            any_of: None,
            one_of: None,
            max_length: alternative.max_length,
        })
    }
}
