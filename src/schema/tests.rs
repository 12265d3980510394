//! Schema mapping, flattening and validation tests

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

fn schema(value: serde_json::Value) -> ColumnSchema {
    serde_json::from_value(value).unwrap()
}

fn object(value: serde_json::Value) -> crate::types::JsonObject {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

fn nested_schema() -> ColumnSchema {
    schema(json!({
        "type": "object",
        "properties": {
            "c_pk": {"type": ["null", "integer"]},
            "c_varchar": {"type": ["null", "string"]},
            "c_int": {"type": ["null", "integer"]},
            "c_obj": {
                "type": ["null", "object"],
                "properties": {
                    "nested_prop1": {"type": ["null", "string"]},
                    "nested_prop2": {"type": ["null", "string"]},
                    "nested_prop3": {
                        "type": ["null", "object"],
                        "properties": {
                            "multi_nested_prop1": {"type": ["null", "string"]},
                            "multi_nested_prop2": {"type": ["null", "string"]}
                        }
                    }
                }
            }
        }
    }))
}

// ============================================================================
// Type mapping
// ============================================================================

#[test_case(json!({"type": ["string"]}), "character varying(10000)" ; "string")]
#[test_case(json!({"type": ["string"], "maxLength": 50000}), "character varying(10000)" ; "string ignores max length")]
#[test_case(json!({"type": ["string"], "format": "date-time"}), "timestamp without time zone" ; "date time")]
#[test_case(json!({"type": ["string"], "format": "time"}), "character varying(256)" ; "time")]
#[test_case(json!({"type": ["number"]}), "double precision" ; "number")]
#[test_case(json!({"type": ["integer"]}), "numeric" ; "integer")]
#[test_case(json!({"type": ["integer", "string"]}), "character varying(65535)" ; "ambiguous union")]
#[test_case(json!({"type": ["boolean"]}), "boolean" ; "boolean")]
#[test_case(json!({"type": ["object"]}), "character varying(65535)" ; "object")]
#[test_case(json!({"type": ["array"]}), "character varying(65535)" ; "array")]
#[test_case(json!({"type": ["null"]}), "character varying(65535)" ; "only null")]
#[test_case(json!({"type": "super"}), "super" ; "super tag")]
#[test_case(json!({"type": ["super"]}), "super" ; "super tag list")]
#[test_case(json!({"type": ["super", "null"]}), "super" ; "nullable super")]
#[test_case(json!({"type": ["object"], "format": "super"}), "super" ; "super format")]
#[test_case(json!({"type": ["null", "object"], "format": "date-time"}), "timestamp without time zone" ; "format wins over object")]
fn test_column_type(property: serde_json::Value, expected: &str) {
    assert_eq!(column_type(&schema(property), true), expected);
}

#[test]
fn test_column_type_without_length() {
    assert_eq!(
        column_type(&schema(json!({"type": ["string"]})), false),
        "character varying"
    );
    assert_eq!(
        column_type(&schema(json!({"type": ["object"]})), false),
        "character varying"
    );
    assert_eq!(
        column_type(&schema(json!({"type": ["integer"]})), false),
        "numeric"
    );
}

#[test]
fn test_column_trans() {
    assert_eq!(
        column_trans(&schema(json!({"type": ["object"]}))),
        ColumnTransform::JsonText
    );
    assert_eq!(
        column_trans(&schema(json!({"type": ["null", "array"]}))),
        ColumnTransform::JsonText
    );
    assert_eq!(
        column_trans(&schema(json!({"type": ["object"], "format": "super"}))),
        ColumnTransform::None
    );
    assert_eq!(
        column_trans(&schema(json!({"type": ["string"]}))),
        ColumnTransform::None
    );
    assert_eq!(ColumnTransform::JsonText.as_str(), "parse_json");
    assert_eq!(ColumnTransform::None.as_str(), "");
}

#[test]
fn test_column_clause() {
    assert_eq!(
        column_clause("name", &schema(json!({"type": ["string"]}))),
        "\"NAME\" character varying(10000)"
    );
}

#[test]
fn test_column_type_same_kind_ignores_length() {
    assert!(ColumnType::Varchar(Some(10000)).same_kind(&ColumnType::Varchar(Some(65535))));
    assert!(ColumnType::Varchar(None).same_kind(&ColumnType::Varchar(Some(256))));
    assert!(!ColumnType::Numeric.same_kind(&ColumnType::DoublePrecision));
    assert!(ColumnType::Other("DATE".into()).same_kind(&ColumnType::Other("date".into())));
}

// ============================================================================
// Schema flattening
// ============================================================================

#[test]
fn test_flatten_schema_without_properties() {
    let flat = flatten_schema(&schema(json!({"type": "object"})), 0).unwrap();
    assert!(flat.is_empty());
}

#[test]
fn test_flatten_schema_level_zero_keeps_objects() {
    let source = nested_schema();
    let flat = flatten_schema(&source, 0).unwrap();

    let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["c_int", "c_obj", "c_pk", "c_varchar"]);
    assert_eq!(
        flat["c_obj"],
        source.properties.as_ref().unwrap()["c_obj"]
    );
}

#[test]
fn test_flatten_schema_level_one() {
    let flat = flatten_schema(&nested_schema(), 1).unwrap();

    let keys: Vec<&str> = flat.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "c_int",
            "c_obj__nested_prop1",
            "c_obj__nested_prop2",
            "c_obj__nested_prop3",
            "c_pk",
            "c_varchar",
        ]
    );
    assert!(flat["c_obj__nested_prop3"].properties.is_some());
    assert_eq!(
        column_type(&flat["c_obj__nested_prop3"], true),
        "character varying(65535)"
    );
}

#[test]
fn test_flatten_schema_full_depth() {
    let flat = flatten_schema(&nested_schema(), 10).unwrap();

    assert!(flat.contains_key("c_obj__nested_prop3__multi_nested_prop1"));
    assert!(flat.contains_key("c_obj__nested_prop3__multi_nested_prop2"));
    assert!(!flat.contains_key("c_obj__nested_prop3"));
    assert_eq!(flat.len(), 7);
}

#[test]
fn test_flatten_schema_normalizes_any_of() {
    let source = schema(json!({
        "type": "object",
        "properties": {
            "field1": {"anyOf": [{"type": "string"}]},
            "field2": {"anyOf": [{"type": "null"}, {"type": "array", "items": {"type": "string"}}]},
            "field3": {"oneOf": [{"type": "object", "properties": {"a": {"type": "string"}}}]},
            "field4": {"description": "no type"}
        }
    }));

    let flat = flatten_schema(&source, 0).unwrap();
    assert_eq!(flat.len(), 3);
    assert_eq!(
        flat["field1"].json_type,
        Some(JsonTypeOrArray::Multiple(vec![JsonType::Null, JsonType::String]))
    );
    assert_eq!(
        flat["field2"].json_type,
        Some(JsonTypeOrArray::Multiple(vec![JsonType::Null, JsonType::Array]))
    );
    assert_eq!(
        flat["field3"].json_type,
        Some(JsonTypeOrArray::Multiple(vec![JsonType::Null, JsonType::Object]))
    );
}

#[test]
fn test_flatten_schema_collision() {
    let source = schema(json!({
        "type": "object",
        "properties": {
            "a__b": {"type": ["null", "string"]},
            "a": {
                "type": ["null", "object"],
                "properties": {"b": {"type": ["null", "integer"]}}
            }
        }
    }));

    let err = flatten_schema(&source, 1).unwrap_err();
    assert!(matches!(err, crate::Error::SchemaCollision { ref column } if column == "a__b"));

    // Without descending, there is nothing to collide with
    assert_eq!(flatten_schema(&source, 0).unwrap().len(), 2);
}

#[test]
fn test_flatten_schema_collision_after_sanitizing() {
    let source = schema(json!({
        "properties": {
            "Id": {"type": "integer"},
            "id": {"type": "string"}
        }
    }));
    let err = flatten_schema(&source, 0).unwrap_err();
    assert!(matches!(err, crate::Error::SchemaCollision { .. }), "{err:?}");

    let nested = schema(json!({
        "properties": {
            "A__b": {"type": ["null", "string"]},
            "a": {"type": "object", "properties": {"B": {"type": "integer"}}}
        }
    }));
    assert!(flatten_schema(&nested, 0).is_ok());
    let err = flatten_schema(&nested, 1).unwrap_err();
    assert!(matches!(err, crate::Error::SchemaCollision { .. }), "{err:?}");
}

#[test]
fn test_flatten_schema_columns_never_shrink_with_depth() {
    let source = nested_schema();
    let counts: Vec<usize> = (0..5)
        .map(|level| flatten_schema(&source, level).unwrap().len())
        .collect();

    assert_eq!(counts, vec![4, 6, 7, 7, 7]);
    assert!(counts.windows(2).all(|pair| pair[0] <= pair[1]));
}

// ============================================================================
// Record flattening
// ============================================================================

fn nested_record() -> crate::types::JsonObject {
    object(json!({
        "c_pk": 1,
        "c_varchar": "1",
        "c_int": 1,
        "c_obj": {
            "nested_prop1": "value_1",
            "nested_prop2": "value_2",
            "nested_prop3": {
                "multi_nested_prop1": "multi_value_1",
                "multi_nested_prop2": "multi_value_2"
            }
        }
    }))
}

#[test]
fn test_flatten_record_level_zero() {
    let flat = flatten_record(&nested_record(), None, 0);

    assert_eq!(flat["c_pk"], json!(1));
    assert_eq!(
        flat["c_obj"],
        json!(
            "{\"nested_prop1\": \"value_1\", \"nested_prop2\": \"value_2\", \"nested_prop3\": \
             {\"multi_nested_prop1\": \"multi_value_1\", \"multi_nested_prop2\": \"multi_value_2\"}}"
        )
    );
}

#[test]
fn test_flatten_record_level_one() {
    let flat = flatten_record(&nested_record(), None, 1);

    assert_eq!(flat["c_obj__nested_prop1"], json!("value_1"));
    assert_eq!(
        flat["c_obj__nested_prop3"],
        json!("{\"multi_nested_prop1\": \"multi_value_1\", \"multi_nested_prop2\": \"multi_value_2\"}")
    );
    assert!(!flat.contains_key("c_obj"));
}

#[test]
fn test_flatten_record_full_depth() {
    let flat = flatten_record(&nested_record(), None, 10);

    assert_eq!(
        flat["c_obj__nested_prop3__multi_nested_prop2"],
        json!("multi_value_2")
    );
    assert_eq!(flat.len(), 7);
}

#[test]
fn test_flatten_record_serializes_arrays_and_keeps_nulls() {
    let record = object(json!({"tags": ["a", "b"], "empty": null, "n": 0}));
    let flat = flatten_record(&record, None, 10);

    assert_eq!(flat["tags"], json!("[\"a\", \"b\"]"));
    assert_eq!(flat["empty"], serde_json::Value::Null);
    assert_eq!(flat["n"], json!(0));
}

#[test]
fn test_flatten_record_with_schema_forces_json_text() {
    let columns = flatten_schema(
        &schema(json!({
            "type": "object",
            "properties": {"id": {"type": ["object", "array", "null"]}}
        })),
        0,
    )
    .unwrap();

    let flat = flatten_record(&object(json!({"id": 1})), Some(&columns), 0);
    assert_eq!(flat["id"], json!("1"));
}

#[test]
fn test_flatten_record_leaves_super_scalars_alone() {
    let columns = flatten_schema(
        &schema(json!({
            "properties": {"doc": {"type": ["null", "object"], "format": "super"}}
        })),
        0,
    )
    .unwrap();
    assert_eq!(column_trans(&columns["doc"]), ColumnTransform::None);

    let flat = flatten_record(&object(json!({"doc": 1})), Some(&columns), 0);
    assert_eq!(flat["doc"], json!(1));
}

#[test]
fn test_flatten_record_json_text_parses_back() {
    let columns = flatten_schema(
        &schema(json!({
            "properties": {
                "obj": {"type": ["null", "object"]},
                "list": {"type": ["null", "array"]},
                "either": {"type": ["null", "string", "object"]}
            }
        })),
        0,
    )
    .unwrap();
    let record = object(json!({
        "obj": {"price": 12.75, "ratio": 0.1, "name": "Ünícödé 文字", "n": null},
        "list": [1.5e-7, -3, "a\"b", {"deep": [true, false]}],
        "either": {"k": "v"}
    }));

    let flat = flatten_record(&record, Some(&columns), 0);
    for (name, original) in &record {
        let text = flat[name].as_str().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(&parsed, original, "column {name}");
    }
}

#[test]
fn test_flatten_record_with_schema_does_not_inline_json_columns() {
    let columns = flatten_schema(
        &schema(json!({
            "type": "object",
            "properties": {"payload": {"type": ["null", "object"]}}
        })),
        5,
    )
    .unwrap();

    let flat = flatten_record(&object(json!({"payload": {"a": 1}})), Some(&columns), 5);
    assert_eq!(flat["payload"], json!("{\"a\": 1}"));
    assert!(!flat.contains_key("payload__a"));
}

#[test]
fn test_to_json_text_separators() {
    assert_eq!(
        to_json_text(&json!({"a": [1, 2], "b": {"c": "d"}})),
        "{\"a\": [1, 2], \"b\": {\"c\": \"d\"}}"
    );
}

// ============================================================================
// Key flattening
// ============================================================================

#[test]
fn test_flatten_key_simple() {
    assert_eq!(flatten_key("zip", &[], FLATTEN_SEPARATOR), "zip");
    assert_eq!(
        flatten_key(
            "zip",
            &["user".to_string(), "address".to_string()],
            FLATTEN_SEPARATOR
        ),
        "user__address__zip"
    );
}

#[test]
fn test_flatten_key_abbreviates_long_ancestors() {
    let parent = "this_is_a_very_long_parent_property_name_that_goes_on_and_on".to_string();
    let child = "another_very_long_child_property_name_that_keeps_going_further";

    let key = flatten_key(child, &[parent.clone(), parent], FLATTEN_SEPARATOR);
    assert!(key.len() < MAX_IDENTIFIER_LENGTH);
    assert!(key.starts_with("tiavlppntgoao__"));
    assert!(key.ends_with(child));
}

#[test]
fn test_flatten_key_short_abbreviation_uses_prefix() {
    let ancestor = "a".repeat(100);
    let key = flatten_key(&"b".repeat(60), &[ancestor], FLATTEN_SEPARATOR);
    assert_eq!(key, format!("aaa__{}", "b".repeat(60)));
}

#[test]
fn test_flatten_key_drops_ancestors_and_truncates_leaf() {
    let ancestors = vec!["x".repeat(10); 20];
    let key = flatten_key(&"leaf".repeat(20), &ancestors, FLATTEN_SEPARATOR);
    assert!(key.len() < MAX_IDENTIFIER_LENGTH);
    assert!(key.ends_with(&"leaf".repeat(20)));

    let key = flatten_key(&"z".repeat(300), &["p".to_string()], FLATTEN_SEPARATOR);
    assert_eq!(key, "z".repeat(126));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_record_accepts_matching_record() {
    let source = schema(json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "price": {"type": ["null", "number"]},
            "created_at": {"type": ["null", "string"], "format": "date-time"},
            "extra": {"type": "super"}
        }
    }));

    let record = object(json!({
        "id": 1,
        "price": 1,
        "created_at": "2024-01-01T10:00:00Z",
        "extra": [1, {"a": 2}],
        "unknown": "ignored"
    }));
    assert!(validate_record(&record, &source).is_ok());
}

#[test]
fn test_validate_record_reports_violations() {
    let source = schema(json!({
        "type": "object",
        "properties": {
            "id": {"type": "integer"},
            "created_at": {"type": ["null", "string"], "format": "date-time"},
            "nested": {
                "type": "object",
                "properties": {"flag": {"type": "boolean"}}
            }
        }
    }));

    let record = object(json!({
        "id": 1.5,
        "created_at": "yesterday",
        "nested": {"flag": "yes"}
    }));
    let violations = validate_record(&record, &source).unwrap_err();

    assert_eq!(violations.len(), 3);
    assert!(violations.contains(&RecordViolation::TypeMismatch {
        field: "id".to_string(),
        expected: vec![JsonType::Integer],
        found: "number",
    }));
    assert!(violations.contains(&RecordViolation::InvalidDateTime {
        field: "created_at".to_string(),
        value: "yesterday".to_string(),
    }));
    assert!(violations
        .iter()
        .any(|v| v.to_string() == "'nested.flag' is string, expected one of [boolean]"));
}
