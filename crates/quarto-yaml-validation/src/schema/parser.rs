//! Schema parsing entry point
//!
//! Schemas arrive as JSON-Schema-shaped JSON. The type of a schema object is
//! discriminated once, here, in this order:
//! - `$ref`: a reference to a registered schema
//! - `type`: a string, or an array of strings read as `anyOf` those types
//! - `anyOf` / `oneOf` / `allOf`
//! - `enum`: a fixed set of values
//! - otherwise `any`
//!
//! An object carrying more than one of `type`, the combinators and `enum`
//! becomes an `allOf` of each constraint, in that order, with the
//! annotations on the `allOf`.

use crate::error::{SchemaError, SchemaResult};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::Schema;
use super::annotations::parse_annotations;
use super::helpers::{get_bool, get_number, get_string, get_string_array, get_usize, invalid, json_type_name};
use super::types::*;

pub(super) fn from_json(value: &Value) -> SchemaResult<Schema> {
    parse_schema(value, "#")
}

fn parse_schema(value: &Value, path: &str) -> SchemaResult<Schema> {
    match value {
        Value::Bool(true) => Ok(Schema::True),
        Value::Bool(false) => Ok(Schema::False),
        Value::Object(map) => parse_object_form(map, path),
        other => Err(invalid(
            path,
            format!("expected a schema object, got {}", json_type_name(other)),
        )),
    }
}

fn parse_object_form(map: &Map<String, Value>, path: &str) -> SchemaResult<Schema> {
    let annotations = parse_annotations(map, path)?;

    if let Some(reference) = get_string(map, "$ref", path)? {
        return Ok(Schema::Ref(RefSchema {
            annotations,
            reference,
        }));
    }

    let mut parts = Vec::new();
    match map.get("type") {
        Some(Value::String(type_name)) => {
            parts.push(parse_typed(type_name, map, SchemaAnnotations::default(), path)?);
        }
        Some(Value::Array(types)) => {
            let schemas = types
                .iter()
                .map(|t| match t {
                    Value::String(type_name) => {
                        parse_typed(type_name, map, SchemaAnnotations::default(), path)
                    }
                    _ => Err(invalid(path, "'type' entries must be strings")),
                })
                .collect::<SchemaResult<Vec<_>>>()?;
            parts.push(Schema::AnyOf(CombinatorSchema {
                annotations: SchemaAnnotations::default(),
                schemas,
            }));
        }
        Some(_) => return Err(invalid(path, "'type' must be a string or an array")),
        None => {}
    }
    let combinators: [(&str, fn(CombinatorSchema) -> Schema); 3] = [
        ("anyOf", Schema::AnyOf),
        ("oneOf", Schema::OneOf),
        ("allOf", Schema::AllOf),
    ];
    for (key, combinator) in combinators {
        if map.contains_key(key) {
            parts.push(combinator(CombinatorSchema {
                annotations: SchemaAnnotations::default(),
                schemas: parse_schema_list(map, key, path)?,
            }));
        }
    }
    if let Some(values) = map.get("enum") {
        let values = values
            .as_array()
            .ok_or_else(|| invalid(path, "'enum' must be an array"))?;
        parts.push(Schema::Enum(EnumSchema {
            annotations: SchemaAnnotations::default(),
            values: values.clone(),
        }));
    }

    if parts.len() > 1 {
        return Ok(Schema::AllOf(CombinatorSchema {
            annotations,
            schemas: parts,
        }));
    }
    Ok(match parts.pop() {
        Some(schema) => with_annotations(schema, annotations),
        None => Schema::Any(AnySchema { annotations }),
    })
}

fn with_annotations(schema: Schema, annotations: SchemaAnnotations) -> Schema {
    match schema {
        Schema::Any(_) => Schema::Any(AnySchema { annotations }),
        Schema::Boolean(_) => Schema::Boolean(BooleanSchema { annotations }),
        Schema::Null(_) => Schema::Null(NullSchema { annotations }),
        Schema::Number(s) => Schema::Number(NumberSchema { annotations, ..s }),
        Schema::String(s) => Schema::String(StringSchema { annotations, ..s }),
        Schema::Enum(s) => Schema::Enum(EnumSchema { annotations, ..s }),
        Schema::AnyOf(s) => Schema::AnyOf(CombinatorSchema { annotations, ..s }),
        Schema::OneOf(s) => Schema::OneOf(CombinatorSchema { annotations, ..s }),
        Schema::AllOf(s) => Schema::AllOf(CombinatorSchema { annotations, ..s }),
        Schema::Array(s) => Schema::Array(ArraySchema { annotations, ..s }),
        Schema::Object(s) => Schema::Object(ObjectSchema { annotations, ..s }),
        Schema::Ref(s) => Schema::Ref(RefSchema { annotations, ..s }),
        other @ (Schema::True | Schema::False) => other,
    }
}

fn parse_typed(
    type_name: &str,
    map: &Map<String, Value>,
    annotations: SchemaAnnotations,
    path: &str,
) -> SchemaResult<Schema> {
    match type_name {
        "boolean" => Ok(Schema::Boolean(BooleanSchema { annotations })),
        "null" => Ok(Schema::Null(NullSchema { annotations })),
        "any" => Ok(Schema::Any(AnySchema { annotations })),
        "number" | "integer" => Ok(Schema::Number(NumberSchema {
            annotations,
            integer: type_name == "integer",
            minimum: get_number(map, "minimum", path)?,
            maximum: get_number(map, "maximum", path)?,
            exclusive_minimum: get_number(map, "exclusiveMinimum", path)?,
            exclusive_maximum: get_number(map, "exclusiveMaximum", path)?,
        })),
        "string" => Ok(Schema::String(StringSchema {
            annotations,
            min_length: get_usize(map, "minLength", path)?,
            max_length: get_usize(map, "maxLength", path)?,
            pattern: get_string(map, "pattern", path)?
                .map(|pattern| compile_pattern(&pattern, path))
                .transpose()?,
        })),
        "array" => parse_array(map, annotations, path),
        "object" => parse_object(map, annotations, path),
        other => Err(SchemaError::InvalidType(other.to_string())),
    }
}

fn parse_array(
    map: &Map<String, Value>,
    annotations: SchemaAnnotations,
    path: &str,
) -> SchemaResult<Schema> {
    let items = match map.get("items") {
        None => None,
        Some(items @ (Value::Object(_) | Value::Bool(_))) => {
            Some(Box::new(parse_schema(items, &format!("{path}/items"))?))
        }
        Some(_) => return Err(invalid(path, "'items' must be a single schema")),
    };
    Ok(Schema::Array(ArraySchema {
        annotations,
        items,
        min_items: get_usize(map, "minItems", path)?,
        max_items: get_usize(map, "maxItems", path)?,
    }))
}

fn parse_object(
    map: &Map<String, Value>,
    annotations: SchemaAnnotations,
    path: &str,
) -> SchemaResult<Schema> {
    let mut properties = BTreeMap::new();
    if let Some(props) = map.get("properties") {
        let props = props
            .as_object()
            .ok_or_else(|| invalid(path, "'properties' must be an object"))?;
        for (key, value) in props {
            let prop_path = format!("{path}/properties/{key}");
            properties.insert(key.clone(), parse_schema(value, &prop_path)?);
        }
    }

    let mut pattern_properties = Vec::new();
    if let Some(patterns) = map.get("patternProperties") {
        let patterns = patterns
            .as_object()
            .ok_or_else(|| invalid(path, "'patternProperties' must be an object"))?;
        for (pattern, value) in patterns {
            let prop_path = format!("{path}/patternProperties/{pattern}");
            pattern_properties.push(PatternProperty {
                pattern: compile_pattern(pattern, &prop_path)?,
                schema: parse_schema(value, &prop_path)?,
            });
        }
    }

    let additional_properties = match map.get("additionalProperties") {
        None | Some(Value::Bool(true)) => None,
        Some(value) => Some(Box::new(parse_schema(
            value,
            &format!("{path}/additionalProperties"),
        )?)),
    };

    let property_names = map
        .get("propertyNames")
        .map(|value| parse_schema(value, &format!("{path}/propertyNames")))
        .transpose()?
        .map(Box::new);

    Ok(Schema::Object(ObjectSchema {
        annotations,
        properties,
        pattern_properties,
        additional_properties,
        required: get_string_array(map, "required", path)?.unwrap_or_default(),
        property_names,
        closed: get_bool(map, "closed", path)?.unwrap_or(false),
    }))
}

fn parse_schema_list(map: &Map<String, Value>, key: &str, path: &str) -> SchemaResult<Vec<Schema>> {
    let items = map
        .get(key)
        .and_then(Value::as_array)
        .ok_or_else(|| invalid(path, format!("'{key}' must be an array of schemas")))?;
    items
        .iter()
        .enumerate()
        .map(|(ix, item)| parse_schema(item, &format!("{path}/{key}/{ix}")))
        .collect()
}

fn compile_pattern(pattern: &str, path: &str) -> SchemaResult<Regex> {
    Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        pattern: pattern.to_string(),
        path: path.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_schemas() {
        assert!(matches!(from_json(&json!(true)).unwrap(), Schema::True));
        assert!(matches!(from_json(&json!(false)).unwrap(), Schema::False));
    }

    #[test]
    fn test_discrimination_order() {
        let s = from_json(&json!({"$ref": "x", "type": "string"})).unwrap();
        assert_eq!(s.schema_type(), "ref");

        let s = from_json(&json!({"enum": ["a", "b"]})).unwrap();
        assert_eq!(s.schema_type(), "enum");

        let s = from_json(&json!({"anyOf": [{"type": "string"}]})).unwrap();
        assert_eq!(s.schema_type(), "anyOf");

        let s = from_json(&json!({"oneOf": [{"type": "string"}]})).unwrap();
        assert_eq!(s.schema_type(), "oneOf");

        let s = from_json(&json!({"allOf": [{"type": "string"}]})).unwrap();
        assert_eq!(s.schema_type(), "allOf");

        let s = from_json(&json!({"description": "anything"})).unwrap();
        assert_eq!(s.schema_type(), "any");
    }

    #[test]
    fn test_type_array_becomes_any_of() {
        let s = from_json(&json!({"type": ["string", "null"], "description": "be text"})).unwrap();
        let Schema::AnyOf(any_of) = &s else {
            panic!("expected anyOf, got {}", s.schema_type());
        };
        assert_eq!(any_of.schemas.len(), 2);
        assert_eq!(any_of.schemas[0].schema_type(), "string");
        assert_eq!(any_of.schemas[1].schema_type(), "null");
        assert_eq!(s.annotations().description.as_deref(), Some("be text"));
    }

    #[test]
    fn test_type_with_other_constraints_becomes_all_of() {
        let s = from_json(&json!({
            "type": "string",
            "enum": ["a", "b"],
            "anyOf": [{"pattern": "^a"}],
            "description": "be a letter"
        }))
        .unwrap();
        let Schema::AllOf(all_of) = &s else {
            panic!("expected allOf, got {}", s.schema_type());
        };
        let kinds: Vec<_> = all_of.schemas.iter().map(Schema::schema_type).collect();
        assert_eq!(kinds, vec!["string", "anyOf", "enum"]);
        assert_eq!(s.annotations().description.as_deref(), Some("be a letter"));
        assert!(all_of.schemas[0].annotations().description.is_none());
    }

    #[test]
    fn test_object_schema() {
        let s = from_json(&json!({
            "type": "object",
            "properties": {"title": {"type": "string"}},
            "patternProperties": {"^x-": {"type": "number"}},
            "additionalProperties": false,
            "required": ["title"],
            "propertyNames": {"type": "string", "pattern": "^[a-z-]+$"}
        }))
        .unwrap();
        let Schema::Object(obj) = s else {
            panic!("expected object");
        };
        assert!(obj.properties.contains_key("title"));
        assert!(obj.is_known_property("x-foo"));
        assert!(!obj.is_known_property("other"));
        assert!(matches!(obj.additional_properties.as_deref(), Some(Schema::False)));
        assert_eq!(obj.required, vec!["title".to_string()]);
        assert!(obj.property_names.is_some());
    }

    #[test]
    fn test_additional_properties_true_is_open() {
        let s = from_json(&json!({"type": "object", "additionalProperties": true})).unwrap();
        let Schema::Object(obj) = s else {
            panic!("expected object");
        };
        assert!(obj.additional_properties.is_none());
    }

    #[test]
    fn test_integer() {
        let s = from_json(&json!({"type": "integer", "minimum": 1})).unwrap();
        assert_eq!(s.schema_type(), "integer");
        let Schema::Number(n) = s else {
            panic!("expected number");
        };
        assert!(n.integer);
        assert_eq!(n.minimum, Some(1.0));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            from_json(&json!({"type": "date"})),
            Err(SchemaError::InvalidType(t)) if t == "date"
        ));
        assert!(matches!(
            from_json(&json!({"type": "string", "pattern": "("})),
            Err(SchemaError::InvalidPattern { .. })
        ));
        assert!(matches!(
            from_json(&json!("string")),
            Err(SchemaError::InvalidStructure { .. })
        ));
        let err = from_json(&json!({"type": "object", "properties": {"a": 3}})).unwrap_err();
        assert!(err.to_string().contains("#/properties/a"));
    }
}
