//! Helper functions for reading schema keywords
//!
//! Each helper extracts one keyword from a JSON schema object, returning
//! `Ok(None)` when it is absent and an `InvalidStructure` error when it has
//! the wrong shape.

use crate::error::{SchemaError, SchemaResult};
use serde_json::{Map, Value};

pub(super) fn invalid(path: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidStructure {
        message: message.into(),
        path: path.to_string(),
    }
}

/// Get a string value by key
pub(super) fn get_string(map: &Map<String, Value>, key: &str, path: &str) -> SchemaResult<Option<String>> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(path, format!("'{key}' must be a string"))),
    }
}

/// Get a number value by key
pub(super) fn get_number(map: &Map<String, Value>, key: &str, path: &str) -> SchemaResult<Option<f64>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(path, format!("'{key}' must be a number"))),
    }
}

/// Get a non-negative integer by key
pub(super) fn get_usize(map: &Map<String, Value>, key: &str, path: &str) -> SchemaResult<Option<usize>> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(path, format!("'{key}' must be a non-negative integer"))),
    }
}

/// Get a boolean by key
pub(super) fn get_bool(map: &Map<String, Value>, key: &str, path: &str) -> SchemaResult<Option<bool>> {
    match map.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(invalid(path, format!("'{key}' must be a boolean"))),
    }
}

/// Get an array of strings by key
pub(super) fn get_string_array(
    map: &Map<String, Value>,
    key: &str,
    path: &str,
) -> SchemaResult<Option<Vec<String>>> {
    let Some(value) = map.get(key) else {
        return Ok(None);
    };
    let items = value
        .as_array()
        .ok_or_else(|| invalid(path, format!("'{key}' must be an array of strings")))?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid(path, format!("'{key}' must be an array of strings")))
        })
        .collect::<SchemaResult<Vec<_>>>()
        .map(Some)
}

/// Human-readable name of a JSON value's type
pub(crate) fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_get_usize_rejects_negative() {
        let map = object(json!({"minItems": -1, "maxItems": 3}));
        assert!(get_usize(&map, "minItems", "#").is_err());
        assert_eq!(get_usize(&map, "maxItems", "#").unwrap(), Some(3));
        assert_eq!(get_usize(&map, "missing", "#").unwrap(), None);
    }

    #[test]
    fn test_get_string_array() {
        let map = object(json!({"required": ["a", "b"], "bad": ["a", 1]}));
        assert_eq!(
            get_string_array(&map, "required", "#").unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert!(get_string_array(&map, "bad", "#").is_err());
    }
}
