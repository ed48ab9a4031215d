//! Schema annotation parsing
//!
//! Annotations are the keywords every schema may carry regardless of its
//! type (description, documentation, completions, ...).

use crate::error::SchemaResult;
use serde_json::{Map, Value};

use super::helpers::{get_bool, get_string, get_string_array, invalid};
use super::types::{Documentation, SchemaAnnotations};

/// Static empty annotations for False and True schemas
pub(super) static EMPTY_ANNOTATIONS: SchemaAnnotations = SchemaAnnotations {
    id: None,
    description: None,
    documentation: None,
    error_message: None,
    hidden: None,
    completions: None,
    exhaustive_completions: None,
    tags: None,
};

/// Parse common annotations from a schema object
pub(super) fn parse_annotations(map: &Map<String, Value>, path: &str) -> SchemaResult<SchemaAnnotations> {
    Ok(SchemaAnnotations {
        id: get_string(map, "$id", path)?,
        description: parse_description(map, path)?,
        documentation: parse_documentation(map, path)?,
        error_message: get_string(map, "errorMessage", path)?,
        hidden: get_bool(map, "hidden", path)?,
        completions: get_string_array(map, "completions", path)?,
        exhaustive_completions: get_bool(map, "exhaustiveCompletions", path)?,
        tags: parse_tags(map, path)?,
    })
}

// Descriptions are occasionally written in the {short, long} form.
fn parse_description(map: &Map<String, Value>, path: &str) -> SchemaResult<Option<String>> {
    match map.get("description") {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(value @ Value::Object(_)) => {
            let doc = documentation_from(value, path)?;
            Ok(doc.short().map(str::to_string))
        }
        Some(_) => Err(invalid(path, "'description' must be a string")),
    }
}

fn parse_documentation(map: &Map<String, Value>, path: &str) -> SchemaResult<Option<Documentation>> {
    map.get("documentation")
        .map(|value| documentation_from(value, path))
        .transpose()
}

fn documentation_from(value: &Value, path: &str) -> SchemaResult<Documentation> {
    serde_json::from_value(value.clone())
        .map_err(|_| invalid(path, "documentation must be a string or {short, long}"))
}

fn parse_tags(
    map: &Map<String, Value>,
    path: &str,
) -> SchemaResult<Option<std::collections::HashMap<String, Value>>> {
    match map.get("tags") {
        None => Ok(None),
        Some(Value::Object(tags)) => Ok(Some(
            tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        )),
        Some(_) => Err(invalid(path, "'tags' must be an object")),
    }
}
