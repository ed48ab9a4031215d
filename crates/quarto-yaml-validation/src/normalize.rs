//! Stripping editor-only keywords before a schema reaches a validator.

use serde_json::{Map, Value};

/// Annotations only editors read; a standards validator would reject or
/// misread them.
const EDITOR_ONLY_KEYWORDS: &[&str] = &[
    "completions",
    "exhaustiveCompletions",
    "documentation",
    "tags",
    "hidden",
];

/// Keywords whose value is a single subschema.
const SUBSCHEMA_KEYWORDS: &[&str] = &["items", "additionalProperties", "propertyNames", "not"];

/// Keywords whose value is an array of subschemas.
const SUBSCHEMA_LIST_KEYWORDS: &[&str] = &["anyOf", "oneOf", "allOf"];

/// Keywords whose value maps names to subschemas.
const SUBSCHEMA_MAP_KEYWORDS: &[&str] = &["properties", "patternProperties", "definitions", "$defs"];

/// Return a copy of `schema` without editor-only keywords.
///
/// Only schema positions are rewritten: a property that happens to be named
/// `completions` is kept. Normalizing twice gives the same result as
/// normalizing once.
pub fn normalize_schema(schema: &Value) -> Value {
    let mut normalized = schema.clone();
    normalize_in_place(&mut normalized);
    normalized
}

fn normalize_in_place(schema: &mut Value) {
    let Value::Object(map) = schema else {
        return;
    };
    for keyword in EDITOR_ONLY_KEYWORDS {
        map.remove(*keyword);
    }
    for keyword in SUBSCHEMA_KEYWORDS {
        if let Some(sub) = map.get_mut(*keyword) {
            normalize_subschemas(sub);
        }
    }
    for keyword in SUBSCHEMA_LIST_KEYWORDS {
        if let Some(Value::Array(subs)) = map.get_mut(*keyword) {
            subs.iter_mut().for_each(normalize_in_place);
        }
    }
    for keyword in SUBSCHEMA_MAP_KEYWORDS {
        if let Some(Value::Object(subs)) = map.get_mut(*keyword) {
            normalize_map(subs);
        }
    }
}

// `items` may also be written as a tuple of schemas.
fn normalize_subschemas(value: &mut Value) {
    match value {
        Value::Array(subs) => subs.iter_mut().for_each(normalize_in_place),
        other => normalize_in_place(other),
    }
}

fn normalize_map(subs: &mut Map<String, Value>) {
    subs.values_mut().for_each(normalize_in_place);
}
