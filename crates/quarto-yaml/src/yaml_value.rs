//! Decode YAML text into JSON values with yaml-rust2.
//!
//! Cell options and other YAML that does not need source positions go
//! through here rather than through tree-sitter.

use serde_json::{Map, Number, Value};
use yaml_rust2::{Yaml, YamlLoader};

use crate::Result;

/// Parse the first YAML document in `text` into a JSON value.
///
/// Empty input decodes to `null`.
///
/// # Errors
///
/// Returns [`crate::Error::Syntax`] if the YAML is malformed.
pub fn parse_yaml_value(text: &str) -> Result<Value> {
    let docs = YamlLoader::load_from_str(text)?;
    Ok(docs.first().map_or(Value::Null, yaml_to_json))
}

/// Convert a yaml-rust2 node into a JSON value.
///
/// Mapping keys that are not strings are rendered as their scalar text.
/// Aliases and bad values become `null`.
pub fn yaml_to_json(yaml: &Yaml) -> Value {
    match yaml {
        Yaml::Real(text) => text
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map_or_else(|| Value::String(text.clone()), Value::Number),
        Yaml::Integer(i) => Value::Number((*i).into()),
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Boolean(b) => Value::Bool(*b),
        Yaml::Array(items) => Value::Array(items.iter().map(yaml_to_json).collect()),
        Yaml::Hash(hash) => {
            let mut map = Map::new();
            for (key, value) in hash {
                map.insert(yaml_key(key), yaml_to_json(value));
            }
            Value::Object(map)
        }
        Yaml::Alias(_) | Yaml::Null | Yaml::BadValue => Value::Null,
    }
}

fn yaml_key(key: &Yaml) -> String {
    match key {
        Yaml::String(s) | Yaml::Real(s) => s.clone(),
        Yaml::Integer(i) => i.to_string(),
        Yaml::Boolean(b) => b.to_string(),
        other => match yaml_to_json(other) {
            Value::String(s) => s,
            value => value.to_string(),
        },
    }
}
