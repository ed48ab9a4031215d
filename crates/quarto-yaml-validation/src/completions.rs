//! Completion candidates derived from schemas.

use crate::error::SchemaResult;
use crate::schema::{Schema, SchemaRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// Whether a completion fills in a mapping key or a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Key,
    Value,
}

/// One completion candidate.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    #[serde(rename = "type")]
    pub kind: CompletionKind,
    pub display: String,
    pub value: String,
    pub description: String,
    /// Ask the editor to immediately offer completions after this one is
    /// accepted
    pub suggest_on_accept: bool,
    /// The schema that produced this completion (for keys, the schema of the
    /// property's value)
    #[serde(skip)]
    pub schema: Schema,
}

impl Completion {
    fn value_completion(value: impl Into<String>, schema: &Schema) -> Self {
        let value = value.into();
        Completion {
            kind: CompletionKind::Value,
            display: value.clone(),
            value,
            description: String::new(),
            suggest_on_accept: false,
            schema: schema.clone(),
        }
    }
}

/// The completions a schema offers for the value it describes.
///
/// A schema's own `completions` (or a `completions` tag) win. Otherwise
/// arrays offer their items' completions, combinators the union of their
/// alternatives', objects one key completion per visible property, enums
/// their values and booleans `true`/`false`. Hidden schemas offer nothing.
pub fn schema_completions(schema: &Schema, registry: &SchemaRegistry) -> SchemaResult<Vec<Completion>> {
    let mut visiting = HashSet::new();
    completions_inner(schema, registry, &mut visiting)
}

fn completions_inner<'a>(
    schema: &'a Schema,
    registry: &'a SchemaRegistry,
    visiting: &mut HashSet<&'a str>,
) -> SchemaResult<Vec<Completion>> {
    if schema.is_hidden() {
        return Ok(vec![]);
    }

    if let Some(own) = own_completions(schema) {
        return Ok(own
            .into_iter()
            .map(|c| Completion::value_completion(c, schema))
            .collect());
    }

    match schema {
        Schema::Ref(r) => {
            // A reference reached again while expanding itself adds nothing.
            if !visiting.insert(r.reference.as_str()) {
                return Ok(vec![]);
            }
            let resolved = registry.resolve(&r.reference)?;
            let result = completions_inner(resolved, registry, visiting);
            visiting.remove(r.reference.as_str());
            result
        }
        Schema::Array(arr) => match &arr.items {
            Some(items) => completions_inner(items, registry, visiting),
            None => Ok(vec![]),
        },
        Schema::AnyOf(s) | Schema::OneOf(s) | Schema::AllOf(s) => {
            let mut result = Vec::new();
            for alternative in &s.schemas {
                result.extend(completions_inner(alternative, registry, visiting)?);
            }
            Ok(result)
        }
        Schema::Object(obj) => Ok(obj
            .properties
            .iter()
            .filter(|(_, property)| !property.is_hidden())
            .map(|(key, property)| Completion {
                kind: CompletionKind::Key,
                display: key.clone(),
                value: format!("{key}: "),
                description: property_description(property, registry),
                suggest_on_accept: true,
                schema: property.clone(),
            })
            .collect()),
        Schema::Enum(e) => Ok(e
            .values
            .iter()
            .map(|v| Completion::value_completion(enum_text(v), schema))
            .collect()),
        Schema::Boolean(_) => Ok(["true", "false"]
            .into_iter()
            .map(|v| Completion::value_completion(v, schema))
            .collect()),
        _ => Ok(vec![]),
    }
}

fn own_completions(schema: &Schema) -> Option<Vec<String>> {
    let annotations = schema.annotations();
    if let Some(completions) = annotations.completions.as_ref().filter(|c| !c.is_empty()) {
        return Some(completions.clone());
    }
    let tagged = annotations.tags.as_ref()?.get("completions")?.as_array()?;
    let tagged: Vec<String> = tagged
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect();
    (!tagged.is_empty()).then_some(tagged)
}

/// The short documentation of a property, looking through references.
fn property_description(property: &Schema, registry: &SchemaRegistry) -> String {
    let documented = |s: &Schema| {
        s.annotations()
            .documentation
            .as_ref()
            .and_then(|d| d.short())
            .map(str::to_string)
    };
    documented(property)
        .or_else(|| registry.deref(property).ok().and_then(documented))
        .unwrap_or_default()
}

fn enum_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
