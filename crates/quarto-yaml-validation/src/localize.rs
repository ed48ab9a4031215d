//! Reducing raw validator errors to a few located, readable ones.
//!
//! A JSON-Schema validator reports every failed keyword on the way down,
//! including the combinators that merely failed because a branch did. The
//! narrowing here is a pure function iterated to a fixed point:
//!
//! 1. errors on a value are dropped when one of its descendants has errors;
//! 2. among errors on the same value, an error whose schema path is a prefix
//!    of another's is dropped;
//! 3. `additionalProperties` errors move onto the offending key
//!    (`_custom_invalidProperty`), and a `oneOf` error is replaced by the
//!    errors of those branches that failed only on unknown keys.

use std::collections::HashSet;

use quarto_source_map::{MappedText, index_to_line_col};
use quarto_yaml::AnnotatedParse;
use serde_json::Value;
use tracing::debug;

use crate::error::{
    RawValidationError, SchemaResult, ValidationError, escape_pointer_segment, pointer_segments,
};
use crate::improve::improve_errors;
use crate::navigation::schema_path_chain;
use crate::schema::{Schema, SchemaRegistry};

/// Keyword of an error reported on an object key that the schema forbids.
pub const INVALID_PROPERTY_KEYWORD: &str = "_custom_invalidProperty";

/// Rounds of narrowing before giving up on reaching a fixed point.
const MAX_NARROWING_ROUNDS: usize = 32;

/// A raw error that survived narrowing.
#[derive(Debug, Clone, PartialEq)]
pub struct NarrowedError {
    pub error: RawValidationError,
    /// Report on the key node of the last instance path segment rather than
    /// on its value
    pub on_key: bool,
}

impl From<RawValidationError> for NarrowedError {
    fn from(error: RawValidationError) -> Self {
        NarrowedError { error, on_key: false }
    }
}

/// Steps 1 to 3: prune and rewrite raw errors until nothing changes.
pub fn narrow_errors(errors: Vec<RawValidationError>) -> Vec<NarrowedError> {
    let mut current: Vec<NarrowedError> = errors.into_iter().map(Into::into).collect();
    for round in 0..MAX_NARROWING_ROUNDS {
        let (rewritten, changed) = rewrite_keywords(current);
        current = prune_by_schema_path(prune_by_instance_path(rewritten));
        if !changed {
            debug!(rounds = round + 1, errors = current.len(), "narrowed validation errors");
            return current;
        }
    }
    current
}

fn is_strict_prefix(prefix: &[String], path: &[String]) -> bool {
    prefix.len() < path.len() && path.starts_with(prefix)
}

/// Split `base#/a/b` into `("base", ["a", "b"])`.
fn schema_path_parts(schema_path: &str) -> (&str, Vec<String>) {
    match schema_path.split_once('#') {
        Some((base, pointer)) => (base, pointer_segments(pointer)),
        None => ("", pointer_segments(schema_path)),
    }
}

fn prune_by_instance_path(errors: Vec<NarrowedError>) -> Vec<NarrowedError> {
    let paths: Vec<Vec<String>> = errors.iter().map(|e| e.error.instance_segments()).collect();
    errors
        .into_iter()
        .zip(&paths)
        .filter(|(_, path)| !paths.iter().any(|other| is_strict_prefix(path, other)))
        .map(|(error, _)| error)
        .collect()
}

fn prune_by_schema_path(errors: Vec<NarrowedError>) -> Vec<NarrowedError> {
    let keys: Vec<(&str, &str, Vec<String>)> = errors
        .iter()
        .map(|e| {
            let (base, segments) = schema_path_parts(&e.error.schema_path);
            (e.error.instance_path.as_str(), base, segments)
        })
        .collect();
    let keep: Vec<bool> = keys
        .iter()
        .map(|(instance, base, segments)| {
            !keys.iter().any(|(other_instance, other_base, other_segments)| {
                instance == other_instance
                    && base == other_base
                    && is_strict_prefix(segments, other_segments)
            })
        })
        .collect();
    errors
        .into_iter()
        .zip(keep)
        .filter_map(|(error, keep)| keep.then_some(error))
        .collect()
}

/// Step 3. Returns whether anything was rewritten.
fn rewrite_keywords(errors: Vec<NarrowedError>) -> (Vec<NarrowedError>, bool) {
    let mut changed = false;
    let mut errors = narrow_one_of(errors, &mut changed);

    for e in errors.iter_mut() {
        if e.error.keyword != "additionalProperties" {
            continue;
        }
        let Some(key) = e.error.params.get("additionalProperty").and_then(Value::as_str) else {
            continue;
        };
        e.error.instance_path = format!("{}/{}", e.error.instance_path, escape_pointer_segment(key));
        e.error.keyword = INVALID_PROPERTY_KEYWORD.to_string();
        e.on_key = true;
        changed = true;
    }
    (errors, changed)
}

/// Replace innermost `oneOf` errors by the errors of their branches that
/// failed only with `additionalProperties`.
///
/// A `oneOf` whose failing branches all failed for other reasons is left
/// alone. Nested `oneOf`s are handled innermost first, one level per round.
fn narrow_one_of(errors: Vec<NarrowedError>, changed: &mut bool) -> Vec<NarrowedError> {
    let parts: Vec<(&str, Vec<String>)> = errors
        .iter()
        .map(|e| schema_path_parts(&e.error.schema_path))
        .collect();

    let mut dropped = vec![false; errors.len()];
    for (ix, e) in errors.iter().enumerate() {
        if e.error.keyword != "oneOf" || dropped[ix] {
            continue;
        }
        let (base, segments) = &parts[ix];
        let below = |other: usize| {
            other != ix && parts[other].0 == *base && is_strict_prefix(segments, &parts[other].1)
        };
        let nested_one_of = (0..errors.len()).any(|o| below(o) && errors[o].error.keyword == "oneOf");
        if nested_one_of {
            continue;
        }

        // Branch errors grouped by the branch index following `oneOf`.
        let branch_of = |other: usize| parts[other].1.get(segments.len()).cloned();
        let mut branches: Vec<(String, Vec<usize>)> = Vec::new();
        for other in (0..errors.len()).filter(|&o| below(o)) {
            let Some(branch) = branch_of(other) else { continue };
            match branches.iter_mut().find(|(b, _)| *b == branch) {
                Some((_, members)) => members.push(other),
                None => branches.push((branch, vec![other])),
            }
        }

        let unknown_key_branches: Vec<&Vec<usize>> = branches
            .iter()
            .map(|(_, members)| members)
            .filter(|members| {
                members
                    .iter()
                    .all(|&m| errors[m].error.keyword == "additionalProperties")
            })
            .collect();
        if unknown_key_branches.is_empty() {
            continue;
        }

        dropped[ix] = true;
        for (_, members) in &branches {
            let keep = unknown_key_branches.iter().any(|kept| std::ptr::eq(*kept, members));
            if !keep {
                for &m in members {
                    dropped[m] = true;
                }
            }
        }
        *changed = true;
    }

    errors
        .into_iter()
        .zip(dropped)
        .filter_map(|(error, dropped)| (!dropped).then_some(error))
        .collect()
}

/// Steps 4 and 5: attach each narrowed error to its node in `annotation`,
/// describe it using `schema`, then sort by position. Details and hints
/// come from [`improve_errors`].
///
/// Errors repeating an earlier one's instance path, schema path and keyword
/// are dropped; distinct errors sharing a span are all kept.
pub fn localize_errors(
    raw: Vec<RawValidationError>,
    annotation: &AnnotatedParse,
    source: &MappedText,
    schema: &Schema,
    registry: &SchemaRegistry,
) -> SchemaResult<Vec<ValidationError>> {
    let mut localized = Vec::new();
    for narrowed in narrow_errors(raw) {
        localized.push(localize_one(narrowed, annotation, source, schema, registry)?);
    }
    localized.sort_by_key(|e| (e.violating_object.start, e.violating_object.end));
    let mut seen = HashSet::new();
    localized.retain(|e| {
        seen.insert((
            e.error.instance_path.clone(),
            e.error.schema_path.clone(),
            e.error.keyword.clone(),
        ))
    });
    improve_errors(&mut localized, schema, registry);
    Ok(localized)
}

fn localize_one(
    narrowed: NarrowedError,
    annotation: &AnnotatedParse,
    source: &MappedText,
    schema: &Schema,
    registry: &SchemaRegistry,
) -> SchemaResult<ValidationError> {
    let NarrowedError { error, on_key } = narrowed;
    let path = error.instance_segments();
    let violating_object = annotation.navigate(&path, on_key).clone();

    let description = describe(&error, schema, registry)?;
    let field = if error.instance_path.is_empty() {
        "(top-level)"
    } else {
        error.instance_path.as_str()
    };
    let message_no_location = format!("Field {field} must {description}");

    let original = source.original();
    let start = index_to_line_col(original, violating_object.start);
    let end = index_to_line_col(original, violating_object.end);
    let location = if start.row == end.row {
        format!(
            "(line {}, columns {}--{})",
            start.row + 1,
            start.column + 1,
            end.column + 1
        )
    } else {
        format!(
            "(line {}, column {} through line {}, column {})",
            start.row + 1,
            start.column + 1,
            end.row + 1,
            end.column + 1
        )
    };

    Ok(ValidationError {
        instance_path: error.instance_path.clone(),
        violating_object,
        message: format!("{location}: {message_no_location}"),
        message_no_location,
        source: source.clone(),
        start,
        end,
        error,
        details: Vec::new(),
        hints: Vec::new(),
    })
}

/// Text completing "Field <path> must ...".
///
/// Errors about the value itself prefer the nearest `errorMessage`, then the
/// nearest `description`, among the schemas describing that value. Errors
/// about keys (missing, unknown, or badly named properties) are always
/// described from the keyword.
fn describe(error: &RawValidationError, schema: &Schema, registry: &SchemaRegistry) -> SchemaResult<String> {
    if is_key_keyword(&error.keyword) {
        return Ok(keyword_description(error));
    }
    let chain = schema_path_chain(schema, keyword_parent(&error.schema_path), registry)?;
    let annotated = chain
        .iter()
        .rev()
        .find_map(|s| s.annotations().error_message.clone())
        .or_else(|| {
            chain
                .iter()
                .rev()
                .find_map(|s| s.annotations().description.clone())
        });
    Ok(annotated.unwrap_or_else(|| keyword_description(error)))
}

fn is_key_keyword(keyword: &str) -> bool {
    matches!(
        keyword,
        "required" | "additionalProperties" | "propertyNames" | INVALID_PROPERTY_KEYWORD
    )
}

/// The schema path without its final keyword segment.
pub(crate) fn keyword_parent(schema_path: &str) -> &str {
    match schema_path.rsplit_once('/') {
        Some((parent, _)) if parent.contains('#') => parent,
        _ => schema_path,
    }
}

fn keyword_description(error: &RawValidationError) -> String {
    let param = |name: &str| error.params.get(name).cloned().unwrap_or(Value::Null);
    let text = |value: Value| match value {
        Value::String(s) => s,
        other => other.to_string(),
    };
    match error.keyword.as_str() {
        "type" => type_phrase(&text(param("type"))),
        "enum" => {
            let allowed = match param("allowedValues") {
                Value::Array(values) => values.into_iter().map(text).collect::<Vec<_>>().join(", "),
                other => text(other),
            };
            format!("be one of: {allowed}")
        }
        "required" => format!("have required property '{}'", text(param("missingProperty"))),
        INVALID_PROPERTY_KEYWORD | "additionalProperties" => "not be present (unknown property)".to_string(),
        "propertyNames" => format!("not use '{}' as a property name", text(param("propertyName"))),
        "pattern" => format!("match the pattern {}", text(param("pattern"))),
        "minimum" | "maximum" | "exclusiveMinimum" | "exclusiveMaximum" => format!(
            "be {} {}",
            text(param("comparison")),
            text(param("limit"))
        ),
        "minItems" => format!("have at least {} items", text(param("limit"))),
        "maxItems" => format!("have at most {} items", text(param("limit"))),
        "minLength" => format!("have at least {} characters", text(param("limit"))),
        "maxLength" => format!("have at most {} characters", text(param("limit"))),
        "oneOf" => "match exactly one of the allowed schemas".to_string(),
        "anyOf" => "match one of the allowed schemas".to_string(),
        "false schema" => "not be present".to_string(),
        _ => error.message.trim_start_matches("must ").to_string(),
    }
}

fn type_phrase(type_name: &str) -> String {
    match type_name {
        "object" | "array" | "integer" => format!("be an {type_name}"),
        "null" => "be null".to_string(),
        other => format!("be a {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(instance_path: &str, schema_path: &str, keyword: &str, params: Value) -> RawValidationError {
        RawValidationError {
            instance_path: instance_path.to_string(),
            schema_path: schema_path.to_string(),
            keyword: keyword.to_string(),
            params,
            message: String::new(),
        }
    }

    fn summary(errors: &[NarrowedError]) -> Vec<(&str, &str, bool)> {
        errors
            .iter()
            .map(|e| (e.error.instance_path.as_str(), e.error.keyword.as_str(), e.on_key))
            .collect()
    }

    #[test]
    fn test_children_supersede_parents() {
        let errors = narrow_errors(vec![
            raw("", "#/required", "required", json!({"missingProperty": "x"})),
            raw("/a", "#/properties/a/type", "type", json!({"type": "string"})),
        ]);
        assert_eq!(summary(&errors), vec![("/a", "type", false)]);
    }

    #[test]
    fn test_instance_prefix_is_segment_wise() {
        let errors = narrow_errors(vec![
            raw("/a", "#/properties/a/type", "type", json!({})),
            raw("/ab", "#/properties/ab/type", "type", json!({})),
        ]);
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn test_specific_schema_paths_supersede_combinators() {
        let errors = narrow_errors(vec![
            raw("/a", "#/properties/a/anyOf/0/type", "type", json!({})),
            raw("/a", "#/properties/a/anyOf/1/type", "type", json!({})),
            raw("/a", "#/properties/a/anyOf", "anyOf", json!({})),
        ]);
        assert_eq!(summary(&errors), vec![("/a", "type", false), ("/a", "type", false)]);
    }

    #[test]
    fn test_additional_properties_move_to_the_key() {
        let errors = narrow_errors(vec![
            raw("/a", "#/properties/a/type", "type", json!({})),
            raw("", "#/additionalProperties", "additionalProperties", json!({"additionalProperty": "b"})),
        ]);
        assert_eq!(
            summary(&errors),
            vec![("/a", "type", false), ("/b", INVALID_PROPERTY_KEYWORD, true)]
        );
    }

    #[test]
    fn test_one_of_keeps_unknown_key_branches() {
        let errors = narrow_errors(vec![
            raw("/format", "#/properties/format/oneOf/0/type", "type", json!({"type": "string"})),
            raw(
                "/format",
                "#/properties/format/oneOf/1/additionalProperties",
                "additionalProperties",
                json!({"additionalProperty": "htm"}),
            ),
            raw("/format", "#/properties/format/oneOf", "oneOf", json!({"passingSchemas": null})),
        ]);
        assert_eq!(summary(&errors), vec![("/format/htm", INVALID_PROPERTY_KEYWORD, true)]);
    }

    #[test]
    fn test_one_of_with_mixed_failures_is_not_narrowed() {
        let errors = narrow_errors(vec![
            raw("/x", "#/properties/x/oneOf/0/type", "type", json!({})),
            raw("/x", "#/properties/x/oneOf/1/enum", "enum", json!({})),
            raw("/x", "#/properties/x/oneOf", "oneOf", json!({})),
        ]);
        // Only the generic prefix pruning applies.
        assert_eq!(summary(&errors), vec![("/x", "type", false), ("/x", "enum", false)]);
    }

    #[test]
    fn test_narrowing_is_deterministic() {
        let input = vec![
            raw("", "#/additionalProperties", "additionalProperties", json!({"additionalProperty": "z"})),
            raw("/a", "#/properties/a/type", "type", json!({})),
        ];
        assert_eq!(narrow_errors(input.clone()), narrow_errors(input));
    }

    #[test]
    fn test_keyword_parent() {
        assert_eq!(keyword_parent("#/properties/a/type"), "#/properties/a");
        assert_eq!(keyword_parent("#/type"), "#");
        assert_eq!(keyword_parent("#"), "#");
        assert_eq!(keyword_parent("author#/anyOf"), "author#");
    }

    #[test]
    fn test_keyword_descriptions() {
        assert_eq!(keyword_description(&raw("", "#/type", "type", json!({"type": "object"}))), "be an object");
        assert_eq!(keyword_description(&raw("", "#/type", "type", json!({"type": "string"}))), "be a string");
        assert_eq!(
            keyword_description(&raw("", "#/enum", "enum", json!({"allowedValues": ["a", 1]}))),
            "be one of: a, 1"
        );
        assert_eq!(
            keyword_description(&raw("", "#/minimum", "minimum", json!({"comparison": ">=", "limit": 1.0}))),
            "be >= 1.0"
        );
    }
}
