//! Completions for the cursor position in one YAML buffer.

use std::collections::{BTreeSet, HashSet};

use quarto_source_map::{Position, line_col_to_offset};
use quarto_yaml::{
    PathSegment, YamlParser, attempt_parses_at_line, build_annotated, locate_cursor,
    locate_from_indentation,
};
use quarto_yaml_validation::{
    Completion, CompletionKind, Schema, SchemaRegistry, SchemaResult, YamlSchema, navigate_schema,
    schema_completions,
};
use serde_json::Value;
use tracing::debug;

use crate::automation::YamlRequest;
use crate::error::Result;
use crate::types::CompletionResult;

/// Bound on nested arrays and references followed while classifying a
/// schema.
const MAX_SHAPE_DEPTH: usize = 16;

/// What the cursor is completing and how to format it.
struct Target<'a> {
    schema: &'a YamlSchema,
    word: String,
    indent: usize,
    comment_prefix: &'a str,
    /// The character before the cursor is `:`
    after_colon: bool,
}

/// Completions at `request.position`.
///
/// The path to the cursor comes from the first parse that builds an
/// annotation. On a whitespace-only line, or when the cursor cannot be
/// placed in the annotation, it is inferred from indentation instead.
pub(crate) fn complete_parse(
    schema: &YamlSchema,
    parser: &mut YamlParser,
    request: &YamlRequest,
) -> Result<CompletionResult> {
    let line = request.line.as_str();
    let position = request.position;
    let word = if line.ends_with(':') {
        ""
    } else {
        line.rsplit(' ').next().unwrap_or_default()
    };
    let mut target = Target {
        schema,
        word: word.to_string(),
        indent: line.len(),
        comment_prefix: &request.comment_prefix,
        after_colon: position
            .column
            .checked_sub(1)
            .and_then(|ix| line.as_bytes().get(ix))
            == Some(&b':'),
    };

    if line.trim().is_empty() {
        let path = locate_from_indentation(request.code.value(), line, position);
        return Ok(completions(&target, path, Some(CompletionKind::Key))?);
    }
    target.indent = line.trim_end().len() - line.trim().len();

    // a cursor in trailing whitespace completes at the end of the text
    let trimmed = line.trim_end();
    let trailing_whitespace = if position.column > trimmed.len() {
        line.len() - trimmed.len()
    } else {
        0
    };

    for attempt in attempt_parses_at_line(parser, &request.code, position) {
        let kept = drop_last_chars(line, attempt.deletions);
        let column = position.column.saturating_sub(line.len() - kept.len());
        let kept_position = Position::new(position.row, column);

        if kept.trim().is_empty() {
            let path = locate_from_indentation(attempt.code.value(), kept, kept_position);
            return Ok(completions(&target, path, Some(CompletionKind::Key))?);
        }

        let Some(annotation) = build_annotated(&attempt.tree, &attempt.code)? else {
            continue;
        };
        let Some(index) = line_col_to_offset(
            attempt.code.value(),
            position.row,
            column.saturating_sub(trailing_whitespace),
        ) else {
            continue;
        };
        let offset = attempt.code.map_closest(index).unwrap_or(index);

        let location = locate_cursor(&annotation, offset)?;
        let mut path = if location.with_error {
            locate_from_indentation(attempt.code.value(), kept, kept_position)
        } else {
            location.path
        };
        // the cursor sits on the word being completed ("echo: fal")
        if path.last().is_some_and(|last| last.as_key() == target.word) {
            path.pop();
        }
        debug!(deletions = attempt.deletions, path = ?path, "located cursor");

        let on_value = line.contains(':');
        let kind = if on_value {
            Some(CompletionKind::Value)
        } else if !line.contains('-') {
            Some(CompletionKind::Key)
        } else {
            None
        };
        let mut result = completions(&target, path, kind)?;
        if on_value {
            for completion in &mut result.completions {
                completion.suggest_on_accept = false;
            }
        }
        return Ok(result);
    }

    Ok(CompletionResult::empty())
}

/// `text` without its last `count` characters.
fn drop_last_chars(text: &str, count: usize) -> &str {
    if count == 0 {
        return text;
    }
    match text.char_indices().nth_back(count - 1) {
        Some((ix, _)) => &text[..ix],
        None => "",
    }
}

/// Completions for the value at `path`, of the given `kind` when set.
fn completions(
    target: &Target<'_>,
    mut path: Vec<PathSegment>,
    kind: Option<CompletionKind>,
) -> SchemaResult<CompletionResult> {
    let root = target.schema.schema();
    let registry = target.schema.registry();
    let mut word = target.word.clone();

    let mut matching = unique(navigate_schema(root, &path, registry)?);
    if matching.is_empty() {
        // the last segment may be a partial key: complete it from its parent
        let Some(last) = path.pop() else {
            return Ok(no_match(word));
        };
        matching = unique(navigate_schema(root, &path, registry)?);
        if matching.is_empty() {
            return Ok(no_match(word));
        }
        word = last.as_key();
    }

    let mut found = Vec::new();
    for schema in matching {
        for completion in schema_completions(schema, registry)? {
            found.push(with_follow_up(completion, target, registry)?);
        }
    }

    let mut seen = HashSet::new();
    let mut completions = Vec::new();
    for mut completion in found {
        if !completion.value.starts_with(&word)
            || tagged_hidden(&completion.schema, registry)
            || kind.is_some_and(|kind| completion.kind != kind)
            || !seen.insert(completion.value.clone())
        {
            continue;
        }
        if completion.description.is_empty() {
            completion.description = documentation(&completion.schema).unwrap_or_default();
        }
        if target.after_colon {
            completion.value.insert(0, ' ');
        }
        completions.push(completion);
    }

    Ok(CompletionResult {
        token: word,
        completions,
        cacheable: true,
    })
}

fn no_match(word: String) -> CompletionResult {
    CompletionResult {
        token: word,
        completions: vec![],
        cacheable: true,
    }
}

fn unique(schemas: Vec<&Schema>) -> Vec<&Schema> {
    let mut result: Vec<&Schema> = Vec::with_capacity(schemas.len());
    for schema in schemas {
        if !result.iter().any(|seen| std::ptr::eq(*seen, schema)) {
            result.push(schema);
        }
    }
    result
}

/// Key completions whose value is an object or an array continue on a new,
/// indented line; the editor is asked to complete again once accepted.
///
/// A key whose value could be more than one of object, array and scalar
/// gets no follow-up at all.
fn with_follow_up(
    mut completion: Completion,
    target: &Target<'_>,
    registry: &SchemaRegistry,
) -> SchemaResult<Completion> {
    if completion.kind != CompletionKind::Key || !completion.suggest_on_accept {
        return Ok(completion);
    }
    if !can_suggest_on_accept(&completion.schema, registry, 0)? {
        completion.suggest_on_accept = false;
        return Ok(completion);
    }

    let shapes = shapes_of(&completion.schema, registry)?;
    let new_line = format!("\n{}{}", target.comment_prefix, " ".repeat(target.indent + 2));
    if shapes.contains(&Shape::Object) {
        completion.value.push_str(&new_line);
    } else if shapes.contains(&Shape::Array) {
        completion.value.push_str(&new_line);
        completion.value.push_str("- ");
    }
    Ok(completion)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Shape {
    Object,
    Array,
    Scalar,
}

fn shapes_of(schema: &Schema, registry: &SchemaRegistry) -> SchemaResult<BTreeSet<Shape>> {
    let mut shapes = BTreeSet::new();
    let mut arrays = Vec::new();
    collect_shapes(schema, registry, 0, &mut shapes, &mut arrays)?;
    Ok(shapes)
}

/// Classify the values `schema` accepts, looking through combinators and
/// references. The array schemas met on the way are collected.
fn collect_shapes<'a>(
    schema: &'a Schema,
    registry: &'a SchemaRegistry,
    depth: usize,
    shapes: &mut BTreeSet<Shape>,
    arrays: &mut Vec<&'a Schema>,
) -> SchemaResult<()> {
    if depth > MAX_SHAPE_DEPTH {
        return Ok(());
    }
    match registry.deref(schema)? {
        Schema::Object(_) => {
            shapes.insert(Shape::Object);
        }
        array @ Schema::Array(_) => {
            shapes.insert(Shape::Array);
            arrays.push(array);
        }
        Schema::AnyOf(s) | Schema::OneOf(s) | Schema::AllOf(s) => {
            for alternative in &s.schemas {
                collect_shapes(alternative, registry, depth + 1, shapes, arrays)?;
            }
        }
        _ => {
            shapes.insert(Shape::Scalar);
        }
    }
    Ok(())
}

/// Whether accepting a key can be followed up unambiguously: its value has
/// a single shape, and so do the items of every array it may be.
fn can_suggest_on_accept(schema: &Schema, registry: &SchemaRegistry, depth: usize) -> SchemaResult<bool> {
    if depth > MAX_SHAPE_DEPTH {
        return Ok(false);
    }
    let mut shapes = BTreeSet::new();
    let mut arrays = Vec::new();
    collect_shapes(schema, registry, 0, &mut shapes, &mut arrays)?;
    if shapes.len() > 1 {
        return Ok(false);
    }
    for array in arrays {
        if let Schema::Array(array) = array
            && let Some(items) = &array.items
            && !can_suggest_on_accept(items, registry, depth + 1)?
        {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Schemas tagged `hidden: true` are valid but never offered.
fn tagged_hidden(schema: &Schema, registry: &SchemaRegistry) -> bool {
    let tagged = |s: &Schema| {
        s.annotations()
            .tags
            .as_ref()
            .and_then(|tags| tags.get("hidden"))
            .is_some_and(|hidden| hidden == &Value::Bool(true))
    };
    tagged(schema) || registry.deref(schema).is_ok_and(tagged)
}

fn documentation(schema: &Schema) -> Option<String> {
    schema
        .annotations()
        .documentation
        .as_ref()
        .and_then(|d| d.short())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shapes(schema: Value) -> Vec<Shape> {
        let schema = Schema::from_json(&schema).unwrap();
        shapes_of(&schema, &SchemaRegistry::new())
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_drop_last_chars() {
        assert_eq!(drop_last_chars("echo: fal", 0), "echo: fal");
        assert_eq!(drop_last_chars("echo: fal", 3), "echo: ");
        assert_eq!(drop_last_chars("título", 2), "títu");
        assert_eq!(drop_last_chars("ab", 5), "");
    }

    #[test]
    fn test_shapes_look_through_combinators() {
        assert_eq!(shapes(json!({"type": "object"})), vec![Shape::Object]);
        assert_eq!(
            shapes(json!({"anyOf": [{"type": "string"}, {"type": "array", "items": {"type": "string"}}]})),
            vec![Shape::Array, Shape::Scalar]
        );
    }

    #[test]
    fn test_can_suggest_on_accept() {
        let registry = SchemaRegistry::new();
        let check = |schema: Value| {
            can_suggest_on_accept(&Schema::from_json(&schema).unwrap(), &registry, 0).unwrap()
        };
        assert!(check(json!({"type": "object"})));
        assert!(check(json!({"type": "array", "items": {"type": "string"}})));
        assert!(!check(json!({"anyOf": [{"type": "object"}, {"type": "boolean"}]})));
        assert!(!check(json!({
            "type": "array",
            "items": {"anyOf": [{"type": "object"}, {"type": "array"}]}
        })));
    }
}
