//! Walking schemas along instance paths and schema paths.

use crate::error::{SchemaError, SchemaResult, pointer_segments};
use crate::schema::{Schema, SchemaRegistry};
use quarto_yaml::PathSegment;

/// Bound on nested references and combinators visited for one path step.
const MAX_NAVIGATION_DEPTH: usize = 64;

/// Find the schemas that apply at `path` inside a value described by
/// `schema`.
///
/// Combinators fan out into every alternative; references are resolved
/// through `registry`. Array schemas only accept numeric segments. The last
/// segment is also tried as a prefix of the object's property names: when a
/// partially typed key prefixes some property, the object schema itself is
/// returned, so its key completions can be offered.
pub fn navigate_schema<'a>(
    schema: &'a Schema,
    path: &[PathSegment],
    registry: &'a SchemaRegistry,
) -> SchemaResult<Vec<&'a Schema>> {
    let mut found = Vec::new();
    navigate_inner(schema, path, registry, 0, true, &mut found)?;
    Ok(found)
}

/// Like [`navigate_schema`], but every segment must name a property,
/// match a pattern property or index an array.
pub fn navigate_schema_exact<'a>(
    schema: &'a Schema,
    path: &[PathSegment],
    registry: &'a SchemaRegistry,
) -> SchemaResult<Vec<&'a Schema>> {
    let mut found = Vec::new();
    navigate_inner(schema, path, registry, 0, false, &mut found)?;
    Ok(found)
}

fn navigate_inner<'a>(
    schema: &'a Schema,
    path: &[PathSegment],
    registry: &'a SchemaRegistry,
    depth: usize,
    prefix: bool,
    found: &mut Vec<&'a Schema>,
) -> SchemaResult<()> {
    if depth > MAX_NAVIGATION_DEPTH {
        return Ok(());
    }
    let schema = registry.deref(schema)?;
    let Some((segment, rest)) = path.split_first() else {
        found.push(schema);
        return Ok(());
    };

    match schema {
        Schema::Object(obj) => {
            let key = segment.as_key();
            if let Some(property) = obj.properties.get(&key) {
                return navigate_inner(property, rest, registry, 0, prefix, found);
            }
            let mut matched = false;
            for pattern in obj.pattern_properties.iter().filter(|pp| pp.pattern.is_match(&key)) {
                matched = true;
                navigate_inner(&pattern.schema, rest, registry, 0, prefix, found)?;
            }
            if prefix && !matched && rest.is_empty() && obj.properties.keys().any(|name| name.starts_with(&key)) {
                found.push(schema);
            }
            Ok(())
        }
        Schema::Array(arr) => match (&arr.items, segment) {
            (Some(items), PathSegment::Index(_)) => navigate_inner(items, rest, registry, 0, prefix, found),
            _ => Ok(()),
        },
        Schema::AnyOf(s) | Schema::OneOf(s) | Schema::AllOf(s) => {
            for alternative in &s.schemas {
                navigate_inner(alternative, path, registry, depth + 1, prefix, found)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Follow a validator schema path (`"#/properties/a/type"`,
/// `"author#/anyOf/1"`) to the schema that holds its final keyword.
///
/// The part before `#` names the registered schema the path is relative to;
/// an empty name means `root`. `$ref` segments follow references. Keyword
/// segments that do not lead into a subschema (`type`, `enum`, `required`,
/// ...) end the walk.
pub fn navigate_schema_path<'a>(
    root: &'a Schema,
    schema_path: &str,
    registry: &'a SchemaRegistry,
) -> SchemaResult<&'a Schema> {
    schema_path_chain(root, schema_path, registry)?
        .last()
        .copied()
        .ok_or_else(|| SchemaError::InvalidSchemaPath(schema_path.to_string()))
}

/// Like [`navigate_schema_path`], but returns every schema on the path that
/// describes the same value as the final one, outermost first.
///
/// Steps through `properties`, `patternProperties`, `additionalProperties`,
/// `propertyNames` and `items` move to a different value; combinator and
/// `$ref` steps do not.
pub fn schema_path_chain<'a>(
    root: &'a Schema,
    schema_path: &str,
    registry: &'a SchemaRegistry,
) -> SchemaResult<Vec<&'a Schema>> {
    let invalid = || SchemaError::InvalidSchemaPath(schema_path.to_string());
    let (base, pointer) = schema_path.split_once('#').ok_or_else(invalid)?;
    let mut current = if base.is_empty() {
        root
    } else {
        registry.resolve(base)?
    };
    let mut chain = vec![current];

    let segments = pointer_segments(pointer);
    let mut segments = segments.iter();
    while let Some(segment) = segments.next() {
        let (next, moves_to_child) = match (current, segment.as_str()) {
            (Schema::Object(obj), "properties") => (
                segments.next().and_then(|key| obj.properties.get(key)),
                true,
            ),
            (Schema::Object(obj), "patternProperties") => (
                segments.next().and_then(|pattern| {
                    obj.pattern_properties
                        .iter()
                        .find(|pp| pp.source() == pattern)
                        .map(|pp| &pp.schema)
                }),
                true,
            ),
            (Schema::Object(obj), "additionalProperties") => (obj.additional_properties.as_deref(), true),
            (Schema::Object(obj), "propertyNames") => (obj.property_names.as_deref(), true),
            (Schema::Array(arr), "items") => (arr.items.as_deref(), true),
            (Schema::AnyOf(s), "anyOf") | (Schema::OneOf(s), "oneOf") | (Schema::AllOf(s), "allOf") => (
                segments
                    .next()
                    .and_then(|ix| ix.parse::<usize>().ok())
                    .and_then(|ix| s.schemas.get(ix)),
                false,
            ),
            (Schema::Ref(r), "$ref") => (Some(registry.resolve(&r.reference)?), false),
            _ => break,
        };
        current = next.ok_or_else(invalid)?;
        if moves_to_child {
            chain.clear();
        }
        chain.push(current);
    }
    Ok(chain)
}
