// YAML validation engine
//
// Validators are obtained through the `SchemaCompiler` seam so that another
// JSON-Schema implementation can be swapped in. The built-in one covers the
// keywords `Schema` models and reports every violation it finds, in the same
// shape a JSON-Schema validator would. Schema paths run from the root schema
// through references, with a `$ref` segment where one was followed.

use crate::error::{RawValidationError, SchemaError, SchemaResult, escape_pointer_segment};
use crate::schema::{
    ArraySchema, CombinatorSchema, NumberSchema, ObjectSchema, Schema, SchemaRegistry,
    StringSchema, json_type_name, walk_schema,
};
use serde_json::{Map, Value, json};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::trace;

/// Turns a normalized JSON schema into something that can validate values.
pub trait SchemaCompiler: Send + Sync {
    fn compile(
        &self,
        normalized: &Value,
        registry: Arc<SchemaRegistry>,
    ) -> SchemaResult<Box<dyn CompiledValidator>>;
}

/// A compiled schema. Returns an empty list for a valid value.
pub trait CompiledValidator: Send + Sync {
    fn validate(&self, value: &Value) -> Vec<RawValidationError>;
}

/// The validator used unless another compiler is injected.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinCompiler;

impl SchemaCompiler for BuiltinCompiler {
    fn compile(
        &self,
        normalized: &Value,
        registry: Arc<SchemaRegistry>,
    ) -> SchemaResult<Box<dyn CompiledValidator>> {
        let schema = Schema::from_json(normalized)?;
        check_references(&schema, &registry)?;
        Ok(Box::new(BuiltinValidator { schema, registry }))
    }
}

/// Fail if `schema`, or any schema it reaches through references, refers
/// to an id missing from `registry`.
fn check_references(schema: &Schema, registry: &SchemaRegistry) -> SchemaResult<()> {
    let mut pending = vec![schema];
    let mut seen = HashSet::new();
    while let Some(next) = pending.pop() {
        let mut references = Vec::new();
        walk_schema(next, &mut |s| {
            if let Schema::Ref(r) = s {
                references.push(r.reference.as_str());
            }
            false
        });
        for reference in references {
            if seen.insert(reference) {
                let target = registry
                    .get(reference)
                    .ok_or_else(|| SchemaError::UnresolvedRef(reference.to_string()))?;
                pending.push(target);
            }
        }
    }
    Ok(())
}

struct BuiltinValidator {
    schema: Schema,
    registry: Arc<SchemaRegistry>,
}

impl CompiledValidator for BuiltinValidator {
    fn validate(&self, value: &Value) -> Vec<RawValidationError> {
        validate(value, &self.schema, &self.registry)
    }
}

/// Validate `value` against `schema`, returning every violation.
pub fn validate(value: &Value, schema: &Schema, registry: &SchemaRegistry) -> Vec<RawValidationError> {
    let mut context = ValidationContext::new(registry);
    validate_generic(value, schema, &mut context);
    trace!(errors = context.errors.len(), "validated value");
    context.errors
}

/// Validation context tracks state during validation
pub struct ValidationContext<'a> {
    /// Reference to the schema registry for $ref resolution
    registry: &'a SchemaRegistry,
    /// Current instance path (e.g., ["format", "html", "toc"])
    instance_path: Vec<String>,
    /// Current schema path (e.g., ["properties", "format"])
    schema_path: Vec<String>,
    /// Collected validation errors
    errors: Vec<RawValidationError>,
}

impl<'a> ValidationContext<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            instance_path: Vec::new(),
            schema_path: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Record an error for `keyword`, located at the current paths.
    pub fn add_error(&mut self, keyword: &str, params: Value, message: impl Into<String>) {
        let mut schema_path = String::from("#");
        for segment in self.schema_path.iter().map(String::as_str).chain([keyword]) {
            schema_path.push('/');
            schema_path.push_str(&escape_pointer_segment(segment));
        }
        self.errors.push(RawValidationError {
            instance_path: self.instance_pointer(),
            schema_path,
            keyword: keyword.to_string(),
            params,
            message: message.into(),
        });
    }

    fn instance_pointer(&self) -> String {
        self.instance_path
            .iter()
            .map(|segment| format!("/{}", escape_pointer_segment(segment)))
            .collect()
    }

    /// Execute a function with a new instance path segment
    pub fn with_instance_path<F, R>(&mut self, segment: impl Into<String>, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.instance_path.push(segment.into());
        let result = f(self);
        self.instance_path.pop();
        result
    }

    /// Execute a function with a new schema path segment
    pub fn with_schema_path<F, R>(&mut self, segment: impl Into<String>, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        self.schema_path.push(segment.into());
        let result = f(self);
        self.schema_path.pop();
        result
    }

    /// Execute a function with the last schema path segment removed, so a
    /// combinator's own error is reported at the combinator keyword.
    fn with_schema_path_parent<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut Self) -> R,
    {
        let last = self.schema_path.pop();
        let result = f(self);
        if let Some(last) = last {
            self.schema_path.push(last);
        }
        result
    }

    pub fn errors(&self) -> &[RawValidationError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Main validation dispatcher. Returns whether `value` is valid.
fn validate_generic(value: &Value, schema: &Schema, context: &mut ValidationContext) -> bool {
    match schema {
        Schema::False => {
            context.add_error("false schema", json!({}), "boolean schema is false");
            false
        }
        Schema::True | Schema::Any(_) => true,
        Schema::Boolean(_) => check_type(value, "boolean", value.is_boolean(), context),
        Schema::Null(_) => check_type(value, "null", value.is_null(), context),
        Schema::Number(s) => validate_number(value, s, context),
        Schema::String(s) => validate_string(value, s, context),
        Schema::Enum(s) => {
            if s.values.contains(value) {
                return true;
            }
            context.add_error(
                "enum",
                json!({ "allowedValues": s.values }),
                "must be equal to one of the allowed values",
            );
            false
        }
        Schema::AnyOf(s) => context.with_schema_path("anyOf", |ctx| validate_any_of(value, s, ctx)),
        Schema::OneOf(s) => context.with_schema_path("oneOf", |ctx| validate_one_of(value, s, ctx)),
        Schema::AllOf(s) => context.with_schema_path("allOf", |ctx| validate_all_of(value, s, ctx)),
        Schema::Array(s) => validate_array(value, s, context),
        Schema::Object(s) => validate_object(value, s, context),
        Schema::Ref(r) => match context.registry.resolve(&r.reference) {
            Ok(resolved) => context.with_schema_path("$ref", |ctx| validate_generic(value, resolved, ctx)),
            Err(err) => {
                context.add_error("$ref", json!({ "ref": r.reference }), err.to_string());
                false
            }
        },
    }
}

fn check_type(value: &Value, expected: &str, ok: bool, context: &mut ValidationContext) -> bool {
    if !ok {
        trace!(expected, found = json_type_name(value), "type mismatch");
        context.add_error("type", json!({ "type": expected }), format!("must be {expected}"));
    }
    ok
}

fn validate_number(value: &Value, schema: &NumberSchema, context: &mut ValidationContext) -> bool {
    let expected = if schema.integer { "integer" } else { "number" };
    let num = match value.as_f64() {
        Some(n) if !schema.integer || n.fract() == 0.0 => n,
        _ => return check_type(value, expected, false, context),
    };

    let mut ok = true;
    let mut bound = |keyword: &str, comparison: &str, limit: Option<f64>, holds: fn(f64, f64) -> bool| {
        if let Some(limit) = limit
            && !holds(num, limit)
        {
            context.add_error(
                keyword,
                json!({ "comparison": comparison, "limit": limit }),
                format!("must be {comparison} {limit}"),
            );
            ok = false;
        }
    };
    bound("minimum", ">=", schema.minimum, |n, l| n >= l);
    bound("maximum", "<=", schema.maximum, |n, l| n <= l);
    bound("exclusiveMinimum", ">", schema.exclusive_minimum, |n, l| n > l);
    bound("exclusiveMaximum", "<", schema.exclusive_maximum, |n, l| n < l);
    ok
}

fn validate_string(value: &Value, schema: &StringSchema, context: &mut ValidationContext) -> bool {
    let Some(s) = value.as_str() else {
        return check_type(value, "string", false, context);
    };

    let mut ok = true;
    let len = s.chars().count();
    if let Some(min) = schema.min_length
        && len < min
    {
        context.add_error(
            "minLength",
            json!({ "limit": min }),
            format!("must NOT have fewer than {min} characters"),
        );
        ok = false;
    }
    if let Some(max) = schema.max_length
        && len > max
    {
        context.add_error(
            "maxLength",
            json!({ "limit": max }),
            format!("must NOT have more than {max} characters"),
        );
        ok = false;
    }
    if let Some(pattern) = &schema.pattern
        && !pattern.is_match(s)
    {
        context.add_error(
            "pattern",
            json!({ "pattern": pattern.as_str() }),
            format!("must match pattern \"{}\"", pattern.as_str()),
        );
        ok = false;
    }
    ok
}

/// Validate anyOf (at least one schema must match)
///
/// On failure every alternative's errors are kept, followed by the anyOf
/// error itself.
fn validate_any_of(value: &Value, schema: &CombinatorSchema, context: &mut ValidationContext) -> bool {
    let mark = context.errors.len();
    for (ix, alternative) in schema.schemas.iter().enumerate() {
        if context.with_schema_path(ix.to_string(), |ctx| validate_generic(value, alternative, ctx)) {
            context.errors.truncate(mark);
            return true;
        }
    }
    context.with_schema_path_parent(|ctx| {
        ctx.add_error("anyOf", json!({}), "must match a schema in anyOf");
    });
    false
}

/// Validate oneOf (exactly one schema must match)
fn validate_one_of(value: &Value, schema: &CombinatorSchema, context: &mut ValidationContext) -> bool {
    let mark = context.errors.len();
    let mut passing = Vec::new();
    for (ix, alternative) in schema.schemas.iter().enumerate() {
        let before = context.errors.len();
        if context.with_schema_path(ix.to_string(), |ctx| validate_generic(value, alternative, ctx)) {
            context.errors.truncate(before);
            passing.push(ix);
        }
    }
    match passing.len() {
        1 => {
            context.errors.truncate(mark);
            true
        }
        0 => {
            context.with_schema_path_parent(|ctx| {
                ctx.add_error(
                    "oneOf",
                    json!({ "passingSchemas": null }),
                    "must match exactly one schema in oneOf",
                );
            });
            false
        }
        _ => {
            context.errors.truncate(mark);
            context.with_schema_path_parent(|ctx| {
                ctx.add_error(
                    "oneOf",
                    json!({ "passingSchemas": passing }),
                    "must match exactly one schema in oneOf",
                );
            });
            false
        }
    }
}

/// Validate allOf (all schemas must match)
fn validate_all_of(value: &Value, schema: &CombinatorSchema, context: &mut ValidationContext) -> bool {
    let mut ok = true;
    for (ix, alternative) in schema.schemas.iter().enumerate() {
        ok &= context.with_schema_path(ix.to_string(), |ctx| validate_generic(value, alternative, ctx));
    }
    ok
}

fn validate_array(value: &Value, schema: &ArraySchema, context: &mut ValidationContext) -> bool {
    let Some(items) = value.as_array() else {
        return check_type(value, "array", false, context);
    };

    let mut ok = true;
    if let Some(min) = schema.min_items
        && items.len() < min
    {
        context.add_error(
            "minItems",
            json!({ "limit": min }),
            format!("must NOT have fewer than {min} items"),
        );
        ok = false;
    }
    if let Some(max) = schema.max_items
        && items.len() > max
    {
        context.add_error(
            "maxItems",
            json!({ "limit": max }),
            format!("must NOT have more than {max} items"),
        );
        ok = false;
    }

    if let Some(item_schema) = &schema.items {
        context.with_schema_path("items", |ctx| {
            for (ix, item) in items.iter().enumerate() {
                ok &= ctx.with_instance_path(ix.to_string(), |ctx| validate_generic(item, item_schema, ctx));
            }
        });
    }
    ok
}

fn validate_object(value: &Value, schema: &ObjectSchema, context: &mut ValidationContext) -> bool {
    let Some(entries) = value.as_object() else {
        return check_type(value, "object", false, context);
    };
    let mark = context.errors.len();

    for required in &schema.required {
        if !entries.contains_key(required) {
            context.add_error(
                "required",
                json!({ "missingProperty": required }),
                format!("must have required property '{required}'"),
            );
        }
    }

    if let Some(names) = &schema.property_names {
        validate_property_names(entries, names, context);
    }

    for (key, entry) in entries {
        let mut matched = false;
        if let Some(property) = schema.properties.get(key) {
            matched = true;
            context.with_schema_path("properties", |ctx| {
                ctx.with_schema_path(key.as_str(), |ctx| {
                    ctx.with_instance_path(key.as_str(), |ctx| validate_generic(entry, property, ctx))
                })
            });
        }
        for pattern in schema.pattern_properties.iter().filter(|pp| pp.pattern.is_match(key)) {
            matched = true;
            context.with_schema_path("patternProperties", |ctx| {
                ctx.with_schema_path(pattern.source(), |ctx| {
                    ctx.with_instance_path(key.as_str(), |ctx| validate_generic(entry, &pattern.schema, ctx))
                })
            });
        }
        if matched {
            continue;
        }

        match schema.additional_properties.as_deref() {
            Some(Schema::False) => reject_additional(key, context),
            Some(additional) => {
                context.with_schema_path("additionalProperties", |ctx| {
                    ctx.with_instance_path(key.as_str(), |ctx| validate_generic(entry, additional, ctx))
                });
            }
            None if schema.closed => reject_additional(key, context),
            None => {}
        }
    }

    context.errors.len() == mark
}

fn reject_additional(key: &str, context: &mut ValidationContext) {
    context.add_error(
        "additionalProperties",
        json!({ "additionalProperty": key }),
        "must NOT have additional properties",
    );
}

fn validate_property_names(entries: &Map<String, Value>, names: &Schema, context: &mut ValidationContext) {
    for key in entries.keys() {
        let mark = context.errors.len();
        let name = Value::String(key.clone());
        let ok = context.with_schema_path("propertyNames", |ctx| validate_generic(&name, names, ctx));
        if !ok {
            // Errors about a name are reported on the object, tagged with the name.
            for error in &mut context.errors[mark..] {
                if let Value::Object(params) = &mut error.params {
                    params.insert("propertyName".to_string(), name.clone());
                }
            }
            context.add_error(
                "propertyNames",
                json!({ "propertyName": key }),
                "property name must be valid",
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn check(schema: Value, value: Value) -> Vec<RawValidationError> {
        let schema = Schema::from_json(&schema).unwrap();
        validate(&value, &schema, &SchemaRegistry::new())
    }

    fn summary(errors: &[RawValidationError]) -> Vec<(String, String, String)> {
        errors
            .iter()
            .map(|e| (e.instance_path.clone(), e.schema_path.clone(), e.keyword.clone()))
            .collect()
    }

    fn triple(i: &str, s: &str, k: &str) -> (String, String, String) {
        (i.to_string(), s.to_string(), k.to_string())
    }

    #[test]
    fn test_validate_boolean() {
        assert!(check(json!({"type": "boolean"}), json!(true)).is_empty());
        let errors = check(json!({"type": "boolean"}), json!("not a boolean"));
        assert_eq!(summary(&errors), vec![triple("", "#/type", "type")]);
        assert_eq!(errors[0].params, json!({"type": "boolean"}));
        assert_eq!(errors[0].message, "must be boolean");
    }

    #[test]
    fn test_validate_number_bounds() {
        let schema = json!({"type": "integer", "minimum": 1, "exclusiveMaximum": 10});
        assert!(check(schema.clone(), json!(5)).is_empty());
        assert_eq!(summary(&check(schema.clone(), json!(2.5))), vec![triple("", "#/type", "type")]);
        assert_eq!(summary(&check(schema.clone(), json!(0))), vec![triple("", "#/minimum", "minimum")]);
        assert_eq!(
            summary(&check(schema, json!(10))),
            vec![triple("", "#/exclusiveMaximum", "exclusiveMaximum")]
        );
    }

    #[test]
    fn test_validate_string_pattern() {
        let schema = json!({"type": "string", "pattern": "^[a-z]+$", "maxLength": 3});
        assert!(check(schema.clone(), json!("abc")).is_empty());
        let errors = check(schema, json!("ABCD"));
        assert_eq!(
            summary(&errors),
            vec![triple("", "#/maxLength", "maxLength"), triple("", "#/pattern", "pattern")]
        );
    }

    #[test]
    fn test_validate_enum() {
        let schema = json!({"enum": ["html", "pdf"]});
        assert!(check(schema.clone(), json!("pdf")).is_empty());
        let errors = check(schema, json!("docx"));
        assert_eq!(summary(&errors), vec![triple("", "#/enum", "enum")]);
        assert_eq!(errors[0].params, json!({"allowedValues": ["html", "pdf"]}));
    }

    #[test]
    fn test_object_reports_every_violation() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        });
        let errors = check(schema, json!({"a": 1, "b": 2}));
        assert_eq!(
            summary(&errors),
            vec![
                triple("/a", "#/properties/a/type", "type"),
                triple("", "#/additionalProperties", "additionalProperties"),
            ]
        );
        assert_eq!(errors[1].params, json!({"additionalProperty": "b"}));
    }

    #[test]
    fn test_closed_object_and_required() {
        let schema = json!({
            "type": "object",
            "properties": {"title": {"type": "string"}},
            "required": ["title"],
            "closed": true
        });
        let errors = check(schema, json!({"titel": "x"}));
        assert_eq!(
            summary(&errors),
            vec![
                triple("", "#/required", "required"),
                triple("", "#/additionalProperties", "additionalProperties"),
            ]
        );
    }

    #[test]
    fn test_pattern_and_additional_property_schemas() {
        let schema = json!({
            "type": "object",
            "patternProperties": {"^x-": {"type": "number"}},
            "additionalProperties": {"type": "string"}
        });
        assert!(check(schema.clone(), json!({"x-a": 1, "other": "ok"})).is_empty());
        assert_eq!(
            summary(&check(schema, json!({"x-a": "no", "other": 1}))),
            vec![
                triple("/other", "#/additionalProperties/type", "type"),
                triple("/x-a", "#/patternProperties/^x-/type", "type"),
            ]
        );
    }

    #[test]
    fn test_array_items() {
        let schema = json!({"type": "array", "items": {"type": "string"}, "minItems": 3});
        assert_eq!(
            summary(&check(schema, json!(["a", 2]))),
            vec![triple("", "#/minItems", "minItems"), triple("/1", "#/items/type", "type")]
        );
    }

    #[test]
    fn test_any_of_keeps_branch_errors_then_its_own() {
        let schema = json!({"anyOf": [{"type": "string"}, {"type": "number"}]});
        assert!(check(schema.clone(), json!(3)).is_empty());
        assert_eq!(
            summary(&check(schema, json!(true))),
            vec![
                triple("", "#/anyOf/0/type", "type"),
                triple("", "#/anyOf/1/type", "type"),
                triple("", "#/anyOf", "anyOf"),
            ]
        );
    }

    #[test]
    fn test_one_of_counts_passing_branches() {
        let schema = json!({"oneOf": [{"type": "number"}, {"type": "integer"}]});
        assert!(check(schema.clone(), json!(1.5)).is_empty());
        let errors = check(schema.clone(), json!(2));
        assert_eq!(summary(&errors), vec![triple("", "#/oneOf", "oneOf")]);
        assert_eq!(errors[0].params, json!({"passingSchemas": [0, 1]}));

        let errors = check(schema, json!("x"));
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[2].params, json!({"passingSchemas": null}));
    }

    #[test]
    fn test_refs_extend_the_schema_path() {
        let mut registry = SchemaRegistry::new();
        registry.register("name", Schema::from_json(&json!({"type": "string"})).unwrap());
        let schema = Schema::from_json(&json!({
            "type": "object",
            "properties": {"author": {"$ref": "name"}, "missing": {"$ref": "nowhere"}}
        }))
        .unwrap();

        let errors = validate(&json!({"author": 1}), &schema, &registry);
        assert_eq!(summary(&errors), vec![triple("/author", "#/properties/author/$ref/type", "type")]);

        let errors = validate(&json!({"missing": 1}), &schema, &registry);
        assert_eq!(summary(&errors), vec![triple("/missing", "#/properties/missing/$ref", "$ref")]);
    }

    #[test]
    fn test_compile_rejects_unresolved_references() {
        let mut registry = SchemaRegistry::new();
        registry.register("outer", Schema::from_json(&json!({"$ref": "inner"})).unwrap());
        let registry = Arc::new(registry);

        let direct = BuiltinCompiler.compile(&json!({"$ref": "missing"}), registry.clone());
        assert!(matches!(direct, Err(SchemaError::UnresolvedRef(id)) if id == "missing"));

        let transitive = BuiltinCompiler.compile(&json!({"$ref": "outer"}), registry);
        assert!(matches!(transitive, Err(SchemaError::UnresolvedRef(id)) if id == "inner"));
    }

    #[test]
    fn test_compiled_validator() {
        let validator = BuiltinCompiler
            .compile(&json!({"type": "string"}), Arc::new(SchemaRegistry::new()))
            .unwrap();
        assert!(validator.validate(&json!("x")).is_empty());
        assert_eq!(validator.validate(&json!(1)).len(), 1);
    }

    #[test]
    fn test_property_names() {
        let schema = json!({"type": "object", "propertyNames": {"type": "string", "pattern": "^[a-z]+$"}});
        let errors = check(schema, json!({"Bad": 1}));
        assert_eq!(
            summary(&errors),
            vec![
                triple("", "#/propertyNames/pattern", "pattern"),
                triple("", "#/propertyNames", "propertyNames"),
            ]
        );
        assert_eq!(errors[0].params["propertyName"], json!("Bad"));
    }

    #[test]
    fn test_instance_pointer_escapes_keys() {
        let schema = json!({"type": "object", "additionalProperties": {"type": "string"}});
        let errors = check(schema, json!({"a/b": 1}));
        assert_eq!(errors[0].instance_path, "/a~1b");
    }

    #[test]
    fn test_validation_is_deterministic() {
        let schema = json!({
            "type": "object",
            "properties": {"a": {"type": "string"}, "b": {"anyOf": [{"type": "null"}, {"type": "array"}]}},
            "additionalProperties": false
        });
        let value = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        assert_eq!(check(schema.clone(), value.clone()), check(schema, value));
    }
}
