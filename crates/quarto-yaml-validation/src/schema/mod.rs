//! Schema types for YAML validation
//!
//! Schemas are written in a JSON-Schema-like language with Quarto
//! extensions (`completions`, `exhaustiveCompletions`, `documentation`,
//! `hidden`, `tags`, `errorMessage`, `closed`). The shape of a schema object
//! is inspected once by [`Schema::from_json`] and turned into a closed enum;
//! nothing downstream re-inspects raw JSON to find out what a schema is.

use crate::error::{SchemaError, SchemaResult};
use serde_json::Value;
use std::collections::HashMap;

// Internal modules
mod annotations;
mod helpers;
mod parser;
mod types;

// Public re-exports
pub use types::{
    AnySchema, ArraySchema, BooleanSchema, CombinatorSchema, Documentation, EnumSchema,
    NullSchema, NumberSchema, ObjectSchema, PatternProperty, RefSchema, SchemaAnnotations,
    StringSchema,
};

pub(crate) use helpers::json_type_name;

use annotations::EMPTY_ANNOTATIONS;

/// Longest chain of `$ref`s followed before giving up.
const MAX_REF_CHAIN: usize = 64;

/// The main schema enum representing all possible schema types
#[derive(Debug, Clone)]
pub enum Schema {
    /// Always fails validation
    False,
    /// Always passes validation
    True,
    Any(AnySchema),
    Boolean(BooleanSchema),
    Number(NumberSchema),
    String(StringSchema),
    Null(NullSchema),
    Enum(EnumSchema),
    /// Validates if any alternative matches
    AnyOf(CombinatorSchema),
    /// Validates if exactly one alternative matches
    OneOf(CombinatorSchema),
    /// Validates if every alternative matches
    AllOf(CombinatorSchema),
    Array(ArraySchema),
    Object(ObjectSchema),
    /// Reference to a schema in a [`SchemaRegistry`]
    Ref(RefSchema),
}

impl Schema {
    /// Parse a Schema from its JSON form.
    ///
    /// # Example
    ///
    /// ```
    /// use quarto_yaml_validation::Schema;
    /// use serde_json::json;
    ///
    /// let schema = Schema::from_json(&json!({"type": "string"})).unwrap();
    /// assert_eq!(schema.schema_type(), "string");
    /// ```
    pub fn from_json(value: &Value) -> SchemaResult<Schema> {
        parser::from_json(value)
    }

    /// Get the annotations for this schema
    pub fn annotations(&self) -> &SchemaAnnotations {
        match self {
            Schema::False | Schema::True => &EMPTY_ANNOTATIONS,
            Schema::Any(s) => &s.annotations,
            Schema::Boolean(s) => &s.annotations,
            Schema::Number(s) => &s.annotations,
            Schema::String(s) => &s.annotations,
            Schema::Null(s) => &s.annotations,
            Schema::Enum(s) => &s.annotations,
            Schema::AnyOf(s) | Schema::OneOf(s) | Schema::AllOf(s) => &s.annotations,
            Schema::Array(s) => &s.annotations,
            Schema::Object(s) => &s.annotations,
            Schema::Ref(s) => &s.annotations,
        }
    }

    /// The name of this schema's type, as the `type` keyword spells it where
    /// there is one.
    pub fn schema_type(&self) -> &'static str {
        match self {
            Schema::False => "false",
            Schema::True => "true",
            Schema::Any(_) => "any",
            Schema::Boolean(_) => "boolean",
            Schema::Number(n) if n.integer => "integer",
            Schema::Number(_) => "number",
            Schema::String(_) => "string",
            Schema::Null(_) => "null",
            Schema::Enum(_) => "enum",
            Schema::AnyOf(_) => "anyOf",
            Schema::OneOf(_) => "oneOf",
            Schema::AllOf(_) => "allOf",
            Schema::Array(_) => "array",
            Schema::Object(_) => "object",
            Schema::Ref(_) => "ref",
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.annotations().is_hidden()
    }

    /// The alternatives of an `anyOf`, `oneOf` or `allOf`.
    pub fn alternatives(&self) -> Option<&[Schema]> {
        match self {
            Schema::AnyOf(s) | Schema::OneOf(s) | Schema::AllOf(s) => Some(&s.schemas),
            _ => None,
        }
    }
}

/// Visit `schema` and its subschemas depth-first.
///
/// When `f` returns `true` the walk does not descend below that schema.
/// References are not followed.
pub fn walk_schema<'a>(schema: &'a Schema, f: &mut impl FnMut(&'a Schema) -> bool) {
    if f(schema) {
        return;
    }
    match schema {
        Schema::AnyOf(s) | Schema::OneOf(s) | Schema::AllOf(s) => {
            for alternative in &s.schemas {
                walk_schema(alternative, f);
            }
        }
        Schema::Array(s) => {
            if let Some(items) = &s.items {
                walk_schema(items, f);
            }
        }
        Schema::Object(s) => {
            for property in s.properties.values() {
                walk_schema(property, f);
            }
            for pattern in &s.pattern_properties {
                walk_schema(&pattern.schema, f);
            }
            if let Some(additional) = &s.additional_properties {
                walk_schema(additional, f);
            }
            if let Some(names) = &s.property_names {
                walk_schema(names, f);
            }
        }
        _ => {}
    }
}

/// Schema registry for managing schemas with $ref resolution
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Schema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Build a registry from a `definitions` object (`{id: schema}`).
    ///
    /// Every schema nested inside a definition that declares its own `$id`
    /// is registered under that id as well.
    pub fn from_definitions(definitions: &Value) -> SchemaResult<Self> {
        let mut registry = SchemaRegistry::new();
        let Some(definitions) = definitions.as_object() else {
            return Ok(registry);
        };
        for (id, value) in definitions {
            let schema = Schema::from_json(value)?;
            registry.register_nested_ids(&schema);
            registry.register(id.clone(), schema);
        }
        Ok(registry)
    }

    /// Register a schema with an ID
    pub fn register(&mut self, id: impl Into<String>, schema: Schema) {
        self.schemas.insert(id.into(), schema);
    }

    /// Register every subschema of `schema` that carries a `$id`.
    pub fn register_nested_ids(&mut self, schema: &Schema) {
        let mut found = Vec::new();
        walk_schema(schema, &mut |s| {
            if let Some(id) = &s.annotations().id {
                found.push((id.clone(), s.clone()));
            }
            false
        });
        for (id, s) in found {
            self.schemas.entry(id).or_insert(s);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Schema> {
        self.schemas.get(id)
    }

    /// Resolve a schema reference.
    ///
    /// Chains of references are followed to the first schema that is not a
    /// reference.
    pub fn resolve(&self, reference: &str) -> SchemaResult<&Schema> {
        let mut current = reference;
        for _ in 0..MAX_REF_CHAIN {
            let schema = self
                .schemas
                .get(current)
                .ok_or_else(|| SchemaError::UnresolvedRef(current.to_string()))?;
            match schema {
                Schema::Ref(r) => current = &r.reference,
                other => return Ok(other),
            }
        }
        Err(SchemaError::UnresolvedRef(reference.to_string()))
    }

    /// `schema` itself, or what it refers to when it is a reference.
    pub fn deref<'a>(&'a self, schema: &'a Schema) -> SchemaResult<&'a Schema> {
        match schema {
            Schema::Ref(r) => self.resolve(&r.reference),
            other => Ok(other),
        }
    }

    /// Get all registered schema IDs
    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.schemas.keys()
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_schema_type_name() {
        assert_eq!(Schema::False.schema_type(), "false");
        assert_eq!(Schema::True.schema_type(), "true");
        assert_eq!(
            Schema::Boolean(BooleanSchema {
                annotations: Default::default()
            })
            .schema_type(),
            "boolean"
        );
    }

    #[test]
    fn test_schema_registry() {
        let mut registry = SchemaRegistry::new();
        registry.register("test-bool", Schema::from_json(&json!({"type": "boolean"})).unwrap());
        registry.register("alias", Schema::from_json(&json!({"$ref": "test-bool"})).unwrap());

        assert_eq!(registry.resolve("test-bool").unwrap().schema_type(), "boolean");
        assert_eq!(registry.resolve("alias").unwrap().schema_type(), "boolean");
        assert!(matches!(
            registry.resolve("missing"),
            Err(SchemaError::UnresolvedRef(id)) if id == "missing"
        ));
    }

    #[test]
    fn test_reference_cycle_is_unresolved() {
        let mut registry = SchemaRegistry::new();
        registry.register("a", Schema::from_json(&json!({"$ref": "b"})).unwrap());
        registry.register("b", Schema::from_json(&json!({"$ref": "a"})).unwrap());
        assert!(registry.resolve("a").is_err());
    }

    #[test]
    fn test_from_definitions_registers_nested_ids() {
        let registry = SchemaRegistry::from_definitions(&json!({
            "front-matter": {
                "type": "object",
                "properties": {
                    "author": {"$id": "author", "type": "string"}
                }
            }
        }))
        .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.resolve("author").unwrap().schema_type(), "string");
    }

    #[test]
    fn test_walk_schema_can_stop_descent() {
        let schema = Schema::from_json(&json!({
            "anyOf": [
                {"type": "object", "properties": {"a": {"type": "string"}}},
                {"type": "array", "items": {"type": "number"}}
            ]
        }))
        .unwrap();

        let mut all = Vec::new();
        walk_schema(&schema, &mut |s| {
            all.push(s.schema_type());
            false
        });
        assert_eq!(all, vec!["anyOf", "object", "string", "array", "number"]);

        let mut shallow = Vec::new();
        walk_schema(&schema, &mut |s| {
            shallow.push(s.schema_type());
            matches!(s, Schema::Object(_))
        });
        assert_eq!(shallow, vec!["anyOf", "object", "array", "number"]);
    }
}
