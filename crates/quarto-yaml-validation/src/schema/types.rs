//! Schema type definitions
//!
//! Each schema struct carries its [`SchemaAnnotations`] plus the
//! constraints specific to that type.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use super::Schema;

/// Documentation attached to a schema, either a single string or a
/// short/long pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Documentation {
    Text(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        short: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        long: Option<String>,
    },
}

impl Documentation {
    /// The one-line form of the documentation.
    pub fn short(&self) -> Option<&str> {
        match self {
            Documentation::Text(text) => Some(text),
            Documentation::Detailed { short, long } => short.as_deref().or(long.as_deref()),
        }
    }

    /// The full documentation, falling back to the short form.
    pub fn long(&self) -> Option<&str> {
        match self {
            Documentation::Text(text) => Some(text),
            Documentation::Detailed { short, long } => long.as_deref().or(short.as_deref()),
        }
    }
}

/// Annotations that can be attached to any schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaAnnotations {
    /// Schema identifier for references
    #[serde(rename = "$id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Completes "must ..." in error messages
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<Documentation>,

    /// Replaces the generated description in error messages
    #[serde(rename = "errorMessage", skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Hidden schemas are never offered as completions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completions: Option<Vec<String>>,

    /// Whether `completions` lists every acceptable value
    #[serde(
        rename = "exhaustiveCompletions",
        skip_serializing_if = "Option::is_none"
    )]
    pub exhaustive_completions: Option<bool>,

    /// Free-form tags (e.g. "engine: knitr")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<HashMap<String, Value>>,
}

impl SchemaAnnotations {
    pub fn is_hidden(&self) -> bool {
        self.hidden.unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct BooleanSchema {
    pub annotations: SchemaAnnotations,
}

/// Number type schema; `integer` rejects values with a fractional part
#[derive(Debug, Clone)]
pub struct NumberSchema {
    pub annotations: SchemaAnnotations,
    pub integer: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct StringSchema {
    pub annotations: SchemaAnnotations,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    pub pattern: Option<Regex>,
}

#[derive(Debug, Clone)]
pub struct NullSchema {
    pub annotations: SchemaAnnotations,
}

#[derive(Debug, Clone)]
pub struct EnumSchema {
    pub annotations: SchemaAnnotations,
    pub values: Vec<Value>,
}

#[derive(Debug, Clone)]
pub struct AnySchema {
    pub annotations: SchemaAnnotations,
}

/// The alternatives of an `anyOf`, `oneOf` or `allOf`
#[derive(Debug, Clone)]
pub struct CombinatorSchema {
    pub annotations: SchemaAnnotations,
    pub schemas: Vec<Schema>,
}

#[derive(Debug, Clone)]
pub struct ArraySchema {
    pub annotations: SchemaAnnotations,
    pub items: Option<Box<Schema>>,
    pub min_items: Option<usize>,
    pub max_items: Option<usize>,
}

/// A `patternProperties` entry
#[derive(Debug, Clone)]
pub struct PatternProperty {
    pub pattern: Regex,
    pub schema: Schema,
}

impl PatternProperty {
    /// The pattern as written in the schema
    pub fn source(&self) -> &str {
        self.pattern.as_str()
    }
}

#[derive(Debug, Clone)]
pub struct ObjectSchema {
    pub annotations: SchemaAnnotations,
    pub properties: BTreeMap<String, Schema>,
    pub pattern_properties: Vec<PatternProperty>,
    /// `None` allows any additional property; `false` is stored as
    /// `Some(Schema::False)`.
    pub additional_properties: Option<Box<Schema>>,
    pub required: Vec<String>,
    pub property_names: Option<Box<Schema>>,
    /// Reject properties matched by neither `properties` nor
    /// `patternProperties`
    pub closed: bool,
}

impl ObjectSchema {
    /// Whether `key` is declared or matched by a pattern.
    pub fn is_known_property(&self, key: &str) -> bool {
        self.properties.contains_key(key)
            || self.pattern_properties.iter().any(|pp| pp.pattern.is_match(key))
    }
}

#[derive(Debug, Clone)]
pub struct RefSchema {
    pub annotations: SchemaAnnotations,
    pub reference: String,
}
