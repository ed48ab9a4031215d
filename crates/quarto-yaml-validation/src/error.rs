// Error types for YAML validation

use quarto_source_map::{Location, MappedText};
use quarto_yaml::AnnotatedParse;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Errors raised while loading, resolving or compiling a schema.
///
/// These are problems with the schema itself, never with the document
/// being validated.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Unknown value of a `type` keyword
    #[error("Invalid schema type '{0}'")]
    InvalidType(String),

    #[error("Invalid schema structure at {path}: {message}")]
    InvalidStructure { message: String, path: String },

    /// A `$ref` to an id no schema declares
    #[error("Unresolved schema reference: {0}")]
    UnresolvedRef(String),

    #[error("Invalid pattern '{pattern}' at {path}: {source}")]
    InvalidPattern {
        pattern: String,
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("Schema path '{0}' does not lead to a schema")]
    InvalidSchemaPath(String),

    #[error(transparent)]
    Yaml(#[from] quarto_yaml::Error),
}

pub type SchemaResult<T> = Result<T, SchemaError>;

/// An error as reported by a JSON-Schema validator, before localization.
///
/// `instance_path` is a JSON pointer into the validated value (`""` for the
/// root), `schema_path` a pointer into the schema prefixed with the id of
/// the schema it belongs to (`"#/properties/a/type"`, `"author#/type"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawValidationError {
    pub instance_path: String,
    pub schema_path: String,
    pub keyword: String,
    pub params: Value,
    pub message: String,
}

impl RawValidationError {
    /// The unescaped segments of `instance_path`.
    pub fn instance_segments(&self) -> Vec<String> {
        pointer_segments(&self.instance_path)
    }
}

/// Split a JSON pointer into unescaped segments.
pub fn pointer_segments(pointer: &str) -> Vec<String> {
    if pointer.is_empty() {
        return vec![];
    }
    pointer
        .trim_start_matches('/')
        .split('/')
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect()
}

/// Escape a segment for use in a JSON pointer.
pub fn escape_pointer_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// A schema violation attributed to a node of the source document.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub instance_path: String,
    /// The node the error is reported on (a key node for unknown properties)
    pub violating_object: AnnotatedParse,
    pub message: String,
    pub message_no_location: String,
    pub source: MappedText,
    /// Start of the violating node in the original document (0-indexed)
    pub start: Location,
    pub end: Location,
    pub error: RawValidationError,
    /// What is wrong with the value, when it can be said more plainly than
    /// the message
    pub details: Vec<String>,
    /// Suggested fixes
    pub hints: Vec<String>,
}
