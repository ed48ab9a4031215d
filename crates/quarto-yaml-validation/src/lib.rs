//! # quarto-yaml-validation
//!
//! Schemas for Quarto's YAML, and everything editors do with them.
//!
//! - [`Schema`] and [`SchemaRegistry`]: the schema model and its `$ref` targets
//! - [`navigate_schema`]: which schemas apply at a path inside a document
//! - [`schema_completions`]: key and value completions a schema offers
//! - [`normalize_schema`]: removal of editor-only keywords
//! - [`YamlSchema`]: validation of an [`AnnotatedParse`](quarto_yaml::AnnotatedParse)
//!   with errors pinned to the offending source span
//!
//! Validation itself sits behind [`SchemaCompiler`]; [`BuiltinCompiler`] is
//! used unless another is injected. Whatever validator runs, its raw errors
//! are narrowed ([`narrow_errors`]) and localized ([`localize_errors`]) the
//! same way.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use quarto_source_map::as_mapped_string;
//! use quarto_yaml::{YamlParser, build_annotated};
//! use quarto_yaml_validation::{SchemaRegistry, YamlSchema};
//! use serde_json::json;
//!
//! let schema = YamlSchema::new(
//!     &json!({"type": "object", "properties": {"title": {"type": "string"}}}),
//!     Arc::new(SchemaRegistry::new()),
//! )
//! .unwrap();
//!
//! let code = as_mapped_string("title: 3\n");
//! let tree = YamlParser::new().unwrap().parse(code.value()).unwrap();
//! let parse = build_annotated(&tree, &code).unwrap().unwrap();
//! for error in schema.validate_parse(&code, &parse).unwrap().errors {
//!     println!("{}", error.message);
//! }
//! ```

pub mod completions;
pub mod error;
pub mod improve;
pub mod localize;
pub mod navigation;
pub mod normalize;
pub mod schema;
pub mod validator;
pub mod yaml_schema;

pub use completions::{Completion, CompletionKind, schema_completions};
pub use error::{
    RawValidationError, SchemaError, SchemaResult, ValidationError, escape_pointer_segment,
    pointer_segments,
};
pub use improve::{edit_distance, improve_errors};
pub use localize::{INVALID_PROPERTY_KEYWORD, NarrowedError, localize_errors, narrow_errors};
pub use navigation::{
    navigate_schema, navigate_schema_exact, navigate_schema_path, schema_path_chain,
};
pub use normalize::normalize_schema;
pub use schema::{Schema, SchemaRegistry, walk_schema};
pub use validator::{
    BuiltinCompiler, CompiledValidator, SchemaCompiler, ValidationContext, validate,
};
pub use yaml_schema::{ValidatedParseResult, YamlSchema, report_errors_in_source};
