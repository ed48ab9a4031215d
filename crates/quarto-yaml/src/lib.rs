//! # quarto-yaml
//!
//! Error-tolerant YAML parsing with source positions, for editor tooling.
//!
//! YAML being edited is broken most of the time. This crate parses it with
//! tree-sitter, recovers a usable parse near the cursor by deleting
//! characters ([`attempt_parses_at_line`]), and converts the tree into an
//! [`AnnotatedParse`]: decoded values whose spans point into the original
//! document, even when the YAML was cut out of a larger file.
//!
//! ## Example
//!
//! ```rust,no_run
//! use quarto_source_map::{Position, as_mapped_string};
//! use quarto_yaml::{YamlParser, attempt_parses_at_line, build_annotated};
//!
//! let code = as_mapped_string("title: My Document\nauthor: [A, B\n");
//! let mut parser = YamlParser::new().unwrap();
//! for attempt in attempt_parses_at_line(&mut parser, &code, Position::new(1, 14)) {
//!     if let Some(parse) = build_annotated(&attempt.tree, &attempt.code).unwrap() {
//!         println!("{} after {} deletions", parse.result, attempt.deletions);
//!         break;
//!     }
//! }
//! ```

mod annotated;
mod error;
mod locate;
mod parser;
mod reparse;
mod tree_sitter_annotated;
mod yaml_value;

pub use annotated::{AnnotatedParse, ERROR_SENTINEL, NodeKind, PathSegment, key_string};
pub use error::{Error, Result};
pub use locate::{
    CursorLocation, YamlIndentTree, locate_cursor, locate_from_indentation, yaml_indent_tree,
    yaml_predecessors,
};
pub use parser::{YamlParser, is_failed_parse};
pub use reparse::{ParseAttempt, ParseAttempts, attempt_parses_at_line};
pub use tree_sitter_annotated::build_annotated;
pub use yaml_value::{parse_yaml_value, yaml_to_json};
