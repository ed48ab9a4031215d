//! Error types for YAML parsing and annotation.

use quarto_source_map::MappingError;
use thiserror::Error;

/// Result type alias for quarto-yaml operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while parsing or annotating YAML.
///
/// A YAML buffer that simply fails to parse is not an error: the reparser
/// skips such attempts. These variants cover environment failures and
/// shapes the annotator does not know how to handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The tree-sitter grammar could not be loaded
    #[error("failed to load the YAML grammar: {0}")]
    Grammar(String),

    /// tree-sitter returned no tree (cancelled or misconfigured parser)
    #[error("tree-sitter did not produce a parse tree")]
    NoTree,

    /// A parse tree without errors contains a node kind the annotator does
    /// not support
    #[error("unsupported YAML node kind `{kind}` at offset {offset}")]
    UnknownNodeKind { kind: String, offset: usize },

    /// The cursor could not be placed inside the annotated tree
    #[error("cursor at offset {offset} is not inside the annotated tree")]
    CursorPathNotFound { offset: usize },

    /// YAML syntax error reported by yaml-rust2
    #[error("YAML syntax error: {0}")]
    Syntax(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

impl From<yaml_rust2::ScanError> for Error {
    fn from(err: yaml_rust2::ScanError) -> Self {
        Error::Syntax(err.to_string())
    }
}
