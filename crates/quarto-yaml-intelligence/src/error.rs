//! Error types for editor tooling.

use std::path::PathBuf;

use quarto_source_map::MappingError;
use quarto_yaml_validation::SchemaError;
use thiserror::Error;

/// Result type alias for quarto-yaml-intelligence operations.
pub type Result<T> = std::result::Result<T, ToolingError>;

/// Failures of the lint and completion entry points.
///
/// YAML that does not parse is not an error: requests on such buffers
/// simply produce no diagnostics or completions. These variants cover a
/// broken environment (bundle, grammar) and internal invariant violations.
#[derive(Error, Debug)]
pub enum ToolingError {
    #[error("failed to read schema bundle {path}: {source}")]
    BundleIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid schema bundle: {0}")]
    BundleFormat(#[from] serde_json::Error),

    #[error("no schema named {0} in the bundle")]
    UnknownSchema(String),

    #[error(transparent)]
    Yaml(#[from] quarto_yaml::Error),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Mapping(#[from] MappingError),

    /// The request was dropped from its queue by a newer one before it
    /// ran, or its task panicked
    #[error("request did not complete")]
    Cancelled,
}
