//! Lint, completions and hover for the YAML in Quarto documents.
//!
//! YAML shows up in three places: standalone files (`_quarto.yml`), the
//! front matter of `.qmd` documents, and option comments at the head of
//! code cells (`#| echo: false`). This crate finds that YAML, keeps track
//! of where each character came from, and checks it against the schemas of
//! a [`SchemaBundle`].
//!
//! # Usage
//!
//! ```rust,no_run
//! use quarto_source_map::Position;
//! use quarto_yaml_intelligence::{
//!     EditorContext, FileSchemaSource, FileType, ToolingContext,
//! };
//!
//! # async fn run() -> quarto_yaml_intelligence::Result<()> {
//! let tooling = ToolingContext::new(FileSchemaSource::new("schemas.json"))?;
//!
//! let code = "---\ntitle: 1\n---\n\n# Hello\n";
//! let context = EditorContext::new(FileType::Markdown, code, Position::new(1, 7), "title: ")
//!     .with_path("index.qmd");
//!
//! for lint in tooling.get_lint(&context).await? {
//!     println!("{}:{}: {}", lint.start_row + 1, lint.start_column + 1, lint.text);
//! }
//! let _completions = tooling.get_completions(&context).await?;
//! if let Some(hover) = tooling.get_hover(&context).await? {
//!     println!("{}", hover.content);
//! }
//! # Ok(())
//! # }
//! ```

mod automation;
pub mod cell_options;
pub mod cells;
mod completions;
pub mod context;
pub mod error;
mod hover;
mod lint;
pub mod queue;
pub mod types;

pub use cell_options::{
    CellOptions, ChunkOptionsFormat, CommentSyntax, CommentTable, guess_chunk_options_format,
    partition_cell_options_mapped, partition_cell_options_with,
};
pub use cells::{CellType, QuartoMdCell, QuartoMdChunks, break_quarto_md};
pub use context::{
    BundleSchemas, FileSchemaSource, LanguageSchema, LoadedBundle, SchemaBundle, SchemaSource,
    StaticSchemaSource, ToolingContext,
};
pub use error::{Result, ToolingError};
pub use queue::PromiseQueue;
pub use types::{
    CompletionResponse, CompletionResult, EditorContext, EditorRange, FileType, Hover, LintItem,
    LintType,
};
