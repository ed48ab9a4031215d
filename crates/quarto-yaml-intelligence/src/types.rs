//! Request and response types of the editor entry points.
//!
//! These mirror the JSON the editor exchanges with the tooling: rows and
//! columns are 0-based, lint items use dotted keys (`"start.row"`), and "no
//! completions possible here" is the literal `false`.

use quarto_source_map::Position;
use quarto_yaml_validation::{Completion, ValidationError};
use serde::{Deserialize, Serialize, Serializer};

/// The kind of buffer a request is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// A Quarto markdown document
    Markdown,
    /// A standalone YAML file, or front matter on its own
    Yaml,
    /// A code cell, fences optional
    Script,
}

/// A lint or completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditorContext {
    /// Path of the file being edited; `.qmd` YAML is linted as front matter
    #[serde(default)]
    pub path: Option<String>,
    pub filetype: FileType,
    /// The buffer is embedded in another document
    #[serde(default)]
    pub embedded: bool,
    pub code: String,
    pub position: Position,
    /// Text of the cursor's line, up to the cursor
    pub line: String,
    /// Schema to use instead of the one implied by `filetype` and `path`
    #[serde(default, alias = "schemaName")]
    pub schema_name: Option<String>,
    /// Whether the user asked for this request; `Some(false)` hides errors
    /// on the lines the cursor is nested under
    #[serde(default)]
    pub explicit: Option<bool>,
    /// Text inserted at the start of every new line of a completion
    #[serde(default, alias = "commentPrefix")]
    pub comment_prefix: String,
    /// Language of a script buffer; detected from a `{lang}` first line
    /// when missing
    #[serde(default)]
    pub language: Option<String>,
}

impl EditorContext {
    pub fn new(filetype: FileType, code: impl Into<String>, position: Position, line: impl Into<String>) -> Self {
        EditorContext {
            path: None,
            filetype,
            embedded: false,
            code: code.into(),
            position,
            line: line.into(),
            schema_name: None,
            explicit: None,
            comment_prefix: String::new(),
            language: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// The extension of `path`, without the dot.
    pub fn extension(&self) -> Option<&str> {
        let name = self.path.as_deref()?.rsplit(['/', '\\']).next()?;
        name.rsplit_once('.').map(|(_, ext)| ext)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LintType {
    Error,
}

/// One diagnostic, positioned in the document the request was about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintItem {
    #[serde(rename = "start.row")]
    pub start_row: usize,
    #[serde(rename = "start.column")]
    pub start_column: usize,
    #[serde(rename = "end.row")]
    pub end_row: usize,
    #[serde(rename = "end.column")]
    pub end_column: usize,
    pub text: String,
    #[serde(rename = "type")]
    pub kind: LintType,
}

impl From<&ValidationError> for LintItem {
    fn from(error: &ValidationError) -> Self {
        LintItem {
            start_row: error.start.row,
            start_column: error.start.column,
            end_row: error.end.row,
            end_column: error.end.column,
            text: error.message_no_location.clone(),
            kind: LintType::Error,
        }
    }
}

/// A span of editor rows and columns, end exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditorRange {
    pub start: Position,
    pub end: Position,
}

impl EditorRange {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Documentation shown when hovering over a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hover {
    /// Markdown: the key in bold, then its documentation
    pub content: String,
    /// The whole line of the key
    pub range: EditorRange,
}

/// Completions for the word under the cursor.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    /// The partial word the completions replace
    pub token: String,
    pub completions: Vec<Completion>,
    /// Whether the editor may filter this list itself as the user keeps
    /// typing instead of asking again
    pub cacheable: bool,
}

impl CompletionResult {
    /// Nothing to offer, and the editor should ask again.
    pub fn empty() -> Self {
        CompletionResult {
            token: String::new(),
            completions: vec![],
            cacheable: false,
        }
    }
}

/// Answer to a completion request.
#[derive(Debug, Clone)]
pub enum CompletionResponse {
    /// The cursor is somewhere completions make no sense (a `---` line)
    NotApplicable,
    Completions(CompletionResult),
}

impl CompletionResponse {
    pub fn completions(&self) -> &[Completion] {
        match self {
            CompletionResponse::NotApplicable => &[],
            CompletionResponse::Completions(result) => &result.completions,
        }
    }
}

impl Serialize for CompletionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CompletionResponse::NotApplicable => serializer.serialize_bool(false),
            CompletionResponse::Completions(result) => result.serialize(serializer),
        }
    }
}
