//! YAML options written as comments at the head of a code cell.
//!
//! ```text
//! #| echo: false
//! #| fig-cap: A plot
//! plot(cars)
//! ```
//!
//! Every leading line that starts with the language's comment token followed
//! by `| ` is one line of YAML. Block-comment languages must also close the
//! comment on the same line (`/*| echo: false */`).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use quarto_source_map::{MappedText, MappingError, Range, StringPiece, lines, mapped_string, ranged_lines};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// How a language writes a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommentSyntax {
    /// A token that comments out the rest of the line
    Line(String),
    /// An opening and a closing token
    Block(String, String),
}

impl CommentSyntax {
    pub fn prefix(&self) -> &str {
        match self {
            CommentSyntax::Line(prefix) | CommentSyntax::Block(prefix, _) => prefix,
        }
    }

    pub fn suffix(&self) -> Option<&str> {
        match self {
            CommentSyntax::Line(_) => None,
            CommentSyntax::Block(_, suffix) => Some(suffix),
        }
    }

    /// The prefix marking a comment line as a cell option: `#| `.
    pub fn option_prefix(&self) -> String {
        format!("{}| ", self.prefix())
    }
}

const LINE_COMMENTS: &[(&str, &str)] = &[
    ("r", "#"),
    ("python", "#"),
    ("julia", "#"),
    ("scala", "//"),
    ("matlab", "%"),
    ("csharp", "//"),
    ("fsharp", "//"),
    ("powershell", "#"),
    ("bash", "#"),
    ("sql", "--"),
    ("mysql", "--"),
    ("psql", "--"),
    ("lua", "--"),
    ("cpp", "//"),
    ("cc", "//"),
    ("stan", "#"),
    ("octave", "#"),
    ("fortran", "!"),
    ("fortran95", "!"),
    ("awk", "#"),
    ("gawk", "#"),
    ("stata", "*"),
    ("java", "//"),
    ("groovy", "//"),
    ("sed", "#"),
    ("perl", "#"),
    ("ruby", "#"),
    ("tikz", "%"),
    ("js", "//"),
    ("d3", "//"),
    ("node", "//"),
    ("sass", "//"),
    ("coffee", "#"),
    ("go", "//"),
    ("asy", "//"),
    ("haskell", "--"),
    ("dot", "//"),
    ("ojs", "//"),
];

const BLOCK_COMMENTS: &[(&str, &str, &str)] = &[("c", "/*", "*/"), ("css", "/*", "*/"), ("sas", "*", ";")];

/// Languages without an entry comment with `#`.
const DEFAULT_COMMENT: &str = "#";

/// The language → comment syntax table.
///
/// Built-in entries can be extended or replaced, typically from the
/// `lang-comment-chars` map of a schema bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTable {
    entries: HashMap<String, CommentSyntax>,
}

impl Default for CommentTable {
    fn default() -> Self {
        let mut entries: HashMap<String, CommentSyntax> = LINE_COMMENTS
            .iter()
            .map(|(lang, token)| (lang.to_string(), CommentSyntax::Line(token.to_string())))
            .collect();
        for (lang, open, close) in BLOCK_COMMENTS {
            entries.insert(
                lang.to_string(),
                CommentSyntax::Block(open.to_string(), close.to_string()),
            );
        }
        CommentTable { entries }
    }
}

impl CommentTable {
    /// The built-in table with `overrides` applied on top.
    pub fn with_overrides(overrides: impl IntoIterator<Item = (String, CommentSyntax)>) -> Self {
        let mut table = CommentTable::default();
        table.entries.extend(overrides);
        table
    }

    pub fn get(&self, language: &str) -> CommentSyntax {
        self.entries
            .get(language)
            .cloned()
            .unwrap_or_else(|| CommentSyntax::Line(DEFAULT_COMMENT.to_string()))
    }
}

/// A code cell split into its option comments and the code after them.
#[derive(Debug, Clone)]
pub struct CellOptions {
    /// The option lines with comment markers removed, or `None` when the
    /// cell has no options
    pub yaml: Option<MappedText>,
    /// The option lines as written, comment markers included
    pub options_source: Vec<Range>,
    /// The rest of the cell
    pub source: MappedText,
    /// Number of option lines
    pub source_start_line: usize,
}

/// Split the leading option comments of a `language` cell off its body,
/// using the built-in comment table.
pub fn partition_cell_options_mapped(
    language: &str,
    source: &MappedText,
) -> Result<CellOptions, MappingError> {
    partition_cell_options_with(&CommentTable::default().get(language), source)
}

/// Like [`partition_cell_options_mapped`] with an explicit comment syntax.
///
/// Scanning stops at the first line that is not an option line.
pub fn partition_cell_options_with(
    syntax: &CommentSyntax,
    source: &MappedText,
) -> Result<CellOptions, MappingError> {
    let prefix = syntax.option_prefix();
    let mut yaml_pieces: Vec<StringPiece> = Vec::new();
    let mut options_source = Vec::new();
    let mut end_of_options = 0;

    for line in ranged_lines(source.value(), true) {
        let Some(rest) = line.substring.strip_prefix(prefix.as_str()) else {
            break;
        };
        let yaml_start = line.range.start + prefix.len();
        match syntax.suffix() {
            None => yaml_pieces.push(Range::new(yaml_start, line.range.end).into()),
            Some(suffix) => {
                let Some(body) = rest.trim_end().strip_suffix(suffix) else {
                    break;
                };
                let body = body.trim_end();
                yaml_pieces.push(Range::new(yaml_start, yaml_start + body.len()).into());
                // the closing token swallowed the line break
                yaml_pieces.push("\n".into());
            }
        }
        options_source.push(line.range);
        end_of_options = line.range.end;
    }

    let source_start_line = options_source.len();
    let yaml = if yaml_pieces.is_empty() {
        None
    } else {
        Some(mapped_string(source, yaml_pieces)?)
    };
    let rest = mapped_string(source, [Range::new(end_of_options, source.len())])?;

    Ok(CellOptions {
        yaml,
        options_source,
        source: rest,
        source_start_line,
    })
}

/// The syntax cell options are written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOptionsFormat {
    Yaml,
    /// `echo=FALSE, fig.cap="A plot"`
    Knitr,
}

static NO_INDENT_OR_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^:\s]+[^:]+$").unwrap());

/// Tell knitr-style options from YAML ones.
///
/// Options are knitr-style only when some line has no colon and every
/// non-blank line either ends with a comma or contains `=`.
pub fn guess_chunk_options_format(options: &str) -> ChunkOptionsFormat {
    let option_lines = lines(options);
    if !option_lines.iter().any(|line| NO_INDENT_OR_COLON.is_match(line)) {
        return ChunkOptionsFormat::Yaml;
    }
    let yaml_line = |line: &&str| {
        !line.trim().is_empty() && !line.trim_end().ends_with(',') && !line.contains('=')
    };
    if option_lines.iter().any(yaml_line) {
        return ChunkOptionsFormat::Yaml;
    }
    ChunkOptionsFormat::Knitr
}
