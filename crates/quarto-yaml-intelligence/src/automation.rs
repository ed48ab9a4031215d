//! The lint, completion and hover entry points.
//!
//! Requests are dispatched on the file type. Markdown documents are split
//! into cells; front matter is handled as YAML and code cells as scripts.
//! Scripts contribute the YAML of their option comments. Everything ends up
//! as a [`YamlRequest`] run on the schema's queue.

use once_cell::sync::Lazy;
use quarto_source_map::{MappedText, Position, Range, as_mapped_string, lines, mapped_string, ranged_lines};
use regex::Regex;
use tracing::debug;

use crate::cell_options::{ChunkOptionsFormat, guess_chunk_options_format, partition_cell_options_with};
use crate::cells::{CellType, QuartoMdCell, break_quarto_md};
use crate::completions::complete_parse;
use crate::context::{CONFIG_SCHEMA, FRONT_MATTER_SCHEMA, LoadedBundle, ToolingContext};
use crate::error::Result;
use crate::hover::hover_parse;
use crate::lint::lint_parse;
use crate::types::{CompletionResponse, CompletionResult, EditorContext, FileType, Hover, LintItem};

/// The `{lang}` line opening a script that carries its fence.
static SCRIPT_LANGUAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r".*\{([a-z]+)\s*.*\}").unwrap());

/// A YAML buffer with the cursor and the schema to check it against.
#[derive(Debug, Clone)]
pub(crate) struct YamlRequest {
    pub code: MappedText,
    /// Cursor position relative to `code`
    pub position: Position,
    /// The cursor's line up to the cursor, comment prefix removed
    pub line: String,
    pub schema_name: String,
    pub explicit: Option<bool>,
    pub comment_prefix: String,
}

impl YamlRequest {
    fn new(code: MappedText, position: Position, context: &EditorContext, schema_name: &str) -> Self {
        YamlRequest {
            code,
            position,
            line: context.line.clone(),
            schema_name: schema_name.to_string(),
            explicit: context.explicit,
            comment_prefix: context.comment_prefix.clone(),
        }
    }
}

/// The cell option YAML of a script, with the number of option lines.
struct ScriptOptions {
    request: YamlRequest,
    option_lines: usize,
}

impl ToolingContext {
    /// Diagnostics for the YAML in `context.code`.
    pub async fn get_lint(&self, context: &EditorContext) -> Result<Vec<LintItem>> {
        debug!(filetype = ?context.filetype, path = ?context.path, "lint request");
        let code = as_mapped_string(context.code.as_str());
        match context.filetype {
            FileType::Yaml => {
                let request = YamlRequest::new(code, context.position, context, &yaml_schema_name(context));
                self.lint_yaml(request).await
            }
            FileType::Markdown => self.lint_markdown(code, context).await,
            FileType::Script => {
                let bundle = self.bundle().await?;
                match script_options(&bundle, code, context.language.as_deref(), context.position, context)? {
                    Some(script) => self.lint_yaml(script.request).await,
                    None => Ok(vec![]),
                }
            }
        }
    }

    /// Completions at `context.position`.
    ///
    /// Returns [`CompletionResponse::NotApplicable`] when the cursor is on a
    /// `---` delimiter.
    pub async fn get_completions(&self, context: &EditorContext) -> Result<CompletionResponse> {
        debug!(filetype = ?context.filetype, path = ?context.path, "completion request");
        let code = as_mapped_string(context.code.as_str());
        match context.filetype {
            FileType::Yaml => {
                let request = YamlRequest::new(code, context.position, context, &yaml_schema_name(context));
                self.complete_yaml(request).await
            }
            FileType::Markdown => self.complete_markdown(code, context).await,
            FileType::Script => {
                self.complete_script(code, context.language.as_deref(), context.position, context)
                    .await
            }
        }
    }

    /// Documentation for the key on the cursor's line, as markdown.
    ///
    /// Returns `None` outside YAML, on lines without a key, and for keys
    /// whose schema has no documentation.
    pub async fn get_hover(&self, context: &EditorContext) -> Result<Option<Hover>> {
        debug!(filetype = ?context.filetype, path = ?context.path, "hover request");
        let code = as_mapped_string(context.code.as_str());
        let request = match context.filetype {
            FileType::Yaml => Some(YamlRequest::new(code, context.position, context, &yaml_schema_name(context))),
            FileType::Markdown => {
                let chunks = break_quarto_md(&code)?;
                match cell_at(&chunks.cells, context.position) {
                    Some((cell, position)) => match &cell.cell_type {
                        CellType::Raw => Some(YamlRequest::new(cell.source.clone(), position, context, FRONT_MATTER_SCHEMA)),
                        CellType::Code { language } => {
                            let bundle = self.bundle().await?;
                            script_options(&bundle, cell.source_with_options.clone(), Some(language), position, context)?
                                .map(|script| script.request)
                        }
                        CellType::Markdown | CellType::Math => None,
                    },
                    None => None,
                }
            }
            FileType::Script => {
                let bundle = self.bundle().await?;
                script_options(&bundle, code, context.language.as_deref(), context.position, context)?
                    .map(|script| script.request)
            }
        };
        let Some(request) = request else {
            return Ok(None);
        };

        let code = trim_ticks(&request.code)?;
        if code.value().trim().is_empty() {
            return Ok(None);
        }
        let request = YamlRequest { code, ..request };
        // annotation spans are in the coordinates of the whole buffer
        let row = context.position.row;
        let schema_name = request.schema_name.clone();
        self.with_validator(&schema_name, move |schema, parser| {
            hover_parse(schema, parser, &request, row)
        })
        .await
    }

    async fn lint_yaml(&self, request: YamlRequest) -> Result<Vec<LintItem>> {
        let code = trim_ticks(&request.code)?;
        if code.value().trim().is_empty()
            || guess_chunk_options_format(code.value()) == ChunkOptionsFormat::Knitr
        {
            return Ok(vec![]);
        }
        let request = YamlRequest { code, ..request };
        let schema_name = request.schema_name.clone();
        self.with_validator(&schema_name, move |validator, parser| {
            lint_parse(validator, parser, &request)
        })
        .await
    }

    async fn complete_yaml(&self, request: YamlRequest) -> Result<CompletionResponse> {
        if position_in_ticks(request.code.value(), request.position) {
            return Ok(CompletionResponse::NotApplicable);
        }
        let code = trim_ticks(&request.code)?;
        if guess_chunk_options_format(code.value()) == ChunkOptionsFormat::Knitr {
            return Ok(CompletionResponse::Completions(CompletionResult::empty()));
        }
        let request = YamlRequest { code, ..request };
        let schema_name = request.schema_name.clone();
        let result = self
            .with_validator(&schema_name, move |schema, parser| {
                complete_parse(schema, parser, &request)
            })
            .await?;
        Ok(CompletionResponse::Completions(result))
    }

    async fn lint_markdown(&self, doc: MappedText, context: &EditorContext) -> Result<Vec<LintItem>> {
        let bundle = self.bundle().await?;
        let chunks = break_quarto_md(&doc)?;
        let mut lints = Vec::new();

        for cell in &chunks.cells {
            // the cursor only matters in the cell it is in
            let (position, explicit) = match context.position.row.checked_sub(cell.cell_start_line) {
                Some(row) => (Position::new(row, context.position.column), context.explicit),
                None => (Position::default(), None),
            };
            match &cell.cell_type {
                CellType::Raw => {
                    let mut request = YamlRequest::new(cell.source.clone(), position, context, FRONT_MATTER_SCHEMA);
                    request.explicit = explicit;
                    lints.extend(self.lint_yaml(request).await?);
                }
                CellType::Code { language } => {
                    let options = script_options(
                        &bundle,
                        cell.source_with_options.clone(),
                        Some(language),
                        position,
                        context,
                    )?;
                    if let Some(mut script) = options {
                        script.request.explicit = explicit;
                        lints.extend(self.lint_yaml(script.request).await?);
                    }
                }
                CellType::Markdown | CellType::Math => {}
            }
        }
        Ok(lints)
    }

    async fn complete_markdown(&self, doc: MappedText, context: &EditorContext) -> Result<CompletionResponse> {
        let chunks = break_quarto_md(&doc)?;
        let Some((cell, position)) = cell_at(&chunks.cells, context.position) else {
            return Ok(CompletionResponse::Completions(CompletionResult::empty()));
        };

        match &cell.cell_type {
            CellType::Raw => {
                let request = YamlRequest::new(cell.source.clone(), position, context, FRONT_MATTER_SCHEMA);
                self.complete_yaml(request).await
            }
            CellType::Code { language } => {
                self.complete_script(cell.source_with_options.clone(), Some(language), position, context)
                    .await
            }
            CellType::Markdown | CellType::Math => Ok(CompletionResponse::Completions(CompletionResult::empty())),
        }
    }

    async fn complete_script(
        &self,
        code: MappedText,
        language: Option<&str>,
        position: Position,
        context: &EditorContext,
    ) -> Result<CompletionResponse> {
        let bundle = self.bundle().await?;
        match script_options(&bundle, code, language, position, context)? {
            Some(script) if script.request.position.row < script.option_lines => {
                self.complete_yaml(script.request).await
            }
            _ => Ok(CompletionResponse::Completions(CompletionResult::empty())),
        }
    }
}

/// The cell holding `position`, with the position relative to the cell.
///
/// Blank lines and fences between cells belong to no cell.
pub(crate) fn cell_at(cells: &[QuartoMdCell], position: Position) -> Option<(&QuartoMdCell, Position)> {
    let row = position.row;
    let cell = cells.iter().find(|cell| cell_rows(cell) + cell.cell_start_line > row)?;
    let cell_row = row.checked_sub(cell.cell_start_line)?;
    Some((cell, Position::new(cell_row, position.column)))
}

/// Rows covered by a cell; a final line break does not open another row.
fn cell_rows(cell: &QuartoMdCell) -> usize {
    let value = cell.source_with_options.value();
    lines(value.strip_suffix('\n').unwrap_or(value)).len()
}

/// `front-matter` for `.qmd` files, `config` for anything else, unless the
/// request names a schema.
fn yaml_schema_name(context: &EditorContext) -> String {
    if let Some(name) = &context.schema_name {
        return name.clone();
    }
    match context.extension() {
        Some("qmd") => FRONT_MATTER_SCHEMA.to_string(),
        _ => CONFIG_SCHEMA.to_string(),
    }
}

/// Extract the option comments of a script as a YAML request.
///
/// Without a `language`, the script must start with a `{lang}` line. Returns
/// `None` when the language is unknown, has no schema, or the script has no
/// options. The cursor and its line are moved into the YAML: the rows of a
/// `{lang}` line and the comment prefix are taken off.
fn script_options(
    bundle: &LoadedBundle,
    code: MappedText,
    language: Option<&str>,
    position: Position,
    context: &EditorContext,
) -> Result<Option<ScriptOptions>> {
    let code_lines = ranged_lines(code.value(), false);
    let (language, start_line) = match language {
        Some(language) => (language.to_string(), 0),
        None => {
            let detected = code_lines
                .first()
                .filter(|_| code_lines.len() >= 2)
                .and_then(|first| SCRIPT_LANGUAGE.captures(first.substring));
            match detected {
                Some(captures) => (captures[1].to_string(), 1),
                None => return Ok(None),
            }
        }
    };
    if !bundle.has_schema(&language) {
        debug!(%language, "no cell option schema");
        return Ok(None);
    }

    let (Some(first), Some(last)) = (code_lines.get(start_line), code_lines.last()) else {
        return Ok(None);
    };
    let body = mapped_string(&code, [Range::new(first.range.start, last.range.end)])?;

    let syntax = bundle.comments.get(&language);
    let options = partition_cell_options_with(&syntax, &body)?;
    let Some(yaml) = options.yaml else {
        return Ok(None);
    };

    let comment_prefix = syntax.option_prefix();
    let (line, prefix_len) = strip_comment_prefix(&context.line, &comment_prefix);
    let request = YamlRequest {
        code: yaml,
        position: Position::new(
            position.row.saturating_sub(start_line),
            position.column.saturating_sub(prefix_len),
        ),
        line: line.to_string(),
        schema_name: language,
        explicit: context.explicit,
        comment_prefix,
    };
    Ok(Some(ScriptOptions {
        request,
        option_lines: options.source_start_line,
    }))
}

/// `line` without a leading `prefix`, and how many bytes were removed.
fn strip_comment_prefix<'a>(line: &'a str, prefix: &str) -> (&'a str, usize) {
    match line.strip_prefix(prefix) {
        Some(rest) => (rest, prefix.len()),
        None => (line, 0),
    }
}

/// Whether the cursor is on the opening or closing `---` of a buffer.
fn position_in_ticks(code: &str, position: Position) -> bool {
    let trimmed = code.trim_end();
    let last_row = lines(trimmed).len() - 1;
    (code.starts_with("---") && position.row == 0) || (trimmed.ends_with("---") && position.row == last_row)
}

/// Remove the `---` delimiters around a front matter buffer, keeping line
/// breaks so rows do not move.
fn trim_ticks(code: &MappedText) -> Result<MappedText> {
    let mut code = code.clone();
    if code.value().starts_with("---") {
        code = mapped_string(&code, [Range::new(3, code.len())])?;
    }
    if let Some(end) = code.value().trim_end().strip_suffix("---").map(str::len) {
        code = mapped_string(&code, [Range::new(0, end)])?;
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_in_ticks() {
        let code = "---\ntitle: x\n---\n";
        assert!(position_in_ticks(code, Position::new(0, 2)));
        assert!(!position_in_ticks(code, Position::new(1, 2)));
        assert!(position_in_ticks(code, Position::new(2, 0)));
        assert!(!position_in_ticks("title: x\n", Position::new(0, 0)));
    }

    #[test]
    fn test_trim_ticks_keeps_rows() {
        let code = as_mapped_string("---\ntitle: x\n---\n");
        let trimmed = trim_ticks(&code).unwrap();
        assert_eq!(trimmed.value(), "\ntitle: x\n");
        assert_eq!(trimmed.map(1), Some(4));

        let unclosed = trim_ticks(&as_mapped_string("---\ntitle: x\n")).unwrap();
        assert_eq!(unclosed.value(), "\ntitle: x\n");
    }

    #[test]
    fn test_strip_comment_prefix() {
        assert_eq!(strip_comment_prefix("#| echo: t", "#| "), ("echo: t", 3));
        // a line without the prefix is kept whole
        assert_eq!(strip_comment_prefix("  ec", "#| "), ("  ec", 0));
        assert_eq!(strip_comment_prefix("é", "#| "), ("é", 0));
    }

    #[test]
    fn test_cell_at_skips_the_rows_after_front_matter() {
        let doc = as_mapped_string("---\ntitle: x\n---\n\n# Hello\n");
        let chunks = break_quarto_md(&doc).unwrap();
        let (cell, position) = cell_at(&chunks.cells, Position::new(1, 2)).unwrap();
        assert!(matches!(cell.cell_type, CellType::Raw));
        assert_eq!(position, Position::new(1, 2));

        let after = cell_at(&chunks.cells, Position::new(3, 0));
        assert!(after.is_none_or(|(cell, _)| !matches!(cell.cell_type, CellType::Raw)));
    }

    #[test]
    fn test_yaml_schema_name() {
        let context = EditorContext::new(FileType::Yaml, "", Position::default(), "");
        assert_eq!(yaml_schema_name(&context), "config");
        let context = context.with_path("doc.qmd");
        assert_eq!(yaml_schema_name(&context), "front-matter");
    }
}
