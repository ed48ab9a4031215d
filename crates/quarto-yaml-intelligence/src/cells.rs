//! Splitting a Quarto markdown document into cells.
//!
//! This is a line-oriented state machine, not a markdown parser: it only
//! recognizes YAML front matter (`---`), code cells (```` ```{lang} ````),
//! generic fenced blocks and display math (`$$`). Everything else is
//! markdown. Every cell keeps the provenance of its text, so positions
//! found inside a cell can be reported against the document.

use once_cell::sync::Lazy;
use quarto_source_map::{MappedText, MappingError, Range, mapped_string, ranged_lines};
use quarto_yaml::parse_yaml_value;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::cell_options::partition_cell_options_mapped;

static YAML_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---\s*$").unwrap());
static CODE_CELL_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*```+\s*\{([=A-Za-z]+)( *[ ,].*)?\}\s*$").unwrap());
static CODE_START: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```").unwrap());
static CODE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^```\s*$").unwrap());
static MATH_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\$\$").unwrap());

/// Cells in these languages carry their options into [`QuartoMdCell::options`].
const OPTION_LANGUAGES: &[&str] = &["ojs", "dot"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellType {
    Markdown,
    /// YAML front matter, delimiters included
    Raw,
    Math,
    Code { language: String },
}

impl CellType {
    pub fn language(&self) -> Option<&str> {
        match self {
            CellType::Code { language } => Some(language),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QuartoMdCell {
    /// The cell's `label` option, when it has one
    pub id: Option<String>,
    pub cell_type: CellType,
    /// The cell's text; for code cells, the body without fences (and
    /// without option comments when those were partitioned off)
    pub source: MappedText,
    /// The cell as written, code fences included
    pub source_verbatim: MappedText,
    /// The whole code cell body, option comments included
    pub source_with_options: MappedText,
    /// Decoded cell options
    pub options: Option<Value>,
    /// The YAML of the cell options, comment markers removed
    pub options_yaml: Option<MappedText>,
    /// Where `source` starts inside `source_verbatim`
    pub source_offset: usize,
    /// Number of option lines before `source`
    pub source_start_line: usize,
    /// Document row of the first line of the cell body
    pub cell_start_line: usize,
}

#[derive(Debug, Clone, Default)]
pub struct QuartoMdChunks {
    pub cells: Vec<QuartoMdCell>,
}

/// Split `src` into cells.
///
/// Buffers holding only blank lines do not produce cells. A `$$` line
/// inside front matter or any fenced block is ordinary content.
pub fn break_quarto_md(src: &MappedText) -> Result<QuartoMdChunks, MappingError> {
    let mut state = Partitioner {
        src,
        buffer: Vec::new(),
        cells: Vec::new(),
        language: String::new(),
        fence_start: None,
    };
    let (mut in_yaml, mut in_math, mut in_code_cell, mut in_code) = (false, false, false, false);

    let lines = ranged_lines(src.value(), true);
    for (row, line) in lines.iter().enumerate() {
        let text = line.substring;
        if YAML_DELIMITER.is_match(text) && !in_code_cell && !in_code && !in_math {
            if in_yaml {
                state.buffer.push((row, line.range));
                state.flush(CellType::Raw)?;
                in_yaml = false;
            } else {
                state.flush(CellType::Markdown)?;
                state.buffer.push((row, line.range));
                in_yaml = true;
            }
        } else if let Some(captures) = CODE_CELL_START.captures(text) {
            state.flush(CellType::Markdown)?;
            state.language = captures[1].to_string();
            state.fence_start = Some((row, line.range));
            in_code_cell = true;
        } else if CODE_END.is_match(text) {
            if in_code_cell {
                in_code_cell = false;
                state.flush_code(line.range)?;
            } else {
                in_code = !in_code;
                state.buffer.push((row, line.range));
            }
        } else if CODE_START.is_match(text) {
            in_code = true;
            state.buffer.push((row, line.range));
        } else if MATH_DELIMITER.is_match(text) && !in_yaml && !in_code && !in_code_cell {
            if in_math {
                state.buffer.push((row, line.range));
                state.flush(CellType::Math)?;
            } else {
                state.flush(CellType::Markdown)?;
                state.buffer.push((row, line.range));
            }
            in_math = !in_math;
        } else {
            state.buffer.push((row, line.range));
        }
    }
    state.flush(CellType::Markdown)?;

    debug!(cells = state.cells.len(), "split quarto markdown");
    Ok(QuartoMdChunks { cells: state.cells })
}

struct Partitioner<'a> {
    src: &'a MappedText,
    /// Buffered lines with their rows
    buffer: Vec<(usize, Range)>,
    cells: Vec<QuartoMdCell>,
    language: String,
    /// The opening fence of the current code cell
    fence_start: Option<(usize, Range)>,
}

impl Partitioner<'_> {
    fn flush(&mut self, cell_type: CellType) -> Result<(), MappingError> {
        let Some(&(first_row, _)) = self.buffer.first() else {
            return Ok(());
        };
        let source = mapped_string(self.src, self.buffer.drain(..).map(|(_, range)| range))?;
        self.push(QuartoMdCell {
            id: None,
            cell_type,
            source_verbatim: source.clone(),
            source_with_options: source.clone(),
            source,
            options: None,
            options_yaml: None,
            source_offset: 0,
            source_start_line: 0,
            cell_start_line: first_row,
        });
        Ok(())
    }

    fn flush_code(&mut self, fence_end: Range) -> Result<(), MappingError> {
        let Some((fence_row, fence_start)) = self.fence_start.take() else {
            return Ok(());
        };
        let body_ranges: Vec<Range> = self.buffer.drain(..).map(|(_, range)| range).collect();
        let body = mapped_string(self.src, body_ranges.iter().copied())?;
        let source_verbatim = mapped_string(
            self.src,
            std::iter::once(fence_start)
                .chain(body_ranges)
                .chain(std::iter::once(fence_end)),
        )?;

        let language = std::mem::take(&mut self.language);
        let mut cell = QuartoMdCell {
            id: None,
            cell_type: CellType::Code {
                language: language.clone(),
            },
            source: body.clone(),
            source_verbatim,
            source_with_options: body.clone(),
            options: None,
            options_yaml: None,
            source_offset: fence_start.len(),
            source_start_line: 0,
            cell_start_line: fence_row + 1,
        };

        if OPTION_LANGUAGES.contains(&language.as_str()) {
            let partitioned = partition_cell_options_mapped(&language, &body)?;
            let options_len = partitioned
                .options_source
                .last()
                .map_or(0, |range| range.end);
            cell.source_offset += options_len;
            cell.source_start_line = partitioned.source_start_line;
            cell.source = partitioned.source;
            if let Some(yaml) = partitioned.yaml {
                cell.options = decode_options(&yaml);
                cell.id = cell
                    .options
                    .as_ref()
                    .and_then(|o| o.get("label"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                cell.options_yaml = Some(yaml);
            }
        }
        self.push(cell);
        Ok(())
    }

    fn push(&mut self, cell: QuartoMdCell) {
        let keep = match cell.cell_type {
            CellType::Code { .. } => !cell.source_with_options.value().trim().is_empty(),
            _ => !cell.source.value().trim().is_empty(),
        };
        if keep {
            self.cells.push(cell);
        }
    }
}

fn decode_options(yaml: &MappedText) -> Option<Value> {
    match parse_yaml_value(yaml.value()) {
        Ok(value) => Some(value),
        Err(err) => {
            debug!(%err, "cell options are not valid yaml");
            None
        }
    }
}
