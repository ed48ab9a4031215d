//! Line and column helpers over plain strings

use crate::binary_search::glb;
use crate::types::Location;

/// Split text into lines on `\n` or `\r\n`, without terminators.
pub fn lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Byte offset at which each line of `text` starts.
pub fn line_offsets(text: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
        .collect()
}

/// Convert a byte offset to a Location with row and column.
///
/// Offsets past the end of the text are clamped to the end.
pub fn index_to_line_col(text: &str, offset: usize) -> Location {
    let offset = offset.min(text.len());
    let starts = line_offsets(text);
    let row = glb(&starts, &offset).unwrap_or(0);
    Location {
        offset,
        row,
        column: offset - starts[row],
    }
}

/// Convert a byte offset to a Location, or None if it is out of bounds.
pub fn offset_to_location(text: &str, offset: usize) -> Option<Location> {
    (offset <= text.len()).then(|| index_to_line_col(text, offset))
}

/// Convert line and column numbers to a byte offset.
///
/// Line and column are 0-indexed; the column may point just past the end of
/// the line. Returns None if out of bounds.
pub fn line_col_to_offset(text: &str, line: usize, column: usize) -> Option<usize> {
    let starts = line_offsets(text);
    let start = *starts.get(line)?;
    let end = starts.get(line + 1).map_or(text.len(), |next| next - 1);
    let offset = start + column;
    (offset <= end).then_some(offset)
}

/// One line of a [`FormattedLines`] excerpt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLine {
    /// 0-indexed line number
    pub line_number: usize,
    /// The raw line text
    pub content: String,
    /// The line prefixed with its right-aligned 1-indexed line number
    pub rendered: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedLines {
    /// Width of the `"{n}: "` gutter
    pub prefix_width: usize,
    pub lines: Vec<FormattedLine>,
}

/// Render lines `first..=last` of `text` with a line-number gutter.
///
/// Lines past the end of the text are skipped.
pub fn format_line_range(text: &str, first: usize, last: usize) -> FormattedLines {
    let width = (first + 1)
        .to_string()
        .len()
        .max((last + 1).to_string().len());
    let all_lines = lines(text);

    let lines = (first..=last)
        .filter_map(|line_number| {
            let content = *all_lines.get(line_number)?;
            Some(FormattedLine {
                line_number,
                content: content.to_string(),
                rendered: format!("{:>width$}: {content}", line_number + 1),
            })
        })
        .collect();

    FormattedLines {
        prefix_width: width + 2,
        lines,
    }
}
