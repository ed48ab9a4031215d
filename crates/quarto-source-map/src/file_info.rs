//! Line index for fast offset/location conversion

use crate::binary_search::glb;
use crate::types::Location;
use serde::{Deserialize, Serialize};

/// Line-start index over a piece of text.
///
/// Stores only the byte offset at which each line begins, which is enough
/// to turn byte offsets into (row, column) locations and back in O(log n).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInformation {
    /// Byte offset of the first character of every line; always starts with 0
    line_starts: Vec<usize>,

    /// Total length of the text in bytes
    total_length: usize,
}

impl FileInformation {
    /// Index the line starts of `content`.
    ///
    /// # Example
    ///
    /// ```
    /// use quarto_source_map::FileInformation;
    ///
    /// let info = FileInformation::new("line 1\nline 2\nline 3");
    /// assert_eq!(info.line_count(), 3);
    /// ```
    pub fn new(content: &str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(content.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();

        FileInformation {
            line_starts,
            total_length: content.len(),
        }
    }

    /// Convert a byte offset to a Location.
    ///
    /// A newline belongs to the line it terminates. Returns None if the
    /// offset is past the end of the text.
    ///
    /// # Example
    ///
    /// ```
    /// use quarto_source_map::FileInformation;
    ///
    /// let info = FileInformation::new("hello\nworld");
    /// let loc = info.offset_to_location(6).unwrap();
    /// assert_eq!(loc.row, 1);
    /// assert_eq!(loc.column, 0);
    /// ```
    pub fn offset_to_location(&self, offset: usize) -> Option<Location> {
        if offset > self.total_length {
            return None;
        }
        let row = glb(&self.line_starts, &offset)?;
        Some(Location {
            offset,
            row,
            column: offset - self.line_starts[row],
        })
    }

    /// Convert a (row, column) pair back to a byte offset.
    ///
    /// Columns past the end of a line are rejected rather than wrapped onto
    /// the next line.
    pub fn location_to_offset(&self, row: usize, column: usize) -> Option<usize> {
        let start = *self.line_starts.get(row)?;
        let line_end = self
            .line_starts
            .get(row + 1)
            .map_or(self.total_length, |next| next - 1);
        let offset = start + column;
        (offset <= line_end).then_some(offset)
    }

    /// Byte offset where `row` begins.
    pub fn line_start(&self, row: usize) -> Option<usize> {
        self.line_starts.get(row).copied()
    }

    /// Get the total length of the text in bytes
    pub fn total_length(&self) -> usize {
        self.total_length
    }

    /// Number of lines; text ending in a newline has an empty last line
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}
