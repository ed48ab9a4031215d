//! Half-open offset ranges and line splitting that keeps track of them

use serde::{Deserialize, Serialize};

/// A half-open `[start, end)` range of byte offsets into some string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn new(start: usize, end: usize) -> Self {
        Range { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

impl From<std::ops::Range<usize>> for Range {
    fn from(range: std::ops::Range<usize>) -> Self {
        Range::new(range.start, range.end)
    }
}

/// A substring together with the range it occupies in its parent string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangedSubstring<'a> {
    pub substring: &'a str,
    pub range: Range,
}

/// Split `text` into lines, recording where each line sits in `text`.
///
/// Both `\n` and `\r\n` terminate a line. With `keep_newlines` the
/// terminator stays part of the substring (and its range); without it the
/// terminator is dropped. The result always ends with the text after the
/// last terminator, even when that is empty.
pub fn ranged_lines(text: &str, keep_newlines: bool) -> Vec<RangedSubstring<'_>> {
    let mut result = Vec::new();
    let mut line_start = 0;

    for (newline, _) in text.match_indices('\n') {
        let terminator_start = if newline > line_start && text.as_bytes()[newline - 1] == b'\r' {
            newline - 1
        } else {
            newline
        };
        let end = if keep_newlines {
            newline + 1
        } else {
            terminator_start
        };
        result.push(RangedSubstring {
            substring: &text[line_start..end],
            range: Range::new(line_start, end),
        });
        line_start = newline + 1;
    }

    result.push(RangedSubstring {
        substring: &text[line_start..],
        range: Range::new(line_start, text.len()),
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranged_lines_without_newlines() {
        let lines = ranged_lines("ab\ncd\n", false);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].substring, "ab");
        assert_eq!(lines[0].range, Range::new(0, 2));
        assert_eq!(lines[1].substring, "cd");
        assert_eq!(lines[1].range, Range::new(3, 5));
        assert_eq!(lines[2].substring, "");
        assert_eq!(lines[2].range, Range::new(6, 6));
    }

    #[test]
    fn test_ranged_lines_keeping_newlines() {
        let lines = ranged_lines("ab\r\ncd", true);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].substring, "ab\r\n");
        assert_eq!(lines[0].range, Range::new(0, 4));
        assert_eq!(lines[1].substring, "cd");
        assert_eq!(lines[1].range, Range::new(4, 6));
    }

    #[test]
    fn test_ranged_lines_crlf_dropped() {
        let lines = ranged_lines("ab\r\ncd", false);
        assert_eq!(lines[0].substring, "ab");
        assert_eq!(lines[1].range.start, 4);
    }

    #[test]
    fn test_ranged_lines_empty_text() {
        let lines = ranged_lines("", true);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].range.is_empty());
    }

    #[test]
    fn test_lines_cover_text() {
        let text = "one\n\ntwo\nthree";
        let joined: String = ranged_lines(text, true)
            .iter()
            .map(|line| line.substring)
            .collect();
        assert_eq!(joined, text);
    }
}
