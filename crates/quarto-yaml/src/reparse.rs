//! Recover a parse at the cursor by deleting characters before it.
//!
//! While the user types, the YAML under the cursor is usually invalid. The
//! attempts produced here keep every line except the cursor's intact and
//! shorten the cursor's line one character at a time, right to left, until
//! tree-sitter accepts the document.

use quarto_source_map::{MappedText, Position, Range, RangedSubstring, mapped_string, ranged_lines};
use tracing::{debug, warn};
use tree_sitter::Tree;

use crate::parser::{YamlParser, is_failed_parse};

/// A successful parse of the buffer, possibly with characters deleted.
#[derive(Debug)]
pub struct ParseAttempt {
    pub tree: Tree,
    /// The text that was parsed, mapped back to the buffer
    pub code: MappedText,
    /// How many characters were removed before the cursor
    pub deletions: usize,
}

/// Lazily yield parses of `code` around `position`.
///
/// The whole buffer is tried first (zero deletions). Then the cursor's
/// line is cut back one character at a time, keeping the lines before and
/// after it, until the cut reaches column 0. Only parses tree-sitter
/// accepts are yielded, in increasing order of deletions. Calling this
/// again starts a fresh sequence.
pub fn attempt_parses_at_line<'p>(
    parser: &'p mut YamlParser,
    code: &MappedText,
    position: Position,
) -> ParseAttempts<'p> {
    ParseAttempts {
        parser,
        code: code.clone(),
        position,
        stage: Stage::Whole,
    }
}

/// Iterator returned by [`attempt_parses_at_line`].
pub struct ParseAttempts<'p> {
    parser: &'p mut YamlParser,
    code: MappedText,
    position: Position,
    stage: Stage,
}

enum Stage {
    Whole,
    Shrinking(Shrink),
    Done,
}

struct Shrink {
    /// Everything before the cursor's line
    before: Option<Range>,
    /// The cursor's line without its terminator
    line: Range,
    /// The cursor line's terminator, when lines follow it
    terminator: Option<Range>,
    /// Everything after the cursor's line
    after: Option<Range>,
    /// Current end of the kept prefix, relative to `line.start`
    column: usize,
    deletions: usize,
}

impl Iterator for ParseAttempts<'_> {
    type Item = ParseAttempt;

    fn next(&mut self) -> Option<ParseAttempt> {
        loop {
            match &mut self.stage {
                Stage::Done => return None,
                Stage::Whole => {
                    let tree = match self.parser.parse(self.code.value()) {
                        Ok(tree) => tree,
                        Err(err) => {
                            warn!(error = %err, "yaml parser failed, giving up on reparse");
                            self.stage = Stage::Done;
                            return None;
                        }
                    };
                    self.stage = self.shrink_stage();
                    if !is_failed_parse(&tree) {
                        return Some(ParseAttempt {
                            tree,
                            code: self.code.clone(),
                            deletions: 0,
                        });
                    }
                }
                Stage::Shrinking(shrink) => {
                    if shrink.column == 0 {
                        self.stage = Stage::Done;
                        return None;
                    }
                    let line_text = &self.code.value()[shrink.line.start..shrink.line.end];
                    shrink.column = line_text[..shrink.column]
                        .char_indices()
                        .next_back()
                        .map_or(0, |(ix, _)| ix);
                    shrink.deletions += 1;

                    let prefix = Range::new(shrink.line.start, shrink.line.start + shrink.column);
                    let chunks = [Some(prefix), shrink.terminator, shrink.after];
                    let chunks = shrink.before.iter().copied().chain(chunks.into_iter().flatten());
                    let deletions = shrink.deletions;

                    let candidate = match mapped_string(&self.code, chunks) {
                        Ok(candidate) => candidate,
                        Err(err) => {
                            warn!(error = %err, "could not build reparse candidate");
                            self.stage = Stage::Done;
                            return None;
                        }
                    };
                    match self.parser.parse(candidate.value()) {
                        Ok(tree) if !is_failed_parse(&tree) => {
                            debug!(deletions, "recovered yaml parse");
                            return Some(ParseAttempt {
                                tree,
                                code: candidate,
                                deletions,
                            });
                        }
                        Ok(_) => {}
                        Err(err) => {
                            warn!(error = %err, "yaml parser failed, giving up on reparse");
                            self.stage = Stage::Done;
                            return None;
                        }
                    }
                }
            }
        }
    }
}

impl ParseAttempts<'_> {
    fn shrink_stage(&self) -> Stage {
        let lines = ranged_lines(self.code.value(), true);
        let row = self.position.row;
        let Some(current) = lines.get(row) else {
            // the cursor is outside this chunk of text; nothing to shrink
            return Stage::Done;
        };

        let content_len = content_length(current);
        let mut column = self.position.column.min(content_len);
        while !current.substring.is_char_boundary(column) {
            column -= 1;
        }

        let last = lines.len() - 1;
        let has_following = row < last;
        Stage::Shrinking(Shrink {
            before: (row > 0).then(|| Range::new(0, lines[row - 1].range.end)),
            line: Range::new(current.range.start, current.range.start + content_len),
            terminator: has_following
                .then(|| Range::new(current.range.start + content_len, current.range.end)),
            after: has_following.then(|| Range::new(lines[row + 1].range.start, lines[last].range.end)),
            column,
            deletions: 0,
        })
    }
}

fn content_length(line: &RangedSubstring<'_>) -> usize {
    line.substring.trim_end_matches(['\n', '\r']).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarto_source_map::as_mapped_string;

    fn attempts(code: &str, row: usize, column: usize) -> Vec<(usize, String)> {
        let mut parser = YamlParser::new().unwrap();
        let code = as_mapped_string(code);
        attempt_parses_at_line(&mut parser, &code, Position::new(row, column))
            .map(|attempt| (attempt.deletions, attempt.code.value().to_string()))
            .collect()
    }

    #[test]
    fn test_valid_buffer_yields_zero_deletions_first() {
        let found = attempts("title: x\n", 0, 8);
        assert_eq!(found[0], (0, "title: x\n".to_string()));
    }

    #[test]
    fn test_unterminated_flow_sequence_recovers_after_deletions() {
        let found = attempts("foo: [1, 2\n", 0, 10);
        assert!(found.contains(&(5, "foo: \n".to_string())));
        assert!(found.iter().any(|(deletions, _)| *deletions > 0));
    }

    #[test]
    fn test_lines_after_cursor_are_kept() {
        let found = attempts("a: [\nb: 2\n", 0, 4);
        assert!(found.contains(&(1, "a: \nb: 2\n".to_string())));
    }

    #[test]
    fn test_nested_error_keeps_the_zero_deletion_parse() {
        let found = attempts("a: 1\n  b: 2\n", 1, 6);
        assert_eq!(found[0], (0, "a: 1\n  b: 2\n".to_string()));
    }

    #[test]
    fn test_deletions_are_increasing_and_bounded() {
        let found = attempts("foo: [1, 2\n", 0, 10);
        let counts: Vec<usize> = found.iter().map(|(d, _)| *d).collect();
        let mut sorted = counts.clone();
        sorted.sort_unstable();
        assert_eq!(counts, sorted);
        assert!(counts.iter().all(|d| *d <= 10));
    }

    #[test]
    fn test_cursor_outside_buffer_only_tries_whole_parse() {
        let found = attempts("a: [\n", 7, 3);
        assert!(found.is_empty());
    }

    #[test]
    fn test_candidates_map_back_to_buffer() {
        let mut parser = YamlParser::new().unwrap();
        let code = as_mapped_string("x: 1\ny: [\nz: 3\n");
        let attempt = attempt_parses_at_line(&mut parser, &code, Position::new(1, 4))
            .next()
            .unwrap();
        let z = attempt.code.value().find('z').unwrap();
        assert_eq!(attempt.code.map(z), code.value().find('z'));
    }
}
