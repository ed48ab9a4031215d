//! Turning a cursor position into a path from the document root.

use quarto_source_map::{Position, lines};

use crate::annotated::{AnnotatedParse, NodeKind, PathSegment, key_string};
use crate::{Error, Result};

/// Where the cursor sits inside an annotated tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorLocation {
    /// The cursor fell between the pairs of a mapping, or on a node built
    /// from unparseable text
    pub with_error: bool,
    /// Keys and indices from the root to the cursor
    pub path: Vec<PathSegment>,
}

/// Locate `offset` (in the same coordinates as the annotation's spans).
///
/// Node ends are inclusive: tree-sitter's partial objects leave the cursor
/// just past the last character of the node it is editing. When the cursor
/// sits on a scalar, its value is the last path segment.
///
/// # Errors
///
/// Returns [`Error::CursorPathNotFound`] when the cursor lies past every
/// element of a sequence it is inside of.
pub fn locate_cursor(annotation: &AnnotatedParse, offset: usize) -> Result<CursorLocation> {
    let mut path = Vec::new();
    let mut with_error = false;
    let mut node = annotation;

    loop {
        if node.kind.is_mapping() {
            let mut next = None;
            for (key, value) in node.entries() {
                if key.start <= offset && offset <= key.end {
                    path.push(PathSegment::Key(key_string(&key.result)));
                    with_error |= key.kind == NodeKind::Error;
                    return Ok(CursorLocation { with_error, path });
                }
                if value.start <= offset && offset <= value.end {
                    path.push(PathSegment::Key(key_string(&key.result)));
                    next = Some(value);
                    break;
                }
            }
            match next {
                Some(value) => node = value,
                None => {
                    // between pairs: stop at the mapping itself
                    return Ok(CursorLocation {
                        with_error: true,
                        path,
                    });
                }
            }
        } else if node.kind.is_sequence() {
            let mut next = None;
            for (ix, item) in node.components.iter().enumerate() {
                if item.start <= offset && offset <= item.end {
                    next = Some((ix, item));
                    break;
                }
                if item.start > offset {
                    // between entries: the previous entry, without descending
                    if ix > 0 {
                        path.push(PathSegment::Index(ix - 1));
                    }
                    return Ok(CursorLocation { with_error, path });
                }
            }
            match next {
                Some((ix, item)) => {
                    path.push(PathSegment::Index(ix));
                    node = item;
                }
                None => return Err(Error::CursorPathNotFound { offset }),
            }
        } else {
            if !node.is_empty() {
                path.push(PathSegment::Key(key_string(&node.result)));
            }
            return Ok(CursorLocation { with_error, path });
        }
    }
}

/// For each line, the nearest earlier line it is nested under, and its indentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YamlIndentTree {
    pub predecessor: Vec<Option<usize>>,
    pub indentation: Vec<usize>,
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start().len()
}

/// Build the indentation tree of a YAML buffer.
///
/// Whitespace-only lines inherit the predecessor of the line before them
/// without becoming anyone's predecessor.
pub fn yaml_indent_tree(code: &str) -> YamlIndentTree {
    let ls = lines(code);
    let mut predecessor: Vec<Option<usize>> = Vec::with_capacity(ls.len());
    let mut indentation = Vec::with_capacity(ls.len());

    let mut current_indent: Option<usize> = None;
    let mut previous: Option<usize> = None;

    for (ix, line) in ls.iter().enumerate() {
        let indent = indent_of(line);
        indentation.push(indent);
        let inherited = previous.and_then(|p| predecessor[p]);

        if current_indent.is_none_or(|current| indent > current) {
            predecessor.push(previous);
            previous = Some(ix);
            current_indent = Some(indent);
        } else if line.trim().is_empty() {
            predecessor.push(inherited);
        } else if current_indent == Some(indent) {
            predecessor.push(inherited);
            previous = Some(ix);
        } else {
            // shallower: walk up until a line indented less than this one
            let mut candidate = previous;
            while let Some(c) = candidate {
                if indentation[c] < indent {
                    break;
                }
                candidate = predecessor[c];
            }
            predecessor.push(candidate);
            previous = Some(ix);
            current_indent = Some(indent);
        }
    }

    YamlIndentTree {
        predecessor,
        indentation,
    }
}

/// The chain of lines from `row` up through its indentation ancestors.
pub fn yaml_predecessors(code: &str, row: usize) -> Vec<usize> {
    let tree = yaml_indent_tree(code);
    let mut result = Vec::new();
    let mut current = (row < tree.predecessor.len()).then_some(row);
    while let Some(r) = current {
        result.push(r);
        current = tree.predecessor[r];
    }
    result
}

/// Infer the path at `position` from indentation alone.
///
/// Used when the cursor line cannot be parsed, typically because it holds
/// nothing but whitespace. `line` is the text of the cursor's line up to
/// the cursor. Ancestor lines ending in `:` contribute their key; lines
/// starting with `-` contribute an index (always 0, which is enough to
/// navigate a schema).
pub fn locate_from_indentation(code: &str, line: &str, position: Position) -> Vec<PathSegment> {
    let tree = yaml_indent_tree(code);
    let ls = lines(code);
    let line_indent = indent_of(line);
    let mut path = Vec::new();
    let mut current = (position.row < ls.len()).then_some(position.row);

    while let Some(row) = current {
        let trimmed = ls[row].trim();

        if trimmed.is_empty() {
            let Some(prev) = (0..row).rev().find(|&r| !ls[r].trim().is_empty()) else {
                break;
            };
            let prev_indent = indent_of(ls[prev]);
            if prev_indent < line_indent {
                current = Some(prev);
                continue;
            }
            if prev_indent > line_indent {
                current = (0..prev)
                    .rev()
                    .find(|&r| !ls[r].trim().is_empty() && indent_of(ls[r]) < line_indent);
                continue;
            }
        }

        if line_indent >= tree.indentation[row] {
            if trimmed.starts_with('-') {
                path.push(PathSegment::Index(0));
            } else if let Some(key) = trimmed.strip_suffix(':') {
                path.push(PathSegment::Key(key.to_string()));
            }
        }
        current = tree.predecessor[row];
    }

    path.reverse();
    path
}
