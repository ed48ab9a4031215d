//! Strings that remember where their characters came from
//!
//! A [`MappedText`] is an immutable string plus a mapping from every offset
//! in that string back to an offset in the root document it was carved out
//! of. Deriving a new `MappedText` from an existing one (slicing, gluing
//! pieces together, inserting synthetic text) composes the mappings, so a
//! position computed deep inside a derived view can always be reported
//! against the file the user is editing.
//!
//! All offsets are byte offsets.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::binary_search::{glb, glb_by};
use crate::file_info::FileInformation;
use crate::ranged::{Range, ranged_lines};
use crate::types::Location;

/// Failures while deriving mapped text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("range {start}..{end} is not a valid slice of a {len}-byte string")]
    InvalidRange { start: usize, end: usize, len: usize },

    #[error("cannot concatenate mapped text derived from different originals")]
    MixedOriginals,
}

/// One piece of a derived string: synthetic text, or a range of the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringPiece {
    Literal(String),
    Source(Range),
}

impl From<Range> for StringPiece {
    fn from(range: Range) -> Self {
        StringPiece::Source(range)
    }
}

impl From<&str> for StringPiece {
    fn from(text: &str) -> Self {
        StringPiece::Literal(text.to_string())
    }
}

impl From<String> for StringPiece {
    fn from(text: String) -> Self {
        StringPiece::Literal(text)
    }
}

/// A non-empty run of the derived value. `source` is the start offset in the
/// parent for source-derived runs, `None` for literal ones.
#[derive(Debug, Clone, Copy)]
struct Segment {
    offset: usize,
    len: usize,
    source: Option<usize>,
}

enum Mapping {
    Identity,
    Pieces {
        segments: Vec<Segment>,
        parent: MappedText,
    },
    Concat {
        starts: Vec<usize>,
        parts: Vec<MappedText>,
    },
}

/// An immutable string annotated with a mapping back to its original source.
///
/// Cloning is cheap: the value, the original and the mapping are shared.
#[derive(Clone)]
pub struct MappedText {
    value: Arc<str>,
    original: Arc<str>,
    file_name: Option<Arc<str>>,
    mapping: Arc<Mapping>,
}

impl MappedText {
    /// Wrap a plain string; every offset maps to itself.
    pub fn new(value: impl Into<String>) -> Self {
        let value: Arc<str> = Arc::from(value.into());
        MappedText {
            original: value.clone(),
            value,
            file_name: None,
            mapping: Arc::new(Mapping::Identity),
        }
    }

    /// Attach the name of the file the original text was read from.
    ///
    /// Text derived from this value afterwards carries the same name.
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(Arc::from(file_name.into()));
        self
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// The root-most source string, shared by every layer derived from it.
    pub fn original(&self) -> &str {
        &self.original
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    pub fn len(&self) -> usize {
        self.value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Map an offset in this value to the exact offset in the original.
    ///
    /// Returns `None` for offsets outside the value and for offsets that
    /// land on synthetic text.
    pub fn map(&self, offset: usize) -> Option<usize> {
        match self.mapping.as_ref() {
            Mapping::Identity => (offset < self.value.len()).then_some(offset),
            Mapping::Pieces { segments, parent } => {
                let segment = segments[glb_by(segments, |s| s.offset.cmp(&offset))?];
                let source = segment.source?;
                if offset >= segment.offset + segment.len {
                    return None;
                }
                parent.map(source + offset - segment.offset)
            }
            Mapping::Concat { starts, parts } => {
                let ix = glb(starts, &offset)?;
                parts[ix].map(offset - starts[ix])
            }
        }
    }

    /// Map an offset to the closest offset in the original that exists.
    ///
    /// Offsets on synthetic text resolve to the last character of the
    /// nearest earlier source-derived run, or to the start of the first
    /// later one. Offsets at or past the end of the value resolve to the end
    /// of the last source-derived run. Only text with no source-derived runs
    /// at all maps to `None`.
    pub fn map_closest(&self, offset: usize) -> Option<usize> {
        match self.mapping.as_ref() {
            Mapping::Identity => Some(offset.min(self.value.len())),
            Mapping::Pieces { segments, parent } => {
                if offset >= self.value.len() {
                    let end = segments
                        .iter()
                        .rev()
                        .find_map(|s| s.source.map(|source| source + s.len))?;
                    return parent.map_closest(end);
                }
                let ix = glb_by(segments, |s| s.offset.cmp(&offset)).unwrap_or(0);
                let segment = segments[ix];
                if let Some(source) = segment.source {
                    return parent.map_closest(source + offset - segment.offset);
                }
                if let Some(previous) = segments[..ix]
                    .iter()
                    .rev()
                    .find_map(|s| s.source.map(|source| source + s.len - 1))
                {
                    return parent.map_closest(previous);
                }
                let next = segments[ix + 1..].iter().find_map(|s| s.source)?;
                parent.map_closest(next)
            }
            Mapping::Concat { starts, parts } => {
                let ix = glb(starts, &offset)?;
                parts[ix]
                    .map_closest(offset - starts[ix])
                    .or_else(|| parts[..ix].iter().rev().find_map(|p| p.map_closest(p.len())))
            }
        }
    }

    /// Map a range of this value to the closest range in the original.
    pub fn map_range_closest(&self, range: Range) -> Option<Range> {
        let start = self.map_closest(range.start)?;
        let end = self.map_closest(range.end)?;
        Some(Range::new(start, end.max(start)))
    }
}

impl fmt::Debug for MappedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedText")
            .field("value", &self.value)
            .field("file_name", &self.file_name)
            .field("original_len", &self.original.len())
            .finish()
    }
}

impl fmt::Display for MappedText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for MappedText {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl From<&str> for MappedText {
    fn from(value: &str) -> Self {
        MappedText::new(value)
    }
}

impl From<String> for MappedText {
    fn from(value: String) -> Self {
        MappedText::new(value)
    }
}

/// Identity-mapped text.
pub fn as_mapped_string(text: impl Into<String>) -> MappedText {
    MappedText::new(text)
}

/// Build a new string from pieces of `source` and literal text.
///
/// Empty pieces are dropped. Source ranges are offsets into `source.value()`
/// and must fall on character boundaries.
pub fn mapped_string<I, P>(source: &MappedText, pieces: I) -> Result<MappedText, MappingError>
where
    I: IntoIterator<Item = P>,
    P: Into<StringPiece>,
{
    let mut value = String::new();
    let mut segments = Vec::new();

    for piece in pieces {
        match piece.into() {
            StringPiece::Literal(text) => {
                if text.is_empty() {
                    continue;
                }
                segments.push(Segment {
                    offset: value.len(),
                    len: text.len(),
                    source: None,
                });
                value.push_str(&text);
            }
            StringPiece::Source(range) => {
                if range.is_empty() {
                    continue;
                }
                let slice =
                    source
                        .value
                        .get(range.start..range.end)
                        .ok_or(MappingError::InvalidRange {
                            start: range.start,
                            end: range.end,
                            len: source.len(),
                        })?;
                segments.push(Segment {
                    offset: value.len(),
                    len: range.len(),
                    source: Some(range.start),
                });
                value.push_str(slice);
            }
        }
    }

    Ok(MappedText {
        value: Arc::from(value),
        original: source.original.clone(),
        file_name: source.file_name.clone(),
        mapping: Arc::new(Mapping::Pieces {
            segments,
            parent: source.clone(),
        }),
    })
}

/// Concatenate several mapped strings that share an original.
///
/// Offsets are attributed to parts by their starting offset in the result.
pub fn mapped_concat<I>(parts: I) -> Result<MappedText, MappingError>
where
    I: IntoIterator<Item = MappedText>,
{
    let parts: Vec<MappedText> = parts.into_iter().filter(|p| !p.is_empty()).collect();
    let Some(first) = parts.first() else {
        return Ok(MappedText::new(""));
    };
    if parts
        .iter()
        .any(|p| !Arc::ptr_eq(&p.original, &first.original) && p.original != first.original)
    {
        return Err(MappingError::MixedOriginals);
    }
    if parts.len() == 1 {
        return Ok(first.clone());
    }

    let mut value = String::new();
    let mut starts = Vec::with_capacity(parts.len());
    for part in &parts {
        starts.push(value.len());
        value.push_str(&part.value);
    }

    Ok(MappedText {
        value: Arc::from(value),
        original: first.original.clone(),
        file_name: first.file_name.clone(),
        mapping: Arc::new(Mapping::Concat { starts, parts }),
    })
}

/// The `[start, end)` slice of `text`, still mapped to the original.
pub fn mapped_substring(
    text: &MappedText,
    start: usize,
    end: usize,
) -> Result<MappedText, MappingError> {
    mapped_string(text, [Range::new(start, end)])
}

/// Split mapped text into mapped lines.
pub fn mapped_lines(text: &MappedText, keep_newlines: bool) -> Result<Vec<MappedText>, MappingError> {
    ranged_lines(text.value(), keep_newlines)
        .into_iter()
        .map(|line| mapped_string(text, [line.range]))
        .collect()
}

/// Drop the `\r` of every `\r\n`, keeping the provenance of what remains.
pub fn mapped_normalize_newlines(text: &MappedText) -> Result<MappedText, MappingError> {
    if !text.value.contains("\r\n") {
        return Ok(text.clone());
    }
    let mut pieces = Vec::new();
    let mut start = 0;
    for (ix, _) in text.value.match_indices("\r\n") {
        pieces.push(Range::new(start, ix));
        start = ix + 1;
    }
    pieces.push(Range::new(start, text.len()));
    mapped_string(text, pieces)
}

/// Build a locator from offsets in `text` to rows and columns of its original.
///
/// The locator goes through [`MappedText::map_closest`], so it is defined for
/// synthetic offsets too.
pub fn mapped_index_to_row_col(text: &MappedText) -> impl Fn(usize) -> Option<Location> + use<> {
    let info = FileInformation::new(text.original());
    let text = text.clone();
    move |offset| {
        text.map_closest(offset)
            .and_then(|original| info.offset_to_location(original))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source_offsets(text: &MappedText) -> Vec<Option<usize>> {
        (0..text.len()).map(|ix| text.map(ix)).collect()
    }

    #[test]
    fn test_identity_mapping() {
        let text = as_mapped_string("hello");
        assert_eq!(text.map(0), Some(0));
        assert_eq!(text.map(4), Some(4));
        assert_eq!(text.map(5), None);
        assert_eq!(text.map_closest(5), Some(5));
        assert_eq!(text.original(), "hello");
    }

    #[test]
    fn test_pieces_map_back_to_source_characters() {
        let source = as_mapped_string("key: value\nother: thing\n");
        let text = mapped_string(
            &source,
            vec![
                StringPiece::Source(Range::new(0, 3)),
                StringPiece::from(" = "),
                StringPiece::Source(Range::new(11, 16)),
            ],
        )
        .unwrap();
        assert_eq!(text.value(), "key = other");

        for (ix, mapped) in source_offsets(&text).into_iter().enumerate() {
            if let Some(original) = mapped {
                assert_eq!(
                    source.value().as_bytes()[original],
                    text.value().as_bytes()[ix]
                );
            }
        }
        assert_eq!(text.map(4), None);
        assert_eq!(text.map(6), Some(11));
    }

    #[test]
    fn test_map_closest_is_total() {
        let source = as_mapped_string("abcdef");
        let text = mapped_string(
            &source,
            vec![
                StringPiece::from(">>"),
                StringPiece::Source(Range::new(2, 4)),
                StringPiece::from("<<"),
            ],
        )
        .unwrap();
        assert_eq!(text.value(), ">>cd<<");
        for ix in 0..text.len() {
            assert!(text.map_closest(ix).is_some(), "offset {ix}");
        }
        // leading literal falls forward to the first source run
        assert_eq!(text.map_closest(0), Some(2));
        // trailing literal falls back to the last source character
        assert_eq!(text.map_closest(5), Some(3));
        // past the end resolves to the end of the last source run
        assert_eq!(text.map_closest(6), Some(4));
    }

    #[test]
    fn test_literal_only_text_maps_nothing() {
        let source = as_mapped_string("abc");
        let text = mapped_string(&source, vec!["xyz"]).unwrap();
        assert_eq!(text.map(0), None);
        assert_eq!(text.map_closest(0), None);
    }

    #[test]
    fn test_nested_composition() {
        let root = as_mapped_string("0123456789");
        let inner = mapped_string(&root, [Range::new(2, 8)]).unwrap();
        assert_eq!(inner.value(), "234567");
        let outer = mapped_string(
            &inner,
            vec![StringPiece::Source(Range::new(1, 3)), StringPiece::from("-")],
        )
        .unwrap();
        assert_eq!(outer.value(), "34-");
        assert_eq!(outer.original(), "0123456789");

        for ix in 0..2 {
            let through_inner = inner.map(ix + 1);
            assert_eq!(outer.map(ix), through_inner);
        }
        assert_eq!(outer.map(0), Some(3));
        assert_eq!(outer.map(2), None);
    }

    #[test]
    fn test_empty_pieces_are_dropped() {
        let source = as_mapped_string("abc");
        let text = mapped_string(
            &source,
            vec![
                StringPiece::Source(Range::new(1, 1)),
                StringPiece::from(""),
                StringPiece::Source(Range::new(1, 2)),
            ],
        )
        .unwrap();
        assert_eq!(text.value(), "b");
        assert_eq!(text.map(0), Some(1));
    }

    #[test]
    fn test_invalid_range() {
        let source = as_mapped_string("é");
        let err = mapped_string(&source, [Range::new(0, 1)]).unwrap_err();
        assert!(matches!(err, MappingError::InvalidRange { .. }));
    }

    #[test]
    fn test_concat_buckets_by_start_offset() {
        let root = as_mapped_string("aaa\nbbb\nccc\n");
        let first = mapped_substring(&root, 0, 4).unwrap();
        let second = mapped_substring(&root, 8, 12).unwrap();
        let joined = mapped_concat([first, as_empty(&root), second]).unwrap();
        assert_eq!(joined.value(), "aaa\nccc\n");
        assert_eq!(joined.map(0), Some(0));
        assert_eq!(joined.map(3), Some(3));
        assert_eq!(joined.map(4), Some(8));
        assert_eq!(joined.map(7), Some(11));
        assert_eq!(joined.map_closest(8), Some(12));
    }

    fn as_empty(root: &MappedText) -> MappedText {
        mapped_substring(root, 0, 0).unwrap()
    }

    #[test]
    fn test_concat_rejects_mixed_originals() {
        let a = as_mapped_string("a");
        let b = as_mapped_string("b");
        assert_eq!(
            mapped_concat([a, b]).unwrap_err(),
            MappingError::MixedOriginals
        );
    }

    #[test]
    fn test_normalize_newlines() {
        let source = as_mapped_string("a\r\nb\r\n");
        let text = mapped_normalize_newlines(&source).unwrap();
        assert_eq!(text.value(), "a\nb\n");
        assert_eq!(text.map(1), Some(2));
        assert_eq!(text.map(2), Some(3));
    }

    #[test]
    fn test_mapped_lines() {
        let source = as_mapped_string("x: 1\ny: 2");
        let lines = mapped_lines(&source, false).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].value(), "y: 2");
        assert_eq!(lines[1].map(0), Some(5));
    }

    #[test]
    fn test_index_to_row_col_goes_through_original() {
        let root = as_mapped_string("title: x\nauthor: y\n");
        let second = mapped_substring(&root, 9, 19).unwrap();
        let locate = mapped_index_to_row_col(&second);
        let loc = locate(8).unwrap();
        assert_eq!(loc.row, 1);
        assert_eq!(loc.column, 8);
    }

    #[test]
    fn test_file_name_is_inherited() {
        let root = as_mapped_string("abc").with_file_name("doc.qmd");
        let derived = mapped_substring(&root, 1, 2).unwrap();
        assert_eq!(derived.file_name(), Some("doc.qmd"));
    }
}
