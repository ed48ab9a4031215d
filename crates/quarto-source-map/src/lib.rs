//! Source mapping for Quarto
//!
//! This crate tracks where text came from. Editor tooling slices documents
//! into cells, strips comment prefixes, deletes characters to recover a
//! parse, and so on; [`MappedText`] carries a mapping through every such
//! step so that an offset found in the final, derived string can be
//! reported against the file the user is editing.
//!
//! # Overview
//!
//! - [`glb`]: greatest-lower-bound search used for every offset lookup
//! - [`ranged_lines`]: line splitting that remembers each line's [`Range`]
//! - [`MappedText`], [`mapped_string`], [`mapped_concat`]: derived strings
//! - [`FileInformation`] and the `utils` helpers: offset/row/column conversion
//!
//! # Example
//!
//! ```rust
//! use quarto_source_map::*;
//!
//! let doc = as_mapped_string("---\ntitle: x\n---\n");
//! let body = mapped_substring(&doc, 4, 13).unwrap();
//! assert_eq!(body.value(), "title: x\n");
//!
//! // offset 7 of the body is the `x`, offset 11 of the document
//! assert_eq!(body.map(7), Some(11));
//! let locate = mapped_index_to_row_col(&body);
//! assert_eq!(locate(7).map(|l| (l.row, l.column)), Some((1, 7)));
//! ```

pub mod binary_search;
pub mod file_info;
pub mod mapped_text;
pub mod ranged;
pub mod types;
pub mod utils;

pub use binary_search::{glb, glb_by};
pub use file_info::FileInformation;
pub use mapped_text::{
    MappedText, MappingError, StringPiece, as_mapped_string, mapped_concat,
    mapped_index_to_row_col, mapped_lines, mapped_normalize_newlines, mapped_string,
    mapped_substring,
};
pub use ranged::{Range, RangedSubstring, ranged_lines};
pub use types::{Location, Position};
pub use utils::{
    FormattedLine, FormattedLines, format_line_range, index_to_line_col, line_col_to_offset,
    line_offsets, lines, offset_to_location,
};
