//! Position-annotated YAML values.

use std::fmt;

use quarto_source_map::MappedText;
use serde_json::Value;

/// Sentinel stored in place of a value that failed to parse inside a mapping.
pub const ERROR_SENTINEL: &str = "<<ERROR>>";

/// The kind of an [`AnnotatedParse`] node.
///
/// Names follow the tree-sitter-yaml node types the nodes were built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    BlockMapping,
    FlowMapping,
    BlockSequence,
    FlowSequence,
    PlainScalar,
    DoubleQuoteScalar,
    SingleQuoteScalar,
    BlockScalar,
    Alias,
    /// Text tree-sitter could not parse, kept as a mapping key
    Error,
    /// A missing value (`key:` with nothing after it, an empty document)
    Empty,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::BlockMapping => "block_mapping",
            NodeKind::FlowMapping => "flow_mapping",
            NodeKind::BlockSequence => "block_sequence",
            NodeKind::FlowSequence => "flow_sequence",
            NodeKind::PlainScalar => "plain_scalar",
            NodeKind::DoubleQuoteScalar => "double_quote_scalar",
            NodeKind::SingleQuoteScalar => "single_quote_scalar",
            NodeKind::BlockScalar => "block_scalar",
            NodeKind::Alias => "alias",
            NodeKind::Error => "ERROR",
            NodeKind::Empty => "<<EMPTY>>",
        }
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self, NodeKind::BlockMapping | NodeKind::FlowMapping)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, NodeKind::BlockSequence | NodeKind::FlowSequence)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a path from the document root: an object key or an array index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    /// The segment as a key string (indices are rendered in decimal).
    pub fn as_key(&self) -> String {
        match self {
            PathSegment::Key(key) => key.clone(),
            PathSegment::Index(ix) => ix.to_string(),
        }
    }

    /// The segment as an array index, if it is one or parses as one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            PathSegment::Key(key) => key.parse().ok(),
            PathSegment::Index(ix) => Some(*ix),
        }
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(ix) => write!(f, "{ix}"),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<usize> for PathSegment {
    fn from(ix: usize) -> Self {
        PathSegment::Index(ix)
    }
}

/// A YAML node with its decoded value and its span in the original document.
///
/// `start` and `end` are byte offsets into the root-most source of
/// `source`. For mappings, `components` alternates key and value nodes; for
/// sequences there is one component per element; scalars have none.
#[derive(Debug, Clone)]
pub struct AnnotatedParse {
    pub start: usize,
    pub end: usize,
    pub result: Value,
    pub kind: NodeKind,
    pub components: Vec<AnnotatedParse>,
    /// The node's text, still mapped to the original document
    pub source: MappedText,
}

impl AnnotatedParse {
    pub fn is_empty(&self) -> bool {
        self.kind == NodeKind::Empty
    }

    /// Iterate the (key, value) component pairs of a mapping node.
    pub fn entries(&self) -> impl DoubleEndedIterator<Item = (&AnnotatedParse, &AnnotatedParse)> {
        self.components
            .chunks_exact(2)
            .filter(|_| self.kind.is_mapping())
            .map(|pair| (&pair[0], &pair[1]))
    }

    /// Find the node at `path`, stopping at the deepest node that exists.
    ///
    /// Mapping keys are matched against the last occurrence of a key, as
    /// YAML loaders keep the last duplicate. With `return_key`, the final
    /// segment resolves to the key node rather than its value.
    pub fn navigate<S: AsRef<str>>(&self, path: &[S], return_key: bool) -> &AnnotatedParse {
        let Some((segment, rest)) = path.split_first() else {
            return self;
        };
        let segment = segment.as_ref();

        if self.kind.is_mapping() {
            let found = self
                .entries()
                .rev()
                .find(|(key, _)| key_string(&key.result) == segment);
            return match found {
                Some((key, _)) if return_key && rest.is_empty() => key,
                Some((_, value)) => value.navigate(rest, return_key),
                None => self,
            };
        }

        if self.kind.is_sequence() {
            return match segment.parse::<usize>().ok().and_then(|ix| self.components.get(ix)) {
                Some(item) => item.navigate(rest, return_key),
                None => self,
            };
        }

        self
    }
}

/// Render a decoded YAML value as a mapping key.
pub fn key_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarto_source_map::as_mapped_string;
    use serde_json::json;

    fn leaf(start: usize, end: usize, result: Value) -> AnnotatedParse {
        AnnotatedParse {
            start,
            end,
            result,
            kind: NodeKind::PlainScalar,
            components: vec![],
            source: as_mapped_string(""),
        }
    }

    fn sample() -> AnnotatedParse {
        // a: [x, y]
        let items = AnnotatedParse {
            start: 3,
            end: 9,
            result: json!(["x", "y"]),
            kind: NodeKind::FlowSequence,
            components: vec![leaf(4, 5, json!("x")), leaf(7, 8, json!("y"))],
            source: as_mapped_string(""),
        };
        AnnotatedParse {
            start: 0,
            end: 9,
            result: json!({"a": ["x", "y"]}),
            kind: NodeKind::BlockMapping,
            components: vec![leaf(0, 1, json!("a")), items],
            source: as_mapped_string(""),
        }
    }

    #[test]
    fn test_navigate_to_value_and_key() {
        let parse = sample();
        let path = ["a", "1"];
        assert_eq!(parse.navigate(&path, false).start, 7);
        assert_eq!(parse.navigate(&["a"], true).start, 0);
        assert_eq!(parse.navigate(&["a"], false).kind, NodeKind::FlowSequence);
    }

    #[test]
    fn test_navigate_stops_at_deepest_existing_node() {
        let parse = sample();
        assert_eq!(parse.navigate(&["a", "7"], false).kind, NodeKind::FlowSequence);
        assert_eq!(parse.navigate(&["zzz"], false).kind, NodeKind::BlockMapping);
    }

    #[test]
    fn test_key_string() {
        assert_eq!(key_string(&json!("k")), "k");
        assert_eq!(key_string(&json!(3)), "3");
        assert_eq!(key_string(&Value::Null), "null");
    }

    #[test]
    fn test_path_segment_conversions() {
        assert_eq!(PathSegment::from("2").as_index(), Some(2));
        assert_eq!(PathSegment::from(4).as_key(), "4");
        assert_eq!(PathSegment::from("title").to_string(), "title");
    }
}
