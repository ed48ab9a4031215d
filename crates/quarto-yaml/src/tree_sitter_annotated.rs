//! Build [`AnnotatedParse`] trees from tree-sitter-yaml parse trees.

use quarto_source_map::{MappedText, mapped_substring};
use serde_json::{Map, Value};
use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::annotated::{AnnotatedParse, ERROR_SENTINEL, NodeKind, key_string};
use crate::{Error, Result};

/// Parses covering less than this share of the (trimmed) input are rejected.
const MIN_COVERAGE: f64 = 0.95;

/// Convert a tree-sitter YAML tree into an annotated value tree.
///
/// `source` must be the exact text `tree` was parsed from. Every produced
/// node's span is mapped into the original document with
/// [`MappedText::map_closest`].
///
/// Returns `Ok(None)` when tree-sitter left a noticeable part of the input
/// out of the tree: such partial parses describe the wrong object.
///
/// # Errors
///
/// Returns [`Error::UnknownNodeKind`] for node kinds the annotator does not
/// handle. In a tree with `ERROR` nodes such kinds become empty nodes
/// instead.
pub fn build_annotated(tree: &Tree, source: &MappedText) -> Result<Option<AnnotatedParse>> {
    let root = tree.root_node();
    let builder = Builder {
        source,
        recovered: root.has_error(),
    };
    let annotation = builder.build(root)?;

    let parsed_size = builder.text(root).trim().len();
    let code_size = source.value().trim().len();
    if code_size > 0 && (parsed_size as f64) / (code_size as f64) < MIN_COVERAGE {
        debug!(parsed_size, code_size, "rejecting partial yaml parse");
        return Ok(None);
    }

    Ok(Some(annotation))
}

struct Builder<'a> {
    source: &'a MappedText,
    /// tree-sitter had to recover somewhere in the tree
    recovered: bool,
}

impl Builder<'_> {
    fn build(&self, node: Node<'_>) -> Result<AnnotatedParse> {
        match node.kind() {
            "stream" | "document" | "block_node" | "flow_node" => self.build_singleton(node),
            "block_mapping" => self.build_block_mapping(node),
            "flow_mapping" => self.build_flow_mapping(node),
            "block_sequence" => self.build_sequence(node, NodeKind::BlockSequence),
            "flow_sequence" => self.build_sequence(node, NodeKind::FlowSequence),
            "block_sequence_item" => match content_children(node).first() {
                Some(child) => self.build(*child),
                None => self.empty(node.end_byte()),
            },
            "flow_pair" => {
                // a bare `key: value` inside a flow sequence is a one-entry mapping
                let (key, value) = self.build_pair(node)?;
                let mut result = Map::new();
                result.insert(key_string(&key.result), value.result.clone());
                self.annotate(node, Value::Object(result), NodeKind::FlowMapping, vec![key, value])
            }
            "plain_scalar" => {
                let value = decode_plain(self.text(node));
                self.annotate(node, value, NodeKind::PlainScalar, vec![])
            }
            "double_quote_scalar" => {
                let value = decode_double_quoted(self.text(node));
                self.annotate(node, Value::String(value), NodeKind::DoubleQuoteScalar, vec![])
            }
            "single_quote_scalar" => {
                let value = decode_single_quoted(self.text(node));
                self.annotate(node, Value::String(value), NodeKind::SingleQuoteScalar, vec![])
            }
            "block_scalar" => match decode_block_scalar(self.text(node)) {
                Some(value) => {
                    self.annotate(node, Value::String(value), NodeKind::BlockScalar, vec![])
                }
                None => self.empty(node.end_byte()),
            },
            "alias" => {
                let text = self.text(node).to_string();
                self.annotate(node, Value::String(text), NodeKind::Alias, vec![])
            }
            "ERROR" => self.empty(node.end_byte()),
            // shapes left by tree-sitter's error recovery
            kind if self.recovered => {
                debug!(kind, offset = self.original_offset(node.start_byte()), "skipping yaml node");
                self.empty(node.end_byte())
            }
            kind => Err(Error::UnknownNodeKind {
                kind: kind.to_string(),
                offset: self.original_offset(node.start_byte()),
            }),
        }
    }

    /// Wrapper nodes hold a single meaningful child next to comments,
    /// anchors and tags.
    fn build_singleton(&self, node: Node<'_>) -> Result<AnnotatedParse> {
        match content_children(node).first() {
            Some(child) => self.build(*child),
            None => self.empty(node.end_byte()),
        }
    }

    fn build_sequence(&self, node: Node<'_>, kind: NodeKind) -> Result<AnnotatedParse> {
        let components = content_children(node)
            .into_iter()
            .map(|child| self.build(child))
            .collect::<Result<Vec<_>>>()?;
        let result = components.iter().map(|c| c.result.clone()).collect();
        self.annotate(node, Value::Array(result), kind, components)
    }

    fn build_block_mapping(&self, node: Node<'_>) -> Result<AnnotatedParse> {
        let mut result = Map::new();
        let mut components = Vec::new();

        for child in content_children(node) {
            match child.kind() {
                "block_mapping_pair" => {
                    let (key, value) = self.build_pair(child)?;
                    result.insert(key_string(&key.result), value.result.clone());
                    components.push(key);
                    components.push(value);
                }
                "ERROR" => {
                    // keep the unparseable text as a key so the cursor can land on it
                    let text = self.text(child).to_string();
                    let key =
                        self.annotate(child, Value::String(text.clone()), NodeKind::Error, vec![])?;
                    let value = self.empty(child.end_byte())?;
                    result.insert(text, Value::String(ERROR_SENTINEL.to_string()));
                    components.push(key);
                    components.push(value);
                }
                _ => {}
            }
        }

        self.annotate(node, Value::Object(result), NodeKind::BlockMapping, components)
    }

    fn build_flow_mapping(&self, node: Node<'_>) -> Result<AnnotatedParse> {
        let mut result = Map::new();
        let mut components = Vec::new();

        for child in content_children(node) {
            let (key, value) = match child.kind() {
                "flow_pair" => self.build_pair(child)?,
                // `{a, b}`: keys without values
                "flow_node" => (self.build(child)?, self.empty(child.end_byte())?),
                _ => continue,
            };
            result.insert(key_string(&key.result), value.result.clone());
            components.push(key);
            components.push(value);
        }

        self.annotate(node, Value::Object(result), NodeKind::FlowMapping, components)
    }

    /// Build the key and value of a mapping pair.
    ///
    /// A pair with a key and no value gets an empty value; a pair without a
    /// key (only possible in broken input) gets empty nodes on both sides.
    fn build_pair(&self, node: Node<'_>) -> Result<(AnnotatedParse, AnnotatedParse)> {
        let Some(key) = node.child_by_field_name("key") else {
            return Ok((self.empty(node.end_byte())?, self.empty(node.end_byte())?));
        };
        let key = self.build(key)?;
        let value = match node.child_by_field_name("value") {
            Some(value) => self.build(value)?,
            None => self.empty(node.end_byte())?,
        };
        Ok((key, value))
    }

    fn annotate(
        &self,
        node: Node<'_>,
        result: Value,
        kind: NodeKind,
        components: Vec<AnnotatedParse>,
    ) -> Result<AnnotatedParse> {
        Ok(AnnotatedParse {
            start: self.original_offset(node.start_byte()),
            end: self.original_offset(node.end_byte()),
            result,
            kind,
            components,
            source: mapped_substring(self.source, node.start_byte(), node.end_byte())?,
        })
    }

    fn empty(&self, position: usize) -> Result<AnnotatedParse> {
        let offset = self.original_offset(position);
        Ok(AnnotatedParse {
            start: offset,
            end: offset,
            result: Value::Null,
            kind: NodeKind::Empty,
            components: vec![],
            source: mapped_substring(self.source, position, position)?,
        })
    }

    fn original_offset(&self, offset: usize) -> usize {
        self.source.map_closest(offset).unwrap_or(offset)
    }

    fn text(&self, node: Node<'_>) -> &str {
        self.source.value().get(node.byte_range()).unwrap_or_default()
    }
}

fn content_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !is_decoration(child.kind()))
        .collect()
}

fn is_decoration(kind: &str) -> bool {
    matches!(kind, "comment" | "anchor" | "tag") || kind.ends_with("directive")
}

/// Plain scalars that read as JSON literals become numbers, booleans or
/// null; everything else stays text.
fn decode_plain(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Null | Value::Bool(_) | Value::Number(_))) => value,
        _ if text.contains('\n') => Value::String(
            text.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .collect::<Vec<_>>()
                .join(" "),
        ),
        _ => Value::String(text.to_string()),
    }
}

fn decode_double_quoted(text: &str) -> String {
    serde_json::from_str::<String>(text).unwrap_or_else(|_| {
        text.strip_prefix('"')
            .and_then(|t| t.strip_suffix('"'))
            .unwrap_or(text)
            .to_string()
    })
}

/// Single-quoted scalars escape a quote by doubling it.
fn decode_single_quoted(text: &str) -> String {
    let inner = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .unwrap_or(text);
    inner.replace("''", "'")
}

/// Decode `|` (literal) and `>` (folded) block scalars.
///
/// Returns None for a block scalar with no content lines.
fn decode_block_scalar(text: &str) -> Option<String> {
    let mut lines = quarto_source_map::lines(text).into_iter();
    let header = lines.next()?.trim();
    let body: Vec<&str> = lines.collect();
    if body.is_empty() {
        return None;
    }

    let indent = body
        .iter()
        .find(|line| !line.trim().is_empty())
        .map_or(0, |line| line.len() - line.trim_start().len());
    let stripped: Vec<&str> = body
        .iter()
        .map(|line| line.get(indent..).unwrap_or_else(|| line.trim_start()))
        .collect();

    let folded = header.starts_with('>');
    let mut value = String::new();
    for (ix, line) in stripped.iter().enumerate() {
        if ix > 0 {
            let join_with_space = folded && !line.is_empty() && !stripped[ix - 1].is_empty();
            value.push(if join_with_space { ' ' } else { '\n' });
        }
        value.push_str(line);
    }

    let mut value = value.trim_end_matches('\n').to_string();
    if !header.contains('-') {
        value.push('\n');
    }
    Some(value)
}
