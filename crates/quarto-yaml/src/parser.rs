//! tree-sitter YAML parser wrapper.

use tracing::trace;
use tree_sitter::{Parser, Tree};

use crate::{Error, Result};

/// A tree-sitter parser loaded with the YAML grammar.
///
/// Construction loads the grammar once; the parser is then reused for
/// every parse.
pub struct YamlParser {
    parser: Parser,
}

impl YamlParser {
    /// Create a parser with the YAML grammar loaded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Grammar`] if the grammar is incompatible with the
    /// linked tree-sitter runtime.
    pub fn new() -> Result<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_yaml::LANGUAGE.into())
            .map_err(|e| Error::Grammar(e.to_string()))?;
        Ok(YamlParser { parser })
    }

    /// Parse `text` into a tree-sitter tree.
    ///
    /// A tree is produced even for invalid YAML; use [`is_failed_parse`] to
    /// tell whether it is usable.
    pub fn parse(&mut self, text: &str) -> Result<Tree> {
        let tree = self.parser.parse(text, None).ok_or(Error::NoTree)?;
        trace!(
            len = text.len(),
            root = tree.root_node().kind(),
            has_error = tree.root_node().has_error(),
            "parsed yaml"
        );
        Ok(tree)
    }
}

impl std::fmt::Debug for YamlParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YamlParser").finish_non_exhaustive()
    }
}

/// Whether a parse is unusable.
///
/// Only an `ERROR` root fails. Trees with `ERROR` nodes further down are
/// kept: the annotator turns those into sentinel keys the cursor can land on.
pub fn is_failed_parse(tree: &Tree) -> bool {
    tree.root_node().is_error()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn can_load_grammar() {
        YamlParser::new().expect("Error loading YAML grammar");
    }

    #[test]
    fn test_valid_yaml_parses() {
        let mut parser = YamlParser::new().unwrap();
        let tree = parser.parse("title: hello\nauthor: me\n").unwrap();
        assert_eq!(tree.root_node().kind(), "stream");
        assert!(!is_failed_parse(&tree));
    }

    #[test]
    fn test_nested_error_is_not_a_failed_parse() {
        let mut parser = YamlParser::new().unwrap();
        let tree = parser.parse("a: 1\n  b: 2\n").unwrap();
        assert!(tree.root_node().has_error());
        assert!(!tree.root_node().is_error());
        assert!(!is_failed_parse(&tree));
    }
}
