//! Documentation for the key on the cursor's line.

use quarto_source_map::{Position, index_to_line_col, lines};
use quarto_yaml::{
    AnnotatedParse, NodeKind, PathSegment, YamlParser, attempt_parses_at_line, build_annotated,
    key_string,
};
use quarto_yaml_validation::{YamlSchema, navigate_schema_exact};
use tracing::debug;

use crate::automation::YamlRequest;
use crate::error::Result;
use crate::types::{EditorRange, Hover};

/// Hover for the key starting on `row` of the original document.
///
/// The key's path is looked up in the first parse that builds an
/// annotation. Returns `None` when no key starts on the row or the schemas
/// at its path carry no documentation.
pub(crate) fn hover_parse(
    schema: &YamlSchema,
    parser: &mut YamlParser,
    request: &YamlRequest,
    row: usize,
) -> Result<Option<Hover>> {
    let original = request.code.original();
    for attempt in attempt_parses_at_line(parser, &request.code, request.position) {
        let Some(annotation) = build_annotated(&attempt.tree, &attempt.code)? else {
            continue;
        };
        let Some(path) = key_path_on_row(&annotation, original, row) else {
            return Ok(None);
        };
        debug!(path = ?path, "hover key");

        let mut docs: Vec<&str> = Vec::new();
        for found in navigate_schema_exact(schema.schema(), &path, schema.registry())? {
            let doc = found.annotations().documentation.as_ref().and_then(|d| d.long());
            if let Some(doc) = doc.filter(|d| !d.is_empty())
                && !docs.contains(&doc)
            {
                docs.push(doc);
            }
        }
        if docs.is_empty() {
            return Ok(None);
        }

        let key = path.last().map(PathSegment::as_key).unwrap_or_default();
        let width = lines(original).get(row).map_or(0, |line| line.len());
        return Ok(Some(Hover {
            content: format!("**{key}**\n\n{}", docs.join("\n\n")),
            range: EditorRange::new(Position::new(row, 0), Position::new(row, width)),
        }));
    }
    Ok(None)
}

/// Path of the first mapping key whose text starts on `row`.
fn key_path_on_row(node: &AnnotatedParse, original: &str, row: usize) -> Option<Vec<PathSegment>> {
    let children: Vec<(PathSegment, Option<&AnnotatedParse>, &AnnotatedParse)> = if node.kind.is_mapping() {
        node.entries()
            .map(|(key, value)| (PathSegment::Key(key_string(&key.result)), Some(key), value))
            .collect()
    } else if node.kind.is_sequence() {
        node.components
            .iter()
            .enumerate()
            .map(|(ix, item)| (PathSegment::Index(ix), None, item))
            .collect()
    } else {
        return None;
    };

    for (segment, key, value) in children {
        if let Some(key) = key
            && key.kind != NodeKind::Error
            && index_to_line_col(original, key.start).row == row
        {
            return Some(vec![segment]);
        }
        if let Some(mut rest) = key_path_on_row(value, original, row) {
            rest.insert(0, segment);
            return Some(rest);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use quarto_source_map::as_mapped_string;

    fn path_on_row(code: &str, row: usize) -> Option<Vec<String>> {
        let mut parser = YamlParser::new().unwrap();
        let code = as_mapped_string(code);
        let tree = parser.parse(code.value()).unwrap();
        let annotation = build_annotated(&tree, &code).unwrap().unwrap();
        key_path_on_row(&annotation, code.original(), row)
            .map(|path| path.iter().map(PathSegment::as_key).collect())
    }

    #[test]
    fn test_key_path_on_row() {
        let code = "title: x\nformat:\n  html:\n    toc: true\nauthors:\n  - name: me\n";
        assert_eq!(path_on_row(code, 0).unwrap(), vec!["title"]);
        assert_eq!(path_on_row(code, 3).unwrap(), vec!["format", "html", "toc"]);
        assert_eq!(path_on_row(code, 5).unwrap(), vec!["authors", "0", "name"]);
    }

    #[test]
    fn test_no_key_on_a_value_row() {
        let code = "tags:\n  - a\n  - b\n";
        assert!(path_on_row(code, 1).is_none());
        assert!(path_on_row(code, 7).is_none());
    }
}
