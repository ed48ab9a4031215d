//! Validating annotated YAML against a compiled schema.

use std::fmt;
use std::sync::Arc;

use quarto_source_map::{MappedText, format_line_range, index_to_line_col, lines};
use quarto_yaml::AnnotatedParse;
use serde_json::Value;
use tracing::debug;

use crate::error::{SchemaResult, ValidationError};
use crate::localize::localize_errors;
use crate::normalize::normalize_schema;
use crate::schema::{Schema, SchemaRegistry};
use crate::validator::{BuiltinCompiler, CompiledValidator, SchemaCompiler};

/// The decoded value of a parse together with its localized errors.
#[derive(Debug, Clone)]
pub struct ValidatedParseResult {
    pub result: Value,
    pub errors: Vec<ValidationError>,
}

/// A schema compiled once and used for any number of validations.
pub struct YamlSchema {
    schema: Schema,
    registry: Arc<SchemaRegistry>,
    validator: Box<dyn CompiledValidator>,
}

impl fmt::Debug for YamlSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YamlSchema")
            .field("schema", &self.schema.schema_type())
            .field("registry", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl YamlSchema {
    /// Compile `schema` with the built-in validator.
    pub fn new(schema: &Value, registry: Arc<SchemaRegistry>) -> SchemaResult<Self> {
        Self::with_compiler(schema, registry, &BuiltinCompiler)
    }

    /// Compile `schema` with an injected validator.
    ///
    /// The compiler receives the schema with editor-only keywords removed;
    /// error messages are still built from the full schema.
    pub fn with_compiler(
        schema: &Value,
        registry: Arc<SchemaRegistry>,
        compiler: &dyn SchemaCompiler,
    ) -> SchemaResult<Self> {
        let parsed = Schema::from_json(schema)?;
        let validator = compiler.compile(&normalize_schema(schema), registry.clone())?;
        debug!(schema = parsed.schema_type(), "compiled schema");
        Ok(YamlSchema {
            schema: parsed,
            registry,
            validator,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Validate the value of `annotation`, which was parsed from `src`.
    pub fn validate_parse(
        &self,
        src: &MappedText,
        annotation: &AnnotatedParse,
    ) -> SchemaResult<ValidatedParseResult> {
        let raw = self.validator.validate(&annotation.result);
        let errors = if raw.is_empty() {
            vec![]
        } else {
            debug!(raw = raw.len(), "value failed validation");
            localize_errors(raw, annotation, src, &self.schema, &self.registry)?
        };
        Ok(ValidatedParseResult {
            result: annotation.result.clone(),
            errors,
        })
    }
}

/// Render each error's message, its details (`✖`) and hints (`ℹ`), followed
/// by the offending lines of the original document, with one line of
/// context on either side and the violating span underlined.
///
/// Whitespace at either end of the span is not underlined.
pub fn report_errors_in_source(errors: &[ValidationError], src: &MappedText) -> String {
    let original = src.original();
    let last_line = lines(original).len().saturating_sub(1);
    let mut out = Vec::new();

    for error in errors {
        out.push(error.message.clone());
        out.extend(error.details.iter().map(|detail| format!("✖ {detail}")));
        out.extend(error.hints.iter().map(|hint| format!("ℹ {hint}")));
        let (first, last) = trimmed_span(
            original,
            error.violating_object.start,
            error.violating_object.end,
        );
        let start = index_to_line_col(original, first);
        let end = index_to_line_col(original, last);

        let excerpt = format_line_range(
            original,
            start.row.saturating_sub(1),
            (end.row + 1).min(last_line),
        );
        for line in &excerpt.lines {
            out.push(line.rendered.trim_end().to_string());
            if line.line_number < start.row || line.line_number > end.row {
                continue;
            }
            let from = if line.line_number > start.row { 0 } else { start.column };
            let to = if line.line_number < end.row {
                line.content.len().saturating_sub(1)
            } else {
                end.column
            };
            out.push(format!(
                "{}{}",
                " ".repeat(excerpt.prefix_width + from),
                "^".repeat(to.saturating_sub(from) + 1)
            ));
        }
    }
    out.join("\n")
}

/// The first and last (inclusive) byte offsets of the non-whitespace part
/// of `text[start..end]`. An all-whitespace span collapses onto `start`.
fn trimmed_span(text: &str, start: usize, end: usize) -> (usize, usize) {
    let end = end.min(text.len());
    let start = start.min(end);
    let span = &text[start..end];
    let Some(first) = span.find(|c: char| !c.is_whitespace()) else {
        return (start, start);
    };
    let last = span
        .char_indices()
        .rev()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(first, |(ix, _)| ix);
    (start + first, start + last)
}
