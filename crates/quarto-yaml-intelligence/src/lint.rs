//! Diagnostics for one YAML buffer.

use quarto_source_map::{index_to_line_col, line_offsets};
use quarto_yaml::{YamlParser, attempt_parses_at_line, build_annotated, yaml_predecessors};
use quarto_yaml_validation::YamlSchema;
use tracing::debug;

use crate::automation::YamlRequest;
use crate::error::Result;
use crate::types::LintItem;

/// Validate the first parse of `request.code` that builds an annotation.
///
/// When no attempt parses, there is nothing to report.
pub(crate) fn lint_parse(
    validator: &YamlSchema,
    parser: &mut YamlParser,
    request: &YamlRequest,
) -> Result<Vec<LintItem>> {
    let mut lints = Vec::new();
    for attempt in attempt_parses_at_line(parser, &request.code, request.position) {
        let Some(annotation) = build_annotated(&attempt.tree, &attempt.code)? else {
            continue;
        };
        let validated = validator.validate_parse(&request.code, &annotation)?;
        lints = validated.errors.iter().map(LintItem::from).collect();
        break;
    }
    lints.dedup();
    debug!(lints = lints.len(), schema = %request.schema_name, "linted yaml");

    if request.explicit == Some(false) {
        lints = hide_errors_above_cursor(lints, request);
    }
    Ok(lints)
}

/// Drop errors starting on the lines the line above the cursor is nested
/// under: while the user is typing, those are usually incomplete rather
/// than wrong.
fn hide_errors_above_cursor(lints: Vec<LintItem>, request: &YamlRequest) -> Vec<LintItem> {
    let Some(row) = request.position.row.checked_sub(1) else {
        return lints;
    };
    let code = request.code.value();
    let offsets = line_offsets(code);
    let hidden: Vec<usize> = yaml_predecessors(code, row)
        .into_iter()
        .filter_map(|line| request.code.map(offsets[line]))
        .map(|offset| index_to_line_col(request.code.original(), offset).row)
        .collect();
    lints
        .into_iter()
        .filter(|lint| !hidden.contains(&lint.start_row))
        .collect()
}
