//! Friendlier explanations for common YAML mistakes.
//!
//! Runs on localized errors. Each check looks at one error and may replace
//! its details (what is wrong with the value) or add hints (how to fix it):
//! a value of the wrong type, YAML 1.1 booleans, `key:value` and `key=value`
//! written for a mapping, and keys or values that are a typo away from one
//! the schema knows.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::completions::{CompletionKind, schema_completions};
use crate::error::ValidationError;
use crate::localize::{INVALID_PROPERTY_KEYWORD, keyword_parent};
use crate::navigation::navigate_schema_path;
use crate::schema::{Schema, SchemaRegistry, walk_schema};

static MISSING_SPACE_AFTER_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+:[^ ].*$").unwrap());
static EQUALS_INSTEAD_OF_COLON: Lazy<Regex> = Lazy::new(|| Regex::new(r"^.+ *= *.+$").unwrap());
static EQUALS: Lazy<Regex> = Lazy::new(|| Regex::new(r" *= *").unwrap());

/// Strings YAML 1.1 read as booleans (<https://yaml.org/type/bool.html>).
const YAML_11_TRUE: [&str; 11] = ["y", "Y", "yes", "Yes", "YES", "true", "True", "TRUE", "on", "On", "ON"];
const YAML_11_FALSE: [&str; 11] = ["n", "N", "no", "No", "NO", "false", "False", "FALSE", "off", "Off", "OFF"];

/// Values longer than this many lines are shown by their first and last two.
const MAX_SHOWN_LINES: usize = 4;

/// Fill in `details` and `hints` of each error.
///
/// `schema` and `registry` must be the ones the errors were produced with.
pub fn improve_errors(errors: &mut [ValidationError], schema: &Schema, registry: &SchemaRegistry) {
    for error in errors {
        check_type_mismatch(error);
        check_bad_boolean(error);
        check_bad_colon(error);
        check_bad_equals(error);

        let holder = navigate_schema_path(schema, owner_path(&error.error.schema_path), registry)
            .and_then(|s| registry.deref(s));
        if let Ok(holder) = holder {
            check_nearby_correction(error, holder, registry);
        }
        check_nearby_required(error);
    }
}

/// The schema path of the schema an error is about. Errors on property
/// names belong to the object, not to the name schema.
fn owner_path(schema_path: &str) -> &str {
    match schema_path.find("/propertyNames") {
        Some(ix) => &schema_path[..ix],
        None => keyword_parent(schema_path),
    }
}

fn check_type_mismatch(error: &mut ValidationError) {
    let verbatim = error.violating_object.source.value();
    if error.error.keyword != "type" || verbatim.is_empty() {
        return;
    }
    let shown = reindent(&abbreviate(verbatim));
    let subject = if shown.contains('\n') {
        format!("The value\n\n{shown}\n\n")
    } else {
        format!("The value {shown} ")
    };
    let found = value_type(&error.violating_object.result);
    error.details = vec![format!("{subject}is of type {found}.")];
}

fn check_bad_boolean(error: &mut ValidationError) {
    if !expects_type(error, "boolean") {
        return;
    }
    let Some(value) = error.violating_object.result.as_str() else {
        return;
    };
    let fix = if YAML_11_TRUE.contains(&value) {
        true
    } else if YAML_11_FALSE.contains(&value) {
        false
    } else {
        return;
    };
    error.details = vec![format!("The value {value} is a string.")];
    error.hints = vec![
        "Quarto uses YAML 1.2, which interprets booleans strictly.".to_string(),
        format!("Try using {fix} instead."),
    ];
}

/// `echo:false` where a mapping was expected.
fn check_bad_colon(error: &mut ValidationError) {
    if !expects_type(error, "object") {
        return;
    }
    let Some(value) = error.violating_object.result.as_str() else {
        return;
    };
    if !MISSING_SPACE_AFTER_COLON.is_match(value) {
        return;
    }
    error.details = vec![format!("The value {value} is a string.")];
    error.hints = vec![
        "In YAML, key-value pairs in objects must be separated by a space.".to_string(),
        format!("Did you mean {} instead?", value.replace(':', ": ")),
    ];
}

/// `echo=false` where a mapping was expected, or as a key.
fn check_bad_equals(error: &mut ValidationError) {
    let value = if expects_type(error, "object") {
        error.violating_object.result.as_str()
    } else if error.error.keyword == "pattern" && error.error.schema_path.contains("/propertyNames/") {
        bad_key(error)
    } else {
        None
    };
    let Some(value) = value.filter(|v| EQUALS_INSTEAD_OF_COLON.is_match(v)).map(str::to_string) else {
        return;
    };
    let fixed = EQUALS.replace_all(&value, ": ").into_owned();
    error.details = vec![format!("The value {value} is a string.")];
    error.hints = vec![
        "In YAML, key-value pairs in objects must be separated by a colon and a space.".to_string(),
        format!("Did you mean {fixed} instead?"),
    ];
}

/// Suggest the keys (for a bad key) or values (for a bad string value) of
/// `holder` closest to what was written.
fn check_nearby_correction(error: &mut ValidationError, holder: &Schema, registry: &SchemaRegistry) {
    let (written, candidates) = match bad_key(error) {
        Some(key) => (key.to_string(), possible_keys(holder, registry)),
        None => match error.violating_object.result.as_str() {
            Some(value) => (value.to_string(), possible_values(holder)),
            None => return,
        },
    };
    let best = closest(&written, &candidates);
    if !best.is_empty() {
        error.hints.push(format!("Did you mean {}?", alternatives(&best)));
    }
}

/// For a missing required key, point at existing keys that look like a
/// misspelling of it.
fn check_nearby_required(error: &mut ValidationError) {
    if error.error.keyword != "required" {
        return;
    }
    let Some(missing) = error.error.params.get("missingProperty").and_then(Value::as_str) else {
        return;
    };
    let Value::Object(present) = &error.violating_object.result else {
        return;
    };
    let keys: Vec<String> = present.keys().cloned().collect();
    let best = closest(missing, &keys);
    let hint = match best.as_slice() {
        [] => return,
        [_] | [_, _] => format!("Is {} a typo of {missing}?", alternatives(&best)),
        _ => format!("Is one of {} a typo of {missing}?", alternatives(&best)),
    };
    error.hints.push(hint);
}

fn expects_type(error: &ValidationError, type_name: &str) -> bool {
    error.error.keyword == "type" && error.error.params.get("type").and_then(Value::as_str) == Some(type_name)
}

/// The key an error complains about, if it is about a key.
fn bad_key(error: &ValidationError) -> Option<&str> {
    if error.error.keyword == INVALID_PROPERTY_KEYWORD {
        return error.violating_object.result.as_str();
    }
    if error.error.schema_path.contains("/propertyNames") {
        return error.error.params.get("propertyName").and_then(Value::as_str);
    }
    None
}

/// Keys a schema accepts: its key completions, or else the properties of
/// every object it is made of.
fn possible_keys(schema: &Schema, registry: &SchemaRegistry) -> Vec<String> {
    let completed: Vec<String> = schema_completions(schema, registry)
        .unwrap_or_default()
        .into_iter()
        .filter(|c| c.kind == CompletionKind::Key)
        .filter_map(|c| c.value.split(':').next().map(str::to_string))
        .collect();
    if !completed.is_empty() {
        return completed;
    }

    let mut keys = Vec::new();
    walk_schema(schema, &mut |s| match s {
        Schema::Object(obj) => {
            keys.extend(obj.properties.keys().cloned());
            true
        }
        Schema::Array(_) => true,
        _ => false,
    });
    keys
}

/// Enum values a schema accepts, without descending into arrays or objects.
fn possible_values(schema: &Schema) -> Vec<String> {
    let mut values = Vec::new();
    walk_schema(schema, &mut |s| match s {
        Schema::Enum(e) => {
            values.extend(e.values.iter().map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            }));
            true
        }
        Schema::Array(_) | Schema::Object(_) => true,
        _ => false,
    });
    values
}

/// The candidates nearest to `word`, or none when even the nearest would
/// need ordinary edits to more than 30% of its characters.
fn closest<'a>(word: &str, candidates: &'a [String]) -> Vec<&'a str> {
    let mut best: Vec<&str> = Vec::new();
    let mut best_distance = usize::MAX;
    for candidate in candidates {
        let distance = edit_distance(candidate, word);
        if distance < best_distance {
            best = vec![candidate.as_str()];
            best_distance = distance;
        } else if distance == best_distance && !best.contains(&candidate.as_str()) {
            best.push(candidate);
        }
    }
    if best_distance > 3 * word.chars().count() {
        return vec![];
    }
    best
}

/// "a", "a or b", "a, b, or c".
fn alternatives(words: &[&str]) -> String {
    match words {
        [] => String::new(),
        [one] => one.to_string(),
        [first, second] => format!("{first} or {second}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}

/// Weighted edit distance between two words.
///
/// Inserting, deleting or replacing a character costs 10, except that `_`
/// and `-` cost 1 to insert, delete or swap for each other. Changing only
/// the case of a letter, or one digit for another, costs 1.
pub fn edit_distance(w1: &str, w2: &str) -> usize {
    let a: Vec<char> = w1.chars().collect();
    let b: Vec<char> = w2.chars().collect();
    let cost = |c: char| if matches!(c, '_' | '-') { 1 } else { 10 };
    let substitution = |c1: char, c2: char| {
        if c1 == c2 {
            0
        } else if matches!(c1, '_' | '-') && matches!(c2, '_' | '-') {
            1
        } else if c1.to_lowercase().eq(c2.to_lowercase()) {
            1
        } else if c1.is_ascii_digit() && c2.is_ascii_digit() {
            1
        } else {
            10
        }
    };

    let mut previous: Vec<usize> = Vec::with_capacity(b.len() + 1);
    previous.push(0);
    for &c in &b {
        let last = previous[previous.len() - 1];
        previous.push(last + cost(c));
    }
    for &c1 in &a {
        let mut row = Vec::with_capacity(b.len() + 1);
        row.push(previous[0] + cost(c1));
        for (j, &c2) in b.iter().enumerate() {
            let value = (previous[j] + substitution(c1, c2))
                .min(row[j] + cost(c2))
                .min(previous[j + 1] + cost(c1));
            row.push(value);
        }
        previous = row;
    }
    previous[b.len()]
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Array(_) => "an array",
        Value::Null => "a null value",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Object(_) => "object",
    }
}

/// Long values keep their first and last two lines.
fn abbreviate(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= MAX_SHOWN_LINES {
        return text.to_string();
    }
    let mut shown = lines[..2].to_vec();
    shown.push("...");
    shown.extend_from_slice(&lines[lines.len() - 2..]);
    shown.join("\n")
}

/// Shift a nested block left so its shallowest indented lines use two
/// spaces, keeping deeper lines relative to them.
fn reindent(text: &str) -> String {
    let mut widths: Vec<usize> = Vec::new();
    for line in text.lines() {
        let width = line.len() - line.trim_start_matches(' ').len();
        if width > 0 && !widths.contains(&width) {
            widths.push(width);
        }
    }
    let cut = match widths.as_slice() {
        [] => return text.to_string(),
        [only] if *only <= 2 => return text.to_string(),
        [only] => (*only, *only - 2),
        [first, second, ..] => {
            let step = second.saturating_sub(*first);
            if step == 0 || step >= *first {
                return text.to_string();
            }
            (*first, *first - step)
        }
    };
    let (old_indent, remove) = cut;
    let prefix = " ".repeat(old_indent);
    text.lines()
        .map(|line| if line.starts_with(&prefix) { &line[remove..] } else { line })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance_weights() {
        assert_eq!(edit_distance("toc-depth", "toc_depth"), 1);
        assert_eq!(edit_distance("Title", "title"), 1);
        assert_eq!(edit_distance("h1", "h2"), 1);
        assert_eq!(edit_distance("titl", "title"), 10);
        assert_eq!(edit_distance("toc", "toc-"), 1);
        assert_eq!(edit_distance("", "ab"), 20);
        assert_eq!(edit_distance("abc", "abc"), 0);
    }

    #[test]
    fn test_closest_respects_the_cutoff() {
        let candidates = vec!["title".to_string(), "toc".to_string(), "subtitle".to_string()];
        assert_eq!(closest("titl", &candidates), vec!["title"]);
        assert!(closest("zzzz", &candidates).is_empty());
        // a swap is two substitutions, too many for a five letter word
        assert!(closest("titel", &candidates).is_empty());
    }

    #[test]
    fn test_alternatives() {
        assert_eq!(alternatives(&["a"]), "a");
        assert_eq!(alternatives(&["a", "b"]), "a or b");
        assert_eq!(alternatives(&["a", "b", "c"]), "a, b, or c");
    }

    #[test]
    fn test_abbreviate_and_reindent() {
        assert_eq!(abbreviate("1\n2\n3\n4\n5\n6"), "1\n2\n...\n5\n6");
        assert_eq!(abbreviate("1\n2"), "1\n2");
        assert_eq!(reindent("a: 1\n    b: 2"), "a: 1\n  b: 2");
        assert_eq!(reindent("a:\n  b: 2"), "a:\n  b: 2");
        assert_eq!(reindent("a:\n    b:\n      c: 1"), "a:\n  b:\n    c: 1");
    }
}
