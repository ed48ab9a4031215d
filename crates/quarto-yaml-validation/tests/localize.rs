//! End-to-end validation of annotated YAML.

use std::sync::Arc;

use quarto_source_map::{MappedText, as_mapped_string, mapped_substring};
use quarto_yaml::{AnnotatedParse, YamlParser, build_annotated};
use quarto_yaml_validation::{
    INVALID_PROPERTY_KEYWORD, SchemaRegistry, YamlSchema, report_errors_in_source,
};
use serde_json::{Value, json};

fn annotate(code: &MappedText) -> AnnotatedParse {
    let mut parser = YamlParser::new().unwrap();
    let tree = parser.parse(code.value()).unwrap();
    build_annotated(&tree, code).unwrap().unwrap()
}

fn closed_object() -> YamlSchema {
    YamlSchema::new(
        &json!({
            "type": "object",
            "properties": {"a": {"type": "string"}},
            "additionalProperties": false
        }),
        Arc::new(SchemaRegistry::new()),
    )
    .unwrap()
}

#[test]
fn test_type_and_unknown_key_are_reported_separately() {
    let code = as_mapped_string("a: 1\nb: 2\n");
    let parse = annotate(&code);
    let validated = closed_object().validate_parse(&code, &parse).unwrap();

    assert_eq!(validated.result, json!({"a": 1, "b": 2}));
    let summary: Vec<_> = validated
        .errors
        .iter()
        .map(|e| (e.instance_path.as_str(), e.error.keyword.as_str()))
        .collect();
    assert_eq!(
        summary,
        vec![("/a", "type"), ("/b", INVALID_PROPERTY_KEYWORD)]
    );

    let messages: Vec<_> = validated.errors.iter().map(|e| e.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "(line 1, columns 4--5): Field /a must be a string",
            "(line 2, columns 1--2): Field /b must not be present (unknown property)",
        ]
    );
}

#[test]
fn test_valid_document_has_no_errors() {
    let code = as_mapped_string("a: hello\n");
    let parse = annotate(&code);
    let validated = closed_object().validate_parse(&code, &parse).unwrap();
    assert!(validated.errors.is_empty());
    assert_eq!(validated.result, json!({"a": "hello"}));
}

#[test]
fn test_validation_is_deterministic() {
    let code = as_mapped_string("a: 1\nb: 2\nc: 3\n");
    let parse = annotate(&code);
    let schema = closed_object();
    let first = schema.validate_parse(&code, &parse).unwrap();
    let second = schema.validate_parse(&code, &parse).unwrap();
    let messages = |errors: &[quarto_yaml_validation::ValidationError]| {
        errors.iter().map(|e| e.message.clone()).collect::<Vec<_>>()
    };
    assert_eq!(messages(&first.errors), messages(&second.errors));
    assert_eq!(first.errors.len(), 3);
}

#[test]
fn test_errors_point_into_the_original_document() {
    // the YAML is the front matter of a larger document
    let doc = as_mapped_string("---\ntitle: 3\n---\n\n# Heading\n");
    let yaml = mapped_substring(&doc, 4, 13).unwrap();
    let parse = annotate(&yaml);

    let schema = YamlSchema::new(
        &json!({
            "type": "object",
            "properties": {"title": {"type": "string", "description": "be the document title"}}
        }),
        Arc::new(SchemaRegistry::new()),
    )
    .unwrap();
    let validated = schema.validate_parse(&yaml, &parse).unwrap();

    assert_eq!(validated.errors.len(), 1);
    let error = &validated.errors[0];
    assert_eq!(error.start.row, 1);
    assert_eq!(error.start.column, 7);
    assert_eq!(
        error.message,
        "(line 2, columns 8--9): Field /title must be the document title"
    );
}

#[test]
fn test_one_of_reports_the_unknown_key_branch() {
    let schema = YamlSchema::new(
        &json!({
            "oneOf": [
                {"type": "string"},
                {
                    "type": "object",
                    "properties": {"name": {"type": "string"}},
                    "additionalProperties": false
                }
            ]
        }),
        Arc::new(SchemaRegistry::new()),
    )
    .unwrap();
    let code = as_mapped_string("name: x\nnmae: y\n");
    let parse = annotate(&code);
    let validated = schema.validate_parse(&code, &parse).unwrap();

    assert_eq!(validated.errors.len(), 1);
    assert_eq!(validated.errors[0].instance_path, "/nmae");
    assert_eq!(validated.errors[0].error.keyword, INVALID_PROPERTY_KEYWORD);
}

#[test]
fn test_all_of_siblings_on_one_value_are_all_reported() {
    let schema = YamlSchema::new(
        &json!({
            "type": "object",
            "properties": {
                "a": {"allOf": [{"type": "string"}, {"enum": ["x", "y"]}]}
            }
        }),
        Arc::new(SchemaRegistry::new()),
    )
    .unwrap();
    let code = as_mapped_string("a: 1\n");
    let parse = annotate(&code);
    let validated = schema.validate_parse(&code, &parse).unwrap();

    let summary: Vec<_> = validated
        .errors
        .iter()
        .map(|e| (e.error.schema_path.as_str(), e.start.column, e.end.column))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("#/properties/a/allOf/0/type", 3, 4),
            ("#/properties/a/allOf/1/enum", 3, 4),
        ]
    );
}

#[test]
fn test_report_errors_in_source() {
    let code = as_mapped_string("a: 1\nb: 2\n");
    let parse = annotate(&code);
    let validated = closed_object().validate_parse(&code, &parse).unwrap();
    let report = report_errors_in_source(&validated.errors, &code);

    insta::assert_snapshot!(report, @r"
(line 1, columns 4--5): Field /a must be a string
✖ The value 1 is of type number.
1: a: 1
      ^
2: b: 2
(line 2, columns 1--2): Field /b must not be present (unknown property)
1: a: 1
2: b: 2
   ^
3:
");
}

#[test]
fn test_error_serializes_raw_fields() {
    let code = as_mapped_string("a: 1\n");
    let parse = annotate(&code);
    let validated = closed_object().validate_parse(&code, &parse).unwrap();
    let raw = serde_json::to_value(&validated.errors[0].error).unwrap();
    assert_eq!(raw["instancePath"], Value::from("/a"));
    assert_eq!(raw["schemaPath"], Value::from("#/properties/a/type"));
    assert_eq!(raw["keyword"], Value::from("type"));
}

fn errors_for(schema: Value, code: &str) -> Vec<quarto_yaml_validation::ValidationError> {
    let schema = YamlSchema::new(&schema, Arc::new(SchemaRegistry::new())).unwrap();
    let code = as_mapped_string(code);
    let parse = annotate(&code);
    schema.validate_parse(&code, &parse).unwrap().errors
}

#[test]
fn test_yaml_11_booleans_get_a_fix() {
    let errors = errors_for(
        json!({"type": "object", "properties": {"toc": {"type": "boolean"}}}),
        "toc: yes\n",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].details, vec!["The value yes is a string."]);
    assert_eq!(
        errors[0].hints,
        vec![
            "Quarto uses YAML 1.2, which interprets booleans strictly.",
            "Try using true instead.",
        ]
    );
}

#[test]
fn test_missing_space_after_colon() {
    let errors = errors_for(
        json!({
            "type": "object",
            "properties": {
                "execute": {"type": "object", "properties": {"echo": {"type": "boolean"}}}
            }
        }),
        "execute: echo:false\n",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].details, vec!["The value echo:false is a string."]);
    assert_eq!(errors[0].hints[1], "Did you mean echo: false instead?");
}

#[test]
fn test_typos_suggest_nearby_keys_and_values() {
    let schema = json!({
        "type": "object",
        "properties": {
            "title": {"type": "string"},
            "toc": {"type": "boolean"},
            "format": {"enum": ["html", "pdf"]}
        },
        "additionalProperties": false
    });

    let errors = errors_for(schema.clone(), "titl: x\n");
    assert_eq!(errors[0].error.keyword, INVALID_PROPERTY_KEYWORD);
    assert_eq!(errors[0].hints, vec!["Did you mean title?"]);

    let errors = errors_for(schema.clone(), "format: HTML\n");
    assert_eq!(errors[0].hints, vec!["Did you mean html?"]);

    // nothing close enough
    let errors = errors_for(schema, "zzzzzz: 1\n");
    assert!(errors[0].hints.is_empty());
}

#[test]
fn test_missing_required_key_points_at_a_typo() {
    let errors = errors_for(
        json!({
            "type": "object",
            "properties": {"title": {"type": "string"}},
            "required": ["title"]
        }),
        "titl: x\n",
    );
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error.keyword, "required");
    assert_eq!(errors[0].hints, vec!["Is titl a typo of title?"]);
}

#[test]
fn test_type_mismatch_names_the_found_type() {
    let errors = errors_for(
        json!({"type": "object", "properties": {"title": {"type": "string"}}}),
        "title: [a, b]\n",
    );
    assert_eq!(errors[0].details, vec!["The value [a, b] is of type an array."]);
}
