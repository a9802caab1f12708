//! Manifest validation cases.
//!
//! Each `#[case]` starts from the same minimal valid manifest and breaks one
//! rule.

use assetsync_core::{validate, validate_yaml, Category};
use rstest::rstest;
use serde_json::{json, Value};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn minimal() -> Value {
    json!({
        "id": "web_search",
        "version": "1.0.0",
        "category": "tool",
        "name": "Web search",
        "description": "Search the web"
    })
}

fn with(field: &str, value: Value) -> Value {
    let mut raw = minimal();
    raw[field] = value;
    raw
}

fn without(field: &str) -> Value {
    let mut raw = minimal();
    raw.as_object_mut().expect("object").remove(field);
    raw
}

// ---------------------------------------------------------------------------
// 1. Acceptance
// ---------------------------------------------------------------------------

#[rstest]
#[case::plain("1.0.0")]
#[case::prerelease("2.10.3-beta.1")]
#[case::large("10.20.30")]
fn accepts_versions(#[case] version: &str) {
    let manifest = validate(&with("version", json!(version))).expect("valid");
    assert_eq!(manifest.version, version);
}

#[rstest]
#[case::tool("tool", Category::Tool)]
#[case::prompt("prompt", Category::Prompt)]
#[case::skill("skill", Category::Skill)]
fn accepts_every_category(#[case] raw: &str, #[case] expected: Category) {
    let manifest = validate(&with("category", json!(raw))).expect("valid");
    assert_eq!(manifest.category, expected);
}

#[test]
fn permissions_default_to_denied() {
    let manifest = validate(&minimal()).expect("valid");
    assert!(!manifest.permissions.network_access);
    assert!(!manifest.permissions.filesystem_read);
}

#[test]
fn yaml_document_with_nested_sections_validates() {
    let yaml = r#"
id: pdf_reader
version: 0.3.1
category: skill
name: PDF reader
description: Extract text from PDF documents
author: docs-team
config_schema:
  - name: language
    label: Language
    type: select
    options:
      - label: English
        value: en
      - label: German
        value: de
runtime:
  language: python
  entry: reader.py
  handler: run
  dependencies: [pypdf]
permissions:
  filesystem_read: true
"#;
    let manifest = validate_yaml(yaml).expect("valid");
    assert_eq!(manifest.author.as_deref(), Some("docs-team"));
    assert_eq!(manifest.config_schema[0].options.as_ref().map(Vec::len), Some(2));
    assert!(manifest.permissions.filesystem_read);
    assert_eq!(manifest.runtime.expect("runtime").dependencies, vec!["pypdf"]);
}

// ---------------------------------------------------------------------------
// 2. Rejection
// ---------------------------------------------------------------------------

#[rstest]
#[case::missing_id(without("id"), "id")]
#[case::missing_version(without("version"), "version")]
#[case::missing_category(without("category"), "category")]
#[case::missing_name(without("name"), "name")]
#[case::missing_description(without("description"), "description")]
#[case::id_with_space(with("id", json!("web search")), "id")]
#[case::id_with_slash(with("id", json!("a/b")), "id")]
#[case::two_part_version(with("version", json!("1.0")), "version")]
#[case::prefixed_version(with("version", json!("v1.0.0")), "version")]
#[case::unknown_category(with("category", json!("widget")), "category")]
#[case::empty_name(with("name", json!("")), "name")]
#[case::numeric_description(with("description", json!(42)), "description")]
#[case::permissions_not_bool(with("permissions", json!({"network_access": "yes"})), "network_access")]
fn rejects_rule_violation(#[case] raw: Value, #[case] field: &str) {
    let err = validate(&raw).unwrap_err();
    assert!(err.mentions(field), "expected '{field}' in: {err}");
}

#[test]
fn select_without_options_names_options() {
    let raw = with(
        "config_schema",
        json!([{"name": "mode", "label": "Mode", "type": "select"}]),
    );
    let err = validate(&raw).unwrap_err();
    assert!(err.mentions("options"), "got: {err}");
    assert_eq!(err.errors[0].path, "config_schema.0");
}

#[test]
fn select_with_empty_options_needs_one_item() {
    let raw = with(
        "config_schema",
        json!([{"name": "mode", "label": "Mode", "type": "select", "options": []}]),
    );
    let err = validate(&raw).unwrap_err();
    assert_eq!(err.errors[0].path, "config_schema.0.options");
    assert!(err.errors[0].message.contains("less than 1 item"), "got: {err}");
}

#[test]
fn config_item_name_must_be_identifier() {
    let raw = with(
        "config_schema",
        json!([{"name": "1st-key", "label": "Key", "type": "string"}]),
    );
    let err = validate(&raw).unwrap_err();
    assert_eq!(err.errors[0].path, "config_schema.0.name");
}

#[test]
fn agent_parameters_must_be_object_schema() {
    let raw = with(
        "agent_specs",
        json!({
            "function_name": "search",
            "description": "Search",
            "parameters": {"type": "array"}
        }),
    );
    let err = validate(&raw).unwrap_err();
    assert_eq!(err.errors[0].path, "agent_specs.parameters.type");
}

#[test]
fn runtime_language_is_restricted() {
    let raw = with(
        "runtime",
        json!({"language": "ruby", "entry": "main.rb", "handler": "call"}),
    );
    let err = validate(&raw).unwrap_err();
    assert_eq!(err.errors[0].path, "runtime.language");
    assert!(err.errors[0].message.contains("\"ruby\" is not one of"));
}

#[test]
fn empty_document_is_not_an_object() {
    let err = validate_yaml("").unwrap_err();
    assert_eq!(err.errors[0].path, "root");
}
