//! Manifest schema validation.
//!
//! The manifest rules are a Draft 7 JSON Schema compiled once. Every
//! violation is reported at once (`[path] message`); only data that passes
//! is deserialized into a [`Manifest`].
//!
//! Pure: no I/O, no shared mutable state.

use std::sync::LazyLock;

use jsonschema::{Draft, JSONSchema};
use serde_json::{json, Value};

use crate::error::{FieldError, SchemaViolation};
use crate::types::Manifest;

/// The manifest schema document.
pub static MANIFEST_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "Agent Asset Manifest",
        "type": "object",
        "required": ["id", "version", "category", "name", "description"],
        "properties": {
            "id": {"type": "string", "pattern": "^[a-zA-Z0-9_-]+$"},
            "version": {"type": "string", "pattern": r"^\d+\.\d+\.\d+(-[a-zA-Z0-9.]+)?$"},
            "category": {"type": "string", "enum": ["tool", "prompt", "skill"]},
            "name": {"type": "string", "minLength": 1},
            "description": {"type": "string", "minLength": 1},
            "author": {"type": "string"},
            "config_schema": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "label", "type"],
                    "properties": {
                        "name": {"type": "string", "pattern": "^[a-zA-Z_][a-zA-Z0-9_]*$"},
                        "label": {"type": "string", "minLength": 1},
                        "type": {
                            "type": "string",
                            "enum": ["string", "number", "select", "secret", "boolean"]
                        },
                        "required": {"type": "boolean"},
                        "default": {},
                        "placeholder": {"type": "string"},
                        "options": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["label", "value"],
                                "properties": {"label": {"type": "string"}, "value": {}}
                            }
                        }
                    },
                    "if": {"properties": {"type": {"const": "select"}}},
                    "then": {
                        "required": ["options"],
                        "properties": {"options": {"type": "array", "minItems": 1}}
                    }
                }
            },
            "agent_specs": {
                "type": "object",
                "required": ["function_name", "description", "parameters"],
                "properties": {
                    "function_name": {"type": "string", "pattern": "^[a-zA-Z_][a-zA-Z0-9_]*$"},
                    "description": {"type": "string", "minLength": 1},
                    "parameters": {
                        "type": "object",
                        "required": ["type"],
                        "properties": {
                            "type": {"const": "object"},
                            "properties": {"type": "object"},
                            "required": {"type": "array", "items": {"type": "string"}}
                        }
                    }
                }
            },
            "runtime": {
                "type": "object",
                "required": ["language", "entry", "handler"],
                "properties": {
                    "language": {"type": "string", "enum": ["python"]},
                    "entry": {"type": "string"},
                    "handler": {"type": "string"},
                    "dependencies": {"type": "array", "items": {"type": "string"}}
                }
            },
            "permissions": {
                "type": "object",
                "properties": {
                    "network_access": {"type": "boolean"},
                    "filesystem_read": {"type": "boolean"}
                }
            }
        }
    })
});

static COMPILED: LazyLock<JSONSchema> = LazyLock::new(|| {
    JSONSchema::options()
        .with_draft(Draft::Draft7)
        .compile(&MANIFEST_SCHEMA)
        .expect("embedded manifest schema must compile")
});

/// Validate raw manifest data and deserialize it.
pub fn validate(raw: &Value) -> Result<Manifest, SchemaViolation> {
    let errors = check(raw);
    if !errors.is_empty() {
        return Err(SchemaViolation { errors });
    }
    serde_json::from_value(raw.clone())
        .map_err(|e| SchemaViolation::single("root", e.to_string()))
}

/// Parse YAML text and validate the result.
pub fn validate_yaml(content: &str) -> Result<Manifest, SchemaViolation> {
    let raw = parse_yaml(content)?;
    validate(&raw)
}

/// Parse YAML text into a JSON value; a parse failure is a root violation.
pub fn parse_yaml(content: &str) -> Result<Value, SchemaViolation> {
    serde_yaml::from_str::<Value>(content)
        .map_err(|e| SchemaViolation::single("root", format!("YAML parsing error: {e}")))
}

/// Collect every schema violation in `raw`. Empty means valid.
pub fn check(raw: &Value) -> Vec<FieldError> {
    match COMPILED.validate(raw) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| FieldError::new(dotted(&e.instance_path.to_string()), e.to_string()))
            .collect(),
    }
}

/// `/config_schema/0/options` → `config_schema.0.options`; empty → `root`.
fn dotted(pointer: &str) -> String {
    let trimmed = pointer.trim_start_matches('/');
    if trimmed.is_empty() {
        "root".to_string()
    } else {
        trimmed.replace('/', ".")
    }
}
