//! Schema validation helpers.
//!
//! This module validates `serde_json::Value` documents against a [`Schema`]
//! before any remote call is made, so malformed identifiers and unknown union
//! discriminators are reported to the user directly.
//!
//! # Example
//!
//! ```
//! use stackit_provider::schema::{Attribute, Schema};
//! use stackit_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("project_id", Attribute::required_id())
//!     .with_attribute("replicas", Attribute::optional_int64());
//!
//! let input = json!({
//!     "project_id": "6d8b2a0e-4d1c-4c5e-9d8e-1b2a3c4d5e6f",
//!     "replicas": 3
//! });
//! assert!(validate(&schema, &input).is_empty());
//!
//! let input = json!({"project_id": "a,b"});
//! let diagnostics = validate(&schema, &input);
//! assert!(!diagnostics.is_empty());
//! assert_eq!(diagnostics[0].attribute, Some("project_id".to_string()));
//! ```

use crate::id;
use crate::schema::{Attribute, AttributeType, AttributeValidator, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema};
use crate::value::is_unknown_value;
use serde_json::Value;

/// Validate a configuration document against `schema`.
///
/// An empty result means the document is valid. Unknown values pass every
/// check, computed-only attributes are skipped, and string validators only
/// run once the value has the right type.
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// [`validate`] as a `Result`.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether [`validate`] reports nothing.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if value.is_null() || is_unknown_value(value) {
        return;
    }
    let Some(object) = value.as_object() else {
        let diag = Diagnostic::error("Expected object").with_detail(format!("Got {}", kind_of(value)));
        diagnostics.push(if path.is_empty() { diag } else { diag.with_attribute(path) });
        return;
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, object.get(name), &child(path, name), diagnostics);
    }
    for (name, nested) in &block.blocks {
        validate_nested(nested, object.get(name), &child(path, name), diagnostics);
    }
}

fn validate_attribute(attr: &Attribute, value: Option<&Value>, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if attr.flags.computed_only() {
        return;
    }
    let value = match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{path}'"))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
            return;
        },
        Some(v) => v,
    };

    let before = diagnostics.len();
    check_type(&attr.attr_type, value, path, diagnostics);
    if diagnostics.len() > before || is_unknown_value(value) {
        return;
    }
    if let Some(s) = value.as_str() {
        diagnostics.extend(attr.validators.iter().filter_map(|v| check_validator(v, s, path)));
    }
}

fn check_validator(validator: &AttributeValidator, value: &str, path: &str) -> Option<Diagnostic> {
    let detail = match validator {
        AttributeValidator::NoSeparator if !id::is_separator_free(value) => {
            format!("The value must not contain the character {:?}", id::SEPARATOR)
        },
        AttributeValidator::Uuid if uuid::Uuid::parse_str(value).is_err() => {
            format!("The value {value:?} is not a valid UUID")
        },
        AttributeValidator::NonEmpty if value.is_empty() => "The value must not be empty".to_string(),
        AttributeValidator::OneOf(allowed) if !allowed.iter().any(|a| a == value) => {
            format!("The value {value:?} must be one of: {}", allowed.join(", "))
        },
        _ => return None,
    };
    Some(
        Diagnostic::error(format!("Invalid value for attribute '{path}'"))
            .with_detail(detail)
            .with_attribute(path),
    )
}

fn check_type(attr_type: &AttributeType, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    if is_unknown_value(value) {
        return;
    }
    let expected = match attr_type {
        AttributeType::String if value.is_string() => return,
        AttributeType::Int64 if is_int64(value) => return,
        AttributeType::Bool if value.is_boolean() => return,
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(element) | AttributeType::Set(element) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    check_type(element, item, &format!("{path}.{i}"), diagnostics);
                }
                return;
            },
            None if matches!(attr_type, AttributeType::Set(_)) => "set",
            None => "list",
        },
        AttributeType::Map(element) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    check_type(element, item, &child(path, key), diagnostics);
                }
                return;
            },
            None => "map",
        },
    };
    diagnostics.push(
        Diagnostic::error(format!("Invalid type for attribute '{path}'"))
            .with_detail(format!("Expected {expected}, got {}", kind_of(value)))
            .with_attribute(path),
    );
}

fn validate_nested(nested: &NestedBlock, value: Option<&Value>, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let value = match value {
        Some(v) if !v.is_null() => v,
        _ => {
            if nested.min_items > 0 && !nested.computed {
                let summary = match nested.nesting_mode {
                    BlockNestingMode::Single => format!("Missing required block '{path}'"),
                    BlockNestingMode::List => {
                        format!("Block '{path}' requires at least {} item(s)", nested.min_items)
                    },
                };
                diagnostics.push(Diagnostic::error(summary).with_attribute(path));
            }
            return;
        },
    };

    match (nested.nesting_mode, value) {
        (_, v) if is_unknown_value(v) => {},
        (BlockNestingMode::Single, v) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List, Value::Array(items)) => {
            let len = items.len() as u32;
            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{path}' requires at least {} item(s), got {len}",
                        nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{path}' allows at most {} item(s), got {len}",
                        nested.max_items
                    ))
                    .with_attribute(path),
                );
            }
            for (i, item) in items.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{path}.{i}"), diagnostics);
            }
        },
        (BlockNestingMode::List, v) => diagnostics.push(
            Diagnostic::error(format!("Expected list for block '{path}'"))
                .with_detail(format!("Got {}", kind_of(v)))
                .with_attribute(path),
        ),
    }
}

fn child(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}.{name}")
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// Integral floats such as `3.0` are accepted.
fn is_int64(value: &Value) -> bool {
    let Value::Number(n) = value else {
        return false;
    };
    n.as_i64().is_some()
        || n.as_f64()
            .is_some_and(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
}
