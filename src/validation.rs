//! Configuration checks against a [`Schema`].
//!
//! Checks a configuration `serde_json::Value` against a [`Schema`]: presence
//! of required attributes, value types, nested block item counts, each
//! attribute's [`ValueValidator`]s and `conflicts_with` pairs.
//!
//! # Example
//!
//! ```
//! use duplocloud_provider::schema::{Attribute, Schema, ValueValidator};
//! use duplocloud_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute(
//!         "tenant_id",
//!         Attribute::required_string().with_validator(ValueValidator::Uuid),
//!     )
//!     .with_attribute("replicas", Attribute::optional_int64());
//!
//! let input = json!({
//!     "tenant_id": "5b2a7d6e-21c4-4b61-9f3d-0a1b2c3d4e5f",
//!     "replicas": 2
//! });
//! assert!(validate(&schema, &input).is_empty());
//!
//! let input = json!({"tenant_id": "dev", "replicas": "two"});
//! let diagnostics = validate(&schema, &input);
//! assert_eq!(diagnostics.len(), 2);
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, DiagnosticSeverity, NestedBlock,
    Schema,
};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Check a configuration object against `schema`. No diagnostics means the
/// configuration is valid.
///
/// Computed-only attributes are not checked. Null counts as unset. Value
/// validators only run on values of the right type. Nested blocks are
/// checked recursively, including their item counts.
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

/// True when [`validate`] finds nothing.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        _ => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", value_type_name(value)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    let mut names: Vec<&String> = block.attributes.keys().collect();
    names.sort();
    for name in names {
        let attr = &block.attributes[name];
        let attr_path = join_path(path, name);
        validate_attribute(attr, obj.get(name), &attr_path, diagnostics);
        validate_conflicts(attr, obj, name, path, diagnostics);
    }

    for (name, nested_block) in &block.blocks {
        let block_path = join_path(path, name);
        validate_nested_block(nested_block, obj.get(name), &block_path, diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => {
            let before = diagnostics.len();
            validate_attribute_type(&attr.attr_type, v, path, diagnostics);
            if diagnostics.len() > before {
                return;
            }
            for validator in &attr.validators {
                if let Err(detail) = validator.check(v) {
                    diagnostics.push(
                        Diagnostic::error(format!("Invalid value for attribute '{}'", path))
                            .with_detail(detail)
                            .with_attribute(path),
                    );
                }
            }
        },
    }
}

fn validate_conflicts(
    attr: &Attribute,
    obj: &Map<String, Value>,
    name: &str,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if !is_set(obj.get(name)) {
        return;
    }
    for other in &attr.conflicts_with {
        if is_set(obj.get(other)) {
            diagnostics.push(
                Diagnostic::error(format!("Conflicting configuration for '{}'", join_path(path, name)))
                    .with_detail(format!(
                        "\"{}\": conflicts with {}",
                        name,
                        join_path(path, other)
                    ))
                    .with_attribute(join_path(path, name)),
            );
        }
    }
}

fn is_set(value: Option<&Value>) -> bool {
    !matches!(value, None | Some(Value::Null))
}

fn validate_attribute_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let expected = match attr_type {
        AttributeType::String if value.is_string() => return,
        AttributeType::Int64 if is_int64(value) => return,
        AttributeType::Bool if value.is_boolean() => return,
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Bool => "bool",
        AttributeType::List(element_type) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_attribute_type(element_type, item, &format!("{}.{}", path, i), diagnostics);
                }
                return;
            },
            None => "list",
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(obj) => {
                validate_object_type(fields, obj, path, diagnostics);
                return;
            },
            None => "object",
        },
    };
    diagnostics.push(type_error(path, expected, value));
}

fn validate_object_type(
    attrs: &HashMap<String, AttributeType>,
    obj: &Map<String, Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for (name, attr_type) in attrs {
        if let Some(value) = obj.get(name) {
            validate_attribute_type(attr_type, value, &join_path(path, name), diagnostics);
        }
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match (nested.nesting_mode, value) {
        (_, None | Some(Value::Null)) => {
            if nested.min_items > 0 {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s)",
                        path, nested.min_items
                    ))
                    .with_attribute(path),
                );
            }
        },
        (BlockNestingMode::Single, Some(v)) => validate_block(&nested.block, v, path, diagnostics),
        (BlockNestingMode::List, Some(Value::Array(arr))) => {
            let len = arr.len() as u32;

            if len < nested.min_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' requires at least {} item(s), got {}",
                        path, nested.min_items, len
                    ))
                    .with_attribute(path),
                );
            }

            if nested.max_items > 0 && len > nested.max_items {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Block '{}' allows at most {} item(s), got {}",
                        path, nested.max_items, len
                    ))
                    .with_attribute(path),
                );
            }

            for (i, item) in arr.iter().enumerate() {
                let item_path = format!("{}.{}", path, i);
                validate_block(&nested.block, item, &item_path, diagnostics);
            }
        },
        (BlockNestingMode::List, Some(v)) => {
            diagnostics.push(
                Diagnostic::error(format!("Expected list for block '{}'", path))
                    .with_detail(format!("Got {}", value_type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

fn type_error(path: &str, expected: &str, got: &Value) -> Diagnostic {
    Diagnostic {
        severity: DiagnosticSeverity::Error,
        summary: format!("Invalid type for attribute '{}'", path),
        detail: Some(format!("Expected {}, got {}", expected, value_type_name(got))),
        attribute: Some(path.to_string()),
    }
}
