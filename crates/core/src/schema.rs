//! Structural checks for tool schemas and argument validation.
//!
//! Schemas are checked once, at registration time. Argument validation runs
//! on every dispatch and must be deterministic: the same arguments always
//! produce the same messages in the same order.

use serde_json::Value;

use crate::error::ToolError;
use crate::tool::ToolSchema;

const PRIMITIVE_TYPES: &[&str] = &[
    "string", "number", "integer", "boolean", "array", "object", "null",
];

/// Maximum tool name length accepted by hosted tool-use APIs.
const MAX_NAME_LEN: usize = 64;

/// Check a schema's structure and compile it into a validator.
pub fn compile(schema: &ToolSchema) -> Result<jsonschema::Validator, ToolError> {
    let invalid = |reason: String| ToolError::InvalidSchema {
        tool_name: schema.name.clone(),
        reason,
    };

    if schema.name.is_empty()
        || schema.name.len() > MAX_NAME_LEN
        || !schema
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(invalid(format!(
            "name must be 1-{MAX_NAME_LEN} characters of [a-zA-Z0-9_-]"
        )));
    }

    let Some(root) = schema.input_schema.as_object() else {
        return Err(invalid("input_schema must be a JSON object".into()));
    };

    if root.get("type").and_then(Value::as_str) != Some("object") {
        return Err(invalid("input_schema.type must be \"object\"".into()));
    }

    let properties = match root.get("properties") {
        None => None,
        Some(Value::Object(props)) => Some(props),
        Some(_) => return Err(invalid("properties must be an object".into())),
    };

    if let Some(props) = properties {
        for (name, prop) in props {
            let Some(prop) = prop.as_object() else {
                return Err(invalid(format!("property '{name}' must be an object")));
            };
            match prop.get("type") {
                None => {}
                Some(Value::String(t)) if PRIMITIVE_TYPES.contains(&t.as_str()) => {}
                Some(Value::Array(types))
                    if !types.is_empty()
                        && types.iter().all(|t| {
                            t.as_str().is_some_and(|t| PRIMITIVE_TYPES.contains(&t))
                        }) => {}
                Some(other) => {
                    return Err(invalid(format!(
                        "property '{name}' has unsupported type {other}"
                    )));
                }
            }
            if let Some(values) = prop.get("enum") {
                if !values.as_array().is_some_and(|v| !v.is_empty()) {
                    return Err(invalid(format!(
                        "property '{name}' enum must be a non-empty array"
                    )));
                }
            }
        }
    }

    if let Some(required) = root.get("required") {
        let Some(required) = required.as_array() else {
            return Err(invalid("required must be an array".into()));
        };
        for entry in required {
            let Some(field) = entry.as_str() else {
                return Err(invalid("required entries must be strings".into()));
            };
            if !properties.is_some_and(|p| p.contains_key(field)) {
                return Err(invalid(format!(
                    "required field '{field}' is not declared in properties"
                )));
            }
        }
    }

    jsonschema::validator_for(&schema.input_schema)
        .map_err(|e| invalid(format!("not a valid JSON Schema: {e}")))
}

/// Validate arguments, returning every violation as a sorted message list.
pub fn violations(validator: &jsonschema::Validator, arguments: &Value) -> Vec<String> {
    let mut messages: Vec<String> = validator
        .iter_errors(arguments)
        .map(|err| {
            let path = err.instance_path.to_string();
            if path.is_empty() {
                err.to_string()
            } else {
                format!("{err} (at {path})")
            }
        })
        .collect();
    messages.sort();
    messages.dedup();
    messages
}
