/// Input node: validate and coerce the run input against declared fields
///
/// Without a `fields` list the input passes through untouched. Keys that are
/// not declared are kept as they are.

use super::NodeOutcome;
use crate::runtime::error::NodeError;
use serde_json::{Map, Number, Value};

pub fn execute(config: &Map<String, Value>, input: Value) -> Result<NodeOutcome, NodeError> {
    let fields = match config.get("fields").and_then(Value::as_array) {
        Some(fields) if !fields.is_empty() => fields,
        _ => return Ok(NodeOutcome::value(input)),
    };

    let mut object = match input {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            return Err(NodeError::Validation(format!(
                "input must be an object when fields are declared, got {}",
                other
            )))
        }
    };

    for spec in fields.iter().filter_map(Value::as_object) {
        let Some(name) = spec.get("name").and_then(Value::as_str) else {
            continue;
        };
        let kind = spec.get("type").and_then(Value::as_str).unwrap_or("any");
        let required = spec.get("required").and_then(Value::as_bool).unwrap_or(false);

        let value = match object.remove(name).filter(|value| !value.is_null()) {
            Some(value) => value,
            None => match spec.get("default").filter(|value| !value.is_null()) {
                Some(default) => default.clone(),
                None if required => {
                    return Err(NodeError::Validation(format!("missing required field '{}'", name)))
                }
                None => continue,
            },
        };

        let coerced = coerce(&value, kind).ok_or_else(|| {
            NodeError::Validation(format!("field '{}' expected {}, got {}", name, kind, value))
        })?;
        object.insert(name.to_string(), coerced);
    }

    Ok(NodeOutcome::value(Value::Object(object)))
}

/// Coerce a primitive into the declared type; None if it cannot be
fn coerce(value: &Value, kind: &str) -> Option<Value> {
    match (kind, value) {
        ("string", Value::String(_)) => Some(value.clone()),
        ("string", Value::Number(n)) => Some(Value::String(n.to_string())),
        ("string", Value::Bool(b)) => Some(Value::String(b.to_string())),

        ("number", Value::Number(_)) => Some(value.clone()),
        ("number", Value::String(text)) => parse_number(text.trim()),

        ("boolean", Value::Bool(_)) => Some(value.clone()),
        ("boolean", Value::String(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(Value::Bool(true)),
            "false" | "0" | "no" => Some(Value::Bool(false)),
            _ => None,
        },
        ("boolean", Value::Number(n)) => match n.as_f64() {
            Some(f) if f == 1.0 => Some(Value::Bool(true)),
            Some(f) if f == 0.0 => Some(Value::Bool(false)),
            _ => None,
        },

        ("object", Value::Object(_)) | ("array", Value::Array(_)) => Some(value.clone()),
        ("object", Value::String(text)) => serde_json::from_str::<Value>(text).ok().filter(Value::is_object),
        ("array", Value::String(text)) => serde_json::from_str::<Value>(text).ok().filter(Value::is_array),

        ("any", _) => Some(value.clone()),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<Value> {
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::from(int));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}
