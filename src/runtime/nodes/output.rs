/// Output node: shape the final result
///
/// `fields` projects dot paths out of the input, `template` replaces the
/// body with an already-resolved string, and `format` picks json, text or
/// markdown rendering. Never fails.

use super::{str_field, NodeOutcome};
use crate::runtime::path;
use serde_json::{Map, Value};

pub fn execute(config: &Map<String, Value>, input: Value) -> NodeOutcome {
    let projected = match config.get("fields").and_then(Value::as_array) {
        Some(fields) if !fields.is_empty() => project(&input, fields),
        _ => input,
    };

    let template = config.get("template").and_then(Value::as_str);
    let format = str_field(config, "format").unwrap_or("json").to_ascii_lowercase();

    let output = match (format.as_str(), template) {
        ("text" | "markdown", Some(text)) => Value::String(text.to_string()),
        ("text", None) => Value::String(render_text(&projected)),
        ("markdown", None) => Value::String(render_markdown(&projected)),
        (_, Some(text)) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        (_, None) => projected,
    };

    NodeOutcome::value(output)
}

/// Select each listed dot path; missing paths become null
fn project(input: &Value, fields: &[Value]) -> Value {
    let mut object = Map::new();
    for field in fields.iter().filter_map(Value::as_str) {
        let value = path::select(input, field).cloned().unwrap_or(Value::Null);
        object.insert(field.to_string(), value);
    }
    Value::Object(object)
}

fn render_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        Value::Object(_) | Value::Array(_) => {
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        }
        other => other.to_string(),
    }
}

fn render_markdown(value: &Value) -> String {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| format!("- **{}**: {}", key, inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Array(items) => items
            .iter()
            .map(|item| format!("- {}", inline(item)))
            .collect::<Vec<_>>()
            .join("\n"),
        other => render_text(other),
    }
}

fn inline(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Object(_) | Value::Array(_) => format!("`{}`", value),
        other => other.to_string(),
    }
}
