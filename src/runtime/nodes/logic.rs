/// Logic node: filter, map, reduce, condition and transform in a Lua sandbox
///
/// filter/map/reduce operate on an array: the input itself, or the array at
/// the `field` dot path of an object input. filter/map write their result
/// back at that path; reduce returns the reduced value. `timeoutMs` narrows
/// the sandbox's time budget. Evaluation is synchronous; callers on an async
/// runtime run it on a blocking thread.

use super::{field, str_field, NodeOutcome};
use crate::runtime::error::NodeError;
use crate::runtime::path;
use crate::runtime::sandbox::{Sandbox, SandboxLimits};
use serde_json::{Map, Value};
use std::time::Duration;

pub fn execute(
    config: &Map<String, Value>,
    input: Value,
    limits: SandboxLimits,
) -> Result<NodeOutcome, NodeError> {
    let operation = str_field(config, "operation")
        .ok_or_else(|| NodeError::Validation("logic node needs an 'operation'".to_string()))?
        .to_ascii_lowercase();

    tracing::debug!("🧮 Logic operation: {}", operation);
    let limits = match field(config, "timeoutMs").and_then(Value::as_u64) {
        Some(ms) => limits.with_time(Duration::from_millis(ms)),
        None => limits,
    };
    let sandbox = Sandbox::with_limits(limits)?;

    match operation.as_str() {
        "filter" => {
            let condition = expression(config, &["condition", "expression"])?;
            let field_path = str_field(config, "field");
            let items = target_array(&input, field_path)?;

            let mut kept = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                sandbox.bind("item", item)?;
                sandbox.bind("index", &Value::from(index + 1))?;
                if sandbox.eval_bool(condition)? {
                    kept.push(item.clone());
                }
            }
            write_back(input, field_path, Value::Array(kept)).map(NodeOutcome::value)
        }
        "map" => {
            let expr = expression(config, &["expression"])?;
            let field_path = str_field(config, "field");
            let items = target_array(&input, field_path)?;

            let mut mapped = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                sandbox.bind("item", item)?;
                sandbox.bind("index", &Value::from(index + 1))?;
                mapped.push(sandbox.eval(expr)?);
            }
            write_back(input, field_path, Value::Array(mapped)).map(NodeOutcome::value)
        }
        "reduce" => {
            let expr = expression(config, &["expression"])?;
            let items = target_array(&input, str_field(config, "field"))?;

            let mut acc = field(config, "initial").cloned().unwrap_or(Value::Null);
            for (index, item) in items.iter().enumerate() {
                sandbox.bind("acc", &acc)?;
                sandbox.bind("item", item)?;
                sandbox.bind("index", &Value::from(index + 1))?;
                acc = sandbox.eval(expr)?;
            }
            Ok(NodeOutcome::value(acc))
        }
        "condition" => {
            let condition = expression(config, &["condition", "expression"])?;
            sandbox.bind("input", &input)?;
            let handle = if sandbox.eval_bool(condition)? { "true" } else { "false" };
            Ok(NodeOutcome::branch(input, handle))
        }
        "transform" => {
            sandbox.bind("input", &input)?;
            if let Some(mappings) = config.get("mappings").and_then(Value::as_object) {
                let mut object = Map::with_capacity(mappings.len());
                for (key, expr) in mappings {
                    let expr = expr.as_str().ok_or_else(|| {
                        NodeError::Validation(format!("mapping '{}' must be an expression string", key))
                    })?;
                    object.insert(key.clone(), sandbox.eval(expr)?);
                }
                return Ok(NodeOutcome::value(Value::Object(object)));
            }
            let expr = expression(config, &["expression"])?;
            sandbox.eval(expr).map(NodeOutcome::value)
        }
        other => Err(NodeError::Validation(format!("unknown logic operation '{}'", other))),
    }
}

/// First present expression among `keys`
fn expression<'a>(config: &'a Map<String, Value>, keys: &[&str]) -> Result<&'a str, NodeError> {
    keys.iter()
        .find_map(|key| str_field(config, key))
        .ok_or_else(|| NodeError::Validation(format!("logic node needs one of [{}]", keys.join(", "))))
}

fn target_array<'a>(input: &'a Value, field_path: Option<&str>) -> Result<&'a Vec<Value>, NodeError> {
    let target = match field_path {
        Some(field_path) => path::select(input, field_path).ok_or_else(|| {
            NodeError::Validation(format!("field '{}' not found in logic input", field_path))
        })?,
        None => input,
    };

    target.as_array().ok_or_else(|| match field_path {
        Some(field_path) => NodeError::Validation(format!("field '{}' is not an array", field_path)),
        None => NodeError::Validation("logic input is not an array; set 'field' to select one".to_string()),
    })
}

fn write_back(mut input: Value, field_path: Option<&str>, result: Value) -> Result<Value, NodeError> {
    let Some(field_path) = field_path else {
        return Ok(result);
    };
    let slot = path::select_mut(&mut input, field_path)
        .ok_or_else(|| NodeError::Validation(format!("field '{}' not found in logic input", field_path)))?;
    *slot = result;
    Ok(input)
}
