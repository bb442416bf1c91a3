/// Node execution handlers for the 7 node types
///
/// Each handler is a function of (resolved config, merged input, services)
/// returning the node's output or a `NodeError`:
/// - input: validates and coerces the global input against declared fields
/// - api: outbound HTTP request with optional response mapping
/// - ai: LLM completion with optional JSON-schema-checked output
/// - logic: sandboxed Lua filter/map/reduce/condition/transform
/// - output: json/text/markdown formatting, never fails
/// - webhook: HMAC-signed outbound delivery
/// - integration: delegates to an externally registered action handler

use serde_json::{Map, Value};

pub mod ai;
pub mod api;
pub mod input;
pub mod integration;
pub mod logic;
pub mod output;
pub mod webhook;

/// Result of executing a single node
///
/// The output flows along every active outgoing edge. `branch` is set by
/// condition nodes and deactivates edges bound to the other handle.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeOutcome {
    pub output: Value,
    pub branch: Option<String>,
}

impl NodeOutcome {
    pub fn value(output: Value) -> Self {
        Self { output, branch: None }
    }

    pub fn branch(output: Value, handle: impl Into<String>) -> Self {
        Self {
            output,
            branch: Some(handle.into()),
        }
    }
}

/// Non-empty string config value
pub(crate) fn str_field<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// Config value that is present and not null
pub(crate) fn field<'a>(config: &'a Map<String, Value>, key: &str) -> Option<&'a Value> {
    config.get(key).filter(|value| !value.is_null())
}
