/// AI node: one LLM completion
///
/// With an `outputSchema` the response must be a JSON object matching it
/// (a surrounding markdown code fence is tolerated); anything else is a
/// `SchemaMismatch`. Without a schema the output is `{"text": ...}`.

use super::{field, str_field, NodeOutcome};
use crate::llm::{LlmRequest, DEFAULT_PROVIDER};
use crate::runtime::error::NodeError;
use crate::runtime::services::EngineServices;
use serde_json::{json, Map, Value};

pub async fn execute(services: &EngineServices, config: &Map<String, Value>) -> Result<NodeOutcome, NodeError> {
    let provider_name = str_field(config, "provider").unwrap_or(DEFAULT_PROVIDER);
    let provider = services
        .providers
        .get(provider_name)
        .ok_or_else(|| NodeError::Provider(format!("no LLM provider '{}' is configured", provider_name)))?;

    let schema = field(config, "outputSchema").and_then(Value::as_object);
    let request = LlmRequest {
        model: str_field(config, "model")
            .ok_or_else(|| NodeError::Validation("ai node needs a 'model'".to_string()))?
            .to_string(),
        system_prompt: str_field(config, "systemPrompt").map(str::to_string),
        prompt: config
            .get("userPromptTemplate")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        temperature: config.get("temperature").and_then(Value::as_f64),
        max_tokens: config
            .get("maxTokens")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        json_response: schema.is_some(),
    };

    tracing::info!("🤖 AI call: provider={} model={}", provider_name, request.model);
    let response = provider.complete(&request).await?;

    match schema {
        Some(schema) => {
            let parsed = parse_json_reply(&response.text)?;
            check_schema(&parsed, schema)?;
            Ok(NodeOutcome::value(parsed))
        }
        None => Ok(NodeOutcome::value(json!({ "text": response.text }))),
    }
}

/// Parse a model reply as JSON, tolerating a ```json fence
fn parse_json_reply(text: &str) -> Result<Value, NodeError> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .and_then(|rest| rest.strip_suffix("```"))
        .map(|inner| inner.trim_start_matches("json").trim())
        .unwrap_or(trimmed);

    serde_json::from_str(unfenced)
        .map_err(|err| NodeError::SchemaMismatch(format!("response is not valid JSON: {}", err)))
}

/// Check required keys and declared property types
fn check_schema(value: &Value, schema: &Map<String, Value>) -> Result<(), NodeError> {
    let object = value
        .as_object()
        .ok_or_else(|| NodeError::SchemaMismatch(format!("expected a JSON object, got {}", value)))?;

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for key in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(key) {
                return Err(NodeError::SchemaMismatch(format!("missing required key '{}'", key)));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (key, property) in properties {
            let (Some(actual), Some(expected)) = (object.get(key), property.get("type").and_then(Value::as_str)) else {
                continue;
            };
            if !matches_type(actual, expected) {
                return Err(NodeError::SchemaMismatch(format!(
                    "key '{}' should be {}, got {}",
                    key, expected, actual
                )));
            }
        }
    }

    Ok(())
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}
