/// Api node: outbound HTTP request
///
/// `url`, `headers` and `body` arrive template-resolved. A `responseMapping`
/// reshapes the response body; each value is a dot path or a `$` JSONPath.

use super::{field, str_field, NodeOutcome};
use crate::runtime::error::NodeError;
use crate::runtime::http;
use crate::runtime::path;
use crate::runtime::services::EngineServices;
use reqwest::Method;
use serde_json::{Map, Value};

pub async fn execute(services: &EngineServices, config: &Map<String, Value>) -> Result<NodeOutcome, NodeError> {
    let url = str_field(config, "url")
        .ok_or_else(|| NodeError::Validation("api node needs a 'url'".to_string()))?;
    let method = http::parse_method(config.get("method").and_then(Value::as_str), Method::GET)?;

    tracing::debug!("🌍 HTTP Request: {} {}", method, url);

    let mut builder = services.http.request(method.clone(), url);
    builder = http::apply_headers(builder, config.get("headers").and_then(Value::as_object));
    builder = http::apply_timeout(builder, config);

    if http::sends_body(&method) {
        if let Some(body) = field(config, "body") {
            tracing::debug!("📦 Request body: {}", body);
            builder = match body {
                Value::String(text) => builder.header("Content-Type", "text/plain").body(text.clone()),
                other => builder.json(other),
            };
        }
    }

    let reply = http::send(builder).await?;
    tracing::info!("✅ HTTP request completed: {} {} (status: {})", method, url, reply.status);

    match config.get("responseMapping").and_then(Value::as_object) {
        Some(mapping) if !mapping.is_empty() => apply_mapping(&reply.body, mapping).map(NodeOutcome::value),
        _ => Ok(NodeOutcome::value(reply.body)),
    }
}

/// Build `{outKey: selected value}`; paths that find nothing yield null
fn apply_mapping(body: &Value, mapping: &Map<String, Value>) -> Result<Value, NodeError> {
    let mut output = Map::with_capacity(mapping.len());

    for (key, selector) in mapping {
        let selector = selector.as_str().ok_or_else(|| {
            NodeError::Validation(format!("responseMapping '{}' must be a path string", key))
        })?;

        let value = if selector.starts_with('$') {
            let mut found = jsonpath_lib::select(body, selector).map_err(|err| {
                NodeError::Validation(format!("invalid JSONPath '{}': {:?}", selector, err))
            })?;
            match found.len() {
                0 => Value::Null,
                1 => found.remove(0).clone(),
                _ => Value::Array(found.into_iter().cloned().collect()),
            }
        } else {
            path::select(body, selector).cloned().unwrap_or(Value::Null)
        };

        output.insert(key.clone(), value);
    }

    Ok(Value::Object(output))
}
