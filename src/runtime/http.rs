/// Shared outbound HTTP plumbing for api, webhook and provider calls

use crate::runtime::error::NodeError;
use reqwest::{Method, RequestBuilder};
use serde_json::{Map, Value};
use std::time::Duration;

/// Longest response body kept in an `HttpStatus` error
const MAX_ERROR_BODY: usize = 2048;

/// A 2xx response with its body parsed
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Value,
}

/// Parse a method name, falling back to `default` when absent
pub fn parse_method(method: Option<&str>, default: Method) -> Result<Method, NodeError> {
    match method {
        None => Ok(default),
        Some(name) => match name.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::GET),
            "POST" => Ok(Method::POST),
            "PUT" => Ok(Method::PUT),
            "PATCH" => Ok(Method::PATCH),
            "DELETE" => Ok(Method::DELETE),
            _ => Err(NodeError::Validation(format!("unsupported HTTP method '{}'", name))),
        },
    }
}

/// Whether a request with this method carries a body
pub fn sends_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

/// Add config headers; non-string values are sent as their JSON text
pub fn apply_headers(mut builder: RequestBuilder, headers: Option<&Map<String, Value>>) -> RequestBuilder {
    if let Some(headers) = headers {
        for (name, value) in headers {
            builder = match value {
                Value::String(text) => builder.header(name.as_str(), text.as_str()),
                Value::Null => builder,
                other => builder.header(name.as_str(), other.to_string()),
            };
        }
    }
    builder
}

/// Per-request timeout from a node's `timeoutMs`, if set
pub fn apply_timeout(builder: RequestBuilder, config: &Map<String, Value>) -> RequestBuilder {
    match config.get("timeoutMs").and_then(Value::as_u64) {
        Some(ms) if ms > 0 => builder.timeout(Duration::from_millis(ms)),
        _ => builder,
    }
}

/// Send a request; non-2xx becomes `HttpStatus`, transport errors map via `from_transport`
pub async fn send(builder: RequestBuilder) -> Result<HttpReply, NodeError> {
    let response = builder.send().await.map_err(NodeError::from_transport)?;
    let status = response.status();
    let text = response.text().await.map_err(NodeError::from_transport)?;

    tracing::debug!("📡 Response status: {}", status);

    if !status.is_success() {
        return Err(NodeError::HttpStatus {
            status: status.as_u16(),
            body: truncate(text),
        });
    }

    Ok(HttpReply {
        status: status.as_u16(),
        body: parse_body(&text),
    })
}

/// JSON if it parses, the raw text otherwise, null for an empty body
pub fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

fn truncate(mut text: String) -> String {
    if text.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        text.push_str("...");
    }
    text
}
