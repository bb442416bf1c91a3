/// Anthropic messages API provider

use crate::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::runtime::error::NodeError;
use crate::runtime::http;
use async_trait::async_trait;
use serde_json::{json, Value};

const API_VERSION: &str = "2023-06-01";
const DEFAULT_MAX_TOKENS: u32 = 1024;

pub struct AnthropicProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl AnthropicProvider {
    /// `base_url` is the host root, e.g. `https://api.anthropic.com`
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn body(request: &LlmRequest) -> Value {
        let mut body = json!({
            "model": request.model,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(system) = &request.system_prompt {
            body["system"] = json!(system);
        }
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, NodeError> {
        let url = format!("{}/v1/messages", self.base_url);
        tracing::debug!("🤖 Anthropic completion: model={} url={}", request.model, url);

        let reply = http::send(
            self.http
                .post(&url)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", API_VERSION)
                .json(&Self::body(request)),
        )
        .await?;

        let text = reply
            .body
            .get("content")
            .and_then(Value::as_array)
            .and_then(|blocks| {
                blocks
                    .iter()
                    .find(|block| block.get("type").and_then(Value::as_str) == Some("text"))
            })
            .and_then(|block| block.get("text"))
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Provider("response has no text content block".to_string()))?;
        let model = reply
            .body
            .get("model")
            .and_then(Value::as_str)
            .unwrap_or(request.model.as_str());

        Ok(LlmResponse {
            text: text.to_string(),
            model: model.to_string(),
        })
    }
}
