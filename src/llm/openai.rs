/// OpenAI-compatible chat completions provider

use crate::llm::{LlmProvider, LlmRequest, LlmResponse};
use crate::runtime::error::NodeError;
use crate::runtime::http;
use async_trait::async_trait;
use serde_json::{json, Value};

pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    /// `base_url` is the API root, e.g. `https://api.openai.com/v1`
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn body(request: &LlmRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system_prompt {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if request.json_response {
            body["response_format"] = json!({ "type": "json_object" });
        }
        body
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, NodeError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!("🤖 OpenAI completion: model={} url={}", request.model, url);

        let reply = http::send(
            self.http
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&Self::body(request)),
        )
        .await?;

        let text = reply
            .body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .ok_or_else(|| NodeError::Provider("response has no choices[0].message.content".to_string()))?;
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
