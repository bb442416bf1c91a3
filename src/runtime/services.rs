/// Collaborators node executors reach out to
///
/// Everything with I/O lives here so the engine itself holds no global
/// state: one HTTP client, the LLM providers, integration handlers and the
/// default webhook secret. Cheap to clone.

use crate::config::Config;
use crate::integration::IntegrationRegistry;
use crate::llm::{AnthropicProvider, OpenAiProvider, ProviderRegistry};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct EngineServices {
    pub http: reqwest::Client,
    pub providers: Arc<ProviderRegistry>,
    pub integrations: Arc<IntegrationRegistry>,
    pub webhook_secret: Option<String>,
}

impl EngineServices {
    /// Services with a default HTTP client and empty registries
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            providers: Arc::new(ProviderRegistry::new()),
            integrations: Arc::new(IntegrationRegistry::new()),
            webhook_secret: None,
        }
    }

    /// Build from configuration, registering every provider with a key
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.engine.http_timeout_ms))
            .build()?;

        let mut services = Self::new(http.clone());
        services.webhook_secret = config.engine.webhook_secret.clone();

        if let Some(key) = &config.ai.openai_api_key {
            services
                .providers
                .register(Arc::new(OpenAiProvider::new(http.clone(), key, &config.ai.openai_base_url)));
        }
        if let Some(key) = &config.ai.anthropic_api_key {
            services
                .providers
                .register(Arc::new(AnthropicProvider::new(http, key, &config.ai.anthropic_base_url)));
        }

        Ok(services)
    }

    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }
}

impl Default for EngineServices {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

impl std::fmt::Debug for EngineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineServices")
            .field("providers", &self.providers)
            .field("integrations", &self.integrations)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}
