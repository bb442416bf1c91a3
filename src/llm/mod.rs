/// LLM provider abstraction
///
/// AI nodes talk to models through the `LlmProvider` trait. Concrete
/// providers are registered by name in a lock-free `ProviderRegistry`, so
/// tests and embedders can swap in their own implementation.

use crate::runtime::error::NodeError;
use arc_swap::ArcSwap;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

pub mod anthropic;
pub mod openai;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;

/// Provider used when an AI node does not name one
pub const DEFAULT_PROVIDER: &str = "openai";

/// A single completion request
#[derive(Debug, Clone, PartialEq)]
pub struct LlmRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub prompt: String,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Ask the provider for a JSON object response where supported
    pub json_response: bool,
}

/// Completion text plus the model that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub text: String,
    pub model: String,
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Registry key, e.g. "openai"
    fn name(&self) -> &str;

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, NodeError>;
}

/// Name → provider map with atomic pointer swaps on update
pub struct ProviderRegistry {
    providers: ArcSwap<HashMap<String, Arc<dyn LlmProvider>>>,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            providers: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Register or replace a provider under its own name
    pub fn register(&self, provider: Arc<dyn LlmProvider>) {
        let name = provider.name().to_string();
        self.providers.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(name.clone(), Arc::clone(&provider));
            next
        });
        tracing::info!("🤖 Registered LLM provider: {}", name);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.load().get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.load().keys().cloned().collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.names())
            .finish()
    }
}
