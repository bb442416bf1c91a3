/// Configuration management for the Nodeflow engine
///
/// Handles server binding, engine limits and provider credentials.
/// Every value can be overridden through a `NODEFLOW_*` environment variable.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Execution engine limits and defaults
    pub engine: EngineConfig,
    /// LLM provider credentials
    pub ai: AiConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Server port number
    pub port: u16,
}

/// Execution engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Ceiling on concurrently running node tasks per run (None = unbounded)
    pub max_concurrency: Option<usize>,
    /// Whole-run deadline in milliseconds (None = no deadline)
    pub run_timeout_ms: Option<u64>,
    /// Default timeout for outbound HTTP requests
    pub http_timeout_ms: u64,
    /// Default HMAC secret for webhook nodes without their own
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,
}

/// LLM provider configuration
///
/// A provider is only registered when its API key is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    #[serde(skip_serializing)]
    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
}

impl Default for Config {
    /// Default configuration with ENV_VAR support for k8s/container deployment
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: std::env::var("NODEFLOW_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_parse("NODEFLOW_PORT").unwrap_or(3004),
            },
            engine: EngineConfig::default(),
            ai: AiConfig {
                openai_api_key: env_non_empty("NODEFLOW_OPENAI_API_KEY"),
                openai_base_url: std::env::var("NODEFLOW_OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                anthropic_api_key: env_non_empty("NODEFLOW_ANTHROPIC_API_KEY"),
                anthropic_base_url: std::env::var("NODEFLOW_ANTHROPIC_BASE_URL")
                    .unwrap_or_else(|_| "https://api.anthropic.com".to_string()),
            },
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: env_parse("NODEFLOW_MAX_CONCURRENCY").filter(|n| *n > 0),
            run_timeout_ms: env_parse("NODEFLOW_RUN_TIMEOUT_MS").filter(|ms| *ms > 0),
            http_timeout_ms: env_parse("NODEFLOW_HTTP_TIMEOUT_MS").unwrap_or(30_000),
            webhook_secret: env_non_empty("NODEFLOW_WEBHOOK_SECRET"),
        }
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an env var, ignoring unset or malformed values
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!("⚠️ Ignoring malformed {}={}", key, raw);
            None
        }
    }
}
