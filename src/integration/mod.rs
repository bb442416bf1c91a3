/// Third-party integration actions
///
/// Integration nodes delegate to handlers registered from outside the
/// engine. Connection storage, credential decryption and OAuth live with
/// the embedder; the engine only marshals `{connection, input}` in and the
/// handler's outcome out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod registry;

pub use registry::IntegrationRegistry;

/// Arguments handed to an action handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Resolved connection config (tokens, workspace ids, ...)
    pub connection: Value,
    /// Resolved action input
    pub input: Value,
}

/// What an action handler reports back
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success(Value),
    /// Surfaced verbatim as the node's error
    Failure(String),
}

/// Handler for every action of one integration (e.g. "slack")
#[async_trait]
pub trait IntegrationAction: Send + Sync {
    /// Integration id this handler serves
    fn integration_id(&self) -> &str;

    /// Whether `action_id` is implemented; unknown actions never reach `execute_action`
    fn supports(&self, action_id: &str) -> bool;

    async fn execute_action(&self, action_id: &str, request: ActionRequest) -> ActionOutcome;
}
