/// Integration node: delegate to a registered action handler

use super::{field, str_field, NodeOutcome};
use crate::integration::{ActionOutcome, ActionRequest};
use crate::runtime::error::NodeError;
use crate::runtime::services::EngineServices;
use serde_json::{Map, Value};

pub async fn execute(
    services: &EngineServices,
    config: &Map<String, Value>,
    input: Value,
) -> Result<NodeOutcome, NodeError> {
    let integration_id = str_field(config, "integrationId")
        .ok_or_else(|| NodeError::Validation("integration node needs an 'integrationId'".to_string()))?;
    let action_id = str_field(config, "actionId")
        .ok_or_else(|| NodeError::Validation("integration node needs an 'actionId'".to_string()))?;

    let handler = services.integrations.resolve(integration_id, action_id)?;
    let request = ActionRequest {
        connection: field(config, "connection").cloned().unwrap_or_else(|| Value::Object(Map::new())),
        input: field(config, "input").cloned().unwrap_or(input),
    };

    tracing::debug!("🔌 Integration action: {}.{}", integration_id, action_id);

    match handler.execute_action(action_id, request).await {
        ActionOutcome::Success(output) => Ok(NodeOutcome::value(output)),
        ActionOutcome::Failure(message) => Err(NodeError::Integration(message)),
    }
}
