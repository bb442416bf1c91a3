/// Node execution dispatcher
///
/// Runs one node end to end: config validation, template resolution of the
/// templated config fields, then the type-specific handler. Logic nodes
/// evaluate on the blocking pool so a slow expression never stalls the
/// runtime. Never returns
/// an `Err` across the task boundary; failures are carried in `NodeRun`.

use crate::runtime::context::RunContext;
use crate::runtime::error::NodeError;
use crate::runtime::nodes::{self, NodeOutcome};
use crate::runtime::sandbox::SandboxLimits;
use crate::runtime::services::EngineServices;
use crate::runtime::template::TemplateResolver;
use crate::runtime::validator::validate_node;
use crate::workflow::types::{Node, NodeType};
use serde_json::Value;

/// Outcome of running one node plus the warnings gathered on the way
#[derive(Debug, Clone)]
pub struct NodeRun {
    pub result: Result<NodeOutcome, NodeError>,
    pub warnings: Vec<String>,
}

impl NodeRun {
    fn failed(err: NodeError, warnings: Vec<String>) -> Self {
        Self {
            result: Err(err),
            warnings,
        }
    }
}

/// Node executor that dispatches on node type
///
/// Holds the run-independent collaborators (HTTP client, providers,
/// integrations); everything run-specific arrives per call.
#[derive(Debug, Clone)]
pub struct NodeExecutor {
    services: EngineServices,
}

impl NodeExecutor {
    pub fn new(services: EngineServices) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &EngineServices {
        &self.services
    }

    /// Execute a single node against its merged input
    pub async fn execute_node(&self, node: &Node, input: Value, ctx: &RunContext) -> NodeRun {
        tracing::info!("🚀 Starting node execution: {} (type: {})", node.id, node.node_type);
        tracing::debug!("📥 Input data: {}", input);

        let start_time = std::time::Instant::now();

        let issues = validate_node(node);
        if !issues.is_empty() {
            let message = issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ");
            tracing::error!("❌ Node config invalid: {} - {}", node.id, message);
            return NodeRun::failed(NodeError::Validation(message), Vec::new());
        }

        let mut resolver = TemplateResolver::new(ctx).with_node_input(&input);
        let config = match resolver.resolve_config(node) {
            Ok(config) => config,
            Err(err) => return NodeRun::failed(err.into(), resolver.into_warnings()),
        };
        let warnings = resolver.into_warnings();

        let result = match node.node_type {
            NodeType::Input => nodes::input::execute(&config, input),
            NodeType::Api => nodes::api::execute(&self.services, &config).await,
            NodeType::Ai => nodes::ai::execute(&self.services, &config).await,
            NodeType::Logic => {
                let limits = SandboxLimits::default().with_cancel(ctx.cancel_flag());
                tokio::task::spawn_blocking(move || nodes::logic::execute(&config, input, limits))
                    .await
                    .unwrap_or_else(|err| Err(NodeError::Panicked(err.to_string())))
            }
            NodeType::Output => Ok(nodes::output::execute(&config, input)),
            NodeType::Webhook => nodes::webhook::execute(&self.services, &config, input).await,
            NodeType::Integration => nodes::integration::execute(&self.services, &config, input).await,
        };

        let duration = start_time.elapsed();
        match &result {
            Ok(outcome) => {
                tracing::info!("✅ Node execution completed: {} in {:?}", node.id, duration);
                tracing::debug!("📤 Output data: {}", outcome.output);
            }
            Err(e) => {
                tracing::error!("❌ Node execution failed: {} in {:?} - Error: {}", node.id, duration, e);
            }
        }

        NodeRun { result, warnings }
    }
}
