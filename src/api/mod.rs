/// HTTP API Layer
///
/// Thin axum glue over the execution engine:
/// - Synchronous execution returning the full `ExecutionResult`
/// - Streaming execution as Server-Sent Events
/// - Workflow preflight with credit estimate

// Execution and validation endpoints
pub mod executions;

use crate::runtime::engine::ExecutionEngine;
use std::sync::Arc;

/// Application state containing shared resources
#[derive(Clone)]
pub struct AppState {
    /// Engine shared by every request; holds no per-run state
    pub engine: Arc<ExecutionEngine>,
}

// Re-export router builders
pub use executions::create_execution_routes;
