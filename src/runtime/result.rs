/// Aggregate outcome of one run

use crate::runtime::error::{EngineError, ErrorAnalysis};
use crate::runtime::events::ExecutionLogEntry;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Final result of executing a workflow
///
/// Produced exactly once per run, after every node reached a terminal
/// status or the run was aborted. Per-node errors live in `logs`; `error`
/// only carries a run-level failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub run_id: Uuid,
    pub success: bool,
    /// Output of the output node, or an object keyed by node id when several produced output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// One entry per node, in completion order
    pub logs: Vec<ExecutionLogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_analysis: Option<ErrorAnalysis>,
    pub credits_used: u64,
    pub duration_ms: u64,
}

impl ExecutionResult {
    /// Result for a graph rejected before any node ran
    pub fn structural_failure(run_id: Uuid, err: &EngineError, duration_ms: u64) -> Self {
        Self {
            run_id,
            success: false,
            output: None,
            logs: Vec::new(),
            error: Some(err.to_string()),
            error_analysis: None,
            credits_used: 0,
            duration_ms,
        }
    }

    /// Log entry for a node, if it was part of the run
    pub fn log(&self, node_id: &str) -> Option<&ExecutionLogEntry> {
        self.logs.iter().find(|entry| entry.node_id == node_id)
    }
}
