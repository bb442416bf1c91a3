/// Execution log and progress events
///
/// One `ExecutionLogEntry` per node per run. Entries are created `pending`,
/// move through `running` at most once and end in exactly one terminal
/// status. Progress sinks see every terminal transition in completion order.

use crate::workflow::types::{Node, NodeType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// Lifecycle status of a node within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl NodeStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeStatus::Success | NodeStatus::Failed | NodeStatus::Skipped)
    }
}

/// Why a node was skipped without running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// A node it (transitively) depends on failed
    UpstreamFailed,
    /// Every incoming edge came from an unselected branch handle
    BranchNotTaken,
    /// The run was aborted before the node started
    Aborted,
}

/// Per-node record of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionLogEntry {
    pub node_id: String,
    pub node_name: String,
    pub node_type: NodeType,
    pub status: NodeStatus,
    /// Input snapshot taken when the node started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Output snapshot taken when the node succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Non-fatal issues such as unresolved template paths
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Output handle selected by a condition node
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<SkipReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ExecutionLogEntry {
    /// Fresh entry for a node that has been scheduled
    pub fn pending(node: &Node) -> Self {
        Self {
            node_id: node.id.clone(),
            node_name: node.display_name().to_string(),
            node_type: node.node_type,
            status: NodeStatus::Pending,
            input: None,
            output: None,
            error: None,
            warnings: Vec::new(),
            branch: None,
            skip_reason: None,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn start(&mut self, input: Value) {
        self.status = NodeStatus::Running;
        self.input = Some(input);
        self.started_at = Some(Utc::now());
    }

    pub fn succeed(&mut self, output: Value, branch: Option<String>, warnings: Vec<String>) {
        self.status = NodeStatus::Success;
        self.output = Some(output);
        self.branch = branch;
        self.warnings.extend(warnings);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: String, warnings: Vec<String>) {
        self.status = NodeStatus::Failed;
        self.error = Some(error);
        self.warnings.extend(warnings);
        self.completed_at = Some(Utc::now());
    }

    pub fn skip(&mut self, reason: SkipReason) {
        self.status = NodeStatus::Skipped;
        self.skip_reason = Some(reason);
        self.completed_at = Some(Utc::now());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Observer of per-node terminal transitions
///
/// Called once per node, in completion order, with the entry that just
/// finished and every entry finished so far (including that one).
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, entry: &ExecutionLogEntry, all: &[ExecutionLogEntry]);
}

impl<F> ProgressSink for F
where
    F: Fn(&ExecutionLogEntry, &[ExecutionLogEntry]) + Send + Sync,
{
    fn on_progress(&self, entry: &ExecutionLogEntry, all: &[ExecutionLogEntry]) {
        self(entry, all)
    }
}

/// Forwards finished entries onto an unbounded channel
///
/// Used by the streaming endpoint; a dropped receiver is ignored.
pub struct ChannelProgressSink {
    tx: mpsc::UnboundedSender<ExecutionLogEntry>,
}

impl ChannelProgressSink {
    pub fn new(tx: mpsc::UnboundedSender<ExecutionLogEntry>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, entry: &ExecutionLogEntry, _all: &[ExecutionLogEntry]) {
        if self.tx.send(entry.clone()).is_err() {
            tracing::debug!("📭 Progress receiver dropped; event for {} discarded", entry.node_id);
        }
    }
}

/// Collects every finished entry
///
/// Useful for tests to assert on what observers saw.
#[derive(Default)]
pub struct VecProgressSink {
    entries: Mutex<Vec<ExecutionLogEntry>>,
}

impl VecProgressSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the entries seen so far
    pub fn entries(&self) -> Vec<ExecutionLogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ProgressSink for VecProgressSink {
    fn on_progress(&self, entry: &ExecutionLogEntry, _all: &[ExecutionLogEntry]) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry.clone());
    }
}
