/// Per-run scheduling state
///
/// Owned by the single coordinating task of a run. Tracks each node's phase
/// and how many of its incoming edges are still unsettled, decides which
/// nodes become ready as others finish, applies failure isolation and
/// branch skipping, and records log entries in completion order.

use crate::runtime::context::RunContext;
use crate::runtime::credits;
use crate::runtime::error::{ErrorAnalysis, ErrorCategory, NodeError};
use crate::runtime::events::{ExecutionLogEntry, NodeStatus, ProgressSink, SkipReason};
use crate::runtime::executor::NodeRun;
use crate::runtime::result::ExecutionResult;
use crate::workflow::graph::ExecutionGraph;
use crate::workflow::types::Edge;
use petgraph::graph::NodeIndex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Where a node is in its lifecycle, from the coordinator's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Some incoming edge is still unsettled
    Waiting,
    /// Handed to a task that has not reported `Started`
    Dispatched,
    Running,
    /// Terminal entry recorded
    Done,
}

/// A node ready to run, with its merged input
pub(crate) type Dispatch = (NodeIndex, Value);

const GATE_OPEN: u8 = 0;
const GATE_BEGUN: u8 = 1;
const GATE_CLOSED: u8 = 2;

/// One-shot claim per node, settled between its task and an abort
///
/// Whichever side claims first wins: a task that began is cancelled and
/// charged, a node closed before its task began is skipped.
#[derive(Debug)]
pub(crate) struct StartGates {
    slots: Box<[AtomicU8]>,
}

impl StartGates {
    fn new(len: usize) -> Self {
        Self {
            slots: (0..len).map(|_| AtomicU8::new(GATE_OPEN)).collect(),
        }
    }

    /// Task side; false once an abort closed the node
    pub fn try_begin(&self, index: NodeIndex) -> bool {
        self.claim(index, GATE_BEGUN)
    }

    /// Coordinator side; false once the task began
    fn try_close(&self, index: NodeIndex) -> bool {
        self.claim(index, GATE_CLOSED)
    }

    fn claim(&self, index: NodeIndex, to: u8) -> bool {
        self.slots[index.index()]
            .compare_exchange(GATE_OPEN, to, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// First real failure of the run, kept for `errorAnalysis`
struct FirstFailure {
    index: NodeIndex,
    category: ErrorCategory,
    message: String,
}

pub(crate) struct RunState<'g> {
    graph: &'g ExecutionGraph,
    entries: Vec<ExecutionLogEntry>,
    phases: Vec<Phase>,
    /// Incoming edges whose source is not terminal yet
    unsettled: Vec<usize>,
    /// Handle selected by each finished node, if any
    branches: Vec<Option<String>>,
    /// Input computed at dispatch, moved into the entry on `Started`
    inputs: Vec<Option<Value>>,
    /// Terminal entries in completion order
    logs: Vec<ExecutionLogEntry>,
    progress: Option<Arc<dyn ProgressSink>>,
    first_failure: Option<FirstFailure>,
    abort_reason: Option<String>,
    gates: Arc<StartGates>,
}

impl<'g> RunState<'g> {
    pub fn new(graph: &'g ExecutionGraph, progress: Option<Arc<dyn ProgressSink>>) -> Self {
        let n = graph.len();
        let mut entries = Vec::with_capacity(n);
        let mut unsettled = Vec::with_capacity(n);
        for index in graph.indices() {
            entries.push(ExecutionLogEntry::pending(graph.node(index)));
            unsettled.push(graph.in_degree(index));
        }

        Self {
            graph,
            entries,
            phases: vec![Phase::Waiting; n],
            unsettled,
            branches: vec![None; n],
            inputs: vec![None; n],
            logs: Vec::with_capacity(n),
            progress,
            first_failure: None,
            abort_reason: None,
            gates: Arc::new(StartGates::new(n)),
        }
    }

    /// Gates node tasks must pass before they begin executing
    pub fn gates(&self) -> Arc<StartGates> {
        Arc::clone(&self.gates)
    }

    /// Dispatch every root with the global input
    pub fn start(&mut self, ctx: &RunContext) -> Vec<Dispatch> {
        self.graph
            .roots()
            .into_iter()
            .map(|index| self.dispatch(index, ctx.input().clone()))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.logs.len() == self.entries.len()
    }

    pub fn on_started(&mut self, index: NodeIndex) {
        if self.phases[index.index()] != Phase::Dispatched {
            return;
        }
        self.phases[index.index()] = Phase::Running;
        let input = self.inputs[index.index()].take().unwrap_or(Value::Null);
        self.entries[index.index()].start(input);
    }

    /// Record a finished node and return the nodes that became ready
    pub fn on_finished(&mut self, index: NodeIndex, run: NodeRun, ctx: &RunContext) -> Vec<Dispatch> {
        match self.phases[index.index()] {
            Phase::Done | Phase::Waiting => return Vec::new(),
            Phase::Dispatched => self.on_started(index),
            Phase::Running => {}
        }

        match run.result {
            Ok(outcome) => {
                self.branches[index.index()] = outcome.branch.clone();
                self.entries[index.index()].succeed(outcome.output, outcome.branch, run.warnings);
                self.finalize(index);
                self.release(index, ctx)
            }
            Err(err) => {
                self.fail(index, err, run.warnings);
                Vec::new()
            }
        }
    }

    /// A node task died without reporting
    pub fn on_crashed(&mut self, index: NodeIndex, message: String) {
        if self.phases[index.index()] == Phase::Done {
            return;
        }
        if self.phases[index.index()] == Phase::Dispatched {
            self.on_started(index);
        }
        tracing::error!("💥 Node task crashed: {} - {}", self.graph.node(index).id, message);
        self.fail(index, NodeError::Panicked(message), Vec::new());
    }

    /// Stop the run: nodes that never began are skipped, begun ones cancelled
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::warn!("🛑 Aborting run: {}", reason);
        self.abort_reason = Some(reason);

        let graph = self.graph;
        for &index in graph.topological_order() {
            match self.phases[index.index()] {
                // began, but its Started report is still in flight
                Phase::Dispatched if !self.gates.try_close(index) => {
                    self.on_started(index);
                    self.cancel(index);
                }
                Phase::Waiting | Phase::Dispatched => {
                    self.entries[index.index()].skip(SkipReason::Aborted);
                    self.finalize(index);
                }
                Phase::Running => self.cancel(index),
                Phase::Done => {}
            }
        }
    }

    /// Assemble the final result
    pub fn into_result(self, run_id: Uuid, duration_ms: u64) -> ExecutionResult {
        let output_nodes = self.graph.output_nodes();
        let produced: Vec<(&str, &Value)> = output_nodes
            .iter()
            .map(|&index| &self.entries[index.index()])
            .filter(|entry| entry.status == NodeStatus::Success)
            .filter_map(|entry| entry.output.as_ref().map(|output| (entry.node_id.as_str(), output)))
            .collect();

        let output = match (output_nodes.len(), produced.as_slice()) {
            (_, []) => None,
            (1, [(_, value)]) => Some((*value).clone()),
            _ => Some(Value::Object(
                produced
                    .iter()
                    .map(|(id, value)| (id.to_string(), (*value).clone()))
                    .collect::<Map<String, Value>>(),
            )),
        };

        let any_failed = self.logs.iter().any(|entry| entry.status == NodeStatus::Failed);
        let success = !any_failed && self.abort_reason.is_none() && output.is_some();

        let error = match (&self.abort_reason, &output, &self.first_failure) {
            (Some(reason), _, _) => Some(format!("run aborted: {}", reason)),
            (None, Some(_), _) => None,
            (None, None, Some(failure)) => Some(format!(
                "no output produced; node '{}' failed: {}",
                self.graph.node(failure.index).id,
                failure.message
            )),
            (None, None, None) => Some("no output node produced a value".to_string()),
        };

        let error_analysis = self.first_failure.as_ref().map(|failure| {
            let node = self.graph.node(failure.index);
            ErrorAnalysis::new(&node.id, node.display_name(), failure.category, &failure.message)
        });

        ExecutionResult {
            run_id,
            success,
            output,
            credits_used: credits::cost(&self.logs),
            logs: self.logs,
            error,
            error_analysis,
            duration_ms,
        }
    }

    fn dispatch(&mut self, index: NodeIndex, input: Value) -> Dispatch {
        tracing::debug!("📤 Dispatching node: {}", self.graph.node(index).id);
        self.phases[index.index()] = Phase::Dispatched;
        self.inputs[index.index()] = Some(input.clone());
        (index, input)
    }

    fn fail(&mut self, index: NodeIndex, err: NodeError, warnings: Vec<String>) {
        self.note_failure(index, &err);
        self.entries[index.index()].fail(err.to_string(), warnings);
        self.finalize(index);
        self.skip_dependents(index);
    }

    fn cancel(&mut self, index: NodeIndex) {
        let err = NodeError::Cancelled;
        self.note_failure(index, &err);
        self.entries[index.index()].fail(err.to_string(), Vec::new());
        self.finalize(index);
    }

    fn note_failure(&mut self, index: NodeIndex, err: &NodeError) {
        if self.first_failure.is_none() {
            self.first_failure = Some(FirstFailure {
                index,
                category: err.category(),
                message: err.to_string(),
            });
        }
    }

    /// Skip everything downstream of a failed node, in dependency order
    fn skip_dependents(&mut self, index: NodeIndex) {
        let downstream: HashSet<NodeIndex> = self.graph.transitive_dependents(index).into_iter().collect();
        if downstream.is_empty() {
            return;
        }
        tracing::warn!(
            "⏭️ Skipping {} node(s) downstream of failed node {}",
            downstream.len(),
            self.graph.node(index).id
        );

        let graph = self.graph;
        for &dependent in graph.topological_order() {
            if downstream.contains(&dependent) && self.phases[dependent.index()] != Phase::Done {
                self.entries[dependent.index()].skip(SkipReason::UpstreamFailed);
                self.finalize(dependent);
            }
        }
    }

    /// Settle the outgoing edges of a terminal node; returns newly ready nodes
    fn release(&mut self, index: NodeIndex, ctx: &RunContext) -> Vec<Dispatch> {
        let mut ready = Vec::new();
        let mut settled = vec![index];

        while let Some(source) = settled.pop() {
            for target in self.graph.outgoing_targets(source) {
                let slot = &mut self.unsettled[target.index()];
                *slot = slot.saturating_sub(1);
                if *slot > 0 || self.phases[target.index()] != Phase::Waiting {
                    continue;
                }

                match self.merged_input(target, ctx) {
                    Some(input) => ready.push(self.dispatch(target, input)),
                    None => {
                        tracing::debug!("🔀 Branch not taken: {}", self.graph.node(target).id);
                        self.entries[target.index()].skip(SkipReason::BranchNotTaken);
                        self.finalize(target);
                        settled.push(target);
                    }
                }
            }
        }

        ready
    }

    /// Input for a node whose incoming edges are all settled; None if none is active
    fn merged_input(&self, index: NodeIndex, ctx: &RunContext) -> Option<Value> {
        let active: Vec<(NodeIndex, &Edge)> = self
            .graph
            .incoming(index)
            .into_iter()
            .filter(|(source, edge)| self.edge_active(*source, edge))
            .collect();

        match active.as_slice() {
            [] => None,
            [(source, edge)] if edge.target_handle.is_none() => Some(self.output_of(*source, ctx)),
            _ => {
                let mut merged = Map::with_capacity(active.len());
                for (source, edge) in &active {
                    let key = edge
                        .target_handle
                        .as_deref()
                        .or(edge.source_handle.as_deref())
                        .unwrap_or(self.graph.node(*source).id.as_str());
                    merged.insert(key.to_string(), self.output_of(*source, ctx));
                }
                Some(Value::Object(merged))
            }
        }
    }

    /// Edge carries data iff its source succeeded and did not select another handle
    fn edge_active(&self, source: NodeIndex, edge: &Edge) -> bool {
        if self.entries[source.index()].status != NodeStatus::Success {
            return false;
        }
        match (&edge.source_handle, &self.branches[source.index()]) {
            (Some(handle), Some(selected)) => handle == selected,
            _ => true,
        }
    }

    fn output_of(&self, source: NodeIndex, ctx: &RunContext) -> Value {
        ctx.output(&self.graph.node(source).id)
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Mark terminal, append to the log, notify observers
    fn finalize(&mut self, index: NodeIndex) {
        self.phases[index.index()] = Phase::Done;
        self.inputs[index.index()] = None;

        let entry = self.entries[index.index()].clone();
        self.logs.push(entry);

        if let (Some(progress), Some(entry)) = (&self.progress, self.logs.last()) {
            progress.on_progress(entry, &self.logs);
        }
    }
}
