/// Petgraph-based DAG execution engine
///
/// Validates the graph, then drives a run as one coordinating loop plus one
/// tokio task per node. A node is spawned the moment its own incoming edges
/// settle, not level by level. Tasks report back over an mpsc channel; the
/// coordinator is the only writer of scheduling state and of the log.

use crate::config::Config;
use crate::runtime::context::RunContext;
use crate::runtime::events::ProgressSink;
use crate::runtime::executor::{NodeExecutor, NodeRun};
use crate::runtime::result::ExecutionResult;
use crate::runtime::scheduler::{Dispatch, RunState, StartGates};
use crate::runtime::services::EngineServices;
use crate::runtime::validator::{self, ValidationIssue};
use crate::workflow::graph::ExecutionGraph;
use crate::workflow::types::{Edge, Node};
use petgraph::graph::NodeIndex;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch, Semaphore};
use uuid::Uuid;

/// Engine-wide limits applied to every run
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// Ceiling on concurrently executing node tasks per run
    pub max_concurrency: Option<usize>,
    /// Default deadline for a whole run
    pub run_timeout: Option<Duration>,
}

impl EngineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_concurrency: config.engine.max_concurrency,
            run_timeout: config.engine.run_timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Per-run options
#[derive(Clone, Default)]
pub struct RunOptions {
    /// Observer called once per node terminal transition
    pub progress: Option<Arc<dyn ProgressSink>>,
    /// Deadline for this run; overrides the engine default
    pub timeout: Option<Duration>,
    /// External abort trigger
    pub abort: Option<AbortSignal>,
}

impl RunOptions {
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_abort(mut self, signal: AbortSignal) -> Self {
        self.abort = Some(signal);
        self
    }
}

/// Caller side of a run abort
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

/// Engine side of a run abort
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortHandle {
    pub fn new() -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, AbortSignal { rx })
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once abort is requested; never resolves if the handle is dropped first
    pub async fn aborted(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Messages from node tasks to the coordinator
enum NodeMessage {
    Started { index: NodeIndex },
    Finished { index: NodeIndex, run: NodeRun },
    Crashed { index: NodeIndex, message: String },
}

/// Everything a node task needs, shared across the run
#[derive(Clone)]
struct RunShared {
    executor: Arc<NodeExecutor>,
    graph: Arc<ExecutionGraph>,
    ctx: Arc<RunContext>,
    tx: mpsc::UnboundedSender<NodeMessage>,
    permits: Option<Arc<Semaphore>>,
    gates: Arc<StartGates>,
}

/// DAG execution engine
///
/// Cheap to clone; holds no per-run state.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    /// Node executor for handling individual node execution
    executor: Arc<NodeExecutor>,
    settings: EngineSettings,
}

impl ExecutionEngine {
    pub fn new(services: EngineServices) -> Self {
        Self::with_settings(services, EngineSettings::default())
    }

    pub fn with_settings(services: EngineServices, settings: EngineSettings) -> Self {
        Self {
            executor: Arc::new(NodeExecutor::new(services)),
            settings,
        }
    }

    /// Engine wired from configuration: services, providers and limits
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let services = EngineServices::from_config(config)?;
        Ok(Self::with_settings(services, EngineSettings::from_config(config)))
    }

    pub fn services(&self) -> &EngineServices {
        self.executor.services()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Structural and config checks without executing anything
    pub fn preflight(&self, nodes: &[Node], edges: &[Edge]) -> Vec<ValidationIssue> {
        validator::preflight(nodes, edges)
    }

    /// Execute a workflow with default options
    pub async fn execute(&self, nodes: Vec<Node>, edges: Vec<Edge>, input: Value) -> ExecutionResult {
        self.execute_with(nodes, edges, input, RunOptions::default()).await
    }

    /// Execute a workflow
    ///
    /// Always returns a result: structural errors come back as
    /// `success=false` with empty logs, node failures are isolated to
    /// their dependents.
    pub async fn execute_with(
        &self,
        nodes: Vec<Node>,
        edges: Vec<Edge>,
        input: Value,
        options: RunOptions,
    ) -> ExecutionResult {
        let run_id = Uuid::new_v4();
        let workflow_start_time = Instant::now();

        tracing::info!("🚀 Starting run {} with {} nodes and {} edges", run_id, nodes.len(), edges.len());

        let graph = match ExecutionGraph::build(nodes, edges) {
            Ok(graph) => Arc::new(graph),
            Err(err) => {
                tracing::error!("❌ Run {} rejected: {}", run_id, err);
                return ExecutionResult::structural_failure(run_id, &err, elapsed_ms(workflow_start_time));
            }
        };

        let ctx = Arc::new(RunContext::new(run_id, input, graph.node_ids()));
        let mut state = RunState::new(&graph, options.progress.clone());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let shared = RunShared {
            executor: Arc::clone(&self.executor),
            graph: Arc::clone(&graph),
            ctx: Arc::clone(&ctx),
            tx,
            permits: self.settings.max_concurrency.map(|n| Arc::new(Semaphore::new(n.max(1)))),
            gates: state.gates(),
        };

        spawn_all(&shared, state.start(&ctx));

        let deadline = options
            .timeout
            .or(self.settings.run_timeout)
            .map(|timeout| (tokio::time::Instant::now() + timeout, timeout));
        let mut abort = options.abort;

        while !state.is_complete() {
            tokio::select! {
                Some(message) = rx.recv() => match message {
                    NodeMessage::Started { index } => state.on_started(index),
                    NodeMessage::Finished { index, run } => {
                        let ready = state.on_finished(index, run, &ctx);
                        spawn_all(&shared, ready);
                    }
                    NodeMessage::Crashed { index, message } => state.on_crashed(index, message),
                },
                _ = wait_deadline(deadline) => {
                    let timeout = deadline.map(|(_, timeout)| timeout).unwrap_or_default();
                    ctx.cancel();
                    state.abort(format!("timed out after {}ms", timeout.as_millis()));
                }
                _ = wait_abort(&mut abort) => {
                    ctx.cancel();
                    state.abort("aborted by caller");
                }
            }
        }

        let result = state.into_result(run_id, elapsed_ms(workflow_start_time));
        if result.success {
            tracing::info!("🎉 Run {} completed successfully in {}ms", run_id, result.duration_ms);
        } else {
            tracing::warn!(
                "⚠️ Run {} finished without success in {}ms: {}",
                run_id,
                result.duration_ms,
                result.error.as_deref().unwrap_or("node failures")
            );
        }
        result
    }
}

fn spawn_all(shared: &RunShared, ready: Vec<Dispatch>) {
    for (index, input) in ready {
        spawn_node(shared.clone(), index, input);
    }
}

/// Spawn a node task plus a supervisor that reports panics
fn spawn_node(shared: RunShared, index: NodeIndex, input: Value) {
    let supervisor_tx = shared.tx.clone();

    let task = tokio::spawn(async move {
        let _permit = match &shared.permits {
            Some(permits) => match Arc::clone(permits).acquire_owned().await {
                Ok(permit) => Some(permit),
                Err(_) => return,
            },
            None => None,
        };
        if !shared.gates.try_begin(index) {
            return;
        }

        let node = shared.graph.node(index);
        if shared.tx.send(NodeMessage::Started { index }).is_err() {
            return;
        }

        let run = shared.executor.execute_node(node, input, &shared.ctx).await;
        if let Ok(outcome) = &run.result {
            if !shared.ctx.is_cancelled() {
                shared.ctx.record_output(&node.id, outcome.output.clone());
            }
        }

        if shared.tx.send(NodeMessage::Finished { index, run }).is_err() {
            tracing::debug!("📭 Run already finished; dropping result of {}", node.id);
        }
    });

    tokio::spawn(async move {
        if let Err(err) = task.await {
            if err.is_panic() {
                let message = panic_message(err.into_panic());
                let _ = supervisor_tx.send(NodeMessage::Crashed { index, message });
            }
        }
    });
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn wait_deadline(deadline: Option<(tokio::time::Instant, Duration)>) {
    match deadline {
        Some((at, _)) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn wait_abort(signal: &mut Option<AbortSignal>) {
    match signal {
        Some(signal) => signal.aborted().await,
        None => std::future::pending().await,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
