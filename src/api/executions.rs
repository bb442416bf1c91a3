/// Execution REST API endpoints
///
/// Graphs arrive inline with each request; nothing is stored between runs.
/// Structural problems are reported inside the body (`success=false`),
/// only malformed JSON is rejected at the HTTP level.

use super::AppState;
use crate::runtime::credits;
use crate::runtime::engine::RunOptions;
use crate::runtime::events::ChannelProgressSink;
use crate::runtime::result::ExecutionResult;
use crate::workflow::types::RunRequest;
use axum::{
    extract::State,
    response::{
        sse::{Event, KeepAlive, Sse},
        Json,
    },
    routing::post,
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, UnboundedReceiverStream};
use tokio_stream::{Stream, StreamExt};

/// Create execution routes
pub fn create_execution_routes() -> Router<AppState> {
    Router::new()
        .route("/api/executions", post(execute_workflow))
        .route("/api/executions/stream", post(stream_workflow))
        .route("/api/workflows/validate", post(validate_workflow))
}

/// Execute a graph and return the full result
///
/// POST /api/executions
/// Body: { "nodes": [...], "edges": [...], "input": {...} }
async fn execute_workflow(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Json<ExecutionResult> {
    tracing::info!("📨 Execution request with {} nodes", request.nodes.len());

    let result = state
        .engine
        .execute(request.nodes, request.edges, request.input)
        .await;

    Json(result)
}

/// Execute a graph, streaming log entries as they finish
///
/// POST /api/executions/stream
/// Emits one `node` event per terminal log entry, then one `result` event.
async fn stream_workflow(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::info!("📡 Streaming execution request with {} nodes", request.nodes.len());

    let (entry_tx, entry_rx) = mpsc::unbounded_channel();
    let (result_tx, result_rx) = mpsc::channel::<ExecutionResult>(1);
    let options = RunOptions::default().with_progress(Arc::new(ChannelProgressSink::new(entry_tx)));

    // The progress sink is dropped when the run returns, which ends the
    // node stream before the result is sent.
    let engine = Arc::clone(&state.engine);
    tokio::spawn(async move {
        let result = engine
            .execute_with(request.nodes, request.edges, request.input, options)
            .await;
        if result_tx.send(result).await.is_err() {
            tracing::debug!("📭 Stream client went away before the result");
        }
    });

    let events = UnboundedReceiverStream::new(entry_rx)
        .map(|entry| Ok::<_, Infallible>(sse_event("node", &entry)))
        .chain(ReceiverStream::new(result_rx).map(|result| Ok::<_, Infallible>(sse_event("result", &result))));

    Sse::new(events).keep_alive(KeepAlive::default())
}

/// Preflight a graph without executing it
///
/// POST /api/workflows/validate
/// Returns: { "valid": bool, "issues": [...], "estimatedCredits": n }
async fn validate_workflow(
    State(state): State<AppState>,
    Json(request): Json<RunRequest>,
) -> Json<Value> {
    let issues = state.engine.preflight(&request.nodes, &request.edges);
    let estimated = credits::estimate(&request.nodes);

    tracing::info!("🔍 Validated workflow: {} issue(s), {} credit(s) estimated", issues.len(), estimated);

    Json(json!({
        "valid": issues.is_empty(),
        "issues": issues,
        "estimatedCredits": estimated,
    }))
}

fn sse_event<T: Serialize>(name: &str, payload: &T) -> Event {
    match Event::default().event(name).json_data(payload) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!("❌ Failed to encode {} event: {}", name, err);
            Event::default().event("error").data(err.to_string())
        }
    }
}
