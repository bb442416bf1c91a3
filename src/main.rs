/// Nodeflow: typed workflow graph execution engine
///
/// Main entry point for the Nodeflow server. Loads configuration from the
/// environment and starts the HTTP server.

use nodeflow::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Graph execution at POST /api/executions
/// - Streaming execution (SSE) at POST /api/executions/stream
/// - Workflow preflight at POST /api/workflows/validate
/// - Health check at /healthz
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration (defaults to 0.0.0.0:3004, overridable via NODEFLOW_* env vars)
    let config = Config::default();

    // Start the server
    start_server(config).await?;

    Ok(())
}
