/// Server setup and initialization
///
/// Wires together the engine, its collaborator services and the HTTP routes.
/// Provides the main application factory function for creating the Axum app.

use crate::{
    api::{create_execution_routes, AppState},
    config::Config,
    runtime::engine::ExecutionEngine,
};
use anyhow::{Context, Result};
use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Create the main Axum application around an existing engine
///
/// Lets callers (and tests) register custom providers and integrations
/// on the engine's services before serving.
pub fn create_app_with_engine(engine: ExecutionEngine) -> Router {
    tracing::info!("📡 Creating HTTP router with all endpoints");
    let state = AppState {
        engine: Arc::new(engine),
    };

    Router::new()
        // Health check endpoint
        .route("/healthz", get(health_check))
        // Execution and preflight API routes
        .merge(create_execution_routes().with_state(state))
}

/// Create the main Axum application with all routes
///
/// Builds the engine from configuration: HTTP client, LLM providers for
/// every configured key, engine limits.
pub fn create_app(config: &Config) -> Result<Router> {
    tracing::info!("⚙️ Initializing execution engine");
    let engine = ExecutionEngine::from_config(config).context("Failed to initialize execution engine")?;

    tracing::info!(
        "🤖 LLM providers available: {:?}",
        engine.services().providers.names()
    );
    if let Some(limit) = engine.settings().max_concurrency {
        tracing::info!("🚦 Node concurrency limited to {}", limit);
    }

    let app = create_app_with_engine(engine);
    tracing::info!("✅ Application initialized successfully");

    Ok(app)
}

/// Start the HTTP server with the given configuration
///
/// Creates the application and starts the Axum server on the configured address and port.
pub async fn start_server(config: Config) -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();

    tracing::info!("Starting Nodeflow server...");

    // Create the application
    let app = create_app(&config)?;

    // Bind to the configured address
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    tracing::info!("Server listening on http://{}", bind_addr);

    // Start the server
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}

/// Health check endpoint handler
async fn health_check() -> &'static str {
    "ok"
}
