/// Nodeflow: typed workflow graph execution engine
///
/// This library runs user-authored node graphs as concurrent DAGs: readiness-driven
/// scheduling, per-node executors, failure isolation, branch skipping, template
/// resolution and credit accounting.

// Core configuration and setup
pub mod config;

// Workflow definition layer - node/edge types and the validated execution graph
pub mod workflow;

// Runtime execution engine - scheduling, node executors, logs and results
pub mod runtime;

// LLM provider abstraction used by ai nodes
pub mod llm;

// Integration action handlers used by integration nodes
pub mod integration;

// HTTP API layer - execution, streaming and preflight endpoints
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use config::Config;
pub use runtime::{
    AbortHandle, EngineServices, ExecutionEngine, ExecutionLogEntry, ExecutionResult, NodeStatus, RunOptions,
};
pub use server::start_server;
pub use workflow::{Edge, Node, NodeType, RunRequest};
