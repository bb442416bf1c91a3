/// Runtime Execution Engine
///
/// This module provides the concurrent DAG execution engine for node graphs.
/// It handles:
/// - Readiness-driven scheduling with failure isolation and branch skipping
/// - Per-node executors (input, api, ai, logic, output, webhook, integration)
/// - Template resolution against the run's output store
/// - Execution logs, progress events and credit accounting

// Coordinating run loop: task spawning, deadlines, aborts
pub mod engine;

// Per-run scheduling state owned by the coordinator
pub mod scheduler;

// Individual node execution dispatcher
pub mod executor;

// Type-specific node handlers
pub mod nodes;

// Shared collaborators: HTTP client, LLM providers, integrations
pub mod services;

// Run-scoped context and write-once output store
pub mod context;

// {{path}} placeholder resolution
pub mod template;

// Dot-path navigation over JSON values
pub mod path;

// Node config schema checks and workflow preflight
pub mod validator;

// Lua expression sandbox for logic nodes
pub mod sandbox;

// Outbound HTTP helpers shared by api and webhook nodes
pub mod http;

// Log entries and progress sinks
pub mod events;

// Final run result
pub mod result;

// Typed engine and node errors
pub mod error;

// Credit metering
pub mod credits;

// Re-export main types
pub use engine::{AbortHandle, AbortSignal, EngineSettings, ExecutionEngine, RunOptions};
pub use error::{EngineError, ErrorAnalysis, ErrorCategory, NodeError};
pub use events::{ChannelProgressSink, ExecutionLogEntry, NodeStatus, ProgressSink, SkipReason, VecProgressSink};
pub use executor::{NodeExecutor, NodeRun};
pub use result::ExecutionResult;
pub use services::EngineServices;
pub use validator::ValidationIssue;
