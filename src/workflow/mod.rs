/// Workflow Definition Layer
///
/// This module holds the graph the engine executes:
/// - Type definitions (Node, NodeType, Edge, RunRequest)
/// - Structural validation and dependency ordering (ExecutionGraph)

// Core workflow type definitions
pub mod types;

// petgraph-backed validated graph with Kahn ordering
pub mod graph;

// Re-export commonly used types
pub use graph::ExecutionGraph;
pub use types::{Edge, Node, NodeType, RunRequest};
