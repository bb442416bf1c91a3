/// Error taxonomy for the execution engine
///
/// Two levels: `EngineError` aborts a whole run before any node executes,
/// `NodeError` is captured into a single node's log entry and isolated to
/// that node and its dependents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Run-level structural errors
///
/// Raised while validating the graph; no node is executed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Graph has no nodes at all
    #[error("workflow has no nodes")]
    EmptyGraph,

    /// Two nodes share the same id
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),

    /// An edge points at a node that does not exist
    #[error("edge '{edge_id}' references unknown node '{node_id}'")]
    UnknownEdgeEndpoint { edge_id: String, node_id: String },

    /// The dependency graph is not acyclic
    #[error("workflow contains a cycle ({remaining} nodes could not be ordered)")]
    CycleDetected { remaining: usize },

    /// Nothing in the graph would ever produce a run output
    #[error("workflow has no output node")]
    MissingOutputNode,
}

/// Node-level failures
///
/// Every variant maps onto a coarse `ErrorCategory` for diagnostics.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NodeError {
    /// Config failed its schema, or input failed the node's declared fields
    #[error("validation failed: {0}")]
    Validation(String),

    /// Malformed `{{...}}` placeholder in a templated config field
    #[error("template error: {0}")]
    Template(String),

    /// Transport-level failure (DNS, connect, TLS, reset)
    #[error("network error: {0}")]
    Network(String),

    /// Remote answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    /// Request or node exceeded its time budget
    #[error("timed out: {0}")]
    Timeout(String),

    /// Structured output did not parse or did not match its schema
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Sandboxed expression failed to compile or evaluate
    #[error("expression error: {0}")]
    Expression(String),

    /// Integration handler reported failure (surfaced verbatim)
    #[error("{0}")]
    Integration(String),

    /// LLM provider returned an envelope we could not understand
    #[error("provider error: {0}")]
    Provider(String),

    /// The node's task panicked
    #[error("node task panicked: {0}")]
    Panicked(String),

    /// The run was aborted while this node was executing
    #[error("cancelled: run aborted before the node completed")]
    Cancelled,
}

impl NodeError {
    /// Map a reqwest failure onto the taxonomy
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NodeError::Timeout(err.to_string())
        } else {
            NodeError::Network(err.to_string())
        }
    }

    /// Coarse category used by `ErrorAnalysis`
    pub fn category(&self) -> ErrorCategory {
        match self {
            NodeError::Validation(_) | NodeError::Template(_) => ErrorCategory::Validation,
            NodeError::Network(_) | NodeError::HttpStatus { .. } => ErrorCategory::Network,
            NodeError::Timeout(_) | NodeError::Cancelled => ErrorCategory::Timeout,
            NodeError::SchemaMismatch(_) => ErrorCategory::SchemaMismatch,
            NodeError::Expression(_)
            | NodeError::Integration(_)
            | NodeError::Provider(_)
            | NodeError::Panicked(_) => ErrorCategory::Unknown,
        }
    }
}

/// Coarse classification of a node failure for downstream tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Validation,
    Network,
    SchemaMismatch,
    Timeout,
    Unknown,
}

impl ErrorCategory {
    fn suggestion(&self) -> &'static str {
        match self {
            ErrorCategory::Validation => "Check the node configuration and the fields it expects from its input.",
            ErrorCategory::Network => "Check that the target URL is reachable and returns a 2xx status.",
            ErrorCategory::SchemaMismatch => "Make the prompt ask for JSON matching the output schema, or relax the schema.",
            ErrorCategory::Timeout => "Raise the timeout or reduce the amount of work the node does.",
            ErrorCategory::Unknown => "Inspect the node's error message in the execution log.",
        }
    }
}

/// Structured diagnostic for the first failing node of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorAnalysis {
    pub node_id: String,
    pub node_name: String,
    pub category: ErrorCategory,
    pub message: String,
    pub suggestion: String,
}

impl ErrorAnalysis {
    pub fn new(node_id: &str, node_name: &str, category: ErrorCategory, message: &str) -> Self {
        Self {
            node_id: node_id.to_string(),
            node_name: node_name.to_string(),
            category,
            message: message.to_string(),
            suggestion: category.suggestion().to_string(),
        }
    }
}
