/// Core workflow type definitions
///
/// Defines the node, edge and run-request structures the engine consumes.
/// These types are serialized/deserialized from the editor's JSON (camelCase keys).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A single node in the workflow graph
///
/// Nodes are typed processing units. The type selects the executor and the
/// config map carries type-specific settings (url, prompt, expression, ...).
/// Nodes are immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node identifier within the graph (e.g., "fetch-orders")
    pub id: String,
    /// The type of node which determines execution behavior
    #[serde(rename = "type")]
    pub node_type: NodeType,
    /// Node-specific configuration as a flexible key-value map
    #[serde(default)]
    pub config: Map<String, Value>,
    /// Human-readable label shown in the editor
    #[serde(default)]
    pub label: String,
}

impl Node {
    /// Create a node from a JSON config object
    ///
    /// Non-object configs are replaced by an empty map.
    pub fn new(id: impl Into<String>, node_type: NodeType, config: Value) -> Self {
        let config = match config {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        Self {
            id: id.into(),
            node_type,
            config,
            label: String::new(),
        }
    }

    /// Attach an editor label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Label if set, otherwise the node id
    pub fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

/// Available node types
///
/// A closed set: every place that dispatches on node type matches
/// exhaustively, so adding a type is a compile error until handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Validates and defaults the run's global input
    /// Expected config: { "fields": [{ "name": "email", "type": "string", "required": true }] }
    Input,

    /// Outbound HTTP request
    /// Expected config: { "url": "https://api.example.com/{{input.id}}", "method": "GET", "responseMapping": {...} }
    Api,

    /// LLM invocation with optional structured output
    /// Expected config: { "provider": "openai", "model": "gpt-4o-mini", "userPromptTemplate": "...", "outputSchema": {...} }
    Ai,

    /// Sandboxed data transform
    /// Expected config: { "operation": "filter", "field": "items", "condition": "item > 1" }
    Logic,

    /// Formats the final run output
    /// Expected config: { "format": "json" | "text" | "markdown", "template": "...", "fields": [...] }
    Output,

    /// Signed outbound webhook
    /// Expected config: { "url": "https://hooks.example.com/x", "payload": {...}, "secret": "..." }
    Webhook,

    /// Externally registered integration action
    /// Expected config: { "integrationId": "slack", "actionId": "post_message", "input": {...} }
    Integration,
}

impl NodeType {
    /// Every node type, in declaration order
    pub const ALL: [NodeType; 7] = [
        NodeType::Input,
        NodeType::Api,
        NodeType::Ai,
        NodeType::Logic,
        NodeType::Output,
        NodeType::Webhook,
        NodeType::Integration,
    ];

    /// Wire name of the node type
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Input => "input",
            NodeType::Api => "api",
            NodeType::Ai => "ai",
            NodeType::Logic => "logic",
            NodeType::Output => "output",
            NodeType::Webhook => "webhook",
            NodeType::Integration => "integration",
        }
    }

    /// Config keys whose string values go through template resolution
    ///
    /// Logic expressions are Lua source and are deliberately excluded:
    /// `{{` is valid Lua table syntax.
    pub fn templated_fields(&self) -> &'static [&'static str] {
        match self {
            NodeType::Input | NodeType::Logic => &[],
            NodeType::Api => &["url", "headers", "body"],
            NodeType::Ai => &["userPromptTemplate", "systemPrompt"],
            NodeType::Output => &["template"],
            NodeType::Webhook => &["url", "headers", "payload"],
            NodeType::Integration => &["input", "connection"],
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection between two nodes in the workflow graph
///
/// An edge is a data dependency: `target` may not start until `source`
/// has finished. Handles disambiguate multi-output/multi-input ports,
/// e.g. the `"true"`/`"false"` branches of a condition node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    /// Edge identifier (editor-assigned, informational)
    #[serde(default)]
    pub id: String,
    /// Source node ID
    pub source: String,
    /// Target node ID
    pub target: String,
    /// Output port on the source node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Input port on the target node
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl Edge {
    /// Create a plain edge with a derived id
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();

        Self {
            id: format!("{}->{}", source, target),
            source,
            target,
            source_handle: None,
            target_handle: None,
        }
    }

    /// Route this edge from a named output port
    pub fn from_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    /// Route this edge into a named input port
    pub fn into_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }
}

/// A run request: the graph plus the global input for one execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    /// Nodes of the graph
    pub nodes: Vec<Node>,
    /// Edges of the graph
    #[serde(default)]
    pub edges: Vec<Edge>,
    /// Global input object handed to root nodes
    #[serde(default)]
    pub input: Value,
}
