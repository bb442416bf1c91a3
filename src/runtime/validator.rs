/// Node config validation
///
/// Per node-type schema check (required fields, enum membership, JSON types)
/// run right before a node executes. A failing node is isolated like any
/// other node failure; its siblings keep running.

use crate::workflow::graph::ExecutionGraph;
use crate::workflow::types::{Edge, Node, NodeType};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;

const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE"];
const LOGIC_OPERATIONS: &[&str] = &["filter", "map", "reduce", "condition", "transform"];
const OUTPUT_FORMATS: &[&str] = &["json", "text", "markdown"];
const INPUT_FIELD_TYPES: &[&str] = &["string", "number", "boolean", "object", "array", "any"];

/// A single problem found in a node config or in the graph itself
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationIssue {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ValidationIssue {
    fn field(node: &Node, field: &str, message: impl Into<String>) -> Self {
        Self {
            node_id: Some(node.id.clone()),
            field: Some(field.to_string()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "'{}': {}", field, self.message),
            None => f.write_str(&self.message),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Any,
    OneOf(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy)]
struct Rule {
    field: &'static str,
    kind: Kind,
    required: bool,
}

const fn required(field: &'static str, kind: Kind) -> Rule {
    Rule { field, kind, required: true }
}

const fn optional(field: &'static str, kind: Kind) -> Rule {
    Rule { field, kind, required: false }
}

const INPUT_RULES: &[Rule] = &[optional("fields", Kind::Array)];

const API_RULES: &[Rule] = &[
    required("url", Kind::String),
    optional("method", Kind::OneOf(HTTP_METHODS)),
    optional("headers", Kind::Object),
    optional("body", Kind::Any),
    optional("responseMapping", Kind::Object),
    optional("timeoutMs", Kind::Number),
];

const AI_RULES: &[Rule] = &[
    optional("provider", Kind::String),
    required("model", Kind::String),
    required("userPromptTemplate", Kind::String),
    optional("systemPrompt", Kind::String),
    optional("temperature", Kind::Number),
    optional("maxTokens", Kind::Number),
    optional("outputSchema", Kind::Object),
];

const LOGIC_RULES: &[Rule] = &[
    required("operation", Kind::OneOf(LOGIC_OPERATIONS)),
    optional("expression", Kind::String),
    optional("condition", Kind::String),
    optional("mappings", Kind::Object),
    optional("field", Kind::String),
    optional("initial", Kind::Any),
    optional("timeoutMs", Kind::Number),
];

const OUTPUT_RULES: &[Rule] = &[
    optional("format", Kind::OneOf(OUTPUT_FORMATS)),
    optional("template", Kind::String),
    optional("fields", Kind::Array),
];

const WEBHOOK_RULES: &[Rule] = &[
    required("url", Kind::String),
    optional("method", Kind::OneOf(HTTP_METHODS)),
    optional("headers", Kind::Object),
    optional("payload", Kind::Any),
    optional("secret", Kind::String),
    optional("timeoutMs", Kind::Number),
];

const INTEGRATION_RULES: &[Rule] = &[
    required("integrationId", Kind::String),
    required("actionId", Kind::String),
    optional("connection", Kind::Object),
    optional("input", Kind::Any),
];

fn rules_for(node_type: NodeType) -> &'static [Rule] {
    match node_type {
        NodeType::Input => INPUT_RULES,
        NodeType::Api => API_RULES,
        NodeType::Ai => AI_RULES,
        NodeType::Logic => LOGIC_RULES,
        NodeType::Output => OUTPUT_RULES,
        NodeType::Webhook => WEBHOOK_RULES,
        NodeType::Integration => INTEGRATION_RULES,
    }
}

/// Check a node's config against its type's schema
///
/// Returns every issue found, not just the first.
pub fn validate_node(node: &Node) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    for rule in rules_for(node.node_type) {
        check_rule(node, rule, &mut issues);
    }

    let config = &node.config;
    match node.node_type {
        NodeType::Input => check_input_fields(node, config, &mut issues),
        NodeType::Api => {
            check_non_empty(node, "url", &mut issues);
            check_string_values(node, "responseMapping", &mut issues);
        }
        NodeType::Ai => check_ai(node, config, &mut issues),
        NodeType::Logic => check_logic(node, config, &mut issues),
        NodeType::Output => check_string_items(node, "fields", &mut issues),
        NodeType::Webhook => check_non_empty(node, "url", &mut issues),
        NodeType::Integration => {
            check_non_empty(node, "integrationId", &mut issues);
            check_non_empty(node, "actionId", &mut issues);
        }
    }

    issues
}

/// Structural check plus every node's config check, without executing
pub fn preflight(nodes: &[Node], edges: &[Edge]) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if let Err(err) = ExecutionGraph::build(nodes.to_vec(), edges.to_vec()) {
        issues.push(ValidationIssue {
            node_id: None,
            field: None,
            message: err.to_string(),
        });
    }

    for node in nodes {
        issues.extend(validate_node(node));
    }

    issues
}

fn check_rule(node: &Node, rule: &Rule, issues: &mut Vec<ValidationIssue>) {
    let value = match node.config.get(rule.field) {
        Some(Value::Null) | None => {
            if rule.required {
                issues.push(ValidationIssue::field(node, rule.field, "is required"));
            }
            return;
        }
        Some(value) => value,
    };

    if let Some(expected) = mismatch(rule.kind, value) {
        issues.push(ValidationIssue::field(
            node,
            rule.field,
            format!("must be {}, got {}", expected, value),
        ));
    }
}

/// Describes the expected kind when `value` does not satisfy it
fn mismatch(kind: Kind, value: &Value) -> Option<String> {
    let (ok, expected) = match kind {
        Kind::Any => return None,
        Kind::String => (value.is_string(), "a string".to_string()),
        Kind::Number => (value.is_number(), "a number".to_string()),
        Kind::Boolean => (value.is_boolean(), "a boolean".to_string()),
        Kind::Object => (value.is_object(), "an object".to_string()),
        Kind::Array => (value.is_array(), "an array".to_string()),
        Kind::OneOf(allowed) => (
            value
                .as_str()
                .is_some_and(|text| allowed.iter().any(|candidate| candidate.eq_ignore_ascii_case(text))),
            format!("one of [{}]", allowed.join(", ")),
        ),
    };
    (!ok).then_some(expected)
}

fn check_non_empty(node: &Node, field: &str, issues: &mut Vec<ValidationIssue>) {
    if let Some(Value::String(text)) = node.config.get(field) {
        if text.trim().is_empty() {
            issues.push(ValidationIssue::field(node, field, "must not be empty"));
        }
    }
}

fn check_string_values(node: &Node, field: &str, issues: &mut Vec<ValidationIssue>) {
    if let Some(Value::Object(map)) = node.config.get(field) {
        for (key, value) in map {
            if !value.is_string() {
                issues.push(ValidationIssue::field(
                    node,
                    field,
                    format!("entry '{}' must be a path string", key),
                ));
            }
        }
    }
}

fn check_string_items(node: &Node, field: &str, issues: &mut Vec<ValidationIssue>) {
    if let Some(Value::Array(items)) = node.config.get(field) {
        if items.iter().any(|item| !item.is_string()) {
            issues.push(ValidationIssue::field(node, field, "must contain only strings"));
        }
    }
}

fn check_input_fields(node: &Node, config: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(Value::Array(fields)) = config.get("fields") else {
        return;
    };

    for (position, field) in fields.iter().enumerate() {
        let Some(spec) = field.as_object() else {
            issues.push(ValidationIssue::field(
                node,
                "fields",
                format!("entry {} must be an object", position),
            ));
            continue;
        };

        match spec.get("name").and_then(Value::as_str) {
            Some(name) if !name.is_empty() => {}
            _ => issues.push(ValidationIssue::field(
                node,
                "fields",
                format!("entry {} needs a non-empty 'name'", position),
            )),
        }

        if let Some(kind) = spec.get("type") {
            let known = kind
                .as_str()
                .map(|kind| INPUT_FIELD_TYPES.contains(&kind))
                .unwrap_or(false);
            if !known {
                issues.push(ValidationIssue::field(
                    node,
                    "fields",
                    format!("entry {} has unknown type {}", position, kind),
                ));
            }
        }

        if let Some(flag) = spec.get("required") {
            if !flag.is_boolean() {
                issues.push(ValidationIssue::field(
                    node,
                    "fields",
                    format!("entry {} 'required' must be a boolean", position),
                ));
            }
        }
    }
}

fn check_ai(node: &Node, config: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    if let Some(temperature) = config.get("temperature").and_then(Value::as_f64) {
        if !(0.0..=2.0).contains(&temperature) {
            issues.push(ValidationIssue::field(node, "temperature", "must be between 0 and 2"));
        }
    }

    if let Some(max_tokens) = config.get("maxTokens").filter(|value| value.is_number()) {
        if max_tokens.as_u64().map(|n| n == 0).unwrap_or(true) {
            issues.push(ValidationIssue::field(node, "maxTokens", "must be a positive integer"));
        }
    }

    if let Some(Value::Object(schema)) = config.get("outputSchema") {
        if let Some(properties) = schema.get("properties") {
            if !properties.is_object() {
                issues.push(ValidationIssue::field(node, "outputSchema", "'properties' must be an object"));
            }
        }
        if let Some(required) = schema.get("required") {
            let valid = required
                .as_array()
                .map(|keys| keys.iter().all(Value::is_string))
                .unwrap_or(false);
            if !valid {
                issues.push(ValidationIssue::field(
                    node,
                    "outputSchema",
                    "'required' must be an array of strings",
                ));
            }
        }
    }
}

fn check_logic(node: &Node, config: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) {
    let Some(operation) = config.get("operation").and_then(Value::as_str) else {
        return;
    };

    let has = |field: &str| config.get(field).map(|v| !v.is_null()).unwrap_or(false);
    let needs: &[&str] = match operation.to_ascii_lowercase().as_str() {
        "filter" | "condition" => &["condition", "expression"],
        "map" | "reduce" => &["expression"],
        "transform" => &["mappings", "expression"],
        _ => return,
    };

    if !needs.iter().any(|field| has(field)) {
        issues.push(ValidationIssue::field(
            node,
            needs[0],
            format!("operation '{}' requires one of [{}]", operation, needs.join(", ")),
        ));
    }

    check_string_values(node, "mappings", issues);
}
