/// `{{source.path}}` template resolution
///
/// Placeholders are dot paths rooted at `input` (the global run input), at
/// `$in` (the merged input of the node being resolved) or at a node id (that
/// node's produced output). Syntax is strict: a malformed
/// placeholder is an error. Resolution is lenient: a well-formed path that
/// finds nothing becomes an empty string plus a warning.

use crate::runtime::context::RunContext;
use crate::runtime::error::NodeError;
use crate::runtime::path;
use crate::workflow::types::Node;
use serde_json::{Map, Value};
use thiserror::Error;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// Root naming the resolving node's own merged input
pub const NODE_INPUT_ROOT: &str = "$in";

/// Malformed placeholder syntax
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateError {
    #[error("unclosed placeholder starting at byte {0}")]
    Unclosed(usize),

    #[error("empty placeholder at byte {0}")]
    Empty(usize),

    #[error("nested placeholder at byte {0}")]
    Nested(usize),

    #[error("invalid placeholder path '{0}'")]
    InvalidPath(String),
}

impl From<TemplateError> for NodeError {
    fn from(err: TemplateError) -> Self {
        NodeError::Template(err.to_string())
    }
}

/// A resolved string plus the non-fatal warnings raised while resolving it
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub text: String,
    pub warnings: Vec<String>,
}

/// One scanned piece of a template
enum Segment<'t> {
    Literal(&'t str),
    Placeholder(&'t str),
}

/// Resolve every placeholder in `template` against `ctx`
pub fn resolve(template: &str, ctx: &RunContext) -> Result<Resolved, TemplateError> {
    let mut resolver = TemplateResolver::new(ctx);
    let text = resolver.resolve_str(template)?;
    Ok(Resolved {
        text,
        warnings: resolver.into_warnings(),
    })
}

/// True if the string contains at least one `{{`
pub fn has_placeholders(template: &str) -> bool {
    template.contains(OPEN)
}

/// Stateful resolver that accumulates warnings across several fields
pub struct TemplateResolver<'c> {
    ctx: &'c RunContext,
    node_input: Option<&'c Value>,
    warnings: Vec<String>,
}

impl<'c> TemplateResolver<'c> {
    pub fn new(ctx: &'c RunContext) -> Self {
        Self {
            ctx,
            node_input: None,
            warnings: Vec::new(),
        }
    }

    /// Make `$in` resolve against the given node input
    pub fn with_node_input(mut self, input: &'c Value) -> Self {
        self.node_input = Some(input);
        self
    }

    pub fn into_warnings(self) -> Vec<String> {
        self.warnings
    }

    /// Resolve a template string, stringifying non-string values
    pub fn resolve_str(&mut self, template: &str) -> Result<String, TemplateError> {
        if !has_placeholders(template) {
            return Ok(template.to_string());
        }

        let mut out = String::with_capacity(template.len());
        for segment in scan(template)? {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(path) => match self.lookup(path) {
                    Some(Value::String(text)) => out.push_str(text),
                    Some(value) => out.push_str(&value.to_string()),
                    None => {}
                },
            }
        }
        Ok(out)
    }

    /// Resolve strings anywhere inside a JSON value
    ///
    /// A string that is exactly one placeholder keeps the referenced
    /// value's JSON type instead of being stringified.
    pub fn resolve_value(&mut self, value: &Value) -> Result<Value, TemplateError> {
        match value {
            Value::String(template) => {
                if let Some(path) = sole_placeholder(template)? {
                    return Ok(self
                        .lookup(path)
                        .cloned()
                        .unwrap_or_else(|| Value::String(String::new())));
                }
                self.resolve_str(template).map(Value::String)
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.resolve_value(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(map) => {
                let mut resolved = Map::with_capacity(map.len());
                for (key, item) in map {
                    resolved.insert(key.clone(), self.resolve_value(item)?);
                }
                Ok(Value::Object(resolved))
            }
            other => Ok(other.clone()),
        }
    }

    /// Resolve the templated fields of a node's config
    ///
    /// Non-templated fields are copied unchanged.
    pub fn resolve_config(&mut self, node: &Node) -> Result<Map<String, Value>, TemplateError> {
        let mut config = node.config.clone();
        for field in node.node_type.templated_fields() {
            if let Some(value) = node.config.get(*field) {
                let resolved = self.resolve_value(value)?;
                config.insert(field.to_string(), resolved);
            }
        }
        Ok(config)
    }

    fn lookup(&mut self, placeholder: &str) -> Option<&'c Value> {
        let ctx: &'c RunContext = self.ctx;
        let node_input = self.node_input;
        let mut segments = placeholder.split('.');
        let found = segments
            .next()
            .and_then(|root| match root {
                NODE_INPUT_ROOT => node_input,
                name => ctx.root(name),
            })
            .and_then(|root| path::select_segments(root, segments));

        if found.is_none() {
            let warning = format!("placeholder '{{{{{}}}}}' did not resolve; substituted empty string", placeholder);
            tracing::warn!("⚠️ {}", warning);
            self.warnings.push(warning);
        }
        found
    }
}

/// If the whole string is a single placeholder, return its path
fn sole_placeholder(template: &str) -> Result<Option<&str>, TemplateError> {
    if !has_placeholders(template) {
        return Ok(None);
    }
    let segments = scan(template)?;
    match segments.as_slice() {
        [Segment::Placeholder(path)] => Ok(Some(path)),
        _ => Ok(None),
    }
}

/// Split a template into literal and placeholder segments, checking syntax
fn scan(template: &str) -> Result<Vec<Segment<'_>>, TemplateError> {
    let mut segments = Vec::new();
    let mut rest = template;
    let mut offset = 0;

    while let Some(start) = rest.find(OPEN) {
        if start > 0 {
            segments.push(Segment::Literal(&rest[..start]));
        }

        let body_start = start + OPEN.len();
        let end = rest[body_start..]
            .find(CLOSE)
            .map(|end| body_start + end)
            .ok_or(TemplateError::Unclosed(offset + start))?;

        let body = &rest[body_start..end];
        if let Some(nested) = body.find(OPEN) {
            return Err(TemplateError::Nested(offset + body_start + nested));
        }

        let path = body.trim();
        if path.is_empty() {
            return Err(TemplateError::Empty(offset + start));
        }
        if !is_valid_path(path) {
            return Err(TemplateError::InvalidPath(path.to_string()));
        }
        segments.push(Segment::Placeholder(path));

        let consumed = end + CLOSE.len();
        offset += consumed;
        rest = &rest[consumed..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

fn is_valid_path(path: &str) -> bool {
    let mut segments = path.split('.');
    let root_ok = match segments.next() {
        Some(NODE_INPUT_ROOT) => true,
        Some(root) => is_valid_segment(root),
        None => false,
    };
    root_ok && segments.all(is_valid_segment)
}

fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
