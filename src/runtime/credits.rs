/// Credit accounting
///
/// Fixed cost per node type, summed over nodes that actually ran. Pure: the
/// caller checks balances before a run and deducts afterwards.

use crate::runtime::events::{ExecutionLogEntry, NodeStatus};
use crate::workflow::types::{Node, NodeType};

/// Cost of executing one node of the given type
pub fn cost_of(node_type: NodeType) -> u64 {
    match node_type {
        NodeType::Input | NodeType::Output => 0,
        NodeType::Logic | NodeType::Api | NodeType::Webhook | NodeType::Integration => 1,
        NodeType::Ai => 10,
    }
}

/// Total cost of a run's log
///
/// Only `success` and `failed` entries count; skipped nodes never ran.
pub fn cost<'a>(entries: impl IntoIterator<Item = &'a ExecutionLogEntry>) -> u64 {
    entries
        .into_iter()
        .filter(|entry| matches!(entry.status, NodeStatus::Success | NodeStatus::Failed))
        .map(|entry| cost_of(entry.node_type))
        .sum()
}

/// Upper bound for a run, assuming every node executes
pub fn estimate<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> u64 {
    nodes.into_iter().map(|node| cost_of(node.node_type)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::events::SkipReason;
    use serde_json::json;

    fn entry(node_type: NodeType, status: NodeStatus) -> ExecutionLogEntry {
        let node = Node::new("n", node_type, json!({}));
        let mut entry = ExecutionLogEntry::pending(&node);
        entry.status = status;
        entry
    }

    #[test]
    fn test_cost_table() {
        assert_eq!(cost_of(NodeType::Input), 0);
        assert_eq!(cost_of(NodeType::Output), 0);
        assert_eq!(cost_of(NodeType::Logic), 1);
        assert_eq!(cost_of(NodeType::Api), 1);
        assert_eq!(cost_of(NodeType::Webhook), 1);
        assert_eq!(cost_of(NodeType::Integration), 1);
        assert_eq!(cost_of(NodeType::Ai), 10);
    }

    #[test]
    fn test_skipped_and_pending_nodes_are_free() {
        let mut skipped = entry(NodeType::Ai, NodeStatus::Skipped);
        skipped.skip_reason = Some(SkipReason::UpstreamFailed);

        let entries = vec![
            entry(NodeType::Input, NodeStatus::Success),
            entry(NodeType::Api, NodeStatus::Failed),
            entry(NodeType::Ai, NodeStatus::Success),
            skipped,
            entry(NodeType::Logic, NodeStatus::Pending),
        ];
        assert_eq!(cost(&entries), 11);
    }

    #[test]
    fn test_adding_a_paid_node_increases_cost() {
        let mut entries = vec![entry(NodeType::Logic, NodeStatus::Success)];
        let before = cost(&entries);
        entries.push(entry(NodeType::Webhook, NodeStatus::Success));
        assert!(cost(&entries) > before);
    }

    #[test]
    fn test_estimate_counts_every_node() {
        let nodes = vec![
            Node::new("a", NodeType::Input, json!({})),
            Node::new("b", NodeType::Ai, json!({})),
            Node::new("c", NodeType::Output, json!({})),
        ];
        assert_eq!(estimate(&nodes), 10);
    }
}
