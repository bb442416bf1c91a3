/// Validated execution graph
///
/// Converts a node/edge list into a petgraph DAG, rejecting dangling edge
/// references and cycles before anything runs. Built once per run and
/// read-only afterwards.

use crate::runtime::error::EngineError;
use crate::workflow::types::{Edge, Node, NodeType};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Bfs, EdgeRef};
use petgraph::Direction;
use std::collections::{HashMap, VecDeque};

/// Edge weight: the original edge plus its declaration position
#[derive(Debug, Clone)]
struct EdgeSlot {
    position: usize,
    edge: Edge,
}

/// Validated (nodes, edges) pair with derived adjacency
#[derive(Debug)]
pub struct ExecutionGraph {
    /// The petgraph DiGraph structure
    graph: DiGraph<Node, EdgeSlot>,
    /// Mapping from node ID to graph node index
    node_id_to_index: HashMap<String, NodeIndex>,
    /// Dependency order computed during validation
    order: Vec<NodeIndex>,
}

impl ExecutionGraph {
    /// Build and validate a graph
    ///
    /// Fails fast on empty graphs, duplicate ids, edges to unknown nodes,
    /// cycles, and graphs without any output node.
    pub fn build(nodes: Vec<Node>, edges: Vec<Edge>) -> Result<Self, EngineError> {
        tracing::debug!("🏗️ Building execution graph with {} nodes and {} edges", nodes.len(), edges.len());

        if nodes.is_empty() {
            return Err(EngineError::EmptyGraph);
        }

        let mut graph = DiGraph::with_capacity(nodes.len(), edges.len());
        let mut node_id_to_index = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if node_id_to_index.contains_key(&node.id) {
                return Err(EngineError::DuplicateNode(node.id));
            }
            let id = node.id.clone();
            let index = graph.add_node(node);
            node_id_to_index.insert(id, index);
        }

        for (position, edge) in edges.into_iter().enumerate() {
            let from = *node_id_to_index.get(&edge.source).ok_or_else(|| {
                EngineError::UnknownEdgeEndpoint {
                    edge_id: edge.id.clone(),
                    node_id: edge.source.clone(),
                }
            })?;
            let to = *node_id_to_index.get(&edge.target).ok_or_else(|| {
                EngineError::UnknownEdgeEndpoint {
                    edge_id: edge.id.clone(),
                    node_id: edge.target.clone(),
                }
            })?;

            graph.add_edge(from, to, EdgeSlot { position, edge });
        }

        let order = kahn_order(&graph)?;

        if !graph.node_weights().any(|node| node.node_type == NodeType::Output) {
            return Err(EngineError::MissingOutputNode);
        }

        tracing::debug!("✅ Graph validation successful - {} nodes ordered", order.len());

        Ok(Self {
            graph,
            node_id_to_index,
            order,
        })
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.graph[index]
    }

    pub fn index_of(&self, node_id: &str) -> Option<NodeIndex> {
        self.node_id_to_index.get(node_id).copied()
    }

    /// All node indices in insertion order
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> + '_ {
        self.graph.node_weights().map(|node| node.id.as_str())
    }

    /// A valid dependency order (Kahn reduction order)
    pub fn topological_order(&self) -> &[NodeIndex] {
        &self.order
    }

    /// Nodes with no incoming edges
    pub fn roots(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&index| {
                self.graph
                    .neighbors_directed(index, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Incoming edges with their source index, in declaration order
    pub fn incoming(&self, index: NodeIndex) -> Vec<(NodeIndex, &Edge)> {
        let mut slots: Vec<(NodeIndex, &EdgeSlot)> = self
            .graph
            .edges_directed(index, Direction::Incoming)
            .map(|edge| (edge.source(), edge.weight()))
            .collect();
        slots.sort_by_key(|(_, slot)| slot.position);
        slots.into_iter().map(|(source, slot)| (source, &slot.edge)).collect()
    }

    /// Number of incoming edges (multi-edges counted individually)
    pub fn in_degree(&self, index: NodeIndex) -> usize {
        self.graph.edges_directed(index, Direction::Incoming).count()
    }

    /// Targets of outgoing edges, one entry per edge
    pub fn outgoing_targets(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.graph
            .edges_directed(index, Direction::Outgoing)
            .map(|edge| edge.target())
            .collect()
    }

    /// Ordered, de-duplicated dependency node ids of a node
    pub fn dependencies(&self, index: NodeIndex) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for (source, _) in self.incoming(index) {
            let id = self.graph[source].id.as_str();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Direct dependents of a node
    pub fn dependents(&self, index: NodeIndex) -> Vec<&str> {
        let mut ids: Vec<&str> = Vec::new();
        for target in self.outgoing_targets(index) {
            let id = self.graph[target].id.as_str();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Every node reachable from `index`, excluding `index` itself
    pub fn transitive_dependents(&self, index: NodeIndex) -> Vec<NodeIndex> {
        let mut bfs = Bfs::new(&self.graph, index);
        let mut reachable = Vec::new();

        while let Some(next) = bfs.next(&self.graph) {
            if next != index {
                reachable.push(next);
            }
        }

        reachable
    }

    /// Indices of all output-type nodes
    pub fn output_nodes(&self) -> Vec<NodeIndex> {
        self.graph
            .node_indices()
            .filter(|&index| self.graph[index].node_type == NodeType::Output)
            .collect()
    }
}

/// Kahn's algorithm: repeatedly remove zero in-degree nodes
///
/// Anything left once no more nodes can be removed sits on a cycle.
fn kahn_order(graph: &DiGraph<Node, EdgeSlot>) -> Result<Vec<NodeIndex>, EngineError> {
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|index| graph.edges_directed(index, Direction::Incoming).count())
        .collect();

    let mut queue: VecDeque<NodeIndex> = graph
        .node_indices()
        .filter(|index| in_degree[index.index()] == 0)
        .collect();

    let mut order = Vec::with_capacity(graph.node_count());
    while let Some(current) = queue.pop_front() {
        order.push(current);
        for edge in graph.edges_directed(current, Direction::Outgoing) {
            let degree = &mut in_degree[edge.target().index()];
            *degree -= 1;
            if *degree == 0 {
                queue.push_back(edge.target());
            }
        }
    }

    if order.len() != graph.node_count() {
        let remaining = graph.node_count() - order.len();
        tracing::error!("❌ Workflow contains a cycle - {} nodes unreachable by reduction", remaining);
        return Err(EngineError::CycleDetected { remaining });
    }

    Ok(order)
}
