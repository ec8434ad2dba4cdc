//! Executable graph topology
//!
//! The compiler writes a [`FlowGraph`]: ordinary nodes become
//! [`GraphNode::Task`]s, surviving control-flow nodes become pass-through
//! [`GraphNode::Router`]s whose routing lives on their outgoing edges.
//!
//! ```text
//! __start__ ──▶ fetch ──▶ check ─┬─(router)─▶ summarize ──▶ __end__
//!                                └─(router)─▶ reject ─────▶ __end__
//! ```

use crate::control_flow::ControlFlowKind;
use crate::instance::NodeInstance;
use crate::state::FlowState;
use std::collections::HashMap;
use std::sync::Arc;

pub type NodeId = String;

/// Synthetic entry of every graph
pub const START: &str = "__start__";

/// Synthetic terminal sink of every graph
pub const END: &str = "__end__";

/// Run-time routing decision attached to a conditional edge
pub trait Router: Send + Sync {
    /// Pick the next node; may record bookkeeping (loop counters) in `state`
    fn route(&self, state: &mut FlowState) -> NodeId;

    /// Closed set of destinations `route` can return
    fn destinations(&self) -> Vec<NodeId>;
}

#[derive(Clone)]
pub enum Edge {
    Direct(NodeId),
    Conditional {
        router: Arc<dyn Router>,
        branches: Vec<NodeId>,
    },
}

impl std::fmt::Debug for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Edge::Direct(node_id) => f.debug_tuple("Direct").field(node_id).finish(),
            Edge::Conditional { branches, .. } => f
                .debug_struct("Conditional")
                .field("router", &"<router>")
                .field("branches", branches)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum GraphNode {
    Task(Arc<NodeInstance>),
    Router { kind: ControlFlowKind },
}

impl GraphNode {
    pub fn is_task(&self) -> bool {
        matches!(self, GraphNode::Task(_))
    }
}

#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    pub(crate) nodes: HashMap<NodeId, GraphNode>,
    /// Insertion order of `nodes`
    pub(crate) order: Vec<NodeId>,
    pub(crate) edges: HashMap<NodeId, Vec<Edge>>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, id: impl Into<NodeId>, node: GraphNode) {
        let id = id.into();
        if self.nodes.insert(id.clone(), node).is_none() {
            self.order.push(id);
        }
    }

    /// Add a direct edge; adding the same edge twice is a no-op
    pub fn add_edge(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        let to = to.into();
        let edges = self.edges.entry(from.into()).or_default();
        let exists = edges
            .iter()
            .any(|edge| matches!(edge, Edge::Direct(target) if *target == to));
        if !exists {
            edges.push(Edge::Direct(to));
        }
    }

    pub fn add_conditional_edge(&mut self, from: impl Into<NodeId>, router: Arc<dyn Router>) {
        let branches = router.destinations();
        self.edges
            .entry(from.into())
            .or_default()
            .push(Edge::Conditional { router, branches });
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> &[NodeId] {
        &self.order
    }

    pub fn edges_from(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every (source, target) pair, conditional branches included, sorted
    pub fn edge_pairs(&self) -> Vec<(NodeId, NodeId)> {
        let mut pairs: Vec<(NodeId, NodeId)> = self
            .edges
            .iter()
            .flat_map(|(from, edges)| {
                edges.iter().flat_map(move |edge| {
                    let targets = match edge {
                        Edge::Direct(to) => vec![to.clone()],
                        Edge::Conditional { branches, .. } => branches.clone(),
                    };
                    targets.into_iter().map(move |to| (from.clone(), to))
                })
            })
            .collect();
        pairs.sort();
        pairs.dedup();
        pairs
    }

    /// Nodes wired from [`START`], sorted
    pub fn entry_nodes(&self) -> Vec<NodeId> {
        let mut entries: Vec<NodeId> = self
            .edges_from(START)
            .iter()
            .filter_map(|edge| match edge {
                Edge::Direct(to) => Some(to.clone()),
                Edge::Conditional { .. } => None,
            })
            .collect();
        entries.sort();
        entries
    }

    /// Nodes with a direct edge to [`END`], sorted
    pub fn exit_nodes(&self) -> Vec<NodeId> {
        let mut exits: Vec<NodeId> = self
            .edges
            .iter()
            .filter(|(from, edges)| {
                from.as_str() != START
                    && edges
                        .iter()
                        .any(|edge| matches!(edge, Edge::Direct(to) if to == END))
            })
            .map(|(from, _)| from.clone())
            .collect();
        exits.sort();
        exits
    }
}
