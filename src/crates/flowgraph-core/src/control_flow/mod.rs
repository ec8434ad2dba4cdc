//! Control-flow nodes: classification and edge synthesis
//!
//! Conditional, loop and parallel nodes have no runtime body. Each one becomes
//! a pass-through router in the graph and owns every edge leaving it:
//!
//! - [`conditional`] routes to the first branch whose rule matches
//! - [`loops`] re-enters its body until an iteration bound is reached
//! - [`parallel`] forks the run into one branch per outgoing edge
//!
//! A control-flow node without enough outgoing connections contributes no
//! edges and is dropped from the graph.

pub mod classify;
pub mod conditional;
pub mod loops;
pub mod parallel;

pub use classify::{classify, classify_type, ControlFlowKind, ControlFlowTag, REGULAR_NODE_TYPES};
pub use conditional::{BranchRule, ConditionType, ConditionalRouter};
pub use loops::LoopRouter;

use crate::connection::{outgoing, Connection};
use crate::error::Result;
use crate::graph::{FlowGraph, GraphNode, NodeId, END};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One classified control-flow node, rebuilt on each compile
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFlowEntry {
    pub node_id: String,
    pub kind: ControlFlowKind,
    pub config: Map<String, Value>,
}

impl ControlFlowEntry {
    pub fn new(node_id: impl Into<String>, kind: ControlFlowKind, config: Map<String, Value>) -> Self {
        Self {
            node_id: node_id.into(),
            kind,
            config,
        }
    }

    /// Outgoing connections needed for the node to take part in the graph
    pub fn required_outgoing(&self) -> usize {
        match self.kind {
            ControlFlowKind::Conditional => 2,
            ControlFlowKind::Loop | ControlFlowKind::Parallel => 1,
        }
    }

    pub fn is_wired(&self, connections: &[Connection]) -> bool {
        outgoing(connections, &self.node_id).len() >= self.required_outgoing()
    }

    /// Check the configuration without touching a graph
    pub fn validate_config(&self) -> Result<()> {
        match self.kind {
            ControlFlowKind::Conditional => conditional::ConditionalConfig::parse(&self.node_id, &self.config).map(|_| ()),
            ControlFlowKind::Loop => loops::parse_max_iterations(&self.node_id, &self.config).map(|_| ()),
            ControlFlowKind::Parallel => Ok(()),
        }
    }
}

/// What synthesizers can see of the flow being compiled
pub struct SynthesisContext<'a> {
    pub connections: &'a [Connection],
    /// Control-flow nodes left out of the graph
    pub dropped: &'a HashSet<String>,
}

impl<'a> SynthesisContext<'a> {
    pub fn outgoing(&self, node_id: &str) -> Vec<&'a Connection> {
        outgoing(self.connections, node_id)
    }

    /// Routing to a dropped node ends the branch instead
    pub fn resolve(&self, target: &str) -> NodeId {
        if self.dropped.contains(target) {
            END.to_string()
        } else {
            target.to_string()
        }
    }
}

/// Add the node and its outgoing edges; `Ok(false)` when it was skipped
pub fn synthesize(graph: &mut FlowGraph, entry: &ControlFlowEntry, ctx: &SynthesisContext<'_>) -> Result<bool> {
    if !entry.is_wired(ctx.connections) {
        tracing::warn!(
            node = %entry.node_id,
            kind = %entry.kind,
            required = entry.required_outgoing(),
            "control-flow node has too few outgoing connections, dropping it"
        );
        return Ok(false);
    }

    graph.add_node(entry.node_id.clone(), GraphNode::Router { kind: entry.kind });
    match entry.kind {
        ControlFlowKind::Conditional => conditional::synthesize(graph, entry, ctx)?,
        ControlFlowKind::Loop => loops::synthesize(graph, entry, ctx)?,
        ControlFlowKind::Parallel => parallel::synthesize(graph, entry, ctx),
    }
    Ok(true)
}
