//! Parallel fan-out
//!
//! Every outgoing connection becomes a branch. The node itself is a
//! pass-through with one direct edge per branch. It is the only node the
//! driver forks at, giving each branch its own deep copy of the state. No
//! join is synthesized: a node reached by several branches runs once per
//! arriving branch.

use super::{ControlFlowEntry, SynthesisContext};
use crate::graph::FlowGraph;

pub(crate) fn synthesize(graph: &mut FlowGraph, entry: &ControlFlowEntry, ctx: &SynthesisContext<'_>) {
    for conn in ctx.outgoing(&entry.node_id) {
        graph.add_edge(entry.node_id.clone(), ctx.resolve(&conn.target_node_id));
    }
}
