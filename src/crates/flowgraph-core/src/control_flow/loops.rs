//! Counter-bounded loops
//!
//! ```text
//! ┌──────────▶ loop ──(counter < max)──▶ body ──▶ … ──┐
//! │              └──(counter >= max)──▶ __end__       │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! The first outgoing connection is the body. The counter is the state
//! variable `<loop_id>_counter`, so several loops in one run never share a
//! counter. `max_iterations` defaults to 3.

use super::{ControlFlowEntry, SynthesisContext};
use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, NodeId, Router, END};
use crate::state::FlowState;
use serde_json::{Map, Value};
use std::sync::Arc;

pub const DEFAULT_MAX_ITERATIONS: u64 = 3;

pub fn counter_key(loop_id: &str) -> String {
    format!("{}_counter", loop_id)
}

pub(crate) fn parse_max_iterations(node_id: &str, config: &Map<String, Value>) -> Result<u64> {
    match config.get("max_iterations") {
        None | Some(Value::Null) => Ok(DEFAULT_MAX_ITERATIONS),
        Some(Value::Number(n)) => n.as_u64().ok_or_else(|| {
            FlowError::invalid_control_flow(
                node_id,
                format!("max_iterations must be a non-negative integer, got {}", n),
            )
        }),
        Some(Value::String(s)) => s.trim().parse::<u64>().map_err(|_| {
            FlowError::invalid_control_flow(
                node_id,
                format!("max_iterations must be a non-negative integer, got '{}'", s),
            )
        }),
        Some(other) => Err(FlowError::invalid_control_flow(
            node_id,
            format!("max_iterations must be a non-negative integer, got {}", other),
        )),
    }
}

pub struct LoopRouter {
    node_id: String,
    body: NodeId,
    max_iterations: u64,
    counter_key: String,
}

impl LoopRouter {
    pub fn new(node_id: impl Into<String>, body: impl Into<NodeId>, max_iterations: u64) -> Self {
        let node_id = node_id.into();
        Self {
            counter_key: counter_key(&node_id),
            node_id,
            body: body.into(),
            max_iterations,
        }
    }

    pub fn max_iterations(&self) -> u64 {
        self.max_iterations
    }
}

impl Router for LoopRouter {
    fn route(&self, state: &mut FlowState) -> NodeId {
        let counter = state
            .get_variable(&self.counter_key)
            .and_then(Value::as_u64)
            .unwrap_or(0);

        if counter >= self.max_iterations {
            tracing::debug!(node = %self.node_id, iterations = counter, "loop finished");
            return END.to_string();
        }

        state.set_variable(self.counter_key.clone(), Value::from(counter + 1));
        tracing::debug!(node = %self.node_id, iteration = counter + 1, body = %self.body, "loop iteration");
        self.body.clone()
    }

    fn destinations(&self) -> Vec<NodeId> {
        vec![self.body.clone(), END.to_string()]
    }
}

pub(crate) fn synthesize(graph: &mut FlowGraph, entry: &ControlFlowEntry, ctx: &SynthesisContext<'_>) -> Result<()> {
    let max_iterations = parse_max_iterations(&entry.node_id, &entry.config)?;
    let outgoing = ctx.outgoing(&entry.node_id);
    let Some(first) = outgoing.first() else {
        return Ok(());
    };

    let router = LoopRouter::new(entry.node_id.clone(), ctx.resolve(&first.target_node_id), max_iterations);
    graph.add_conditional_edge(entry.node_id.clone(), Arc::new(router));
    Ok(())
}
