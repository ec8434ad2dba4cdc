//! Common test nodes and setup

#![allow(dead_code)]

use async_trait::async_trait;
use flowgraph_core::state::value_to_text;
use flowgraph_core::{
    FlowCompiler, FlowNode, FlowSettings, FlowState, NodeContext, NodeError, NodeRegistry, StateUpdate,
};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;

/// Outputs the run input unchanged
pub struct Echo;

#[async_trait]
impl FlowNode for Echo {
    async fn invoke(&self, _ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::output(state.current_input.clone()))
    }
}

/// Appends its `suffix` config to the last output (or the input)
pub struct Append;

#[async_trait]
impl FlowNode for Append {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        let base = match &state.last_output {
            Value::Null => state.current_input.clone(),
            other => value_to_text(other),
        };
        let suffix = ctx
            .config_value("suffix")
            .map(value_to_text)
            .unwrap_or_else(|| ctx.node_id().to_string());
        Ok(StateUpdate::output(format!("{}{}", base, suffix)))
    }
}

pub struct Failing;

#[async_trait]
impl FlowNode for Failing {
    async fn invoke(&self, ctx: &NodeContext, _state: &FlowState) -> Result<StateUpdate, NodeError> {
        Err(format!("{} exploded", ctx.node_id()).into())
    }
}

/// Emits one token per word of the input
pub struct Tokens;

#[async_trait]
impl FlowNode for Tokens {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        for word in state.current_input.split_whitespace() {
            ctx.emit_token(word).await;
        }
        Ok(StateUpdate::output(state.current_input.clone()))
    }
}

/// What a [`Mark`] node saw when it ran: (node id, marks already present)
pub type Observations = Arc<Mutex<Vec<(String, Vec<String>)>>>;

/// Adds its id to the `marks` variable and records the marks it saw
pub struct Mark {
    observations: Observations,
}

#[async_trait]
impl FlowNode for Mark {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        let mut marks: Vec<String> = state
            .get_variable("marks")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        self.observations
            .lock()
            .push((ctx.node_id().to_string(), marks.clone()));

        // give sibling branches a chance to interleave
        tokio::task::yield_now().await;

        marks.push(ctx.node_id().to_string());
        Ok(StateUpdate::output(ctx.node_id().to_string()).with_variable("marks", json!(marks)))
    }
}

/// Outputs the ids of every node whose output it can see, sorted
pub struct Gather;

#[async_trait]
impl FlowNode for Gather {
    async fn invoke(&self, _ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        let mut seen: Vec<String> = state.node_outputs.keys().cloned().collect();
        seen.sort();
        Ok(StateUpdate::output(json!(seen)))
    }
}

/// Sleeps long enough to be cancelled
pub struct Slow;

#[async_trait]
impl FlowNode for Slow {
    async fn invoke(&self, _ctx: &NodeContext, _state: &FlowState) -> Result<StateUpdate, NodeError> {
        tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
        Ok(StateUpdate::empty())
    }
}

pub fn registry_with(observations: Observations) -> NodeRegistry {
    NodeRegistry::new()
        .with("Echo", || Echo)
        .with("Append", || Append)
        .with("Failing", || Failing)
        .with("Tokens", || Tokens)
        .with("Slow", || Slow)
        .with("Gather", || Gather)
        .with("Mark", move || Mark {
            observations: observations.clone(),
        })
}

pub fn registry() -> NodeRegistry {
    registry_with(Observations::default())
}

pub fn compiler() -> FlowCompiler {
    FlowCompiler::new(Arc::new(registry()))
}

pub fn compiler_with(settings: FlowSettings) -> FlowCompiler {
    compiler().with_settings(settings)
}
