//! Demo node types available to flows run from the command line
//!
//! | type | output |
//! |------|--------|
//! | `Echo` | the connected input, else the last output, else the run input |
//! | `Uppercase` | the same text, upper-cased |
//! | `Template` | `template` config with `{input}`, `{last_output}` and `{var.NAME}` filled in |
//! | `SetVariable` | stores `value` (or the last output) under the `name` variable |
//! | `Typewriter` | the run input, streamed one word at a time |

use async_trait::async_trait;
use flowgraph_core::state::value_to_text;
use flowgraph_core::{FlowNode, FlowState, NodeContext, NodeError, NodeRegistry, StateUpdate};
use serde_json::Value;

/// Text the node works on: connected input, last output, run input
fn current_text(ctx: &NodeContext, state: &FlowState) -> String {
    if let Some(value) = ctx.default_input(state) {
        return value_to_text(value);
    }
    match &state.last_output {
        Value::Null => state.current_input.clone(),
        other => value_to_text(other),
    }
}

pub struct Echo;

#[async_trait]
impl FlowNode for Echo {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::output(current_text(ctx, state)))
    }
}

pub struct Uppercase;

#[async_trait]
impl FlowNode for Uppercase {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        Ok(StateUpdate::output(current_text(ctx, state).to_uppercase()))
    }
}

pub struct Template;

#[async_trait]
impl FlowNode for Template {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        let template = ctx
            .config_value("template")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("node '{}' needs a string 'template'", ctx.node_id()))?;

        let mut rendered = template
            .replace("{input}", &state.current_input)
            .replace("{last_output}", &value_to_text(&state.last_output));
        for (name, value) in &state.variables {
            rendered = rendered.replace(&format!("{{var.{}}}", name), &value_to_text(value));
        }
        Ok(StateUpdate::output(rendered))
    }
}

pub struct SetVariable;

#[async_trait]
impl FlowNode for SetVariable {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        let name = ctx
            .config_value("name")
            .and_then(Value::as_str)
            .ok_or_else(|| format!("node '{}' needs a string 'name'", ctx.node_id()))?;
        let value = ctx
            .config_value("value")
            .cloned()
            .unwrap_or_else(|| state.last_output.clone());

        tracing::debug!(node = %ctx.node_id(), variable = %name, "variable set");
        Ok(StateUpdate::output(value.clone()).with_variable(name, value))
    }
}

pub struct Typewriter;

#[async_trait]
impl FlowNode for Typewriter {
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
        let text = current_text(ctx, state);
        for (i, word) in text.split_whitespace().enumerate() {
            let token = if i == 0 { word.to_string() } else { format!(" {}", word) };
            ctx.emit_token(token).await;
        }
        Ok(StateUpdate::output(text))
    }
}

pub fn demo_registry() -> NodeRegistry {
    NodeRegistry::new()
        .with("Echo", || Echo)
        .with("Uppercase", || Uppercase)
        .with("Template", || Template)
        .with("SetVariable", || SetVariable)
        .with("Typewriter", || Typewriter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::{FlowCompiler, FlowDefinition, NodeDefinition, RunInput};
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_demo_nodes_compose() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("name", "SetVariable").with_data("name", json!("who")).with_data("value", json!("world")))
            .with_node(NodeDefinition::new("greet", "Template").with_data("template", json!("{input}, {var.who}")))
            .with_node(NodeDefinition::new("shout", "Uppercase"))
            .with_edge("name", "greet")
            .with_edge("greet", "shout");
        let flow = FlowCompiler::new(Arc::new(demo_registry())).compile(&def, None).unwrap();

        let result = flow.invoke(RunInput::new("hello")).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output, json!("HELLO, WORLD"));
    }

    #[tokio::test]
    async fn test_template_requires_config() {
        let def = FlowDefinition::new().with_node(NodeDefinition::new("t", "Template"));
        let flow = FlowCompiler::new(Arc::new(demo_registry())).compile(&def, None).unwrap();

        let result = flow.invoke(RunInput::new("x")).await;
        assert!(!result.success);
        assert!(result.error.unwrap().message.contains("needs a string 'template'"));
    }
}
