//! Node runtime contract and registry
//!
//! Node bodies are external collaborators. The core only knows them through
//! [`FlowNode`]; the [`NodeRegistry`] maps a definition's `type` string to a
//! [`NodeFactory`] that creates a fresh runtime unit per compile.
//!
//! # Implementing a Node
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowgraph_core::{FlowNode, FlowState, NodeContext, NodeError, NodeRegistry, StateUpdate};
//!
//! #[derive(Default)]
//! struct Shout;
//!
//! #[async_trait]
//! impl FlowNode for Shout {
//!     async fn invoke(&self, _ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
//!         Ok(StateUpdate::output(state.current_input.to_uppercase()))
//!     }
//! }
//!
//! let registry = NodeRegistry::new().with("Shout", || Shout);
//! assert!(registry.contains("Shout"));
//! ```

use crate::compiled::FlowEvent;
use crate::connection::{DEFAULT_SOURCE_HANDLE, DEFAULT_TARGET_HANDLE};
use crate::definition::NodeDefinition;
use crate::error::NodeError;
use crate::instance::{InputSource, NodeInstance, OutputTarget};
use crate::state::{FlowState, StateUpdate};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A node's run-time behaviour
#[async_trait]
pub trait FlowNode: Send + Sync {
    /// Transform the current state into a partial update
    async fn invoke(&self, ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError>;
}

/// Everything a node invocation may read besides the state
#[derive(Clone)]
pub struct NodeContext {
    instance: Arc<NodeInstance>,
    events: Option<mpsc::Sender<FlowEvent>>,
}

impl NodeContext {
    pub(crate) fn new(instance: Arc<NodeInstance>, events: Option<mpsc::Sender<FlowEvent>>) -> Self {
        Self { instance, events }
    }

    pub fn node_id(&self) -> &str {
        &self.instance.id
    }

    pub fn node_type(&self) -> &str {
        &self.instance.node_type
    }

    /// Credential context the node was compiled under
    pub fn context_id(&self) -> &str {
        &self.instance.context_id
    }

    /// Static user configuration from the definition
    pub fn config(&self) -> &Map<String, Value> {
        &self.instance.user_data
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.instance.user_data.get(key)
    }

    pub fn input_connections(&self) -> &HashMap<String, InputSource> {
        &self.instance.input_connections
    }

    pub fn output_connections(&self) -> &HashMap<String, Vec<OutputTarget>> {
        &self.instance.output_connections
    }

    /// Output of the node wired to `handle`, read from `state`
    pub fn connected_input<'s>(&self, handle: &str, state: &'s FlowState) -> Option<&'s Value> {
        self.instance
            .input_connections
            .get(handle)
            .and_then(|source| state.node_output(&source.source_node_id))
    }

    /// Output wired to the default `input` handle
    pub fn default_input<'s>(&self, state: &'s FlowState) -> Option<&'s Value> {
        self.connected_input(DEFAULT_TARGET_HANDLE, state)
    }

    /// Whether anything consumes the default `output` handle
    pub fn has_default_output(&self) -> bool {
        self.instance
            .output_connections
            .contains_key(DEFAULT_SOURCE_HANDLE)
    }

    /// Whether the run is streaming events
    pub fn is_streaming(&self) -> bool {
        self.events.is_some()
    }

    /// Emit an incremental output fragment; a no-op outside streaming runs
    pub async fn emit_token(&self, content: impl Into<String>) {
        if let Some(events) = &self.events {
            let event = FlowEvent::Token {
                node_id: self.instance.id.clone(),
                content: content.into(),
            };
            // a closed channel means the consumer went away
            let _ = events.send(event).await;
        }
    }
}

/// Creates a node's runtime unit during compilation
pub trait NodeFactory: Send + Sync {
    fn create(&self, definition: &NodeDefinition) -> Result<Arc<dyn FlowNode>, NodeError>;
}

impl<F, N> NodeFactory for F
where
    F: Fn() -> N + Send + Sync,
    N: FlowNode + 'static,
{
    fn create(&self, _definition: &NodeDefinition) -> Result<Arc<dyn FlowNode>, NodeError> {
        Ok(Arc::new(self()))
    }
}

/// Read-only mapping from node type to factory
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: HashMap<String, Arc<dyn NodeFactory>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, node_type: impl Into<String>, factory: impl NodeFactory + 'static) -> &mut Self {
        self.factories.insert(node_type.into(), Arc::new(factory));
        self
    }

    pub fn with(mut self, node_type: impl Into<String>, factory: impl NodeFactory + 'static) -> Self {
        self.register(node_type, factory);
        self
    }

    pub fn get(&self, node_type: &str) -> Option<&Arc<dyn NodeFactory>> {
        self.factories.get(node_type)
    }

    pub fn contains(&self, node_type: &str) -> bool {
        self.factories.contains_key(node_type)
    }

    /// Registered type names, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeRegistry")
            .field("node_types", &self.node_types())
            .finish()
    }
}
