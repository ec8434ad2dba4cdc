//! Graph node instances
//!
//! A [`NodeInstance`] pairs a runtime unit with everything it was compiled
//! with. Instances are built once through [`NodeInstanceBuilder`] and never
//! change afterwards; they are derived on every compile and never persisted.

use crate::connection::Connection;
use crate::node::FlowNode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Where a node's input handle is fed from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSource {
    pub source_node_id: String,
    pub source_handle: String,
}

/// One consumer of a node's output handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub target_node_id: String,
    pub target_handle: String,
}

pub struct NodeInstance {
    pub id: String,
    pub node_type: String,
    pub context_id: String,
    pub runtime: Arc<dyn FlowNode>,
    /// target handle → source; the last connection into a handle wins
    pub input_connections: HashMap<String, InputSource>,
    /// source handle → targets, in connection order
    pub output_connections: HashMap<String, Vec<OutputTarget>>,
    pub user_data: Map<String, Value>,
}

impl NodeInstance {
    pub fn builder(
        id: impl Into<String>,
        node_type: impl Into<String>,
        runtime: Arc<dyn FlowNode>,
    ) -> NodeInstanceBuilder {
        NodeInstanceBuilder {
            id: id.into(),
            node_type: node_type.into(),
            runtime,
            context_id: String::new(),
            user_data: Map::new(),
            input_connections: HashMap::new(),
            output_connections: HashMap::new(),
        }
    }
}

impl std::fmt::Debug for NodeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeInstance")
            .field("id", &self.id)
            .field("node_type", &self.node_type)
            .field("context_id", &self.context_id)
            .field("input_connections", &self.input_connections)
            .field("output_connections", &self.output_connections)
            .field("user_data", &self.user_data)
            .finish_non_exhaustive()
    }
}

pub struct NodeInstanceBuilder {
    id: String,
    node_type: String,
    runtime: Arc<dyn FlowNode>,
    context_id: String,
    user_data: Map<String, Value>,
    input_connections: HashMap<String, InputSource>,
    output_connections: HashMap<String, Vec<OutputTarget>>,
}

impl NodeInstanceBuilder {
    pub fn context_id(mut self, context_id: impl Into<String>) -> Self {
        self.context_id = context_id.into();
        self
    }

    pub fn user_data(mut self, user_data: Map<String, Value>) -> Self {
        self.user_data = user_data;
        self
    }

    /// Derive both connection maps from the flow's connections
    pub fn connections(mut self, connections: &[Connection]) -> Self {
        for conn in connections {
            if conn.target_node_id == self.id {
                self.input_connections.insert(
                    conn.target_handle.clone(),
                    InputSource {
                        source_node_id: conn.source_node_id.clone(),
                        source_handle: conn.source_handle.clone(),
                    },
                );
            }
            if conn.source_node_id == self.id {
                self.output_connections
                    .entry(conn.source_handle.clone())
                    .or_default()
                    .push(OutputTarget {
                        target_node_id: conn.target_node_id.clone(),
                        target_handle: conn.target_handle.clone(),
                    });
            }
        }
        self
    }

    pub fn build(self) -> NodeInstance {
        NodeInstance {
            id: self.id,
            node_type: self.node_type,
            context_id: self.context_id,
            runtime: self.runtime,
            input_connections: self.input_connections,
            output_connections: self.output_connections,
            user_data: self.user_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NodeError;
    use crate::node::NodeContext;
    use crate::state::{FlowState, StateUpdate};
    use async_trait::async_trait;
    use serde_json::json;

    struct Noop;

    #[async_trait]
    impl FlowNode for Noop {
        async fn invoke(&self, _ctx: &NodeContext, _state: &FlowState) -> Result<StateUpdate, NodeError> {
            Ok(StateUpdate::empty())
        }
    }

    fn conn(source: &str, sh: &str, target: &str, th: &str) -> Connection {
        Connection {
            source_node_id: source.into(),
            source_handle: sh.into(),
            target_node_id: target.into(),
            target_handle: th.into(),
            data_type: "any".into(),
        }
    }

    #[test]
    fn test_connection_maps() {
        let connections = vec![
            conn("a", "output", "n", "input"),
            conn("b", "text", "n", "input"),
            conn("c", "output", "n", "context"),
            conn("n", "output", "x", "input"),
            conn("n", "output", "y", "prompt"),
            conn("n", "debug", "z", "input"),
        ];

        let mut data = Map::new();
        data.insert("temperature".into(), json!(0.2));

        let instance = NodeInstance::builder("n", "Echo", Arc::new(Noop))
            .context_id("ctx-1")
            .user_data(data.clone())
            .connections(&connections)
            .build();

        // last edge into a handle wins
        assert_eq!(instance.input_connections["input"].source_node_id, "b");
        assert_eq!(instance.input_connections["input"].source_handle, "text");
        assert_eq!(instance.input_connections["context"].source_node_id, "c");

        let outputs = &instance.output_connections["output"];
        assert_eq!(outputs.len(), 2);
        assert_eq!(outputs[0].target_node_id, "x");
        assert_eq!(outputs[1].target_handle, "prompt");
        assert_eq!(instance.output_connections["debug"].len(), 1);

        assert_eq!(instance.context_id, "ctx-1");
        assert_eq!(instance.user_data, data);
    }
}
