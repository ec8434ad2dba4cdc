//! Flow definitions as authored in the visual editor
//!
//! A definition is a list of node records and a list of directed edges. It is
//! loaded from JSON or YAML and never mutated by the compiler.
//!
//! ```json
//! {
//!   "nodes": [
//!     {"id": "a", "type": "Echo", "data": {"prefix": ">"}},
//!     {"id": "check", "type": "ConditionNode", "data": {"condition_type": "contains"}}
//!   ],
//!   "edges": [
//!     {"source": "a", "target": "check", "sourceHandle": "output"}
//!   ]
//! }
//! ```

use crate::control_flow::ControlFlowTag;
use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: String,

    #[serde(rename = "type")]
    pub node_type: String,

    /// User configuration, passed to the node verbatim
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Explicit control-flow role; overrides the type-name convention
    #[serde(
        default,
        rename = "controlFlow",
        skip_serializing_if = "Option::is_none"
    )]
    pub control_flow: Option<ControlFlowTag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub source: String,
    pub target: String,

    #[serde(
        default,
        rename = "sourceHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_handle: Option<String>,

    #[serde(
        default,
        rename = "targetHandle",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_handle: Option<String>,

    #[serde(default, rename = "dataType", skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,
}

impl FlowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_yaml_str(source: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(source)?)
    }

    /// Load from a file, choosing YAML for `.yaml`/`.yml` and JSON otherwise
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&contents),
            _ => Self::from_json_str(&contents),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_node(mut self, node: NodeDefinition) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.edges.push(EdgeDefinition::new(source, target));
        self
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// First duplicated node id, if any
    pub fn find_duplicate_id(&self) -> Option<&str> {
        let mut seen = HashSet::with_capacity(self.nodes.len());
        self.nodes
            .iter()
            .find(|node| !seen.insert(node.id.as_str()))
            .map(|node| node.id.as_str())
    }

    /// Error for the first edge whose endpoint names no node
    pub fn check_edge_endpoints(&self) -> Result<()> {
        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if self.node(endpoint).is_none() {
                    return Err(FlowError::dangling(&edge.source, &edge.target, endpoint));
                }
            }
        }
        Ok(())
    }
}

impl NodeDefinition {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            data: Map::new(),
            control_flow: None,
        }
    }

    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    pub fn with_control_flow(mut self, tag: ControlFlowTag) -> Self {
        self.control_flow = Some(tag);
        self
    }
}

impl EdgeDefinition {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            data_type: None,
        }
    }

    pub fn with_handles(mut self, source: impl Into<String>, target: impl Into<String>) -> Self {
        self.source_handle = Some(source.into());
        self.target_handle = Some(target.into());
        self
    }
}

/// Input for one run of a compiled flow
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    #[serde(default)]
    pub input: String,

    /// Generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,

    #[serde(default)]
    pub variables: Map<String, Value>,
}

impl RunInput {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_workflow_id(mut self, workflow_id: impl Into<String>) -> Self {
        self.workflow_id = Some(workflow_id.into());
        self
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.variables.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_editor_json() {
        let def = FlowDefinition::from_json_str(
            r#"{
                "nodes": [
                    {"id": "a", "type": "Echo", "data": {"k": 1}},
                    {"id": "b", "type": "Thing", "controlFlow": "loop"}
                ],
                "edges": [{"source": "a", "target": "b", "targetHandle": "in"}]
            }"#,
        )
        .unwrap();

        assert_eq!(def.nodes.len(), 2);
        assert_eq!(def.nodes[0].data["k"], json!(1));
        assert_eq!(def.nodes[1].control_flow, Some(ControlFlowTag::Loop));
        assert_eq!(def.edges[0].source_handle, None);
        assert_eq!(def.edges[0].target_handle.as_deref(), Some("in"));
    }

    #[test]
    fn test_parse_yaml() {
        let def = FlowDefinition::from_yaml_str(
            "nodes:\n  - id: a\n    type: Echo\nedges: []\n",
        )
        .unwrap();
        assert_eq!(def.nodes[0].node_type, "Echo");
        assert!(def.nodes[0].data.is_empty());
    }

    #[test]
    fn test_duplicate_and_dangling_detection() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Echo"))
            .with_node(NodeDefinition::new("a", "Echo"));
        assert_eq!(def.find_duplicate_id(), Some("a"));

        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Echo"))
            .with_edge("a", "ghost");
        let err = def.check_edge_endpoints().unwrap_err();
        assert!(matches!(err, FlowError::DanglingConnection { ref missing, .. } if missing == "ghost"));
    }

    #[test]
    fn test_run_input_defaults() {
        let input: RunInput = serde_json::from_value(json!({"input": "hi"})).unwrap();
        assert_eq!(input.input, "hi");
        assert!(input.session_id.is_none());
        assert!(input.variables.is_empty());
    }
}
