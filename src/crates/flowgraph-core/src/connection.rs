//! Raw edges normalized into connections
//!
//! One [`Connection`] per edge, in edge order. Missing handles default to
//! `"output"` on the source side and `"input"` on the target side. Endpoint
//! integrity is checked by the compiler, not here.

use crate::definition::EdgeDefinition;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SOURCE_HANDLE: &str = "output";
pub const DEFAULT_TARGET_HANDLE: &str = "input";
pub const DEFAULT_DATA_TYPE: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    pub source_node_id: String,
    pub source_handle: String,
    pub target_node_id: String,
    pub target_handle: String,
    pub data_type: String,
}

impl Connection {
    pub fn new(source_node_id: impl Into<String>, target_node_id: impl Into<String>) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            source_handle: DEFAULT_SOURCE_HANDLE.to_string(),
            target_node_id: target_node_id.into(),
            target_handle: DEFAULT_TARGET_HANDLE.to_string(),
            data_type: DEFAULT_DATA_TYPE.to_string(),
        }
    }
}

impl From<&EdgeDefinition> for Connection {
    fn from(edge: &EdgeDefinition) -> Self {
        Self {
            source_node_id: edge.source.clone(),
            source_handle: edge
                .source_handle
                .clone()
                .unwrap_or_else(|| DEFAULT_SOURCE_HANDLE.to_string()),
            target_node_id: edge.target.clone(),
            target_handle: edge
                .target_handle
                .clone()
                .unwrap_or_else(|| DEFAULT_TARGET_HANDLE.to_string()),
            data_type: edge
                .data_type
                .clone()
                .unwrap_or_else(|| DEFAULT_DATA_TYPE.to_string()),
        }
    }
}

pub fn parse_connections(edges: &[EdgeDefinition]) -> Vec<Connection> {
    edges.iter().map(Connection::from).collect()
}

/// Connections leaving `node_id`, in edge order
pub fn outgoing<'a>(connections: &'a [Connection], node_id: &str) -> Vec<&'a Connection> {
    connections
        .iter()
        .filter(|conn| conn.source_node_id == node_id)
        .collect()
}
