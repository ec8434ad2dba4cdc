//! Types produced by running a compiled flow

use crate::error::FlowError;
use crate::graph::NodeId;
use crate::state::FlowState;
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

/// Events emitted by a streaming run
///
/// A stream is finite and single-pass:
///
/// ```text
/// Start → (NodeStart | NodeEnd | Token)* → Complete | Error
/// ```
///
/// `Error` is terminal; nothing follows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FlowEvent {
    Start {
        session_id: String,
    },
    NodeStart {
        node_id: NodeId,
        metadata: Value,
    },
    NodeEnd {
        node_id: NodeId,
        output: Value,
    },
    /// Incremental output fragment emitted by a node
    Token {
        node_id: NodeId,
        content: String,
    },
    Complete {
        result: Value,
        executed_nodes: Vec<NodeId>,
        session_id: String,
    },
    Error {
        error: String,
        error_type: String,
    },
}

impl FlowEvent {
    pub fn error(err: &FlowError) -> Self {
        FlowEvent::Error {
            error: err.to_string(),
            error_type: err.error_type().to_string(),
        }
    }

    /// Whether the event ends the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowEvent::Complete { .. } | FlowEvent::Error { .. })
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            FlowEvent::Start { .. } => "start",
            FlowEvent::NodeStart { .. } => "node_start",
            FlowEvent::NodeEnd { .. } => "node_end",
            FlowEvent::Token { .. } => "token",
            FlowEvent::Complete { .. } => "complete",
            FlowEvent::Error { .. } => "error",
        }
    }
}

/// Async stream of run events
pub type EventStream = Pin<Box<dyn Stream<Item = FlowEvent> + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Failed,
}

/// Failure record of a blocking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub error_type: String,
    pub message: String,
}

impl From<&FlowError> for RunError {
    fn from(err: &FlowError) -> Self {
        Self {
            error_type: err.error_type().to_string(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a blocking run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub status: RunStatus,
    /// `last_output` of the final state
    pub output: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<FlowState>,
    pub executed_nodes: Vec<NodeId>,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl RunResult {
    pub(crate) fn completed(state: FlowState, executed_nodes: Vec<NodeId>) -> Self {
        Self {
            success: true,
            status: RunStatus::Completed,
            output: state.last_output.clone(),
            session_id: state.session_id.clone(),
            executed_nodes,
            state: Some(state),
            error: None,
        }
    }

    pub(crate) fn failed(err: &FlowError, session_id: String, executed_nodes: Vec<NodeId>) -> Self {
        Self {
            success: false,
            status: RunStatus::Failed,
            output: Value::Null,
            state: None,
            executed_nodes,
            session_id,
            error: Some(RunError::from(err)),
        }
    }
}

/// Entry, exit and edge sets of a compiled flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    /// Graph node ids in declaration order
    pub nodes: Vec<NodeId>,
    pub entry: Vec<NodeId>,
    pub exit: Vec<NodeId>,
    /// Every (source, target) pair, sorted
    pub edges: Vec<(NodeId, NodeId)>,
}

/// State as recorded after one step of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub step: usize,
    pub node: Option<NodeId>,
    pub state: FlowState,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_format() {
        let event = FlowEvent::NodeEnd {
            node_id: "a".to_string(),
            output: json!("hi"),
        };
        let wire = serde_json::to_value(&event).unwrap();
        assert_eq!(wire, json!({"type": "node_end", "node_id": "a", "output": "hi"}));
        assert_eq!(event.event_type(), "node_end");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_error_event_from_flow_error() {
        let event = FlowEvent::error(&FlowError::GraphNotBuilt);
        assert!(event.is_terminal());
        match event {
            FlowEvent::Error { error, error_type } => {
                assert_eq!(error_type, "GraphNotBuilt");
                assert_eq!(error, "Graph not built. Call build() first.");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_failed_result() {
        let err = FlowError::node_execution("b", "boom");
        let result = RunResult::failed(&err, "s1".to_string(), vec!["a".to_string()]);
        assert!(!result.success);
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.error.unwrap().error_type, "NodeExecution");
    }
}
