//! Error types for compiling and running flows
//!
//! ```text
//! FlowError
//! ├── UnknownNodeType           - build time, node type missing from the registry
//! ├── DuplicateNode             - build time, two nodes share an id
//! ├── DanglingConnection        - build time, edge endpoint names no node
//! ├── InvalidControlFlowConfig  - build time, bad conditional/loop config
//! ├── GraphNotBuilt             - run requested before a successful build
//! ├── NodeExecution             - a node body failed
//! ├── StepLimitExceeded         - run visited too many nodes
//! ├── Credential                - credential activation failed
//! ├── Checkpoint                - persistence failed
//! ├── Serialization / Yaml / Io - loading definitions or settings
//! ├── Configuration             - malformed settings
//! └── Execution                 - anything else raised by the driver
//! ```
//!
//! Build errors abort compilation; no partial graph is ever returned. Run
//! errors are turned into a failure record by [`CompiledFlow::invoke`] or a
//! terminal `error` event by [`CompiledFlow::stream`], classified with
//! [`FlowError::error_type`].
//!
//! [`CompiledFlow::invoke`]: crate::CompiledFlow::invoke
//! [`CompiledFlow::stream`]: crate::CompiledFlow::stream

use thiserror::Error;

/// Convenience result type using [`FlowError`]
pub type Result<T> = std::result::Result<T, FlowError>;

/// Error type node bodies return
pub type NodeError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum FlowError {
    /// Node type is not present in the registry
    ///
    /// # Example
    ///
    /// ```rust
    /// use flowgraph_core::FlowError;
    ///
    /// let err = FlowError::unknown_node_type("n1", "LLMNode");
    /// assert_eq!(err.to_string(), "Unknown node type: LLMNode (node 'n1')");
    /// ```
    #[error("Unknown node type: {node_type} (node '{node}')")]
    UnknownNodeType { node: String, node_type: String },

    #[error("Duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("Connection {source_node} -> {target_node} references unknown node '{missing}'")]
    DanglingConnection {
        source_node: String,
        target_node: String,
        missing: String,
    },

    #[error("Invalid control-flow configuration for node '{node}': {reason}")]
    InvalidControlFlowConfig { node: String, reason: String },

    #[error("Graph not built. Call build() first.")]
    GraphNotBuilt,

    #[error("Node '{node}' execution failed: {error}")]
    NodeExecution { node: String, error: String },

    #[error("Run exceeded the step limit of {limit} node visits")]
    StepLimitExceeded { limit: usize },

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] flowgraph_checkpoint::CheckpointError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    Execution(String),
}

impl FlowError {
    pub fn unknown_node_type(node: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self::UnknownNodeType {
            node: node.into(),
            node_type: node_type.into(),
        }
    }

    pub fn dangling(
        source_node: impl Into<String>,
        target_node: impl Into<String>,
        missing: impl Into<String>,
    ) -> Self {
        Self::DanglingConnection {
            source_node: source_node.into(),
            target_node: target_node.into(),
            missing: missing.into(),
        }
    }

    pub fn invalid_control_flow(node: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidControlFlowConfig {
            node: node.into(),
            reason: reason.into(),
        }
    }

    pub fn node_execution(node: impl Into<String>, error: impl Into<String>) -> Self {
        Self::NodeExecution {
            node: node.into(),
            error: error.into(),
        }
    }

    /// Stable classification string used in failure records and error events
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UnknownNodeType { .. } => "UnknownNodeType",
            Self::DuplicateNode(_) => "DuplicateNode",
            Self::DanglingConnection { .. } => "DanglingConnection",
            Self::InvalidControlFlowConfig { .. } => "InvalidControlFlowConfig",
            Self::GraphNotBuilt => "GraphNotBuilt",
            Self::NodeExecution { .. } => "NodeExecution",
            Self::StepLimitExceeded { .. } => "StepLimitExceeded",
            Self::Credential(_) => "Credential",
            Self::Checkpoint(_) => "Checkpoint",
            Self::Serialization(_) => "Serialization",
            Self::Yaml(_) => "Yaml",
            Self::Io(_) => "Io",
            Self::Configuration(_) => "Configuration",
            Self::Execution(_) => "Execution",
        }
    }

    /// Whether the error is raised while compiling rather than running
    pub fn is_build_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownNodeType { .. }
                | Self::DuplicateNode(_)
                | Self::DanglingConnection { .. }
                | Self::InvalidControlFlowConfig { .. }
                | Self::Credential(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_type_classification() {
        assert_eq!(FlowError::GraphNotBuilt.error_type(), "GraphNotBuilt");
        assert_eq!(
            FlowError::node_execution("a", "boom").error_type(),
            "NodeExecution"
        );
        assert_eq!(
            FlowError::unknown_node_type("a", "X").error_type(),
            "UnknownNodeType"
        );
    }

    #[test]
    fn test_node_execution_display() {
        let err = FlowError::node_execution("llm_call", "API timeout");
        assert_eq!(err.to_string(), "Node 'llm_call' execution failed: API timeout");
        assert!(!err.is_build_error());
    }

    #[test]
    fn test_checkpoint_error_converts() {
        let err: FlowError =
            flowgraph_checkpoint::CheckpointError::Storage("disk full".into()).into();
        assert_eq!(err.error_type(), "Checkpoint");
        assert!(err.to_string().contains("disk full"));
    }
}
