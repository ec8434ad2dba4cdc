//! Checkpoint data structures
//!
//! A [`Checkpoint`] is a snapshot of one run's flow state taken after a node
//! visit. Checkpoints are grouped by run identifier (the session id of the
//! run) and ordered by `step`, so the last checkpoint of a run is always the
//! most recent state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Unique identifier of a single checkpoint
pub type CheckpointId = String;

/// What produced a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointSource {
    /// Initial state before any node ran
    Input,
    /// State after a node visit
    Step,
    /// Final state of a completed run
    Complete,
}

/// Metadata attached to a checkpoint
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CheckpointMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<CheckpointSource>,

    /// Free-form extra metadata (workflow id, user id, ...)
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl CheckpointMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, source: CheckpointSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Snapshot of a run's state
///
/// # Examples
///
/// ```rust
/// use flowgraph_checkpoint::Checkpoint;
/// use serde_json::json;
///
/// let checkpoint = Checkpoint::new(2, Some("summarize".to_string()), json!({"last_output": "ok"}));
/// assert_eq!(checkpoint.step, 2);
/// assert_eq!(checkpoint.node.as_deref(), Some("summarize"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Format version
    pub v: i32,

    pub id: CheckpointId,

    pub ts: DateTime<Utc>,

    /// Number of node visits completed when the snapshot was taken
    pub step: usize,

    /// Node whose visit produced this snapshot, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,

    /// Serialized flow state
    pub state: serde_json::Value,

    #[serde(default)]
    pub metadata: CheckpointMetadata,
}

impl Checkpoint {
    pub const CURRENT_VERSION: i32 = 1;

    pub fn new(step: usize, node: Option<String>, state: serde_json::Value) -> Self {
        Self {
            v: Self::CURRENT_VERSION,
            id: Uuid::new_v4().to_string(),
            ts: Utc::now(),
            step,
            node,
            state,
            metadata: CheckpointMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: CheckpointMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_checkpoint_serde_roundtrip_keeps_metadata() {
        let checkpoint = Checkpoint::new(1, Some("a".into()), json!({"variables": {"k": 1}}))
            .with_metadata(
                CheckpointMetadata::new()
                    .with_source(CheckpointSource::Step)
                    .with_extra("workflow_id", json!("wf-1")),
            );

        let encoded = serde_json::to_string(&checkpoint).unwrap();
        let decoded: Checkpoint = serde_json::from_str(&encoded).unwrap();

        assert_eq!(decoded, checkpoint);
        assert_eq!(decoded.metadata.extra["workflow_id"], json!("wf-1"));
    }

    #[test]
    fn test_checkpoint_ids_are_unique() {
        let a = Checkpoint::new(0, None, json!(null));
        let b = Checkpoint::new(0, None, json!(null));
        assert_ne!(a.id, b.id);
    }
}
