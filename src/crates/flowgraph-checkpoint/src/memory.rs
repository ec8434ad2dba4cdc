//! In-memory checkpoint storage
//!
//! [`InMemoryCheckpointStore`] keeps every run's checkpoints in a
//! `HashMap<run_id, Vec<Checkpoint>>` behind a tokio `RwLock`. Data lives for
//! the lifetime of the process only; it is the fallback tier when no durable
//! store is configured or reachable.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │  InMemoryCheckpointStore                      │
//! │  Arc<RwLock<HashMap>>                         │
//! │    run_id: "session-1"                        │
//! │      ├─ [0] step 0 (input)                    │
//! │      ├─ [1] step 1 (node "a")                 │
//! │      └─ [2] step 2 (node "b")                 │
//! │    run_id: "session-2"                        │
//! │      └─ [0] step 0 (input)                    │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Clones share the same storage, so one store can be handed to several
//! compiled flows.

use crate::checkpoint::{Checkpoint, CheckpointId};
use crate::error::Result;
use crate::traits::{require_run_id, CheckpointStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

type CheckpointStorage = Arc<RwLock<HashMap<String, Vec<Checkpoint>>>>;

/// Process-lifetime checkpoint store
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: CheckpointStorage,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of runs with at least one checkpoint
    pub async fn run_count(&self) -> usize {
        self.storage.read().await.len()
    }

    /// Total number of stored checkpoints
    pub async fn checkpoint_count(&self) -> usize {
        self.storage
            .read()
            .await
            .values()
            .map(|entries| entries.len())
            .sum()
    }

    /// Remove everything (useful for test isolation)
    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn save(&self, run_id: &str, checkpoint: Checkpoint) -> Result<CheckpointId> {
        require_run_id(run_id)?;
        let id = checkpoint.id.clone();
        self.storage
            .write()
            .await
            .entry(run_id.to_string())
            .or_default()
            .push(checkpoint);
        Ok(id)
    }

    async fn restore(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        require_run_id(run_id)?;
        Ok(self
            .storage
            .read()
            .await
            .get(run_id)
            .and_then(|entries| entries.last().cloned()))
    }

    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        require_run_id(run_id)?;
        Ok(self
            .storage
            .read()
            .await
            .get(run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        self.storage.write().await.remove(run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckpointError;
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_restore_latest() {
        let store = InMemoryCheckpointStore::new();
        for step in 0..3 {
            store
                .save("run-1", Checkpoint::new(step, None, json!({"step": step})))
                .await
                .unwrap();
        }

        let latest = store.restore("run-1").await.unwrap().unwrap();
        assert_eq!(latest.step, 2);
        assert_eq!(latest.state, json!({"step": 2}));
        assert_eq!(store.history("run-1").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_runs_are_isolated() {
        let store = InMemoryCheckpointStore::new();
        store.save("a", Checkpoint::new(0, None, json!(1))).await.unwrap();
        store.save("b", Checkpoint::new(0, None, json!(2))).await.unwrap();

        assert_eq!(store.run_count().await, 2);
        assert_eq!(store.restore("a").await.unwrap().unwrap().state, json!(1));

        store.delete("a").await.unwrap();
        assert!(store.restore("a").await.unwrap().is_none());
        assert_eq!(store.checkpoint_count().await, 1);
    }

    #[tokio::test]
    async fn test_clones_share_storage() {
        let store = InMemoryCheckpointStore::new();
        let clone = store.clone();
        clone.save("run", Checkpoint::new(0, None, json!(null))).await.unwrap();
        assert_eq!(store.checkpoint_count().await, 1);
    }

    #[tokio::test]
    async fn test_empty_run_id_is_rejected() {
        let store = InMemoryCheckpointStore::new();
        let err = store
            .save("  ", Checkpoint::new(0, None, json!(null)))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckpointError::Invalid(_)));
    }
}
