//! Store that accepts every write and remembers nothing
//!
//! Used when persistence is disabled. `save` succeeds, `restore` is always
//! empty.

use crate::checkpoint::{Checkpoint, CheckpointId};
use crate::error::Result;
use crate::traits::CheckpointStore;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCheckpointStore;

impl NoopCheckpointStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CheckpointStore for NoopCheckpointStore {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn save(&self, _run_id: &str, checkpoint: Checkpoint) -> Result<CheckpointId> {
        Ok(checkpoint.id)
    }

    async fn restore(&self, _run_id: &str) -> Result<Option<Checkpoint>> {
        Ok(None)
    }

    async fn history(&self, _run_id: &str) -> Result<Vec<Checkpoint>> {
        Ok(Vec::new())
    }

    async fn delete(&self, _run_id: &str) -> Result<()> {
        Ok(())
    }
}
