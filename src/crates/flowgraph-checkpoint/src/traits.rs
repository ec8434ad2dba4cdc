//! The checkpoint store contract
//!
//! Every backend implements [`CheckpointStore`]. The flow compiler probes
//! [`CheckpointStore::is_available`] exactly once when it selects a store; a
//! store that reports itself unavailable is skipped in favour of the next
//! tier, it is never retried.
//!
//! # Implementing a Custom Store
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, Result};
//!
//! struct DiscardingStore;
//!
//! #[async_trait]
//! impl CheckpointStore for DiscardingStore {
//!     fn name(&self) -> &'static str {
//!         "discard"
//!     }
//!
//!     fn is_available(&self) -> bool {
//!         true
//!     }
//!
//!     async fn save(&self, _run_id: &str, checkpoint: Checkpoint) -> Result<String> {
//!         Ok(checkpoint.id)
//!     }
//!
//!     async fn history(&self, _run_id: &str) -> Result<Vec<Checkpoint>> {
//!         Ok(Vec::new())
//!     }
//!
//!     async fn delete(&self, _run_id: &str) -> Result<()> {
//!         Ok(())
//!     }
//! }
//! ```

use crate::checkpoint::{Checkpoint, CheckpointId};
use crate::error::{CheckpointError, Result};
use async_trait::async_trait;

/// Persistence backend for run checkpoints, keyed by run identifier
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Short backend name used in logs
    fn name(&self) -> &'static str;

    /// Whether the backend can accept writes right now
    fn is_available(&self) -> bool;

    /// Append a checkpoint to the run's history and return its id
    async fn save(&self, run_id: &str, checkpoint: Checkpoint) -> Result<CheckpointId>;

    /// Latest checkpoint of a run, or `None` when nothing was saved
    async fn restore(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        Ok(self.history(run_id).await?.pop())
    }

    /// All checkpoints of a run, oldest first
    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>>;

    /// Forget every checkpoint of a run
    async fn delete(&self, run_id: &str) -> Result<()>;
}

pub(crate) fn require_run_id(run_id: &str) -> Result<()> {
    if run_id.trim().is_empty() {
        return Err(CheckpointError::Invalid("run id is required".to_string()));
    }
    Ok(())
}
