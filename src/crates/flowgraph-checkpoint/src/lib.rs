//! # flowgraph-checkpoint - Run State Persistence
//!
//! Checkpoint stores for compiled flows. A checkpoint is a snapshot of one
//! run's flow state, saved by the execution driver after every node visit and
//! keyed by the run's session id.
//!
//! ## Stores
//!
//! - [`NoopCheckpointStore`] - accepts writes, remembers nothing (persistence disabled)
//! - [`InMemoryCheckpointStore`] - process-lifetime storage, the fallback tier
//! - [`FileCheckpointStore`] - durable JSON-lines files under a directory
//!
//! Custom backends implement [`CheckpointStore`].
//!
//! ## Quick Start
//!
//! ```rust
//! use flowgraph_checkpoint::{Checkpoint, CheckpointStore, InMemoryCheckpointStore};
//! use serde_json::json;
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let store = InMemoryCheckpointStore::new();
//! store
//!     .save("session-1", Checkpoint::new(1, Some("a".into()), json!({"last_output": "hi"})))
//!     .await
//!     .unwrap();
//!
//! let latest = store.restore("session-1").await.unwrap().unwrap();
//! assert_eq!(latest.state["last_output"], "hi");
//! # });
//! # }
//! ```

pub mod checkpoint;
pub mod error;
pub mod file;
pub mod memory;
pub mod noop;
pub mod traits;

pub use checkpoint::{Checkpoint, CheckpointId, CheckpointMetadata, CheckpointSource};
pub use error::{CheckpointError, Result};
pub use file::FileCheckpointStore;
pub use memory::InMemoryCheckpointStore;
pub use noop::NoopCheckpointStore;
pub use traits::CheckpointStore;
