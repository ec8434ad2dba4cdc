//! Durable checkpoint storage on the local filesystem
//!
//! Each run gets one JSON-lines file (`<dir>/<run_id>.jsonl`), one checkpoint
//! per line, appended in save order. Run ids are sanitized before they become
//! file names.

use crate::checkpoint::{Checkpoint, CheckpointId};
use crate::error::{CheckpointError, Result};
use crate::traits::{require_run_id, CheckpointStore};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Checkpoint store writing JSON lines under a directory
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
    // Serializes appends so concurrent branches never interleave lines
    write_lock: Mutex<()>,
}

impl FileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        let file_name: String = run_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.dir.join(format!("{}.jsonl", file_name))
    }

    async fn read_run(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        let path = self.run_path(run_id);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        contents
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(CheckpointError::from))
            .collect()
    }
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    fn name(&self) -> &'static str {
        "file"
    }

    /// Creates the directory if needed and probes that it is writable.
    fn is_available(&self) -> bool {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            tracing::debug!(dir = %self.dir.display(), error = %e, "checkpoint directory not creatable");
            return false;
        }

        let probe = self.dir.join(".flowgraph-probe");
        let writable = std::fs::write(&probe, b"ok").is_ok();
        let _ = std::fs::remove_file(&probe);
        if !writable {
            tracing::debug!(dir = %self.dir.display(), "checkpoint directory not writable");
        }
        writable
    }

    async fn save(&self, run_id: &str, checkpoint: Checkpoint) -> Result<CheckpointId> {
        require_run_id(run_id)?;
        let mut line = serde_json::to_string(&checkpoint)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.dir).await?;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.run_path(run_id))
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(checkpoint.id)
    }

    async fn restore(&self, run_id: &str) -> Result<Option<Checkpoint>> {
        require_run_id(run_id)?;
        Ok(self.read_run(run_id).await?.pop())
    }

    async fn history(&self, run_id: &str) -> Result<Vec<Checkpoint>> {
        require_run_id(run_id)?;
        self.read_run(run_id).await
    }

    async fn delete(&self, run_id: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(self.run_path(run_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
