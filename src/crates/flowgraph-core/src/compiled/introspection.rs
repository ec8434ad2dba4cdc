//! Graph topology and recorded run state

use super::types::{StateSnapshot, Topology};
use super::CompiledFlow;
use crate::error::Result;
use crate::state::FlowState;
use flowgraph_checkpoint::Checkpoint;

impl CompiledFlow {
    pub fn topology(&self) -> Topology {
        Topology {
            nodes: self.graph.node_ids().to_vec(),
            entry: self.graph.entry_nodes(),
            exit: self.graph.exit_nodes(),
            edges: self.graph.edge_pairs(),
        }
    }

    /// Latest recorded state of a session
    ///
    /// `None` when the bound store holds nothing for it, which is always the
    /// case with persistence disabled.
    pub async fn get_state(&self, session_id: &str) -> Result<Option<FlowState>> {
        match self.checkpoint_store.restore(session_id).await? {
            Some(checkpoint) => Ok(Some(serde_json::from_value(checkpoint.state)?)),
            None => Ok(None),
        }
    }

    /// Every recorded state of a session, oldest first
    pub async fn state_history(&self, session_id: &str) -> Result<Vec<StateSnapshot>> {
        self.checkpoint_store
            .history(session_id)
            .await?
            .into_iter()
            .map(snapshot)
            .collect()
    }
}

fn snapshot(checkpoint: Checkpoint) -> Result<StateSnapshot> {
    Ok(StateSnapshot {
        step: checkpoint.step,
        node: checkpoint.node,
        state: serde_json::from_value(checkpoint.state)?,
        created_at: checkpoint.ts,
    })
}
