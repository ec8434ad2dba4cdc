//! CompiledFlow struct and accessors

use crate::config::FlowSettings;
use crate::graph::FlowGraph;
use crate::visualization::{self, VisualizationFormat};
use flowgraph_checkpoint::CheckpointStore;
use std::sync::Arc;

/// Compiled flow ready for execution
///
/// Cheap to clone; the graph and its node instances are shared and never
/// change after compilation.
#[derive(Clone)]
pub struct CompiledFlow {
    pub(crate) graph: Arc<FlowGraph>,
    pub(crate) checkpoint_store: Arc<dyn CheckpointStore>,
    pub(crate) settings: Arc<FlowSettings>,
}

impl CompiledFlow {
    pub(crate) fn new(graph: FlowGraph, checkpoint_store: Arc<dyn CheckpointStore>, settings: FlowSettings) -> Self {
        Self {
            graph: Arc::new(graph),
            checkpoint_store,
            settings: Arc::new(settings),
        }
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    pub fn checkpoint_store(&self) -> Arc<dyn CheckpointStore> {
        self.checkpoint_store.clone()
    }

    /// Name of the checkpoint tier bound at compile time
    pub fn checkpoint_store_name(&self) -> &'static str {
        self.checkpoint_store.name()
    }

    /// Render the graph as Mermaid or DOT
    pub fn visualize(&self, format: VisualizationFormat) -> String {
        visualization::visualize(&self.graph, format)
    }
}

impl std::fmt::Debug for CompiledFlow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledFlow")
            .field("nodes", &self.graph.node_ids())
            .field("checkpoint_store", &self.checkpoint_store.name())
            .finish()
    }
}
