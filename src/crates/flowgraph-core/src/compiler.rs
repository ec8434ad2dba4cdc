//! Flow definition → executable graph
//!
//! [`FlowCompiler::compile`] is a pure function of the registry, the settings
//! and the definition. Nothing survives between calls, so compiling the same
//! definition twice yields the same topology.
//!
//! Compilation order:
//!
//! 1. integrity checks (duplicate ids, dangling edges)
//! 2. classification; every control-flow config is validated
//! 3. instantiation of ordinary nodes under a credential context
//! 4. control-flow edge synthesis
//! 5. ordinary edges, grouped by target
//! 6. `START`/`END` wiring
//! 7. checkpoint store selection
//!
//! Any error aborts the compile; no partial graph is returned.

use crate::compiled::CompiledFlow;
use crate::config::FlowSettings;
use crate::connection::{parse_connections, Connection};
use crate::control_flow::{self, classify, ControlFlowEntry, SynthesisContext};
use crate::credentials::{CredentialGuard, CredentialProvider, NoopCredentials};
use crate::definition::{FlowDefinition, NodeDefinition};
use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, GraphNode, NodeId, END, START};
use crate::instance::NodeInstance;
use crate::node::NodeRegistry;
use flowgraph_checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, NoopCheckpointStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct FlowCompiler {
    registry: Arc<NodeRegistry>,
    credentials: Arc<dyn CredentialProvider>,
    settings: FlowSettings,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
}

impl FlowCompiler {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            credentials: Arc::new(NoopCredentials),
            settings: FlowSettings::default(),
            checkpoint_store: None,
        }
    }

    pub fn with_settings(mut self, settings: FlowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialProvider>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Bind this store to every compiled flow instead of selecting a tier
    pub fn with_checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &FlowSettings {
        &self.settings
    }

    /// Compile a definition, activating `user_id`'s credentials while node
    /// runtime units are created
    #[tracing::instrument(skip(self, definition, user_id), fields(nodes = definition.nodes.len(), edges = definition.edges.len()))]
    pub fn compile(&self, definition: &FlowDefinition, user_id: Option<&str>) -> Result<CompiledFlow> {
        self.settings.validate()?;

        if let Some(id) = definition.find_duplicate_id() {
            return Err(FlowError::DuplicateNode(id.to_string()));
        }
        definition.check_edge_endpoints()?;

        let connections = parse_connections(&definition.edges);

        let mut entries: Vec<ControlFlowEntry> = Vec::new();
        let mut ordinary: Vec<&NodeDefinition> = Vec::new();
        for node in &definition.nodes {
            match classify(node) {
                Some(kind) => {
                    let entry = ControlFlowEntry::new(node.id.clone(), kind, node.data.clone());
                    entry.validate_config()?;
                    entries.push(entry);
                }
                None => ordinary.push(node),
            }
        }
        let control_ids: HashSet<&str> = entries.iter().map(|e| e.node_id.as_str()).collect();

        let mut graph = FlowGraph::new();

        // scoped so the credential context is released as soon as every
        // runtime unit exists
        {
            let guard = CredentialGuard::acquire(
                self.credentials.clone(),
                format!("compile-{}", Uuid::new_v4()),
                user_id,
            )?;
            for node in &ordinary {
                let instance = self.instantiate(node, &connections, guard.context_id())?;
                graph.add_node(node.id.clone(), GraphNode::Task(Arc::new(instance)));
            }
        }

        let dropped: HashSet<String> = entries
            .iter()
            .filter(|entry| !entry.is_wired(&connections))
            .map(|entry| entry.node_id.clone())
            .collect();
        let ctx = SynthesisContext {
            connections: &connections,
            dropped: &dropped,
        };
        for entry in &entries {
            control_flow::synthesize(&mut graph, entry, &ctx)?;
        }

        for (target, sources) in group_by_target(&connections, &control_ids) {
            if dropped.contains(target) {
                tracing::debug!(target = %target, "skipping edges into dropped control-flow node");
                continue;
            }
            for source in sources {
                graph.add_edge(source, target);
            }
        }

        wire_entry_and_exit(&mut graph, &definition.nodes, &ordinary, &entries, &connections, &dropped);

        let checkpoint_store = select_checkpoint_store(&self.settings, self.checkpoint_store.clone());

        tracing::info!(
            ordinary = ordinary.len(),
            control_flow = entries.len() - dropped.len(),
            dropped = dropped.len(),
            checkpoint_store = checkpoint_store.name(),
            "flow compiled"
        );

        Ok(CompiledFlow::new(graph, checkpoint_store, self.settings.clone()))
    }

    fn instantiate(&self, node: &NodeDefinition, connections: &[Connection], context_id: &str) -> Result<NodeInstance> {
        let factory = self
            .registry
            .get(&node.node_type)
            .ok_or_else(|| FlowError::unknown_node_type(&node.id, &node.node_type))?;

        let runtime = factory.create(node).map_err(|e| {
            FlowError::Configuration(format!(
                "failed to create node '{}' of type {}: {}",
                node.id, node.node_type, e
            ))
        })?;

        tracing::debug!(node = %node.id, node_type = %node.node_type, "node instantiated");

        Ok(NodeInstance::builder(node.id.clone(), node.node_type.clone(), runtime)
            .context_id(context_id)
            .user_data(node.data.clone())
            .connections(connections)
            .build())
    }
}

impl std::fmt::Debug for FlowCompiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowCompiler")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("checkpoint_store", &self.checkpoint_store.as_ref().map(|s| s.name()))
            .finish()
    }
}

/// Ordinary edges keyed by target, targets in first-appearance order
///
/// Edges leaving control-flow nodes are left to their synthesizers.
fn group_by_target<'a>(connections: &'a [Connection], control_ids: &HashSet<&str>) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut groups: Vec<(&'a str, Vec<&'a str>)> = Vec::new();
    let mut index: HashMap<&'a str, usize> = HashMap::new();

    for conn in connections {
        if control_ids.contains(conn.source_node_id.as_str()) {
            continue;
        }
        let target = conn.target_node_id.as_str();
        let slot = *index.entry(target).or_insert_with(|| {
            groups.push((target, Vec::new()));
            groups.len() - 1
        });
        groups[slot].1.push(conn.source_node_id.as_str());
    }

    groups
}

/// `START` into every live node without live incoming connections, and
/// every ordinary node without live outgoing connections into `END`
///
/// Entries are wired in declaration order. When no node qualifies as an
/// entry, the first ordinary node is the sole entry.
fn wire_entry_and_exit(
    graph: &mut FlowGraph,
    declared: &[NodeDefinition],
    ordinary: &[&NodeDefinition],
    entries: &[ControlFlowEntry],
    connections: &[Connection],
    dropped: &HashSet<String>,
) {
    let live = |id: &str| !dropped.contains(id);
    let has_incoming: HashSet<&str> = connections
        .iter()
        .filter(|conn| live(conn.source_node_id.as_str()))
        .map(|conn| conn.target_node_id.as_str())
        .collect();
    let has_outgoing: HashSet<&str> = connections
        .iter()
        .filter(|conn| live(conn.target_node_id.as_str()))
        .map(|conn| conn.source_node_id.as_str())
        .collect();

    let mut starts: Vec<NodeId> = declared
        .iter()
        .map(|node| node.id.as_str())
        .filter(|id| graph.contains(id) && !has_incoming.contains(id))
        .map(str::to_string)
        .collect();

    if starts.is_empty() {
        if let Some(first) = ordinary.first() {
            tracing::debug!(node = %first.id, "no node without incoming edges, using first node as entry");
            starts.push(first.id.clone());
        }
    }
    for id in starts {
        graph.add_edge(START, id);
    }

    for node in ordinary {
        if !has_outgoing.contains(node.id.as_str()) {
            graph.add_edge(node.id.clone(), END);
        }
    }

    tracing::debug!(
        control_flow = entries.len(),
        entry = ?graph.entry_nodes(),
        exit = ?graph.exit_nodes(),
        "entry and exit wired"
    );
}

/// Checkpoint tier for a compiled flow
///
/// An injected store wins; then disabled persistence binds the no-op store;
/// then the file store when configured and available; otherwise in-memory.
/// Availability is probed once.
pub fn select_checkpoint_store(
    settings: &FlowSettings,
    injected: Option<Arc<dyn CheckpointStore>>,
) -> Arc<dyn CheckpointStore> {
    if let Some(store) = injected {
        return store;
    }
    if settings.disable_persistence {
        return Arc::new(NoopCheckpointStore::new());
    }
    if let Some(dir) = &settings.checkpoint_dir {
        let store = FileCheckpointStore::new(dir.clone());
        if store.is_available() {
            return Arc::new(store);
        }
        tracing::warn!(
            dir = %dir.display(),
            "checkpoint directory unavailable, falling back to in-memory checkpoints"
        );
    }
    Arc::new(InMemoryCheckpointStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::node::{FlowNode, NodeContext};
    use crate::state::{FlowState, StateUpdate};
    use crate::NodeError;
    use async_trait::async_trait;
    use serde_json::json;

    struct Pass;

    #[async_trait]
    impl FlowNode for Pass {
        async fn invoke(&self, _ctx: &NodeContext, _state: &FlowState) -> std::result::Result<StateUpdate, NodeError> {
            Ok(StateUpdate::empty())
        }
    }

    fn compiler() -> FlowCompiler {
        FlowCompiler::new(Arc::new(NodeRegistry::new().with("Pass", || Pass)))
            .with_settings(FlowSettings::default().with_persistence_disabled(true))
    }

    fn pairs(flow: &CompiledFlow) -> Vec<(String, String)> {
        flow.graph().edge_pairs()
    }

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_node(NodeDefinition::new("a", "Pass"));
        let err = compiler().compile(&def, None).unwrap_err();
        assert!(matches!(err, FlowError::DuplicateNode(id) if id == "a"));
    }

    #[test]
    fn test_dangling_edge_rejected() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_edge("a", "ghost");
        let err = compiler().compile(&def, None).unwrap_err();
        assert!(matches!(err, FlowError::DanglingConnection { .. }));
    }

    #[test]
    fn test_invalid_config_on_dropped_node_still_fails() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_node(NodeDefinition::new("loop", "LoopNode").with_data("max_iterations", json!("lots")));
        let err = compiler().compile(&def, None).unwrap_err();
        assert!(matches!(err, FlowError::InvalidControlFlowConfig { .. }));
    }

    #[test]
    fn test_ordinary_edges_into_dropped_nodes_are_skipped() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_node(NodeDefinition::new("c", "ConditionNode"))
            .with_node(NodeDefinition::new("x", "Pass"))
            .with_edge("a", "c")
            .with_edge("c", "x");
        let flow = compiler().compile(&def, None).unwrap();

        assert!(!flow.graph().contains("c"));
        let edges = pairs(&flow);
        assert!(!edges.contains(&pair("a", "c")));
        // x is only fed by the dropped node, so it becomes an entry
        assert_eq!(flow.topology().entry, vec!["a".to_string(), "x".to_string()]);
        assert_eq!(flow.topology().exit, vec!["a".to_string(), "x".to_string()]);
    }

    #[test]
    fn test_cycle_falls_back_to_first_node() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_node(NodeDefinition::new("b", "Pass"))
            .with_edge("a", "b")
            .with_edge("b", "a");
        let flow = compiler().compile(&def, None).unwrap();
        assert_eq!(flow.topology().entry, vec!["a".to_string()]);
        assert!(flow.topology().exit.is_empty());
    }

    #[test]
    fn test_control_flow_node_without_incoming_is_entry() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("p", "ParallelNode"))
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_node(NodeDefinition::new("b", "Pass"))
            .with_edge("p", "a")
            .with_edge("p", "b");
        let flow = compiler().compile(&def, None).unwrap();
        assert_eq!(flow.topology().entry, vec!["p".to_string()]);
        assert_eq!(flow.topology().exit, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_entries_follow_declaration_order() {
        let def = FlowDefinition::new()
            .with_node(NodeDefinition::new("z", "Pass"))
            .with_node(NodeDefinition::new("loop", "LoopNode"))
            .with_node(NodeDefinition::new("a", "Pass"))
            .with_node(NodeDefinition::new("body", "Pass"))
            .with_edge("loop", "body");
        let flow = compiler().compile(&def, None).unwrap();

        let starts: Vec<&str> = flow
            .graph()
            .edges_from(START)
            .iter()
            .filter_map(|edge| match edge {
                Edge::Direct(to) => Some(to.as_str()),
                Edge::Conditional { .. } => None,
            })
            .collect();
        assert_eq!(starts, vec!["z", "loop", "a"]);
    }

    #[test]
    fn test_credentials_released_after_compile() {
        use crate::credentials::InMemoryCredentialProvider;

        let provider = Arc::new(InMemoryCredentialProvider::new().with_secret("u1", "token", "t"));
        let compiler = compiler().with_credentials(provider.clone());
        let def = FlowDefinition::new().with_node(NodeDefinition::new("a", "Pass"));

        compiler.compile(&def, Some("u1")).unwrap();
        assert_eq!(provider.active_contexts(), 0);

        let bad = FlowDefinition::new().with_node(NodeDefinition::new("a", "Missing"));
        assert!(compiler.compile(&bad, Some("u1")).is_err());
        assert_eq!(provider.active_contexts(), 0);

        let err = compiler.compile(&def, Some("nobody")).unwrap_err();
        assert!(matches!(err, FlowError::Credential(_)));
    }

    #[test]
    fn test_checkpoint_store_selection() {
        let disabled = FlowSettings::default().with_persistence_disabled(true);
        assert_eq!(select_checkpoint_store(&disabled, None).name(), "noop");

        let injected: Arc<dyn CheckpointStore> = Arc::new(InMemoryCheckpointStore::new());
        assert_eq!(select_checkpoint_store(&disabled, Some(injected)).name(), "memory");

        let dir = tempfile::tempdir().unwrap();
        let durable = FlowSettings::default().with_checkpoint_dir(dir.path().join("checkpoints"));
        assert_eq!(select_checkpoint_store(&durable, None).name(), "file");

        assert_eq!(select_checkpoint_store(&FlowSettings::default(), None).name(), "memory");
    }

    #[test]
    fn test_unavailable_file_store_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();

        let settings = FlowSettings::default().with_checkpoint_dir(blocker.join("checkpoints"));
        assert_eq!(select_checkpoint_store(&settings, None).name(), "memory");
    }
}
