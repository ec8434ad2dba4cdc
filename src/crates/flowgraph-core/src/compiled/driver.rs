//! Step-based execution driver
//!
//! A run starts with one branch holding the initial state and a frontier of
//! entry nodes. Each step runs every node of the frontier against the same
//! state, applies their updates in frontier order, then collects the targets
//! of all their edges into the next frontier. A node reached from several
//! frontier nodes is scheduled once, so multi-input nodes see every
//! predecessor that ran in the step before.
//!
//! ```text
//! step 1: a          a ─┬─▶ b ─┐
//! step 2: b, c          └─▶ c ─┴─▶ d
//! step 3: d
//! ```
//!
//! Only a parallel router forks: each of its targets continues in a new
//! branch with its own deep copy of the state, and all live branches are
//! polled concurrently. Branches never join, so a node reached by two
//! branches runs once per branch. The run's final state is the state of the
//! last branch to finish.

use super::types::FlowEvent;
use crate::config::FlowSettings;
use crate::control_flow::ControlFlowKind;
use crate::error::{FlowError, NodeError, Result};
use crate::graph::{Edge, FlowGraph, GraphNode, NodeId, END, START};
use crate::instance::NodeInstance;
use crate::node::NodeContext;
use crate::state::{FlowState, StateUpdate};
use flowgraph_checkpoint::{Checkpoint, CheckpointMetadata, CheckpointSource, CheckpointStore};
use futures::future::{join_all, BoxFuture};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// One independently owned line of execution
struct Branch {
    frontier: Vec<NodeId>,
    state: FlowState,
}

impl Branch {
    fn new(frontier: Vec<NodeId>, state: FlowState) -> Self {
        Self { frontier, state }
    }
}

/// What a step hands back to the driver
enum StepOutcome {
    Finished(FlowState),
    /// The branch itself when it has more to run, plus any forks
    Continue(Vec<Branch>),
}

/// Result of invoking one frontier node
enum Visit {
    Task {
        instance: Arc<NodeInstance>,
        update: std::result::Result<StateUpdate, NodeError>,
    },
    Router {
        kind: ControlFlowKind,
    },
}

/// Shared bookkeeping of one run
pub(crate) struct RunContext {
    graph: Arc<FlowGraph>,
    store: Arc<dyn CheckpointStore>,
    settings: Arc<FlowSettings>,
    events: Option<mpsc::Sender<FlowEvent>>,
    session_id: String,
    /// Visit order across every branch
    executed: Mutex<Vec<NodeId>>,
    steps: AtomicUsize,
}

impl RunContext {
    pub(crate) fn new(
        graph: Arc<FlowGraph>,
        store: Arc<dyn CheckpointStore>,
        settings: Arc<FlowSettings>,
        events: Option<mpsc::Sender<FlowEvent>>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            graph,
            store,
            settings,
            events,
            session_id: session_id.into(),
            executed: Mutex::new(Vec::new()),
            steps: AtomicUsize::new(0),
        }
    }

    /// Ordinary nodes executed so far, in completion order
    pub(crate) fn executed(&self) -> Vec<NodeId> {
        self.executed.lock().clone()
    }

    /// Drive every branch to completion and return the final state
    pub(crate) async fn run(&self, mut state: FlowState) -> Result<FlowState> {
        self.checkpoint(0, None, &state, CheckpointSource::Input).await;

        let (starts, _) = self.successors(START, &mut state);
        if starts.is_empty() {
            tracing::warn!(session_id = %self.session_id, "flow has no entry nodes");
            self.checkpoint(0, None, &state, CheckpointSource::Complete).await;
            return Ok(state);
        }

        let mut pending: FuturesUnordered<BoxFuture<'_, Result<StepOutcome>>> = FuturesUnordered::new();
        pending.push(Box::pin(self.step(Branch::new(starts, state.clone()))));

        let mut last = None;
        while let Some(outcome) = pending.next().await {
            match outcome? {
                StepOutcome::Finished(finished) => last = Some(finished),
                StepOutcome::Continue(branches) => {
                    if branches.len() > 1 {
                        tracing::debug!(
                            session_id = %self.session_id,
                            branches = branches.len(),
                            "branch forked"
                        );
                    }
                    for branch in branches {
                        pending.push(Box::pin(self.step(branch)));
                    }
                }
            }
        }

        let final_state = last.unwrap_or(state);
        let step = self.steps.load(Ordering::SeqCst);
        self.checkpoint(step, None, &final_state, CheckpointSource::Complete).await;
        Ok(final_state)
    }

    /// Run one frontier and work out what comes after it
    async fn step(&self, branch: Branch) -> Result<StepOutcome> {
        let Branch { frontier, mut state } = branch;

        let mut steps = Vec::with_capacity(frontier.len());
        for _ in &frontier {
            let step = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
            if step > self.settings.step_limit {
                return Err(FlowError::StepLimitExceeded {
                    limit: self.settings.step_limit,
                });
            }
            steps.push(step);
        }

        let visits = {
            let snapshot = &state;
            join_all(frontier.iter().map(|node| self.visit(node, snapshot))).await
        };

        for ((node, step), visit) in frontier.iter().zip(steps).zip(visits) {
            match visit? {
                Visit::Task { instance, update } => self.finish_task(&instance, update, &mut state).await?,
                Visit::Router { kind } => {
                    self.emit(FlowEvent::NodeEnd {
                        node_id: node.clone(),
                        output: Value::Null,
                    })
                    .await;
                    tracing::debug!(session_id = %self.session_id, node = %node, kind = %kind, "router visited");
                }
            }
            self.checkpoint(step, Some(node), &state, CheckpointSource::Step).await;
        }

        let mut next = Vec::new();
        let mut forks = Vec::new();
        for node in &frontier {
            let (targets, fork) = self.successors(node, &mut state);
            for target in targets {
                if fork {
                    forks.push(target);
                } else if !next.contains(&target) {
                    next.push(target);
                }
            }
        }

        if next.is_empty() && forks.is_empty() {
            return Ok(StepOutcome::Finished(state));
        }

        let mut branches: Vec<Branch> = forks
            .into_iter()
            .map(|target| Branch::new(vec![target], state.clone()))
            .collect();
        if !next.is_empty() {
            branches.insert(0, Branch::new(next, state));
        }
        Ok(StepOutcome::Continue(branches))
    }

    /// Live targets of every edge leaving `node`, and whether they fork
    ///
    /// Routers decide here, on the state after the step's updates.
    fn successors(&self, node: &str, state: &mut FlowState) -> (Vec<NodeId>, bool) {
        let fork = matches!(
            self.graph.node(node),
            Some(GraphNode::Router {
                kind: ControlFlowKind::Parallel
            })
        );
        let targets = self
            .graph
            .edges_from(node)
            .iter()
            .map(|edge| match edge {
                Edge::Direct(to) => to.clone(),
                Edge::Conditional { router, .. } => router.route(state),
            })
            .filter(|target| target != END)
            .collect();
        (targets, fork)
    }

    /// Invoke one node against the step's shared state
    async fn visit(&self, node: &str, state: &FlowState) -> Result<Visit> {
        match self.graph.node(node) {
            Some(GraphNode::Task(instance)) => {
                let node_id = instance.id.as_str();
                tracing::debug!(session_id = %self.session_id, node = %node_id, node_type = %instance.node_type, "node started");
                self.emit(FlowEvent::NodeStart {
                    node_id: node_id.to_string(),
                    metadata: json!({ "type": instance.node_type }),
                })
                .await;

                let ctx = NodeContext::new(instance.clone(), self.events.clone());
                let update = if self.settings.config_as_variables && !instance.user_data.is_empty() {
                    let mut view = state.clone();
                    mirror_config(instance, &mut view);
                    instance.runtime.invoke(&ctx, &view).await
                } else {
                    instance.runtime.invoke(&ctx, state).await
                };
                Ok(Visit::Task {
                    instance: instance.clone(),
                    update,
                })
            }
            Some(GraphNode::Router { kind }) => {
                self.emit(FlowEvent::NodeStart {
                    node_id: node.to_string(),
                    metadata: json!({ "kind": kind.to_string() }),
                })
                .await;
                Ok(Visit::Router { kind: *kind })
            }
            None => Err(FlowError::Execution(format!(
                "node '{}' is not part of the compiled graph",
                node
            ))),
        }
    }

    async fn finish_task(
        &self,
        instance: &Arc<NodeInstance>,
        update: std::result::Result<StateUpdate, NodeError>,
        state: &mut FlowState,
    ) -> Result<()> {
        let node_id = instance.id.as_str();
        let update = update.map_err(|e| {
            tracing::error!(session_id = %self.session_id, node = %node_id, error = %e, "node failed");
            FlowError::node_execution(node_id, e.to_string())
        })?;

        if self.settings.config_as_variables {
            mirror_config(instance, state);
        }
        let output = update.output.clone().unwrap_or(Value::Null);
        state.record_execution(node_id);
        state.apply(node_id, update);
        self.executed.lock().push(node_id.to_string());

        tracing::debug!(session_id = %self.session_id, node = %node_id, "node finished");
        self.emit(FlowEvent::NodeEnd {
            node_id: node_id.to_string(),
            output,
        })
        .await;
        Ok(())
    }

    async fn emit(&self, event: FlowEvent) {
        if let Some(events) = &self.events {
            // the consumer may have gone away; the run is aborted separately
            let _ = events.send(event).await;
        }
    }

    /// Save a snapshot; a failing store never fails the run
    async fn checkpoint(&self, step: usize, node: Option<&str>, state: &FlowState, source: CheckpointSource) {
        let checkpoint = Checkpoint::new(step, node.map(str::to_string), state.to_value())
            .with_metadata(CheckpointMetadata::new().with_source(source));
        if let Err(e) = self.store.save(&self.session_id, checkpoint).await {
            tracing::warn!(
                session_id = %self.session_id,
                store = self.store.name(),
                step,
                error = %e,
                "failed to save checkpoint"
            );
        }
    }
}

/// Legacy mode: a node's static configuration as state variables
fn mirror_config(instance: &NodeInstance, state: &mut FlowState) {
    for (key, value) in &instance.user_data {
        state.set_variable(key.clone(), value.clone());
    }
}
