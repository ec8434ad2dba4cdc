//! # flowgraph-core - Visual Flows Compiled to Executable Graphs
//!
//! Turns a declarative flow description (node records plus directed edges,
//! as produced by a visual editor) into an executable graph, then drives that
//! graph to completion, either blocking or as a live event stream.
//!
//! ## Overview
//!
//! - **Definitions** - [`FlowDefinition`] loaded from JSON or YAML
//! - **Compilation** - [`FlowCompiler`] resolves node types through a
//!   [`NodeRegistry`], synthesizes control flow and wires `START`/`END`
//! - **Control flow** - conditional routing, bounded loops and parallel
//!   fan-out, recognized by type name or an explicit `controlFlow` tag
//! - **Execution** - [`CompiledFlow::invoke`] and [`CompiledFlow::stream`]
//! - **Checkpoints** - a snapshot after every node visit, readable through
//!   [`CompiledFlow::get_state`]
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use flowgraph_core::{
//!     FlowCompiler, FlowDefinition, FlowNode, FlowState, NodeContext, NodeDefinition,
//!     NodeError, NodeRegistry, RunInput, StateUpdate,
//! };
//! use std::sync::Arc;
//!
//! struct Echo;
//!
//! #[async_trait]
//! impl FlowNode for Echo {
//!     async fn invoke(&self, _ctx: &NodeContext, state: &FlowState) -> Result<StateUpdate, NodeError> {
//!         Ok(StateUpdate::output(state.current_input.clone()))
//!     }
//! }
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Runtime::new().unwrap();
//! # rt.block_on(async {
//! let registry = NodeRegistry::new().with("Echo", || Echo);
//! let definition = FlowDefinition::new()
//!     .with_node(NodeDefinition::new("a", "Echo"))
//!     .with_node(NodeDefinition::new("b", "Echo"))
//!     .with_edge("a", "b");
//!
//! let flow = FlowCompiler::new(Arc::new(registry)).compile(&definition, None).unwrap();
//! let result = flow.invoke(RunInput::new("hello")).await;
//!
//! assert!(result.success);
//! assert_eq!(result.executed_nodes, vec!["a", "b"]);
//! assert_eq!(result.output, "hello");
//! # });
//! # }
//! ```
//!
//! ## Control-Flow Nodes
//!
//! | kind | recognized by | needs | behaviour |
//! |------|---------------|-------|-----------|
//! | conditional | type contains `condition` or `router` | 2 outgoing edges | first matching branch, else first edge |
//! | loop | type contains `loop` | 1 outgoing edge | re-enter the body `max_iterations` times |
//! | parallel | type contains `parallel` | 1 outgoing edge | one branch per edge, each with its own state |
//!
//! See [`control_flow`] for configuration details.

pub mod compiled;
pub mod compiler;
pub mod config;
pub mod connection;
pub mod control_flow;
pub mod credentials;
pub mod definition;
pub mod engine;
pub mod error;
pub mod graph;
pub mod instance;
pub mod node;
pub mod predicate;
pub mod state;
pub mod validation;
pub mod visualization;

pub use compiled::{CompiledFlow, EventStream, FlowEvent, RunError, RunResult, RunStatus, StateSnapshot, Topology};
pub use compiler::{select_checkpoint_store, FlowCompiler};
pub use config::FlowSettings;
pub use connection::{parse_connections, Connection};
pub use control_flow::{classify, classify_type, ControlFlowKind, ControlFlowTag};
pub use credentials::{CredentialGuard, CredentialProvider, InMemoryCredentialProvider, NoopCredentials};
pub use definition::{EdgeDefinition, FlowDefinition, NodeDefinition, RunInput};
pub use engine::FlowEngine;
pub use error::{FlowError, NodeError, Result};
pub use graph::{FlowGraph, NodeId, END, START};
pub use instance::{InputSource, NodeInstance, OutputTarget};
pub use node::{FlowNode, NodeContext, NodeFactory, NodeRegistry};
pub use predicate::Predicate;
pub use state::{FlowState, StateUpdate};
pub use validation::{validate, ValidationReport};
pub use visualization::VisualizationFormat;

pub use flowgraph_checkpoint::{CheckpointStore, FileCheckpointStore, InMemoryCheckpointStore, NoopCheckpointStore};
