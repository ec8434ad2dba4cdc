//! Compiled flows and their execution driver
//!
//! A [`CompiledFlow`] is the immutable result of [`FlowCompiler::compile`].
//! It can be run any number of times, concurrently, in two modes:
//!
//! - [`CompiledFlow::invoke`] runs to completion and returns a [`RunResult`]
//! - [`CompiledFlow::stream`] returns an [`EventStream`] of [`FlowEvent`]s
//!
//! Every run follows `Built → Running → {Completed, Failed}` and saves a
//! checkpoint after each node visit to the store bound at compile time, so
//! [`CompiledFlow::get_state`] and [`CompiledFlow::state_history`] can read
//! a session back.
//!
//! [`FlowCompiler::compile`]: crate::FlowCompiler::compile

mod driver;
mod execution;
mod graph;
mod introspection;
mod streaming;
mod types;

pub use graph::CompiledFlow;
pub use types::{EventStream, FlowEvent, RunError, RunResult, RunStatus, StateSnapshot, Topology};
