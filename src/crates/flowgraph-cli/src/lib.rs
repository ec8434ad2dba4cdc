//! # flowgraph-cli
//!
//! Library half of the `flowgraph` binary: demo node types and the command
//! implementations behind `validate`, `inspect` and `run`.

pub mod commands;
pub mod nodes;

pub use nodes::demo_registry;
