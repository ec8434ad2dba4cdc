//! Control-flow classification of node definitions
//!
//! An explicit `controlFlow` tag on the definition always wins. Without one,
//! the lower-cased type name decides, checked in this order:
//!
//! 1. contains `condition` or `router` → [`ControlFlowKind::Conditional`]
//! 2. contains `loop` → [`ControlFlowKind::Loop`]
//! 3. contains `parallel` → [`ControlFlowKind::Parallel`]
//!
//! Types listed in [`REGULAR_NODE_TYPES`] are ordinary nodes whatever their
//! name contains.

use crate::definition::NodeDefinition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower-cased type names that are ordinary processing nodes even though the
/// naming convention would classify them
pub const REGULAR_NODE_TYPES: &[&str] = &["conditionalchain"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlFlowKind {
    Conditional,
    Loop,
    Parallel,
}

impl fmt::Display for ControlFlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlFlowKind::Conditional => write!(f, "conditional"),
            ControlFlowKind::Loop => write!(f, "loop"),
            ControlFlowKind::Parallel => write!(f, "parallel"),
        }
    }
}

/// Explicit role tag a definition may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlFlowTag {
    Conditional,
    Loop,
    Parallel,
    /// Force an ordinary node
    #[serde(rename = "none", alias = "regular")]
    Regular,
}

impl ControlFlowTag {
    pub fn kind(self) -> Option<ControlFlowKind> {
        match self {
            ControlFlowTag::Conditional => Some(ControlFlowKind::Conditional),
            ControlFlowTag::Loop => Some(ControlFlowKind::Loop),
            ControlFlowTag::Parallel => Some(ControlFlowKind::Parallel),
            ControlFlowTag::Regular => None,
        }
    }
}

/// Classify by type name alone
pub fn classify_type(node_type: &str) -> Option<ControlFlowKind> {
    let lowered = node_type.to_lowercase();
    if REGULAR_NODE_TYPES.contains(&lowered.as_str()) {
        return None;
    }

    if lowered.contains("condition") || lowered.contains("router") {
        Some(ControlFlowKind::Conditional)
    } else if lowered.contains("loop") {
        Some(ControlFlowKind::Loop)
    } else if lowered.contains("parallel") {
        Some(ControlFlowKind::Parallel)
    } else {
        None
    }
}

pub fn classify(node: &NodeDefinition) -> Option<ControlFlowKind> {
    match node.control_flow {
        Some(tag) => tag.kind(),
        None => classify_type(&node.node_type),
    }
}
