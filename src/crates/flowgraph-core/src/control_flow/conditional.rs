//! Conditional routing
//!
//! Configuration (node `data`):
//!
//! ```json
//! {
//!   "condition_field": "last_output",
//!   "condition_type": "contains",
//!   "branch_approve": {"value": "yes"},
//!   "branch_escalate": {"expression": "len(value) > 200"}
//! }
//! ```
//!
//! At run time the router reads `condition_field` from the state, tries the
//! branch rules in outgoing-edge order and takes the first match. When no rule
//! matches it takes the first outgoing edge, so routing never dead-ends.
//!
//! A branch without a `branch_<target>` entry (or whose rule has no `value`)
//! compares against `""` for `contains` and `equals` and against `0` for
//! `greater_than`. Under `contains` such a branch matches anything, which
//! makes it a catch-all for the branches after it. A `custom` branch without
//! an expression never matches.

use super::{ControlFlowEntry, SynthesisContext};
use crate::error::{FlowError, Result};
use crate::graph::{FlowGraph, NodeId, Router};
use crate::predicate::{as_number, Predicate};
use crate::state::{value_to_text, FlowState};
use serde_json::{Map, Value};
use std::str::FromStr;
use std::sync::Arc;

pub const DEFAULT_CONDITION_FIELD: &str = "last_output";
pub const BRANCH_PREFIX: &str = "branch_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionType {
    /// Branch value is a substring of the routed value
    #[default]
    Contains,
    /// Routed value equals the branch value as text
    Equals,
    /// Routed value is numerically greater than the branch value
    GreaterThan,
    /// Branch carries a restricted boolean expression over `value`
    Custom,
}

impl FromStr for ConditionType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contains" => Ok(ConditionType::Contains),
            "equals" => Ok(ConditionType::Equals),
            "greater_than" => Ok(ConditionType::GreaterThan),
            "custom" => Ok(ConditionType::Custom),
            other => Err(format!(
                "unknown condition_type '{}' (expected contains, equals, greater_than or custom)",
                other
            )),
        }
    }
}

/// Rule attached to one branch
#[derive(Debug, Clone)]
pub enum BranchRule {
    Never,
    Value(Value),
    Expression(Predicate),
}

impl BranchRule {
    /// Read `branch_<target>` from the node config
    ///
    /// Accepts `{"value": ..}`, `{"expression": ".."}` or a bare value. A
    /// custom expression that is missing or does not parse becomes
    /// [`BranchRule::Never`].
    pub fn from_config(node_id: &str, target: &str, condition_type: ConditionType, config: &Map<String, Value>) -> Self {
        let Some(raw) = config.get(&format!("{}{}", BRANCH_PREFIX, target)) else {
            return Self::missing(condition_type);
        };

        if condition_type == ConditionType::Custom {
            let source = match raw {
                Value::Object(map) => map.get("expression").and_then(Value::as_str),
                Value::String(s) => Some(s.as_str()),
                _ => None,
            };
            let Some(source) = source else {
                return BranchRule::Never;
            };
            return match Predicate::parse(source) {
                Ok(predicate) => BranchRule::Expression(predicate),
                Err(e) => {
                    tracing::warn!(
                        node = %node_id,
                        branch = %target,
                        expression = %source,
                        error = %e,
                        "invalid branch expression, branch will never match"
                    );
                    BranchRule::Never
                }
            };
        }

        match raw {
            Value::Object(map) => map
                .get("value")
                .cloned()
                .map(BranchRule::Value)
                .unwrap_or_else(|| Self::missing(condition_type)),
            other => BranchRule::Value(other.clone()),
        }
    }

    /// Rule used when a branch configures no value
    fn missing(condition_type: ConditionType) -> Self {
        match condition_type {
            ConditionType::Contains | ConditionType::Equals => BranchRule::Value(Value::String(String::new())),
            ConditionType::GreaterThan => BranchRule::Value(Value::from(0)),
            ConditionType::Custom => BranchRule::Never,
        }
    }

    pub fn matches(&self, condition_type: ConditionType, value: &Value) -> bool {
        match (self, condition_type) {
            (BranchRule::Never, _) => false,
            (BranchRule::Expression(predicate), _) => predicate.matches(value),
            (BranchRule::Value(expected), ConditionType::Contains) => {
                value_to_text(value).contains(&value_to_text(expected))
            }
            (BranchRule::Value(expected), ConditionType::Equals) => {
                value_to_text(value) == value_to_text(expected)
            }
            (BranchRule::Value(expected), ConditionType::GreaterThan) => {
                match (as_number(value), as_number(expected)) {
                    (Some(actual), Some(threshold)) => actual > threshold,
                    _ => false,
                }
            }
            (BranchRule::Value(_), ConditionType::Custom) => false,
        }
    }
}

/// Validated conditional configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConditionalConfig {
    pub field: String,
    pub condition_type: ConditionType,
}

impl ConditionalConfig {
    pub fn parse(node_id: &str, config: &Map<String, Value>) -> Result<Self> {
        let field = match config.get("condition_field") {
            None | Some(Value::Null) => DEFAULT_CONDITION_FIELD.to_string(),
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(other) => {
                return Err(FlowError::invalid_control_flow(
                    node_id,
                    format!("condition_field must be a non-empty string, got {}", other),
                ))
            }
        };

        let condition_type = match config.get("condition_type") {
            None | Some(Value::Null) => ConditionType::default(),
            Some(Value::String(s)) => s
                .parse()
                .map_err(|reason: String| FlowError::invalid_control_flow(node_id, reason))?,
            Some(other) => {
                return Err(FlowError::invalid_control_flow(
                    node_id,
                    format!("condition_type must be a string, got {}", other),
                ))
            }
        };

        Ok(Self {
            field,
            condition_type,
        })
    }
}

pub struct ConditionalRouter {
    node_id: String,
    config: ConditionalConfig,
    /// (destination, rule) in outgoing-edge order
    branches: Vec<(NodeId, BranchRule)>,
}

impl ConditionalRouter {
    pub fn new(node_id: impl Into<String>, config: ConditionalConfig, branches: Vec<(NodeId, BranchRule)>) -> Self {
        Self {
            node_id: node_id.into(),
            config,
            branches,
        }
    }

    /// Destination for an already resolved routing value
    pub fn select(&self, value: &Value) -> Option<&NodeId> {
        self.branches
            .iter()
            .find(|(_, rule)| rule.matches(self.config.condition_type, value))
            .or_else(|| self.branches.first())
            .map(|(target, _)| target)
    }
}

impl Router for ConditionalRouter {
    fn route(&self, state: &mut FlowState) -> NodeId {
        let value = state.lookup(&self.config.field);
        let target = self
            .select(&value)
            .cloned()
            .unwrap_or_else(|| crate::graph::END.to_string());
        tracing::debug!(
            node = %self.node_id,
            field = %self.config.field,
            target = %target,
            "conditional routed"
        );
        target
    }

    fn destinations(&self) -> Vec<NodeId> {
        let mut targets: Vec<NodeId> = Vec::with_capacity(self.branches.len());
        for (target, _) in &self.branches {
            if !targets.contains(target) {
                targets.push(target.clone());
            }
        }
        targets
    }
}

pub(crate) fn synthesize(graph: &mut FlowGraph, entry: &ControlFlowEntry, ctx: &SynthesisContext<'_>) -> Result<()> {
    let config = ConditionalConfig::parse(&entry.node_id, &entry.config)?;
    let branches = ctx
        .outgoing(&entry.node_id)
        .into_iter()
        .map(|conn| {
            let rule = BranchRule::from_config(
                &entry.node_id,
                &conn.target_node_id,
                config.condition_type,
                &entry.config,
            );
            (ctx.resolve(&conn.target_node_id), rule)
        })
        .collect();

    let router = ConditionalRouter::new(entry.node_id.clone(), config, branches);
    graph.add_conditional_edge(entry.node_id.clone(), Arc::new(router));
    Ok(())
}
