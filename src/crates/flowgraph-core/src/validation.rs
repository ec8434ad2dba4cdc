//! Pre-compile checks of a flow definition
//!
//! [`validate`] collects every problem instead of stopping at the first one,
//! so an editor can show them all at once. Anything reported as an error
//! would also make [`FlowCompiler::compile`] fail; warnings describe flows
//! that compile but probably do not do what their author meant.
//!
//! [`FlowCompiler::compile`]: crate::FlowCompiler::compile

use crate::connection::{outgoing, parse_connections};
use crate::control_flow::{classify, ControlFlowEntry, ControlFlowKind};
use crate::definition::FlowDefinition;
use crate::node::NodeRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn finish(mut self) -> Self {
        self.valid = self.errors.is_empty();
        self
    }
}

pub fn validate(definition: &FlowDefinition, registry: &NodeRegistry) -> ValidationReport {
    let mut report = ValidationReport::default();

    if definition.nodes.is_empty() {
        report.errors.push("flow has no nodes".to_string());
        return report.finish();
    }
    if definition.edges.is_empty() && definition.nodes.len() > 1 {
        report
            .warnings
            .push("flow has no edges; every node runs as its own entry".to_string());
    }

    let mut seen = HashSet::new();
    for node in &definition.nodes {
        if !seen.insert(node.id.as_str()) {
            report.errors.push(format!("duplicate node id '{}'", node.id));
        }
    }

    for edge in &definition.edges {
        for endpoint in [&edge.source, &edge.target] {
            if !seen.contains(endpoint.as_str()) {
                report.errors.push(format!(
                    "edge {} -> {} references unknown node '{}'",
                    edge.source, edge.target, endpoint
                ));
            }
        }
    }

    let connections = parse_connections(&definition.edges);
    for node in &definition.nodes {
        match classify(node) {
            Some(kind) => {
                let entry = ControlFlowEntry::new(node.id.clone(), kind, node.data.clone());
                if let Err(e) = entry.validate_config() {
                    report.errors.push(e.to_string());
                }
                let count = outgoing(&connections, &node.id).len();
                if count < entry.required_outgoing() {
                    report.warnings.push(match kind {
                        ControlFlowKind::Conditional => format!(
                            "conditional node '{}' has {} outgoing edge(s), needs at least 2; it will be dropped",
                            node.id, count
                        ),
                        _ => format!(
                            "{} node '{}' has no outgoing edges; it will be dropped",
                            kind, node.id
                        ),
                    });
                }
            }
            None if !registry.contains(&node.node_type) => {
                let mut message = format!("node '{}' has unknown type '{}'", node.id, node.node_type);
                if let Some(suggestion) = suggest(&node.node_type, &registry.node_types()) {
                    message.push_str(&format!("; did you mean '{}'?", suggestion));
                }
                report.errors.push(message);
            }
            None => {}
        }
    }

    report.finish()
}

/// Closest registered type, if it is plausibly a typo
fn suggest<'a>(unknown: &str, known: &[&'a str]) -> Option<&'a str> {
    let lowered = unknown.to_lowercase();
    known
        .iter()
        .map(|candidate| (edit_distance(&lowered, &candidate.to_lowercase()), *candidate))
        .filter(|(distance, candidate)| *distance <= (candidate.len() / 3).max(1))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, candidate)| candidate)
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    let mut current = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = previous[j] + usize::from(ca != *cb);
            current[j + 1] = substitution.min(previous[j + 1] + 1).min(current[j] + 1);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b.len()]
}
