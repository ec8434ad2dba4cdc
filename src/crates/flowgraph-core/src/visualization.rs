//! Render compiled flows as Mermaid or Graphviz DOT
//!
//! Output is deterministic: nodes follow declaration order and edges follow
//! insertion order, so diagrams can be diffed between compiles.
//!
//! Conventions:
//!
//! - `START`/`END` are circles
//! - ordinary nodes are boxes labelled `id (type)`
//! - control-flow routers are diamonds; their routed edges are dashed

use crate::graph::{Edge, FlowGraph, GraphNode, NodeId, END, START};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VisualizationFormat {
    #[default]
    Mermaid,
    Dot,
}

impl FromStr for VisualizationFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mermaid" => Ok(VisualizationFormat::Mermaid),
            "dot" | "graphviz" => Ok(VisualizationFormat::Dot),
            other => Err(format!("unknown visualization format '{}'", other)),
        }
    }
}

pub fn visualize(graph: &FlowGraph, format: VisualizationFormat) -> String {
    match format {
        VisualizationFormat::Mermaid => visualize_mermaid(graph),
        VisualizationFormat::Dot => visualize_dot(graph),
    }
}

fn node_label(id: &str, node: &GraphNode) -> String {
    match node {
        GraphNode::Task(instance) => format!("{} ({})", id, instance.node_type),
        GraphNode::Router { kind } => format!("{} [{}]", id, kind),
    }
}

/// Edge sources in a stable order: START, then declared nodes
fn edge_sources(graph: &FlowGraph) -> Vec<NodeId> {
    std::iter::once(START.to_string())
        .chain(graph.node_ids().iter().cloned())
        .filter(|id| !graph.edges_from(id).is_empty())
        .collect()
}

fn visualize_mermaid(graph: &FlowGraph) -> String {
    let mut output = String::from("graph TD\n");

    output.push_str(&format!("    {}((START))\n", sanitize_id(START)));
    output.push_str(&format!("    {}((END))\n", sanitize_id(END)));

    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else { continue };
        let label = escape_mermaid(&node_label(id, node));
        match node {
            GraphNode::Task(_) => output.push_str(&format!("    {}[\"{}\"]\n", sanitize_id(id), label)),
            GraphNode::Router { .. } => output.push_str(&format!("    {}{{\"{}\"}}\n", sanitize_id(id), label)),
        }
    }

    for from in edge_sources(graph) {
        for edge in graph.edges_from(&from) {
            match edge {
                Edge::Direct(to) => {
                    output.push_str(&format!("    {} --> {}\n", sanitize_id(&from), sanitize_id(to)));
                }
                Edge::Conditional { branches, .. } => {
                    for to in branches {
                        output.push_str(&format!("    {} -.-> {}\n", sanitize_id(&from), sanitize_id(to)));
                    }
                }
            }
        }
    }

    output
}

fn visualize_dot(graph: &FlowGraph) -> String {
    let mut output = String::new();
    output.push_str("digraph flow {\n");
    output.push_str("    rankdir=TB;\n");
    output.push_str("    node [shape=box, style=rounded];\n");
    output.push_str(&format!("    \"{}\" [shape=circle, style=filled, fillcolor=green];\n", START));
    output.push_str(&format!("    \"{}\" [shape=circle, style=filled, fillcolor=red];\n", END));

    for id in graph.node_ids() {
        let Some(node) = graph.node(id) else { continue };
        let shape = match node {
            GraphNode::Task(_) => "",
            GraphNode::Router { .. } => ", shape=diamond",
        };
        output.push_str(&format!(
            "    \"{}\" [label=\"{}\"{}];\n",
            escape_dot(id),
            escape_dot(&node_label(id, node)),
            shape
        ));
    }

    for from in edge_sources(graph) {
        for edge in graph.edges_from(&from) {
            match edge {
                Edge::Direct(to) => {
                    output.push_str(&format!("    \"{}\" -> \"{}\";\n", escape_dot(&from), escape_dot(to)));
                }
                Edge::Conditional { branches, .. } => {
                    for to in branches {
                        output.push_str(&format!(
                            "    \"{}\" -> \"{}\" [style=dashed];\n",
                            escape_dot(&from),
                            escape_dot(to)
                        ));
                    }
                }
            }
        }
    }

    output.push_str("}\n");
    output
}

fn escape_dot(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn escape_mermaid(s: &str) -> String {
    s.replace('"', "&quot;").replace('<', "&lt;").replace('>', "&gt;")
}

/// Mermaid ids must be alphanumeric plus underscore; `end` is a keyword
fn sanitize_id(s: &str) -> String {
    match s {
        START => return "flow_start".to_string(),
        END => return "flow_end".to_string(),
        _ => {}
    }
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}
