//! Compiler topology tests

mod common;

use flowgraph_core::{
    ControlFlowTag, FlowDefinition, FlowError, NodeDefinition, VisualizationFormat, END, START,
};
use proptest::prelude::*;
use serde_json::json;
use std::collections::HashSet;

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

#[test]
fn test_linear_flow_entry_and_exit() {
    let def = FlowDefinition::new()
        .with_node(NodeDefinition::new("a", "Echo"))
        .with_node(NodeDefinition::new("b", "Echo"))
        .with_edge("a", "b");
    let flow = common::compiler().compile(&def, None).unwrap();
    let topology = flow.topology();

    assert_eq!(topology.entry, ids(&["a"]));
    assert_eq!(topology.exit, ids(&["b"]));
    assert_eq!(topology.nodes, ids(&["a", "b"]));
    assert_eq!(
        topology.edges,
        vec![
            ("__start__".to_string(), "a".to_string()),
            ("a".to_string(), "b".to_string()),
            ("b".to_string(), "__end__".to_string()),
        ]
    );
}

#[test]
fn test_unknown_node_type_fails_build() {
    let def = FlowDefinition::new()
        .with_node(NodeDefinition::new("a", "Echo"))
        .with_node(NodeDefinition::new("n1", "LLMNode"))
        .with_edge("a", "n1");
    let err = common::compiler().compile(&def, None).unwrap_err();

    match &err {
        FlowError::UnknownNodeType { node, node_type } => {
            assert_eq!(node, "n1");
            assert_eq!(node_type, "LLMNode");
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert!(err.is_build_error());
    assert_eq!(err.error_type(), "UnknownNodeType");
}

#[test]
fn test_single_branch_conditional_contributes_no_edges() {
    let def = FlowDefinition::new()
        .with_node(NodeDefinition::new("a", "Echo"))
        .with_node(NodeDefinition::new("c", "ConditionNode").with_data("branch_x", json!({"value": "yes"})))
        .with_node(NodeDefinition::new("x", "Echo"))
        .with_edge("a", "c")
        .with_edge("c", "x");
    let flow = common::compiler().compile(&def, None).unwrap();
    let topology = flow.topology();

    assert!(!topology.nodes.contains(&"c".to_string()));
    assert!(topology.edges.iter().all(|(from, to)| from != "c" && to != "c"));
}

#[test]
fn test_conditional_chain_is_an_ordinary_node() {
    let def = FlowDefinition::new().with_node(NodeDefinition::new("chain", "ConditionalChain"));
    let err = common::compiler().compile(&def, None).unwrap_err();
    assert!(matches!(err, FlowError::UnknownNodeType { .. }));
}

#[test]
fn test_explicit_tag_overrides_type_name() {
    let def = FlowDefinition::new()
        .with_node(NodeDefinition::new("a", "Echo"))
        .with_node(NodeDefinition::new("fan", "Fanout").with_control_flow(ControlFlowTag::Parallel))
        .with_node(NodeDefinition::new("b", "Echo"))
        .with_node(NodeDefinition::new("c", "Echo"))
        .with_edge("a", "fan")
        .with_edge("fan", "b")
        .with_edge("fan", "c");
    let flow = common::compiler().compile(&def, None).unwrap();
    let topology = flow.topology();

    assert!(topology.edges.contains(&("fan".to_string(), "b".to_string())));
    assert!(topology.edges.contains(&("fan".to_string(), "c".to_string())));
    assert_eq!(topology.exit, ids(&["b", "c"]));
}

#[test]
fn test_loop_topology() {
    let def = FlowDefinition::new()
        .with_node(NodeDefinition::new("a", "Echo"))
        .with_node(NodeDefinition::new("l", "LoopNode").with_data("max_iterations", json!(2)))
        .with_node(NodeDefinition::new("b", "Append"))
        .with_edge("a", "l")
        .with_edge("l", "b")
        .with_edge("b", "l");
    let flow = common::compiler().compile(&def, None).unwrap();
    let topology = flow.topology();

    assert_eq!(topology.entry, ids(&["a"]));
    assert!(topology.exit.is_empty());
    assert!(topology.edges.contains(&("l".to_string(), "b".to_string())));
    assert!(topology.edges.contains(&("l".to_string(), END.to_string())));
    assert!(topology.edges.contains(&("b".to_string(), "l".to_string())));
}

#[test]
fn test_visualize_compiled_flow() {
    let def = FlowDefinition::new()
        .with_node(NodeDefinition::new("a", "Echo"))
        .with_node(NodeDefinition::new("c", "RouterNode"))
        .with_node(NodeDefinition::new("x", "Echo"))
        .with_node(NodeDefinition::new("y", "Echo"))
        .with_edge("a", "c")
        .with_edge("c", "x")
        .with_edge("c", "y");
    let flow = common::compiler().compile(&def, None).unwrap();

    let mermaid = flow.visualize(VisualizationFormat::Mermaid);
    assert!(mermaid.contains("a[\"a (Echo)\"]"));
    assert!(mermaid.contains("c{\"c [conditional]\"}"));
    assert!(mermaid.contains("c -.-> x"));
    assert!(mermaid.contains("c -.-> y"));

    let dot = flow.visualize(VisualizationFormat::Dot);
    assert!(dot.contains("\"c\" -> \"x\" [style=dashed];"));
    assert!(dot.contains(&format!("\"{}\" -> \"a\";", START)));
}

/// Flows of `count` ordinary nodes with arbitrary edges between them
fn ordinary_flow(count: usize, edges: &[(usize, usize)]) -> FlowDefinition {
    let mut def = FlowDefinition::new();
    for i in 0..count {
        def = def.with_node(NodeDefinition::new(format!("n{}", i), "Echo"));
    }
    for (from, to) in edges {
        def = def.with_edge(format!("n{}", from % count), format!("n{}", to % count));
    }
    def
}

proptest! {
    #[test]
    fn prop_compile_is_idempotent(count in 1usize..8, edges in prop::collection::vec((0usize..8, 0usize..8), 0..12)) {
        let def = ordinary_flow(count, &edges);
        let compiler = common::compiler();

        let first = compiler.compile(&def, None).unwrap().topology();
        let second = compiler.compile(&def, None).unwrap().topology();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_entry_and_exit_of_ordinary_flows(count in 1usize..8, edges in prop::collection::vec((0usize..8, 0usize..8), 0..12)) {
        let def = ordinary_flow(count, &edges);
        let topology = common::compiler().compile(&def, None).unwrap().topology();

        let with_incoming: HashSet<&str> = def.edges.iter().map(|e| e.target.as_str()).collect();
        let with_outgoing: HashSet<&str> = def.edges.iter().map(|e| e.source.as_str()).collect();

        let mut expected_entry: Vec<String> = def
            .nodes
            .iter()
            .filter(|n| !with_incoming.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        if expected_entry.is_empty() {
            expected_entry.push("n0".to_string());
        }
        expected_entry.sort();

        let mut expected_exit: Vec<String> = def
            .nodes
            .iter()
            .filter(|n| !with_outgoing.contains(n.id.as_str()))
            .map(|n| n.id.clone())
            .collect();
        expected_exit.sort();

        prop_assert_eq!(topology.entry, expected_entry);
        prop_assert_eq!(topology.exit, expected_exit);
    }
}
