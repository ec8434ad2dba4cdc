//! Command behavior against flow files on disk

use flowgraph_cli::commands;
use flowgraph_core::{FlowEvent, FlowSettings, RunInput, VisualizationFormat};
use serde_json::{json, Value};
use std::path::PathBuf;
use tempfile::TempDir;

const GREETING: &str = r#"{
  "nodes": [
    {"id": "greet", "type": "Template", "data": {"template": "hi {input}"}},
    {"id": "shout", "type": "Uppercase"}
  ],
  "edges": [
    {"source": "greet", "target": "shout"}
  ]
}"#;

const BRANCHING: &str = r#"
nodes:
  - id: start
    type: Echo
  - id: check
    type: ConditionNode
    data:
      condition_type: contains
      branch_loud:
        value: urgent
  - id: quiet
    type: Echo
  - id: loud
    type: Uppercase
edges:
  - source: start
    target: check
  - source: check
    target: loud
  - source: check
    target: quiet
"#;

fn write_flow(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

fn settings() -> FlowSettings {
    FlowSettings::default().with_persistence_disabled(true)
}

#[test]
fn test_validate_reports_typos() {
    let dir = TempDir::new().unwrap();
    let good = write_flow(&dir, "good.json", GREETING);
    let bad = write_flow(
        &dir,
        "bad.json",
        r#"{"nodes": [{"id": "a", "type": "Uppercas"}], "edges": []}"#,
    );

    assert!(commands::validate(&good).unwrap().valid);

    let report = commands::validate(&bad).unwrap();
    assert!(!report.valid);
    assert!(report.errors[0].contains("did you mean 'Uppercase'?"), "{:?}", report.errors);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = commands::validate(&dir.path().join("absent.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("failed to load flow definition"));
}

#[test]
fn test_inspect_topology_and_diagram() {
    let dir = TempDir::new().unwrap();
    let path = write_flow(&dir, "flow.yaml", BRANCHING);

    let topology: Value = serde_json::from_str(&commands::inspect(&path, &settings(), None).unwrap()).unwrap();
    assert_eq!(topology["entry"], json!(["start"]));

    let diagram = commands::inspect(&path, &settings(), Some(VisualizationFormat::Mermaid)).unwrap();
    assert!(diagram.starts_with("graph TD"));
    assert!(diagram.contains("check -.-> loud"));
}

#[tokio::test]
async fn test_run_follows_condition() {
    let dir = TempDir::new().unwrap();
    let path = write_flow(&dir, "flow.yaml", BRANCHING);

    let result = commands::run(&path, &settings(), RunInput::new("urgent: disk full"))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.output, json!("URGENT: DISK FULL"));
    assert_eq!(result.executed_nodes, vec!["start", "loud"]);

    let result = commands::run(&path, &settings(), RunInput::new("all good")).await.unwrap();
    assert_eq!(result.output, json!("all good"));
    assert_eq!(result.executed_nodes, vec!["start", "quiet"]);
}

#[tokio::test]
async fn test_run_with_variables() {
    let dir = TempDir::new().unwrap();
    let path = write_flow(
        &dir,
        "flow.json",
        r#"{"nodes": [{"id": "t", "type": "Template", "data": {"template": "{var.name} x{var.count}"}}]}"#,
    );

    let mut input = RunInput::new("");
    input.variables = commands::parse_variables(&["name=ada".to_string(), "count=2".to_string()]).unwrap();
    let result = commands::run(&path, &settings(), input).await.unwrap();
    assert_eq!(result.output, json!("ada x2"));
}

#[tokio::test]
async fn test_streaming_writes_json_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_flow(&dir, "flow.json", GREETING);

    let mut out = Vec::new();
    let terminal = commands::run_streaming(&path, &settings(), RunInput::new("bob"), &mut out)
        .await
        .unwrap();
    assert!(matches!(terminal, Some(FlowEvent::Complete { .. })));

    let lines: Vec<Value> = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let types: Vec<&str> = lines.iter().map(|line| line["type"].as_str().unwrap()).collect();
    assert_eq!(
        types,
        vec!["start", "node_start", "node_end", "node_start", "node_end", "complete"]
    );
    assert_eq!(lines.last().unwrap()["result"], json!("HI BOB"));
}

#[tokio::test]
async fn test_streaming_failure_ends_with_error() {
    let dir = TempDir::new().unwrap();
    let path = write_flow(
        &dir,
        "flow.json",
        r#"{"nodes": [{"id": "t", "type": "Template"}]}"#,
    );

    let mut out = Vec::new();
    let terminal = commands::run_streaming(&path, &settings(), RunInput::new("x"), &mut out)
        .await
        .unwrap();
    match terminal {
        Some(FlowEvent::Error { error_type, .. }) => assert_eq!(error_type, "NodeExecution"),
        other => panic!("unexpected terminal event {:?}", other),
    }
}

#[test]
fn test_settings_file() {
    let dir = TempDir::new().unwrap();
    let path = write_flow(&dir, "settings.yaml", "step_limit: 12\ndisable_persistence: true\n");

    let loaded = commands::load_settings(Some(&path)).unwrap();
    assert_eq!(loaded.step_limit, 12);
    assert!(loaded.disable_persistence);
}
