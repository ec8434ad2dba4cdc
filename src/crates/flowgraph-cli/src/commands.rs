//! Command implementations, separated from argument parsing for testing

use crate::nodes::demo_registry;
use anyhow::{bail, Context, Result};
use flowgraph_core::{
    CompiledFlow, FlowCompiler, FlowDefinition, FlowEvent, FlowSettings, RunInput, RunResult, ValidationReport,
    VisualizationFormat,
};
use futures::StreamExt;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub fn load_definition(path: &Path) -> Result<FlowDefinition> {
    FlowDefinition::from_file(path).with_context(|| format!("failed to load flow definition {}", path.display()))
}

/// Settings from an optional YAML file, then the environment
pub fn load_settings(config: Option<&Path>) -> Result<FlowSettings> {
    let settings = match config {
        Some(path) => FlowSettings::from_yaml_file(path)
            .with_context(|| format!("failed to load settings {}", path.display()))?
            .with_env_overrides()?,
        None => FlowSettings::from_env()?,
    };
    Ok(settings)
}

fn compile(path: &Path, settings: &FlowSettings) -> Result<CompiledFlow> {
    let definition = load_definition(path)?;
    let compiler = FlowCompiler::new(Arc::new(demo_registry())).with_settings(settings.clone());
    Ok(compiler.compile(&definition, None)?)
}

pub fn validate(path: &Path) -> Result<ValidationReport> {
    let definition = load_definition(path)?;
    Ok(flowgraph_core::validate(&definition, &demo_registry()))
}

/// Compiled topology as pretty JSON, or a diagram when `format` is given
pub fn inspect(path: &Path, settings: &FlowSettings, format: Option<VisualizationFormat>) -> Result<String> {
    let flow = compile(path, settings)?;
    match format {
        Some(format) => Ok(flow.visualize(format)),
        None => Ok(serde_json::to_string_pretty(&flow.topology())?),
    }
}

/// Parse `key=value` pairs; values that are valid JSON keep their type
pub fn parse_variables(pairs: &[String]) -> Result<Map<String, Value>> {
    let mut variables = Map::new();
    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            bail!("invalid variable '{}', expected key=value", pair);
        };
        let key = key.trim();
        if key.is_empty() {
            bail!("invalid variable '{}', key is empty", pair);
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        variables.insert(key.to_string(), value);
    }
    Ok(variables)
}

pub async fn run(path: &Path, settings: &FlowSettings, input: RunInput) -> Result<RunResult> {
    let flow = compile(path, settings)?;
    Ok(flow.invoke(input).await)
}

/// Write every event as one JSON line; returns the terminal event
pub async fn run_streaming(
    path: &Path,
    settings: &FlowSettings,
    input: RunInput,
    out: &mut impl Write,
) -> Result<Option<FlowEvent>> {
    let flow = compile(path, settings)?;
    let mut events = flow.stream(input).await;
    let mut terminal = None;

    while let Some(event) = events.next().await {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
        if event.is_terminal() {
            terminal = Some(event);
        }
    }
    out.flush()?;
    Ok(terminal)
}
