//! Runtime settings for the compiler and execution driver
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! environment variables.
//!
//! | field | env | default |
//! |-------|-----|---------|
//! | `disable_persistence` | `FLOWGRAPH_DISABLE_PERSISTENCE` | `false` |
//! | `checkpoint_dir` | `FLOWGRAPH_CHECKPOINT_DIR` | unset |
//! | `step_limit` | `FLOWGRAPH_STEP_LIMIT` | `256` |
//! | `stream_buffer` | `FLOWGRAPH_STREAM_BUFFER` | `100` |
//! | `config_as_variables` | `FLOWGRAPH_CONFIG_AS_VARIABLES` | `false` |

use crate::error::{FlowError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "FLOWGRAPH";

pub const DEFAULT_STEP_LIMIT: usize = 256;
pub const DEFAULT_STREAM_BUFFER: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSettings {
    /// Bind the no-op checkpoint store regardless of what else is configured
    pub disable_persistence: bool,

    /// Directory of the durable file-backed checkpoint store
    pub checkpoint_dir: Option<PathBuf>,

    /// Maximum node visits per run
    pub step_limit: usize,

    /// Event channel capacity for streaming runs
    pub stream_buffer: usize,

    /// Also copy each node's static configuration into the state variables
    /// before it runs
    pub config_as_variables: bool,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            disable_persistence: false,
            checkpoint_dir: None,
            step_limit: DEFAULT_STEP_LIMIT,
            stream_buffer: DEFAULT_STREAM_BUFFER,
            config_as_variables: false,
        }
    }
}

impl FlowSettings {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Settings from a YAML file, missing fields take their defaults
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Apply `FLOWGRAPH_*` variables from the process environment
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `lookup` (keys are full variable names)
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |suffix: &str| {
            let key = build_env_key(suffix);
            lookup(&key).map(|value| (key, value))
        };

        if let Some((key, value)) = read("DISABLE_PERSISTENCE") {
            self.disable_persistence = parse_bool(&key, &value)?;
        }
        if let Some((_, value)) = read("CHECKPOINT_DIR") {
            self.checkpoint_dir = if value.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }
        if let Some((key, value)) = read("STEP_LIMIT") {
            self.step_limit = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("STREAM_BUFFER") {
            self.stream_buffer = parse_value(&key, &value)?;
        }
        if let Some((key, value)) = read("CONFIG_AS_VARIABLES") {
            self.config_as_variables = parse_bool(&key, &value)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn with_persistence_disabled(mut self, disabled: bool) -> Self {
        self.disable_persistence = disabled;
        self
    }

    pub fn with_checkpoint_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.checkpoint_dir = Some(dir.into());
        self
    }

    pub fn with_step_limit(mut self, limit: usize) -> Self {
        self.step_limit = limit;
        self
    }

    pub fn with_config_as_variables(mut self, enabled: bool) -> Self {
        self.config_as_variables = enabled;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.step_limit == 0 {
            return Err(FlowError::Configuration(
                "step_limit must be greater than zero".to_string(),
            ));
        }
        if self.stream_buffer == 0 {
            return Err(FlowError::Configuration(
                "stream_buffer must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// `build_env_key("STEP_LIMIT") == "FLOWGRAPH_STEP_LIMIT"`
pub fn build_env_key(suffix: &str) -> String {
    format!("{}_{}", ENV_PREFIX, suffix)
}

/// Recognizes "true", "1", "yes", "on" and "false", "0", "no", "off"
/// (case-insensitive).
fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(FlowError::Configuration(format!(
            "Invalid boolean value for {}: {}",
            key, value
        ))),
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        FlowError::Configuration(format!(
            "Failed to parse environment variable {}: {}",
            key, e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = FlowSettings::default();
        assert!(!settings.disable_persistence);
        assert_eq!(settings.step_limit, 256);
        assert_eq!(settings.stream_buffer, 100);
        assert!(settings.checkpoint_dir.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let settings = FlowSettings::default()
            .with_overrides_from(lookup(&[
                ("FLOWGRAPH_DISABLE_PERSISTENCE", "yes"),
                ("FLOWGRAPH_STEP_LIMIT", "12"),
                ("FLOWGRAPH_CHECKPOINT_DIR", "/var/lib/flowgraph"),
                ("FLOWGRAPH_CONFIG_AS_VARIABLES", "On"),
            ]))
            .unwrap();

        assert!(settings.disable_persistence);
        assert!(settings.config_as_variables);
        assert_eq!(settings.step_limit, 12);
        assert_eq!(
            settings.checkpoint_dir,
            Some(PathBuf::from("/var/lib/flowgraph"))
        );
    }

    #[test]
    fn test_malformed_values_are_configuration_errors() {
        let err = FlowSettings::default()
            .with_overrides_from(lookup(&[("FLOWGRAPH_DISABLE_PERSISTENCE", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));

        let err = FlowSettings::default()
            .with_overrides_from(lookup(&[("FLOWGRAPH_STEP_LIMIT", "lots")]))
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));

        let err = FlowSettings::default()
            .with_overrides_from(lookup(&[("FLOWGRAPH_STREAM_BUFFER", "0")]))
            .unwrap_err();
        assert!(matches!(err, FlowError::Configuration(_)));
    }

    #[test]
    fn test_yaml_layer_keeps_defaults_for_missing_fields() {
        let settings = FlowSettings::from_yaml_str("step_limit: 40\ndisable_persistence: true\n").unwrap();
        assert_eq!(settings.step_limit, 40);
        assert!(settings.disable_persistence);
        assert_eq!(settings.stream_buffer, DEFAULT_STREAM_BUFFER);
    }

    #[test]
    fn test_yaml_file_then_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flowgraph.yaml");
        std::fs::write(&path, "stream_buffer: 8\n").unwrap();

        let settings = FlowSettings::from_yaml_file(&path)
            .unwrap()
            .with_overrides_from(lookup(&[("FLOWGRAPH_STREAM_BUFFER", "16")]))
            .unwrap();
        assert_eq!(settings.stream_buffer, 16);
    }
}
