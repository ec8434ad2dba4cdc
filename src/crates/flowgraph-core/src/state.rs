//! Per-run flow state
//!
//! One [`FlowState`] is threaded through every node of a branch. Parallel fan-out
//! clones it (serde_json values clone deeply), so parallel branches never
//! observe each other's writes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Mutable record threaded through a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowState {
    pub current_input: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub last_output: Value,
    /// Node ids in visit order; only ever appended to
    #[serde(default)]
    pub executed_nodes: Vec<String>,
    /// Latest output of each ordinary node
    #[serde(default)]
    pub node_outputs: Map<String, Value>,
}

impl FlowState {
    pub fn new(current_input: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            current_input: current_input.into(),
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn node_output(&self, node_id: &str) -> Option<&Value> {
        self.node_outputs.get(node_id)
    }

    /// Resolve a routing field name
    ///
    /// Checks the built-in fields (`last_output`, `current_input`,
    /// `session_id`, `user_id`, `workflow_id`), then variables (dotted paths
    /// descend into objects), then node outputs by node id. Falls back to
    /// `last_output` when nothing matches.
    pub fn lookup(&self, field: &str) -> Value {
        match field {
            "last_output" => return self.last_output.clone(),
            "current_input" => return Value::String(self.current_input.clone()),
            "session_id" => return Value::String(self.session_id.clone()),
            "user_id" => return self.user_id.clone().map(Value::String).unwrap_or(Value::Null),
            "workflow_id" => {
                return self
                    .workflow_id
                    .clone()
                    .map(Value::String)
                    .unwrap_or(Value::Null)
            }
            _ => {}
        }

        if let Some(value) = self.variables.get(field) {
            return value.clone();
        }

        let mut parts = field.split('.');
        if let Some(first) = parts.next() {
            if let Some(root) = self.variables.get(first) {
                let nested = parts.try_fold(root, |current, part| match current {
                    Value::Object(map) => map.get(part),
                    Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => None,
                });
                if let Some(value) = nested {
                    return value.clone();
                }
            }
        }

        if let Some(output) = self.node_outputs.get(field) {
            return output.clone();
        }

        self.last_output.clone()
    }

    pub(crate) fn record_execution(&mut self, node_id: &str) {
        self.executed_nodes.push(node_id.to_string());
    }

    /// Apply a node's partial update
    pub(crate) fn apply(&mut self, node_id: &str, update: StateUpdate) {
        for (key, value) in update.variables {
            self.variables.insert(key, value);
        }
        if let Some(output) = update.output {
            self.node_outputs.insert(node_id.to_string(), output.clone());
            self.last_output = output;
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Partial state update returned by a node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    pub output: Option<Value>,
    pub variables: Map<String, Value>,
}

impl StateUpdate {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn output(value: impl Into<Value>) -> Self {
        Self {
            output: Some(value.into()),
            variables: Map::new(),
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// String view used by routing: strings verbatim, `null` as empty, anything
/// else as compact JSON
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_tracks_outputs() {
        let mut state = FlowState::new("hi", "s1");
        state.apply("a", StateUpdate::output("one").with_variable("k", 1));
        state.apply("b", StateUpdate::output(json!({"n": 2})));
        state.apply("c", StateUpdate::empty());

        assert_eq!(state.last_output, json!({"n": 2}));
        assert_eq!(state.node_output("a"), Some(&json!("one")));
        assert_eq!(state.get_variable("k"), Some(&json!(1)));
        assert!(state.node_output("c").is_none());
    }

    #[test]
    fn test_lookup_order_and_fallback() {
        let mut state = FlowState::new("in", "s1");
        state.last_output = json!("last");
        state.set_variable("route", json!("left"));
        state.set_variable("payload", json!({"inner": {"score": 3}, "list": [5, 6]}));
        state.node_outputs.insert("classifier".into(), json!("spam"));

        assert_eq!(state.lookup("route"), json!("left"));
        assert_eq!(state.lookup("payload.inner.score"), json!(3));
        assert_eq!(state.lookup("payload.list.1"), json!(6));
        assert_eq!(state.lookup("classifier"), json!("spam"));
        assert_eq!(state.lookup("current_input"), json!("in"));
        assert_eq!(state.lookup("nope"), json!("last"));
        assert_eq!(state.lookup("payload.missing"), json!("last"));
    }

    #[test]
    fn test_clone_is_independent() {
        let mut original = FlowState::new("x", "s");
        original.set_variable("obj", json!({"a": [1]}));
        let mut copy = original.clone();
        copy.variables["obj"]["a"][0] = json!(99);
        copy.record_execution("n");

        assert_eq!(original.variables["obj"]["a"][0], json!(1));
        assert!(original.executed_nodes.is_empty());
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(&json!("plain")), "plain");
        assert_eq!(value_to_text(&json!(null)), "");
        assert_eq!(value_to_text(&json!(1.5)), "1.5");
        assert_eq!(value_to_text(&json!(true)), "true");
    }
}
