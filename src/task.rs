//! Primitive Tasks
//!
//! A `Task` is one primitive action request handed to the external executor:
//! an action name plus its parameters. `ActionOutcome` is what the executor
//! reports back once the action has finished.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered parameter map shared by tasks and action records
pub type Parameters = BTreeMap<String, Value>;

/// A primitive action request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Action type name (e.g. "mine", "place")
    pub action: String,
    /// Action parameters
    #[serde(default)]
    pub parameters: Parameters,
}

impl Task {
    /// Create a task without parameters
    pub fn new(action: &str) -> Self {
        Self {
            action: action.to_string(),
            parameters: Parameters::new(),
        }
    }

    /// Add a parameter
    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.to_string(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key)
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    /// Integer parameter, falling back to `default` for missing or non-numeric values
    pub fn int_param(&self, key: &str, default: i64) -> i64 {
        int_value(self.parameters.get(key)).unwrap_or(default)
    }

    /// String form of a parameter (strings unquoted)
    pub fn string_param(&self, key: &str) -> Option<String> {
        self.parameters.get(key).map(value_to_plain_string)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task{{action='{}', parameters={{", self.action)?;
        for (i, (key, value)) in self.parameters.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value_to_plain_string(value))?;
        }
        write!(f, "}}}}")
    }
}

/// Result notification for one completed primitive action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    /// Error message when the action failed
    pub message: Option<String>,
    /// Elapsed wall time in milliseconds
    pub elapsed_ms: u64,
}

impl ActionOutcome {
    pub fn success(elapsed_ms: u64) -> Self {
        Self {
            success: true,
            message: None,
            elapsed_ms,
        }
    }

    pub fn failure(message: &str, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            message: Some(message.to_string()),
            elapsed_ms,
        }
    }
}

/// Render a JSON value the way it should appear inside generated text.
///
/// Strings are emitted without surrounding quotes; everything else uses its
/// JSON form (`null`, `true`, `42`, ...).
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer view of a JSON value; floats are truncated toward zero.
///
/// Numbers outside the `i64` range have no integer view.
pub(crate) fn int_value(value: Option<&Value>) -> Option<i64> {
    let value = value?;
    if let Some(v) = value.as_i64() {
        return Some(v);
    }
    if let Some(v) = value.as_u64() {
        return i64::try_from(v).ok();
    }
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= I64_MIN_F64 && *v < I64_MAX_F64)
        .map(|v| v as i64)
}

const I64_MIN_F64: f64 = -9_223_372_036_854_775_808.0;
const I64_MAX_F64: f64 = 9_223_372_036_854_775_808.0;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_param_defaults() {
        let task = Task::new("mine")
            .with_param("x", 10)
            .with_param("depth", 2.7)
            .with_param("block", "stone");

        assert_eq!(task.int_param("x", 0), 10);
        assert_eq!(task.int_param("depth", 0), 2);
        assert_eq!(task.int_param("block", -1), -1);
        assert_eq!(task.int_param("missing", 7), 7);
    }

    #[test]
    fn test_out_of_range_numbers_use_default() {
        let task = Task::new("place")
            .with_param("x", u64::MAX)
            .with_param("y", 1e300)
            .with_param("z", i64::MIN);

        assert_eq!(task.int_param("x", 5), 5);
        assert_eq!(task.int_param("y", 5), 5);
        assert_eq!(task.int_param("z", 5), i64::MIN);
    }

    #[test]
    fn test_display_is_stable() {
        let task = Task::new("place")
            .with_param("z", 3)
            .with_param("block", "dirt");

        assert_eq!(task.to_string(), "Task{action='place', parameters={block=dirt, z=3}}");
    }

    #[test]
    fn test_plain_string() {
        assert_eq!(value_to_plain_string(&json!("north")), "north");
        assert_eq!(value_to_plain_string(&json!(null)), "null");
        assert_eq!(value_to_plain_string(&json!(12)), "12");
    }
}
