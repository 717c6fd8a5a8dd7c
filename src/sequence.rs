//! Action and Sequence Model
//!
//! Immutable records of what an agent actually did:
//! - `ActionRecord`: one executed primitive action
//! - `ExecutionSequence`: one complete goal-pursuit episode
//!
//! Sequences are assembled by a `SequenceBuilder` owned by exactly one
//! tracking session and frozen on completion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::task::{int_value, value_to_plain_string, Parameters};

/// Separator between action keys in a sequence signature
pub const SIGNATURE_SEPARATOR: &str = "->";

/// Parameter-name fragments that mark a value as position/amount-like.
/// Such parameters are left out of normalized keys.
const UNSTABLE_PARAM_FRAGMENTS: &[&str] = &["x", "y", "z", "count", "amount", "quantity", "radius"];

/// Parameter-name fragments that mark a parameter as a skill variable
const VARIABLE_PARAM_FRAGMENTS: &[&str] = &[
    "x", "y", "z", "count", "amount", "quantity", "radius", "depth", "length", "width", "height",
    "direction", "target",
];

/// Whether a parameter is excluded from normalized keys
pub fn is_unstable_parameter(name: &str) -> bool {
    let lower = name.to_lowercase();
    UNSTABLE_PARAM_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Whether a parameter should become a variable of a learned skill
pub fn is_variable_parameter(name: &str) -> bool {
    let lower = name.to_lowercase();
    VARIABLE_PARAM_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// One executed action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    action_type: String,
    parameters: Parameters,
    duration_ms: u64,
    success: bool,
    error: Option<String>,
    timestamp: DateTime<Utc>,
}

impl ActionRecord {
    pub fn new(
        action_type: &str,
        parameters: Parameters,
        duration_ms: u64,
        success: bool,
        error: Option<String>,
    ) -> Self {
        Self {
            action_type: action_type.to_string(),
            parameters,
            duration_ms,
            success,
            error,
            timestamp: Utc::now(),
        }
    }

    pub fn success(action_type: &str, parameters: Parameters, duration_ms: u64) -> Self {
        Self::new(action_type, parameters, duration_ms, true, None)
    }

    pub fn failure(action_type: &str, parameters: Parameters, duration_ms: u64, error: &str) -> Self {
        Self::new(action_type, parameters, duration_ms, false, Some(error.to_string()))
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn has_parameter(&self, key: &str) -> bool {
        self.parameters.contains_key(key)
    }

    pub fn string_param(&self, key: &str) -> Option<String> {
        self.parameters.get(key).map(value_to_plain_string)
    }

    pub fn int_param(&self, key: &str, default: i64) -> i64 {
        int_value(self.parameters.get(key)).unwrap_or(default)
    }

    /// Clustering key: action type plus stable parameters only.
    ///
    /// Format: `action:param=value:param=value`, parameters in key order.
    pub fn normalized_key(&self) -> String {
        let mut key = self.action_type.clone();
        for (name, value) in &self.parameters {
            if is_unstable_parameter(name) {
                continue;
            }
            key.push(':');
            key.push_str(&name.to_lowercase());
            key.push('=');
            key.push_str(&value_to_plain_string(value));
        }
        key
    }
}

/// One complete goal-pursuit episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSequence {
    id: String,
    agent_id: String,
    goal: String,
    actions: Vec<ActionRecord>,
    total_duration_ms: u64,
    successful: bool,
    context: HashMap<String, Value>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
}

impl ExecutionSequence {
    pub fn builder(agent_id: &str, goal: &str) -> SequenceBuilder {
        SequenceBuilder::new(agent_id, goal)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn actions(&self) -> &[ActionRecord] {
        &self.actions
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.total_duration_ms
    }

    pub fn is_successful(&self) -> bool {
        self.successful
    }

    pub fn context(&self) -> &HashMap<String, Value> {
        &self.context
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn average_action_ms(&self) -> u64 {
        if self.actions.is_empty() {
            return 0;
        }
        self.total_duration_ms / self.actions.len() as u64
    }

    pub fn successful_action_count(&self) -> usize {
        self.actions.iter().filter(|a| a.is_success()).count()
    }

    pub fn failed_action_count(&self) -> usize {
        self.actions.len() - self.successful_action_count()
    }

    pub fn all_actions_successful(&self) -> bool {
        self.actions.iter().all(|a| a.is_success())
    }

    /// Shape of the episode: normalized action keys joined by `->`
    pub fn signature(&self) -> String {
        self.actions
            .iter()
            .map(ActionRecord::normalized_key)
            .collect::<Vec<_>>()
            .join(SIGNATURE_SEPARATOR)
    }

    /// Same length and same action types in the same order
    pub fn is_similar_to(&self, other: &ExecutionSequence) -> bool {
        self.actions.len() == other.actions.len()
            && self
                .actions
                .iter()
                .zip(&other.actions)
                .all(|(a, b)| a.action_type == b.action_type)
    }
}

/// Accumulator for an in-progress episode
#[derive(Debug, Clone)]
pub struct SequenceBuilder {
    id: Option<String>,
    agent_id: String,
    goal: String,
    actions: Vec<ActionRecord>,
    total_duration_ms: u64,
    successful: bool,
    context: HashMap<String, Value>,
    start_time: DateTime<Utc>,
}

impl SequenceBuilder {
    pub fn new(agent_id: &str, goal: &str) -> Self {
        Self {
            id: None,
            agent_id: agent_id.to_string(),
            goal: goal.to_string(),
            actions: Vec::new(),
            total_duration_ms: 0,
            successful: true,
            context: HashMap::new(),
            start_time: Utc::now(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn start_time(mut self, start_time: DateTime<Utc>) -> Self {
        self.start_time = start_time;
        self
    }

    /// Append an action; a failed action marks the episode unsuccessful
    pub fn push_action(&mut self, action: ActionRecord) {
        self.total_duration_ms += action.duration_ms;
        if !action.success {
            self.successful = false;
        }
        self.actions.push(action);
    }

    pub fn with_action(mut self, action: ActionRecord) -> Self {
        self.push_action(action);
        self
    }

    pub fn insert_context(&mut self, key: &str, value: Value) {
        self.context.insert(key.to_string(), value);
    }

    pub fn action_count(&self) -> usize {
        self.actions.len()
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    /// Freeze the episode using the success flag derived from its actions
    pub fn build(self) -> ExecutionSequence {
        let successful = self.successful;
        self.build_with_outcome(successful)
    }

    /// Freeze the episode with an explicit overall outcome
    pub fn build_with_outcome(self, successful: bool) -> ExecutionSequence {
        ExecutionSequence {
            id: self.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            agent_id: self.agent_id,
            goal: self.goal,
            actions: self.actions,
            total_duration_ms: self.total_duration_ms,
            successful,
            context: self.context,
            start_time: self.start_time,
            end_time: Utc::now(),
        }
    }
}
