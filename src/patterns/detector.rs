//! Task-Sequence Pattern Detector
//!
//! Inspects one batch of recently executed tasks for structure:
//! - **Loop**: the same action repeated with coordinates in arithmetic progression
//! - **Sequence**: an action triple that repeats at a later, non-overlapping offset
//! - **Parameterized**: the same action with constant or incrementing parameters
//!
//! Unlike the extractor this never looks at stored history.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tracing::{debug, warn};

use crate::task::Task;

/// Fewest tasks worth inspecting
const MIN_TASKS: usize = 3;

/// Axes checked for arithmetic progressions
const AXES: [&str; 3] = ["x", "y", "z"];

/// Tolerance when comparing numeric deltas
const INCREMENT_TOLERANCE: f64 = 1e-3;

/// Structural shape of a detected pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternType {
    Loop,
    Sequence,
    Conditional,
    Parameterized,
    Complex,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Loop => "LOOP",
            Self::Sequence => "SEQUENCE",
            Self::Conditional => "CONDITIONAL",
            Self::Parameterized => "PARAMETERIZED",
            Self::Complex => "COMPLEX",
        }
    }
}

impl fmt::Display for PatternType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a step parameter behaves across occurrences
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterKind {
    Constant,
    Incrementing,
    Formula,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterPattern {
    pub name: String,
    pub kind: ParameterKind,
    /// Value seen at the first occurrence
    pub base_value: Value,
    /// Per-occurrence delta for incrementing parameters
    pub increment: Option<f64>,
}

impl ParameterPattern {
    pub fn constant(name: &str, base_value: Value) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Constant,
            base_value,
            increment: None,
        }
    }

    pub fn incrementing(name: &str, base_value: Value, increment: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Incrementing,
            base_value,
            increment: Some(increment),
        }
    }

    pub fn variable(name: &str, base_value: Value) -> Self {
        Self {
            name: name.to_string(),
            kind: ParameterKind::Variable,
            base_value,
            increment: None,
        }
    }
}

/// One action of a pattern
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStep {
    pub action: String,
    pub parameters: BTreeMap<String, ParameterPattern>,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    Integer,
    Number,
    Text,
}

/// A named input of a pattern with its observed default
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternVariable {
    pub name: String,
    pub kind: VariableKind,
    pub default_value: Value,
}

#[derive(Debug, Error, PartialEq)]
pub enum PatternError {
    #[error("Pattern name cannot be empty")]
    EmptyName,

    #[error("Pattern '{0}' must have at least one step")]
    NoSteps(String),
}

/// A structural pattern found in a single task batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPattern {
    name: String,
    description: String,
    steps: Vec<TaskStep>,
    variables: BTreeMap<String, PatternVariable>,
    pattern_type: PatternType,
    frequency: usize,
    success_rate: f64,
}

impl TaskPattern {
    pub fn builder(name: &str) -> TaskPatternBuilder {
        TaskPatternBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn steps(&self) -> &[TaskStep] {
        &self.steps
    }

    pub fn variables(&self) -> &BTreeMap<String, PatternVariable> {
        &self.variables
    }

    pub fn pattern_type(&self) -> PatternType {
        self.pattern_type
    }

    pub fn frequency(&self) -> usize {
        self.frequency
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    /// `TYPE:action;action;`
    pub fn signature(&self) -> String {
        let mut sig = format!("{}:", self.pattern_type);
        for step in &self.steps {
            sig.push_str(&step.action);
            sig.push(';');
        }
        sig
    }

    /// Same type and the same step actions in the same order
    pub fn is_similar_to(&self, other: &TaskPattern) -> bool {
        self.pattern_type == other.pattern_type
            && self.steps.len() == other.steps.len()
            && self
                .steps
                .iter()
                .zip(&other.steps)
                .all(|(a, b)| a.action == b.action)
    }
}

impl fmt::Display for TaskPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "TaskPattern{{name='{}', type={}, steps={}, frequency={}, successRate={}}}",
            self.name,
            self.pattern_type,
            self.steps.len(),
            self.frequency,
            self.success_rate
        )
    }
}

pub struct TaskPatternBuilder {
    name: String,
    description: String,
    steps: Vec<TaskStep>,
    variables: BTreeMap<String, PatternVariable>,
    pattern_type: PatternType,
    frequency: usize,
    success_rate: f64,
}

impl TaskPatternBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            steps: Vec::new(),
            variables: BTreeMap::new(),
            pattern_type: PatternType::Sequence,
            frequency: 1,
            success_rate: 1.0,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn step(mut self, action: &str, parameters: BTreeMap<String, ParameterPattern>) -> Self {
        let index = self.steps.len();
        self.steps.push(TaskStep {
            action: action.to_string(),
            parameters,
            index,
        });
        self
    }

    pub fn variable(mut self, name: &str, kind: VariableKind, default_value: Value) -> Self {
        self.variables.insert(
            name.to_string(),
            PatternVariable {
                name: name.to_string(),
                kind,
                default_value,
            },
        );
        self
    }

    pub fn pattern_type(mut self, pattern_type: PatternType) -> Self {
        self.pattern_type = pattern_type;
        self
    }

    pub fn frequency(mut self, frequency: usize) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn success_rate(mut self, success_rate: f64) -> Self {
        self.success_rate = success_rate;
        self
    }

    pub fn build(self) -> Result<TaskPattern, PatternError> {
        if self.name.is_empty() {
            return Err(PatternError::EmptyName);
        }
        if self.steps.is_empty() {
            return Err(PatternError::NoSteps(self.name));
        }
        Ok(TaskPattern {
            name: self.name,
            description: self.description,
            steps: self.steps,
            variables: self.variables,
            pattern_type: self.pattern_type,
            frequency: self.frequency,
            success_rate: self.success_rate,
        })
    }
}

/// Run all three detection passes over one task batch.
///
/// Batches shorter than three tasks yield nothing.
pub fn detect_patterns(tasks: &[Task]) -> Vec<TaskPattern> {
    if tasks.len() < MIN_TASKS {
        return Vec::new();
    }

    let mut patterns = Vec::new();
    detect_loop_patterns(tasks, &mut patterns);
    detect_sequence_patterns(tasks, &mut patterns);
    detect_parameterized_patterns(tasks, &mut patterns);

    debug!("Detected {} patterns in {} tasks", patterns.len(), tasks.len());
    patterns
}

fn push_pattern(patterns: &mut Vec<TaskPattern>, builder: TaskPatternBuilder) {
    match builder.build() {
        Ok(pattern) => patterns.push(pattern),
        Err(e) => warn!("Discarding malformed pattern: {}", e),
    }
}

/// Task indices per action, actions in first-encounter order
fn indices_by_action(tasks: &[Task]) -> Vec<(&str, Vec<usize>)> {
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<(&str, Vec<usize>)> = Vec::new();

    for (i, task) in tasks.iter().enumerate() {
        let action = task.action.as_str();
        match index.get(action) {
            Some(&g) => groups[g].1.push(i),
            None => {
                index.insert(action, groups.len());
                groups.push((action, vec![i]));
            }
        }
    }

    groups
}

fn detect_loop_patterns(tasks: &[Task], patterns: &mut Vec<TaskPattern>) {
    for (action, indices) in indices_by_action(tasks) {
        if indices.len() < 3 {
            continue;
        }

        let (first, second, third) = (&tasks[indices[0]], &tasks[indices[1]], &tasks[indices[2]]);
        if !has_incrementing_axis(first, second, third) {
            continue;
        }

        let occurrences: Vec<&Task> = indices.iter().map(|&i| &tasks[i]).collect();
        let mut parameters = BTreeMap::new();
        let mut builder = TaskPattern::builder(&format!("{}_loop", action))
            .description(format!("Looping {} with increments", action))
            .pattern_type(PatternType::Loop)
            .frequency(indices.len())
            .variable("iterations", VariableKind::Integer, Value::from(indices.len()));

        for axis in AXES {
            let increment = second.int_param(axis, 0).checked_sub(first.int_param(axis, 0));
            builder = builder.variable(
                &format!("{}Increment", axis),
                VariableKind::Integer,
                Value::from(increment.unwrap_or(0)),
            );

            if let Some(base) = first.param(axis) {
                let pattern = match increment {
                    Some(0) => ParameterPattern::constant(axis, base.clone()),
                    Some(step) => ParameterPattern::incrementing(axis, base.clone(), step as f64),
                    // Delta does not fit in i64
                    None => ParameterPattern::variable(axis, base.clone()),
                };
                parameters.insert(axis.to_string(), pattern);
            }
        }

        for (key, value) in &first.parameters {
            if AXES.contains(&key.as_str()) {
                continue;
            }
            let constant = occurrences.iter().all(|t| t.param(key) == Some(value));
            let pattern = if constant {
                ParameterPattern::constant(key, value.clone())
            } else {
                ParameterPattern::variable(key, value.clone())
            };
            parameters.insert(key.clone(), pattern);
        }

        push_pattern(patterns, builder.step(action, parameters));
    }
}

/// Any axis forming a non-constant arithmetic progression; missing axes read
/// as 0 and deltas that overflow count as no progression
fn has_incrementing_axis(t1: &Task, t2: &Task, t3: &Task) -> bool {
    AXES.iter().any(|axis| {
        let (a, b, c) = (t1.int_param(axis, 0), t2.int_param(axis, 0), t3.int_param(axis, 0));
        match (b.checked_sub(a), c.checked_sub(b)) {
            (Some(first), Some(second)) => first == second && first != 0,
            _ => false,
        }
    })
}

fn detect_sequence_patterns(tasks: &[Task], patterns: &mut Vec<TaskPattern>) {
    let len = tasks.len();

    for i in 0..len - 2 {
        let window = &tasks[i..i + 3];

        for j in (i + 3)..len.saturating_sub(2) {
            let repeat = &tasks[j..j + 3];
            if !window.iter().zip(repeat).all(|(a, b)| a.action == b.action) {
                continue;
            }

            let actions: Vec<&str> = window.iter().map(|t| t.action.as_str()).collect();
            let mut builder = TaskPattern::builder(&actions.join("_"))
                .description(format!("Sequence: {}", actions.join(" → ")))
                .pattern_type(PatternType::Sequence)
                .frequency(2);

            for (task, again) in window.iter().zip(repeat) {
                let parameters = task
                    .parameters
                    .iter()
                    .map(|(key, value)| {
                        let pattern = if again.param(key) == Some(value) {
                            ParameterPattern::constant(key, value.clone())
                        } else {
                            ParameterPattern::variable(key, value.clone())
                        };
                        (key.clone(), pattern)
                    })
                    .collect();
                builder = builder.step(&task.action, parameters);
            }

            push_pattern(patterns, builder);
            break;
        }
    }
}

fn detect_parameterized_patterns(tasks: &[Task], patterns: &mut Vec<TaskPattern>) {
    for (action, indices) in indices_by_action(tasks) {
        if indices.len() < 3 {
            continue;
        }

        let same_action: Vec<&Task> = indices.iter().map(|&i| &tasks[i]).collect();
        let parameters = analyze_parameter_variation(&same_action);
        if parameters.is_empty() {
            continue;
        }

        let builder = TaskPattern::builder(&format!("{}_pattern", action))
            .description(format!("Parameterized {}", action))
            .pattern_type(PatternType::Parameterized)
            .frequency(same_action.len())
            .step(action, parameters);

        push_pattern(patterns, builder);
    }
}

/// Classify each parameter of the first task as constant or incrementing.
/// Parameters that are neither are left out.
fn analyze_parameter_variation(tasks: &[&Task]) -> BTreeMap<String, ParameterPattern> {
    let mut result = BTreeMap::new();
    let Some(first) = tasks.first() else {
        return result;
    };

    for (key, first_value) in &first.parameters {
        if tasks.iter().all(|t| t.param(key) == Some(first_value)) {
            result.insert(key.clone(), ParameterPattern::constant(key, first_value.clone()));
            continue;
        }

        if !first_value.is_number() {
            continue;
        }

        if let Some(increment) = stable_increment(key, &tasks[..tasks.len().min(3)]) {
            result.insert(
                key.clone(),
                ParameterPattern::incrementing(key, first_value.clone(), increment),
            );
        }
    }

    result
}

fn stable_increment(key: &str, samples: &[&Task]) -> Option<f64> {
    let mut increment: Option<f64> = None;

    for pair in samples.windows(2) {
        let prev = pair[0].param(key)?.as_f64()?;
        let curr = pair[1].param(key)?.as_f64()?;
        let delta = curr - prev;

        match increment {
            None => increment = Some(delta),
            Some(inc) if (delta - inc).abs() > INCREMENT_TOLERANCE => return None,
            Some(_) => {}
        }
    }

    increment
}
