//! Skill Type Definitions
//!
//! Core data structures for the skill system:
//! - `Skill`: the capability set the library and planner depend on
//! - `ExecutableSkill`: template-backed implementation with atomic counters
//! - `CodeEngine`: the external collaborator that runs generated code

use chrono::{DateTime, TimeZone, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use thiserror::Error;
use tracing::debug;

use crate::skills::template::{self, SkillContext};
use crate::task::{ActionOutcome, Task};

/// Default cost estimate in game ticks
pub const DEFAULT_ESTIMATED_TICKS: u32 = 100;

/// Skill category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillCategory {
    Mining,
    Building,
    Farming,
    Combat,
    Utility,
}

/// Keywords per category, checked in priority order
const CATEGORY_KEYWORDS: &[(SkillCategory, &[&str])] = &[
    (SkillCategory::Mining, &["mine", "dig", "excavate", "gather"]),
    (SkillCategory::Building, &["build", "place", "construct"]),
    (SkillCategory::Farming, &["farm", "plant", "harvest", "till"]),
    (SkillCategory::Combat, &["attack", "combat", "defend"]),
];

impl SkillCategory {
    pub const ALL: [SkillCategory; 5] = [
        Self::Mining,
        Self::Building,
        Self::Farming,
        Self::Combat,
        Self::Utility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mining => "mining",
            Self::Building => "building",
            Self::Farming => "farming",
            Self::Combat => "combat",
            Self::Utility => "utility",
        }
    }

    /// Infer a category from action names.
    ///
    /// The first category with any keyword contained in any action wins;
    /// `Utility` otherwise.
    pub fn infer<S: AsRef<str>>(actions: &[S]) -> Self {
        for (category, keywords) in CATEGORY_KEYWORDS {
            let hit = actions.iter().any(|action| {
                let action = action.as_ref().to_lowercase();
                keywords.iter().any(|k| action.contains(k))
            });
            if hit {
                return *category;
            }
        }
        Self::Utility
    }
}

impl fmt::Display for SkillCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillCategory {
    type Err = SkillValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SkillValidationError::InvalidCategory(s.to_string()))
    }
}

/// Skill construction errors
#[derive(Debug, Error, PartialEq)]
pub enum SkillValidationError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid skill name: {0}")]
    InvalidName(String),

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Invalid applicability pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// A reusable, parameterized procedure
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn category(&self) -> SkillCategory {
        SkillCategory::Utility
    }

    fn required_actions(&self) -> &[String];

    fn required_items(&self) -> &[String] {
        &[]
    }

    /// Rough cost in game ticks
    fn estimated_ticks(&self) -> u32 {
        DEFAULT_ESTIMATED_TICKS
    }

    /// Produce executable code for `context`
    fn generate_code(&self, context: &SkillContext) -> String;

    fn is_applicable(&self, task: &Task) -> bool;

    /// Successes over executions; 1.0 while untested
    fn success_rate(&self) -> f64;

    fn record_success(&self, success: bool);

    fn execution_count(&self) -> u64;
}

/// Runs generated skill code
pub trait CodeEngine {
    fn execute(&self, code: &str) -> ActionOutcome;
}

/// Template-based skill
pub struct ExecutableSkill {
    name: String,
    description: String,
    category: SkillCategory,
    code_template: String,
    required_actions: Vec<String>,
    required_items: Vec<String>,
    estimated_ticks: u32,
    applicability: Option<Regex>,

    execution_count: AtomicU64,
    success_count: AtomicU64,
    /// Unix millis of the last execution, 0 when never executed
    last_execution_ms: AtomicI64,
}

impl ExecutableSkill {
    pub fn builder(name: &str) -> ExecutableSkillBuilder {
        ExecutableSkillBuilder::new(name)
    }

    pub fn code_template(&self) -> &str {
        &self.code_template
    }

    pub fn applicability_pattern(&self) -> Option<&str> {
        self.applicability.as_ref().map(|r| r.as_str())
    }

    pub fn last_execution(&self) -> Option<DateTime<Utc>> {
        match self.last_execution_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    /// Generate code, run it on `engine` and record the outcome
    pub fn execute(&self, context: &SkillContext, engine: &dyn CodeEngine) -> ActionOutcome {
        let code = self.generate_code(context);
        debug!("[Skill:{}] Executing code:\n{}", self.name, code);

        let outcome = engine.execute(&code);
        self.record_success(outcome.success);
        outcome
    }
}

impl Skill for ExecutableSkill {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn category(&self) -> SkillCategory {
        self.category
    }

    fn required_actions(&self) -> &[String] {
        &self.required_actions
    }

    fn required_items(&self) -> &[String] {
        &self.required_items
    }

    fn estimated_ticks(&self) -> u32 {
        self.estimated_ticks
    }

    fn generate_code(&self, context: &SkillContext) -> String {
        template::render(&self.code_template, context)
    }

    /// The applicability regex, when present, decides alone; otherwise the
    /// task's action must be one of the required actions.
    fn is_applicable(&self, task: &Task) -> bool {
        match &self.applicability {
            Some(regex) => regex.is_match(&task.to_string().to_lowercase()),
            None => self.required_actions.iter().any(|a| *a == task.action),
        }
    }

    fn success_rate(&self) -> f64 {
        let total = self.execution_count.load(Ordering::Relaxed);
        if total == 0 {
            return 1.0;
        }
        self.success_count.load(Ordering::Relaxed) as f64 / total as f64
    }

    fn record_success(&self, success: bool) {
        // Executions first so a concurrent reader never sees a rate above 1.0
        self.execution_count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        }
        self.last_execution_ms
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn execution_count(&self) -> u64 {
        self.execution_count.load(Ordering::Relaxed)
    }
}

impl fmt::Debug for ExecutableSkill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutableSkill")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("required_actions", &self.required_actions)
            .field("executions", &self.execution_count())
            .finish()
    }
}

impl fmt::Display for ExecutableSkill {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Skill[name={}, category={}, successRate={:.2}%, executions={}]",
            self.name,
            self.category,
            self.success_rate() * 100.0,
            self.execution_count()
        )
    }
}

pub struct ExecutableSkillBuilder {
    name: String,
    description: String,
    category: SkillCategory,
    code_template: String,
    required_actions: Vec<String>,
    required_items: Vec<String>,
    estimated_ticks: u32,
    applicability_pattern: Option<String>,
}

impl ExecutableSkillBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: String::new(),
            category: SkillCategory::Utility,
            code_template: String::new(),
            required_actions: Vec::new(),
            required_items: Vec::new(),
            estimated_ticks: DEFAULT_ESTIMATED_TICKS,
            applicability_pattern: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn category(mut self, category: SkillCategory) -> Self {
        self.category = category;
        self
    }

    pub fn code_template(mut self, template: impl Into<String>) -> Self {
        self.code_template = template.into();
        self
    }

    pub fn required_actions<I, S>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_actions.extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn required_items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.required_items.extend(items.into_iter().map(Into::into));
        self
    }

    pub fn estimated_ticks(mut self, ticks: u32) -> Self {
        self.estimated_ticks = ticks;
        self
    }

    /// Case-insensitive regex matched against the lowercased task text
    pub fn applicability_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.applicability_pattern = Some(pattern.into());
        self
    }

    pub fn build(self) -> Result<ExecutableSkill, SkillValidationError> {
        if self.name.is_empty() {
            return Err(SkillValidationError::MissingField("name".to_string()));
        }
        if self.description.is_empty() {
            return Err(SkillValidationError::MissingField("description".to_string()));
        }
        if self.code_template.is_empty() {
            return Err(SkillValidationError::MissingField("code_template".to_string()));
        }

        let applicability = match self.applicability_pattern {
            Some(pattern) => Some(
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SkillValidationError::InvalidPattern {
                        pattern: pattern.clone(),
                        reason: e.to_string(),
                    })?,
            ),
            None => None,
        };

        Ok(ExecutableSkill {
            name: self.name,
            description: self.description,
            category: self.category,
            code_template: self.code_template,
            required_actions: self.required_actions,
            required_items: self.required_items,
            estimated_ticks: self.estimated_ticks,
            applicability,
            execution_count: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            last_execution_ms: AtomicI64::new(0),
        })
    }
}
