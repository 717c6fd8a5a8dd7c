//! Structural skill generator.
//!
//! Watches task batches for loop, sequence and parameterized structure and
//! synthesizes code that reproduces it. A pattern must be seen in at least
//! `min_frequency` successful batches before a skill is generated, and a
//! signature that produced a skill recently is not generated again.

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::template::escape;
use super::types::{ExecutableSkill, Skill, SkillCategory};
use super::validator::SkillValidator;
use crate::patterns::{detect_patterns, ParameterKind, ParameterPattern, PatternType, TaskPattern, TaskStep};
use crate::task::{value_to_plain_string, Task};

/// Cost per generated step, in ticks
const TICKS_PER_STEP: u32 = 100;

/// Upper bound on the estimated cost (three minutes)
const MAX_ESTIMATED_TICKS: u32 = 3600;

/// Configuration for the structural generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Batches a pattern signature must appear in
    pub min_frequency: usize,
    pub min_success_rate: f64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            min_frequency: 2,
            min_success_rate: 0.7,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeneratorStats {
    pub generated_skills: usize,
    pub tracked_patterns: usize,
    pub recent_signatures: usize,
}

pub struct SkillGenerator {
    config: GeneratorConfig,
    validator: Arc<SkillValidator>,
    pattern_frequency: Mutex<HashMap<String, usize>>,
    recent_signatures: Mutex<HashSet<String>>,
}

impl SkillGenerator {
    pub fn new(validator: Arc<SkillValidator>) -> Self {
        Self::with_config(validator, GeneratorConfig::default())
    }

    pub fn with_config(validator: Arc<SkillValidator>, config: GeneratorConfig) -> Self {
        Self {
            config,
            validator,
            pattern_frequency: Mutex::new(HashMap::new()),
            recent_signatures: Mutex::new(HashSet::new()),
        }
    }

    /// Learn from one batch of executed tasks.
    ///
    /// Failed batches are ignored. Returns the skills registered from this batch.
    pub fn analyze_task_sequence(&self, tasks: &[Task], was_successful: bool) -> Vec<Arc<dyn Skill>> {
        if tasks.is_empty() {
            return Vec::new();
        }

        debug!(
            "Analyzing task sequence of {} tasks (success: {})",
            tasks.len(),
            was_successful
        );

        if !was_successful {
            debug!("Skipping skill generation from failed sequence");
            return Vec::new();
        }

        let patterns = detect_patterns(tasks);
        debug!("Detected {} patterns in task sequence", patterns.len());

        let mut generated = Vec::new();
        for pattern in &patterns {
            *self
                .pattern_frequency
                .lock()
                .entry(pattern.signature())
                .or_insert(0) += 1;

            if self.should_generate(pattern) {
                if let Some(skill) = self.generate_skill_from_pattern(pattern) {
                    generated.push(skill);
                }
            }
        }

        if !generated.is_empty() {
            info!("Generated {} new skills from task sequence", generated.len());
        }
        generated
    }

    /// Build, validate and register a skill for `pattern`
    pub fn generate_skill_from_pattern(&self, pattern: &TaskPattern) -> Option<Arc<dyn Skill>> {
        let name = self.skill_name(pattern);
        let actions = distinct_actions(pattern);

        let built = ExecutableSkill::builder(&name)
            .description(describe(pattern, &actions))
            .category(SkillCategory::infer(actions.as_slice()))
            .code_template(code_template(pattern))
            .required_actions(actions.iter().cloned())
            .estimated_ticks(estimated_ticks(pattern))
            .applicability_pattern(applicability_pattern(&actions))
            .build();

        let skill: Arc<dyn Skill> = match built {
            Ok(skill) => Arc::new(skill),
            Err(e) => {
                error!("Failed to generate skill from pattern '{}': {}", pattern.name(), e);
                return None;
            }
        };

        if !self.validator.register(skill.clone()) {
            debug!("Skill '{}' was not registered", name);
            return None;
        }

        self.recent_signatures.lock().insert(pattern.signature());
        info!("Successfully generated and registered skill: {}", name);
        Some(skill)
    }

    /// Shared registration gate
    pub fn validate_skill(&self, skill: &dyn Skill) -> bool {
        self.validator.validate(skill)
    }

    fn should_generate(&self, pattern: &TaskPattern) -> bool {
        let signature = pattern.signature();

        let seen = self
            .pattern_frequency
            .lock()
            .get(&signature)
            .copied()
            .unwrap_or(0);
        if seen < self.config.min_frequency {
            return false;
        }

        if pattern.success_rate() < self.config.min_success_rate {
            return false;
        }

        !self.recent_signatures.lock().contains(&signature)
    }

    /// `auto_<sanitized name>_<NNN>`, numbered by generated-skill count
    fn skill_name(&self, pattern: &TaskPattern) -> String {
        let base: String = pattern
            .name()
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
            .collect();
        format!("auto_{}_{:03}", base, self.validator.generated_count())
    }

    pub fn stats(&self) -> GeneratorStats {
        GeneratorStats {
            generated_skills: self.validator.generated_count(),
            tracked_patterns: self.pattern_frequency.lock().len(),
            recent_signatures: self.recent_signatures.lock().len(),
        }
    }

    pub fn clear_recent_signatures(&self) {
        self.recent_signatures.lock().clear();
    }

    /// Forget all tracked frequencies, recent signatures and the generated count
    pub fn reset(&self) {
        self.validator.reset();
        self.pattern_frequency.lock().clear();
        self.recent_signatures.lock().clear();
    }
}

fn distinct_actions(pattern: &TaskPattern) -> Vec<String> {
    let mut seen = HashSet::new();
    pattern
        .steps()
        .iter()
        .filter(|step| seen.insert(step.action.as_str()))
        .map(|step| step.action.clone())
        .collect()
}

fn describe(pattern: &TaskPattern, actions: &[String]) -> String {
    let mut desc = format!(
        "Auto-generated skill from {} pattern. ",
        pattern.pattern_type().as_str().to_lowercase()
    );
    if !actions.is_empty() {
        let _ = write!(desc, "Actions: {}", actions.join(", "));
    }
    if pattern.frequency() > 1 {
        let _ = write!(desc, " (seen {} times)", pattern.frequency());
    }
    desc
}

fn applicability_pattern(actions: &[String]) -> String {
    let escaped: Vec<String> = actions.iter().map(|a| regex::escape(a)).collect();
    if escaped.len() == 1 {
        format!("{}.*", escaped[0])
    } else {
        escaped.join(".*")
    }
}

fn estimated_ticks(pattern: &TaskPattern) -> u32 {
    let mut ticks = pattern.steps().len() as u32 * TICKS_PER_STEP;
    if pattern.pattern_type() == PatternType::Loop {
        ticks = ticks.saturating_mul(pattern.frequency() as u32);
    }
    ticks.min(MAX_ESTIMATED_TICKS)
}

fn code_template(pattern: &TaskPattern) -> String {
    match pattern.pattern_type() {
        PatternType::Loop => loop_code(pattern),
        PatternType::Sequence => sequence_code(pattern),
        PatternType::Parameterized => parameterized_code(pattern),
        _ => generic_code(pattern),
    }
}

fn loop_code(pattern: &TaskPattern) -> String {
    let mut code = String::from("// Auto-generated loop pattern\n");
    let _ = writeln!(code, "var iterations = {};\n", pattern.frequency());
    code.push_str("for (var i = 0; i < iterations; i++) {\n");
    if let Some(step) = pattern.steps().first() {
        code.push_str("    ");
        code.push_str(&step_code(step, Some("i")));
    }
    code.push_str("}\n");
    code
}

fn sequence_code(pattern: &TaskPattern) -> String {
    let mut code = String::from("// Auto-generated sequence pattern\n\n");
    for step in pattern.steps() {
        code.push_str(&step_code(step, None));
    }
    code
}

fn parameterized_code(pattern: &TaskPattern) -> String {
    let mut code = String::from("// Auto-generated parameterized pattern\n\n");
    code.push_str("var index = {{index}};\n");
    if let Some(step) = pattern.steps().first() {
        code.push_str(&step_code(step, Some("index")));
    }
    code
}

fn generic_code(pattern: &TaskPattern) -> String {
    let mut code = String::from("// Auto-generated skill\n");
    let _ = writeln!(code, "// Pattern type: {}\n", pattern.pattern_type());
    for step in pattern.steps() {
        let _ = writeln!(code, "// Step: {}", step.action);
        code.push_str(&step_code(step, None));
    }
    code
}

/// `agent.<action>(<params>);` with parameters in name order
fn step_code(step: &TaskStep, index_var: Option<&str>) -> String {
    let params: Vec<String> = step
        .parameters
        .values()
        .map(|p| parameter_code(p, index_var))
        .collect();
    format!("agent.{}({});\n", step.action, params.join(", "))
}

fn parameter_code(param: &ParameterPattern, index_var: Option<&str>) -> String {
    match (param.kind, index_var, param.increment) {
        (ParameterKind::Constant, _, _) => match &param.base_value {
            Value::String(s) => format!("\"{}\"", escape(s)),
            other => value_to_plain_string(other),
        },
        (ParameterKind::Incrementing, Some(index), Some(increment)) => {
            format!("start{} + ({} * {})", capitalize(&param.name), index, increment)
        }
        _ => format!("{{{{{}}}}}", param.name),
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
