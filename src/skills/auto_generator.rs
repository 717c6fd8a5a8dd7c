//! Statistical skill generator.
//!
//! Turns extractor `Pattern`s into template skills. The cost estimate comes
//! from the observed average execution time (20 ticks per second).

use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::library::short_hash;
use super::types::{ExecutableSkill, Skill, SkillCategory, SkillValidationError};
use super::validator::SkillValidator;
use crate::patterns::{Pattern, PatternExtractor};
use crate::sequence::ExecutionSequence;

/// Milliseconds per game tick
const MS_PER_TICK: f64 = 50.0;

/// Lower bound on the estimated cost
const MIN_ESTIMATED_TICKS: u32 = 100;

/// Hex digits of the signature hash appended to skill names
const NAME_HASH_LEN: usize = 6;

/// Parameters that trigger the parameter-extraction block
const EXTRACTED_PARAMS: [&str; 2] = ["depth", "count"];

pub struct SkillAutoGenerator {
    validator: Arc<SkillValidator>,
}

impl SkillAutoGenerator {
    pub fn new(validator: Arc<SkillValidator>) -> Self {
        info!("SkillAutoGenerator initialized");
        Self { validator }
    }

    /// Build a skill from one pattern without registering it
    pub fn generate_skill(&self, pattern: &Pattern) -> Result<ExecutableSkill, SkillValidationError> {
        info!(
            "Generating skill from pattern: {} (frequency: {}, success: {:.2}%)",
            pattern.name,
            pattern.frequency,
            pattern.success_rate * 100.0
        );

        let skill_id = skill_name(pattern);
        let estimated = (pattern.average_execution_ms / MS_PER_TICK) as u32;

        let skill = ExecutableSkill::builder(&skill_id)
            .description(describe(pattern))
            .category(SkillCategory::infer(pattern.action_sequence.as_slice()))
            .code_template(code_template(pattern))
            .required_actions(pattern.action_sequence.iter().cloned())
            .applicability_pattern(applicability_pattern(pattern))
            .estimated_ticks(estimated.max(MIN_ESTIMATED_TICKS))
            .build()?;

        info!("Successfully generated skill: {}", skill_id);
        Ok(skill)
    }

    /// Build skills for every pattern; failures are logged and skipped
    pub fn generate_skills(&self, patterns: &[Pattern]) -> Vec<ExecutableSkill> {
        if patterns.is_empty() {
            debug!("No patterns provided for skill generation");
            return Vec::new();
        }

        let skills: Vec<ExecutableSkill> = patterns
            .iter()
            .filter_map(|pattern| match self.generate_skill(pattern) {
                Ok(skill) => Some(skill),
                Err(e) => {
                    warn!("Failed to generate skill from pattern '{}': {}", pattern.name, e);
                    None
                }
            })
            .collect();

        info!("Generated {} skills from {} patterns", skills.len(), patterns.len());
        skills
    }

    /// Generate from patterns and register what passes the gate
    pub fn register_patterns(&self, patterns: &[Pattern]) -> usize {
        let mut registered = 0;
        for skill in self.generate_skills(patterns) {
            if !self.validate_skill(&skill) {
                continue;
            }
            let name = skill.name().to_string();
            if self.validator.register(Arc::new(skill)) {
                registered += 1;
            } else {
                debug!("Failed to register skill: {}", name);
            }
        }
        registered
    }

    /// Extract patterns from `sequences`, generate, and register
    pub fn generate_and_register(
        &self,
        extractor: &PatternExtractor,
        sequences: &[Arc<ExecutionSequence>],
    ) -> usize {
        info!("Auto-generating skills from {} execution sequences", sequences.len());

        let patterns = extractor.extract_patterns(sequences);
        let registered = self.register_patterns(&patterns);

        info!(
            "Registered {} new skills from {} sequences",
            registered,
            sequences.len()
        );
        registered
    }

    /// Field completeness plus the shared registration gate
    pub fn validate_skill(&self, skill: &dyn Skill) -> bool {
        if skill.name().is_empty() {
            warn!("Skill validation failed: missing name");
            return false;
        }
        if skill.description().is_empty() {
            warn!("Skill validation failed: missing description");
            return false;
        }
        if skill.required_actions().is_empty() {
            warn!("Skill validation failed: no required actions");
            return false;
        }
        self.validator.validate(skill)
    }
}

/// Sanitized pattern name plus a short hash of the pattern signature.
///
/// Patterns whose goals share a word still get distinct names.
pub fn skill_name(pattern: &Pattern) -> String {
    let hash = short_hash(&pattern.signature);
    format!("{}_{}", skill_id(&pattern.name), &hash[..NAME_HASH_LEN])
}

/// Lowercased pattern name with everything but ASCII alphanumerics removed
fn skill_id(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

fn describe(pattern: &Pattern) -> String {
    let mut desc = format!("Automated {}", pattern.name);

    let actions = &pattern.action_sequence;
    if !actions.is_empty() {
        let summary = if actions.len() <= 3 {
            actions.join(", ")
        } else {
            format!("{}, {}, ... {}", actions[0], actions[1], actions[actions.len() - 1])
        };
        let _ = write!(desc, " ({})", summary);
    }

    let _ = write!(desc, " - {:.1}% success rate", pattern.success_rate * 100.0);
    desc
}

fn code_template(pattern: &Pattern) -> String {
    let mut code = String::new();
    let _ = writeln!(code, "// Auto-generated skill from pattern");
    let _ = writeln!(code, "// Pattern: {}", pattern.signature);
    let _ = writeln!(code, "// Success rate: {:.1}%", pattern.success_rate * 100.0);
    code.push('\n');

    if EXTRACTED_PARAMS.iter().any(|p| pattern.parameters.contains(*p)) {
        code.push_str("// Extract parameters\n");
        for param in &pattern.parameters {
            let _ = writeln!(code, "var {} = {{{{{}}}}};", param, param);
        }
        code.push('\n');
    }

    if !pattern.action_sequence.is_empty() {
        code.push_str("// Execute action sequence\n");
        for (index, action) in pattern.action_sequence.iter().enumerate() {
            code.push_str(&action_call(action, index));
        }
    }

    code.push_str("\n// Auto-generated skill completed successfully");
    code
}

fn action_call(action: &str, index: usize) -> String {
    let lower = action.to_lowercase();
    if lower.contains("mine") {
        format!("agent.mineBlock(startX + {i}, startY - {i}, startZ); // Action {i}\n", i = index)
    } else if lower.contains("place") {
        format!(
            "agent.placeBlock({{{{block:quote}}}}, startX + {i}, startY, startZ); // Action {i}\n",
            i = index
        )
    } else if lower.contains("pathfind") {
        format!("agent.pathfindTo(startX, startY, startZ); // Action {}\n", index)
    } else if lower.contains("craft") {
        format!(
            "agent.craftItem({{{{item:quote}}}}, {{{{quantity}}}}); // Action {}\n",
            index
        )
    } else {
        format!("// Unsupported action {} (Action {})\n", action, index)
    }
}

/// `(name)|action.*|action.*...`, all parts regex-escaped
fn applicability_pattern(pattern: &Pattern) -> String {
    let mut out = format!("({})", regex::escape(&pattern.name.to_lowercase()));
    for action in &pattern.action_sequence {
        let _ = write!(out, "|{}.*", regex::escape(action));
    }
    out
}
