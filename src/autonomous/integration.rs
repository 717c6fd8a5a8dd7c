//! Planner-facing skill integration.
//!
//! Sits between the planner and the learning pipeline:
//! - before planning, `plan_with_skills` looks for a proven skill that can
//!   handle the command and returns its generated code instead
//! - while executing, `record_task` collects the batch that
//!   `record_sequence_completion` hands to the structural generator
//! - after a skill runs, `record_skill_outcome` updates both the library
//!   counters and the effectiveness tracker

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::effectiveness::EffectivenessTracker;
use crate::skills::{
    CodeEngine, GeneratorConfig, GeneratorStats, LibraryStats, Skill, SkillContext, SkillGenerator,
    SkillLibrary, SkillValidator,
};
use crate::task::{ActionOutcome, Task};

static FIRST_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

const DIRECTIONS: [&str; 4] = ["north", "south", "east", "west"];

/// Command keyword to block id, first match wins
const BLOCK_WORDS: [(&str, &str); 4] = [
    ("dirt", "dirt"),
    ("stone", "stone"),
    ("wood", "oak_log"),
    ("cobble", "cobblestone"),
];

/// Action name of the task produced for a planned skill
pub const EXECUTE_SKILL_ACTION: &str = "execute_skill";

#[derive(Debug, Clone)]
pub struct IntegrationConfig {
    /// Feed completed batches to the structural generator
    pub learning_enabled: bool,
    /// Consult the library before planning
    pub lookup_enabled: bool,
    /// Skills below this success rate are not used for planning
    pub min_success_rate: f64,
    /// Shorter batches are not analyzed
    pub min_tasks_for_learning: usize,
}

impl Default for IntegrationConfig {
    fn default() -> Self {
        Self {
            learning_enabled: true,
            lookup_enabled: true,
            min_success_rate: 0.7,
            min_tasks_for_learning: 3,
        }
    }
}

/// Block position of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl Position {
    pub fn new(x: i64, y: i64, z: i64) -> Self {
        Self { x, y, z }
    }
}

/// A skill chosen in place of planning
#[derive(Debug, Clone)]
pub struct PlannedSkill {
    pub skill_name: String,
    pub code: String,
    pub context: SkillContext,
}

impl PlannedSkill {
    /// The `execute_skill` task handed to the executor
    pub fn into_task(self) -> Task {
        let context: serde_json::Map<String, Value> = self.context.into_iter().collect();
        Task::new(EXECUTE_SKILL_ACTION)
            .with_param("skillName", self.skill_name)
            .with_param("code", self.code)
            .with_param("context", Value::Object(context))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrationStats {
    pub library: LibraryStats,
    pub generator: GeneratorStats,
    pub skill_usage: BTreeMap<String, u64>,
    pub current_sequence_size: usize,
    pub learning_enabled: bool,
    pub lookup_enabled: bool,
}

pub struct SkillIntegration {
    config: IntegrationConfig,
    library: Arc<SkillLibrary>,
    generator: SkillGenerator,
    effectiveness: Arc<EffectivenessTracker>,
    current_sequence: Mutex<Vec<Task>>,
    usage: Mutex<BTreeMap<String, u64>>,
}

impl SkillIntegration {
    pub fn new(validator: Arc<SkillValidator>, effectiveness: Arc<EffectivenessTracker>) -> Self {
        Self::with_config(
            IntegrationConfig::default(),
            GeneratorConfig::default(),
            validator,
            effectiveness,
        )
    }

    pub fn with_config(
        config: IntegrationConfig,
        generator_config: GeneratorConfig,
        validator: Arc<SkillValidator>,
        effectiveness: Arc<EffectivenessTracker>,
    ) -> Self {
        info!(
            "SkillIntegration initialized (learning: {}, lookup: {})",
            config.learning_enabled, config.lookup_enabled
        );
        Self {
            config,
            library: validator.library().clone(),
            generator: SkillGenerator::with_config(validator, generator_config),
            effectiveness,
            current_sequence: Mutex::new(Vec::new()),
            usage: Mutex::new(BTreeMap::new()),
        }
    }

    /// Pick the best matching skill for `command`.
    ///
    /// None means the caller should fall back to regular planning.
    pub fn plan_with_skills(
        &self,
        command: &str,
        position: Option<Position>,
    ) -> Option<PlannedSkill> {
        if !self.config.lookup_enabled {
            return None;
        }

        debug!("Attempting skill-based planning for: {}", command);

        let Some(skill) = self.library.semantic_search(command).into_iter().next() else {
            debug!("No applicable skills found for '{}'", command);
            return None;
        };

        if skill.success_rate() < self.config.min_success_rate {
            debug!(
                "Best skill '{}' success rate ({:.2}) below threshold ({:.2})",
                skill.name(),
                skill.success_rate(),
                self.config.min_success_rate
            );
            return None;
        }

        let context = command_context(command, position);
        let code = skill.generate_code(&context);

        info!("Using skill '{}' for command '{}'", skill.name(), command);
        self.record_usage(skill.name());

        Some(PlannedSkill {
            skill_name: skill.name().to_string(),
            code,
            context,
        })
    }

    /// Append an executed task to the current batch
    pub fn record_task(&self, task: Task) {
        debug!("Recorded task: {}", task.action);
        self.current_sequence.lock().push(task);
    }

    /// Close the current batch and, when learning, analyze it.
    ///
    /// Returns the skills registered from the batch.
    pub fn record_sequence_completion(&self, success: bool) -> Vec<Arc<dyn Skill>> {
        let sequence = std::mem::take(&mut *self.current_sequence.lock());
        if sequence.is_empty() || !self.config.learning_enabled {
            return Vec::new();
        }

        if sequence.len() < self.config.min_tasks_for_learning {
            debug!(
                "Sequence of {} tasks too short to learn from (minimum {})",
                sequence.len(),
                self.config.min_tasks_for_learning
            );
            return Vec::new();
        }

        debug!(
            "Analyzing completed sequence of {} tasks (success: {})",
            sequence.len(),
            success
        );

        let generated = self.generator.analyze_task_sequence(&sequence, success);
        if !generated.is_empty() {
            info!("Generated {} new skills from experience", generated.len());
        }
        generated
    }

    /// Record a skill execution; false when the skill is unknown
    pub fn record_skill_outcome(&self, skill_name: &str, success: bool, duration_ms: u64) -> bool {
        if !self.library.record_outcome(skill_name, success) {
            return false;
        }
        self.effectiveness.record_use(skill_name, success, duration_ms);
        true
    }

    /// Generate code for `skill_name`, run it and record the outcome
    pub fn execute_skill(
        &self,
        skill_name: &str,
        context: &SkillContext,
        engine: &dyn CodeEngine,
    ) -> ActionOutcome {
        let Some(skill) = self.library.get_skill(skill_name) else {
            return ActionOutcome::failure(&format!("Skill not found: {}", skill_name), 0);
        };

        self.record_usage(skill_name);
        let code = skill.generate_code(context);
        debug!("[Skill:{}] Executing code:\n{}", skill_name, code);

        let outcome = engine.execute(&code);
        self.record_skill_outcome(skill_name, outcome.success, outcome.elapsed_ms);
        outcome
    }

    pub fn clear_sequence(&self) {
        self.current_sequence.lock().clear();
    }

    pub fn current_sequence_len(&self) -> usize {
        self.current_sequence.lock().len()
    }

    pub fn usage_count(&self, skill_name: &str) -> u64 {
        self.usage.lock().get(skill_name).copied().unwrap_or(0)
    }

    pub fn stats(&self) -> IntegrationStats {
        IntegrationStats {
            library: self.library.stats(),
            generator: self.generator.stats(),
            skill_usage: self.usage.lock().clone(),
            current_sequence_size: self.current_sequence_len(),
            learning_enabled: self.config.learning_enabled,
            lookup_enabled: self.config.lookup_enabled,
        }
    }

    fn record_usage(&self, skill_name: &str) {
        *self.usage.lock().entry(skill_name.to_string()).or_insert(0) += 1;
    }
}

/// Context for code generation parsed from a natural-language command
pub fn command_context(command: &str, position: Option<Position>) -> SkillContext {
    let mut context = SkillContext::new();

    if let Some(pos) = position {
        context.insert("startX".to_string(), json!(pos.x));
        context.insert("startY".to_string(), json!(pos.y));
        context.insert("startZ".to_string(), json!(pos.z));
    }

    if let Some(quantity) = FIRST_NUMBER
        .find(command)
        .and_then(|m| m.as_str().parse::<i64>().ok())
    {
        context.insert("quantity".to_string(), json!(quantity));
    }

    let lower = command.to_lowercase();
    if let Some(direction) = DIRECTIONS.iter().find(|d| lower.contains(*d)) {
        context.insert("direction".to_string(), json!(direction));
    }
    if let Some((_, block)) = BLOCK_WORDS.iter().find(|(word, _)| lower.contains(word)) {
        context.insert("block".to_string(), json!(block));
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedEngine {
        success: bool,
        ran: Mutex<Vec<String>>,
    }

    impl CodeEngine for FixedEngine {
        fn execute(&self, code: &str) -> ActionOutcome {
            self.ran.lock().push(code.to_string());
            if self.success {
                ActionOutcome::success(120)
            } else {
                ActionOutcome::failure("boom", 120)
            }
        }
    }

    fn integration(
        library: SkillLibrary,
    ) -> (Arc<SkillLibrary>, Arc<EffectivenessTracker>, SkillIntegration) {
        let library = Arc::new(library);
        let validator = Arc::new(SkillValidator::new(library.clone(), 50));
        let effectiveness = Arc::new(EffectivenessTracker::new());
        let integration = SkillIntegration::new(validator, effectiveness.clone());
        (library, effectiveness, integration)
    }

    #[test]
    fn test_command_context() {
        let context = command_context(
            "Dig 12 blocks NORTH through cobblestone",
            Some(Position::new(1, 64, -3)),
        );
        assert_eq!(context["startX"], json!(1));
        assert_eq!(context["startY"], json!(64));
        assert_eq!(context["startZ"], json!(-3));
        assert_eq!(context["quantity"], json!(12));
        assert_eq!(context["direction"], json!("north"));
        // "stone" is checked before "cobble"
        assert_eq!(context["block"], json!("stone"));

        let context = command_context("chop wood", None);
        assert_eq!(context.len(), 1);
        assert_eq!(context["block"], json!("oak_log"));
    }

    #[test]
    fn test_plan_with_builtin_skill() {
        let (_, _, integration) = integration(SkillLibrary::new());

        let planned = integration
            .plan_with_skills("dig a staircase 12 blocks north", Some(Position::new(0, 70, 0)))
            .unwrap();
        assert_eq!(planned.skill_name, "digStaircase");
        assert!(planned.code.contains("var direction = \"north\";"));
        assert_eq!(integration.usage_count("digStaircase"), 1);

        let task = planned.into_task();
        assert_eq!(task.action, EXECUTE_SKILL_ACTION);
        assert_eq!(task.string_param("skillName").as_deref(), Some("digStaircase"));
        assert_eq!(task.param("context").unwrap()["quantity"], json!(12));
    }

    #[test]
    fn test_plan_rejects_unreliable_skill() {
        let (library, _, integration) = integration(SkillLibrary::new());
        library.record_outcome("digStaircase", true);
        library.record_outcome("digStaircase", false);

        assert!(integration.plan_with_skills("dig a staircase", None).is_none());
        assert!(integration.plan_with_skills("xyzzy", None).is_none());
    }

    #[test]
    fn test_lookup_disabled() {
        let library = Arc::new(SkillLibrary::new());
        let validator = Arc::new(SkillValidator::new(library, 50));
        let integration = SkillIntegration::with_config(
            IntegrationConfig {
                lookup_enabled: false,
                ..Default::default()
            },
            GeneratorConfig::default(),
            validator,
            Arc::new(EffectivenessTracker::new()),
        );
        assert!(integration.plan_with_skills("dig a staircase", None).is_none());
    }

    #[test]
    fn test_extreme_coordinates_do_not_break_completion() {
        let (_, _, integration) = integration(SkillLibrary::empty());
        for x in [i64::MIN, 0, i64::MAX] {
            integration.record_task(Task::new("place").with_param("x", x));
        }

        integration.record_sequence_completion(true);
        assert_eq!(integration.current_sequence_len(), 0);
        assert_eq!(integration.stats().current_sequence_size, 0);
    }

    #[test]
    fn test_sequence_completion_learns() {
        let (library, _, integration) = integration(SkillLibrary::empty());
        let batch = || {
            for i in 0..4 {
                let task = Task::new("place")
                    .with_param("x", i * 2)
                    .with_param("block", "stone");
                integration.record_task(task);
            }
        };

        batch();
        assert_eq!(integration.current_sequence_len(), 4);
        assert!(integration.record_sequence_completion(true).is_empty());
        assert_eq!(integration.current_sequence_len(), 0);

        batch();
        let learned = integration.record_sequence_completion(true);
        assert_eq!(learned.len(), 2);
        assert_eq!(library.len(), 2);
        assert_eq!(integration.stats().generator.generated_skills, 2);
    }

    #[test]
    fn test_short_sequence_ignored() {
        let (_, _, integration) = integration(SkillLibrary::empty());
        integration.record_task(Task::new("mine"));
        integration.record_task(Task::new("mine"));
        assert!(integration.record_sequence_completion(true).is_empty());
        assert_eq!(integration.stats().generator.tracked_patterns, 0);
    }

    #[test]
    fn test_execute_skill_records_outcome() {
        let (library, effectiveness, integration) = integration(SkillLibrary::new());
        let engine = FixedEngine {
            success: false,
            ran: Mutex::new(Vec::new()),
        };

        let mut context = SkillContext::new();
        context.insert("radius".to_string(), json!(8));
        let outcome = integration.execute_skill("collectDrops", &context, &engine);

        assert!(!outcome.success);
        assert!(engine.ran.lock()[0].contains("var radius = 8;"));
        assert_eq!(library.get_skill("collectDrops").unwrap().execution_count(), 1);
        assert_eq!(effectiveness.execution_count("collectDrops"), 1);
        assert_eq!(effectiveness.average_duration("collectDrops"), 120);
        assert_eq!(integration.usage_count("collectDrops"), 1);

        let missing = integration.execute_skill("nope", &context, &engine);
        assert_eq!(missing.message.as_deref(), Some("Skill not found: nope"));
        assert!(!integration.record_skill_outcome("nope", true, 10));
    }
}
