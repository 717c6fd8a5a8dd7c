//! Configuration management
//!
//! Defaults, then an optional TOML file, then `AUTOSKILL_*` environment
//! variables. Invalid environment values are ignored with a warning.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::autonomous::{IntegrationConfig, LoopConfig};
use crate::effectiveness::EffectivenessConfig;
use crate::patterns::ExtractorConfig;
use crate::skills::GeneratorConfig;
use crate::tracker::TrackerConfig;

/// Learning pipeline configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between learning cycles
    pub learning_interval_secs: u64,

    /// Run the refinement pass every N cycles
    pub refinement_every_cycles: u64,

    /// Executions before a skill is evaluated for refinement
    pub min_executions_for_evaluation: u64,

    /// Completed sequences kept by the tracker
    pub max_sequences: usize,

    /// Sequences a pattern must appear in
    pub min_pattern_frequency: usize,

    pub min_pattern_success_rate: f64,

    /// Cap on auto-generated skills
    pub max_generated_skills: usize,

    /// Recent-outcome window for trend detection
    pub recent_window: usize,

    /// Batches a structural pattern must appear in
    pub structural_min_frequency: usize,

    pub learning_enabled: bool,

    pub skill_lookup_enabled: bool,

    /// Minimum success rate for a skill to replace planning
    pub min_skill_success_rate: f64,

    pub min_tasks_for_learning: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            learning_interval_secs: 30,
            refinement_every_cycles: 10,
            min_executions_for_evaluation: 5,
            max_sequences: 1000,
            min_pattern_frequency: 3,
            min_pattern_success_rate: 0.7,
            max_generated_skills: 50,
            recent_window: 10,
            structural_min_frequency: 2,
            learning_enabled: true,
            skill_lookup_enabled: true,
            min_skill_success_rate: 0.7,
            min_tasks_for_learning: 3,
        }
    }
}

impl Config {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply `AUTOSKILL_*` overrides read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| lookup(&format!("AUTOSKILL_{}", name));

        override_from(&env, "LEARNING_INTERVAL_SECS", &mut self.learning_interval_secs);
        override_from(&env, "REFINEMENT_EVERY_CYCLES", &mut self.refinement_every_cycles);
        override_from(
            &env,
            "MIN_EXECUTIONS_FOR_EVALUATION",
            &mut self.min_executions_for_evaluation,
        );
        override_from(&env, "MAX_SEQUENCES", &mut self.max_sequences);
        override_from(&env, "MIN_PATTERN_FREQUENCY", &mut self.min_pattern_frequency);
        override_from(&env, "MIN_PATTERN_SUCCESS_RATE", &mut self.min_pattern_success_rate);
        override_from(&env, "MAX_GENERATED_SKILLS", &mut self.max_generated_skills);
        override_from(&env, "RECENT_WINDOW", &mut self.recent_window);
        override_from(&env, "STRUCTURAL_MIN_FREQUENCY", &mut self.structural_min_frequency);
        override_from(&env, "MIN_SKILL_SUCCESS_RATE", &mut self.min_skill_success_rate);
        override_from(&env, "MIN_TASKS_FOR_LEARNING", &mut self.min_tasks_for_learning);

        if let Some(v) = env("LEARNING_ENABLED") {
            self.learning_enabled = v == "true" || v == "1";
        }
        if let Some(v) = env("SKILL_LOOKUP_ENABLED") {
            self.skill_lookup_enabled = v == "true" || v == "1";
        }
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            max_sequences: self.max_sequences,
        }
    }

    pub fn extractor_config(&self) -> ExtractorConfig {
        ExtractorConfig {
            min_frequency: self.min_pattern_frequency,
            min_success_rate: self.min_pattern_success_rate,
        }
    }

    pub fn effectiveness_config(&self) -> EffectivenessConfig {
        EffectivenessConfig::new(self.recent_window)
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            min_frequency: self.structural_min_frequency,
            ..Default::default()
        }
    }

    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            interval: Duration::from_secs(self.learning_interval_secs),
            refinement_every_cycles: self.refinement_every_cycles,
            min_executions_for_evaluation: self.min_executions_for_evaluation,
            extractor: self.extractor_config(),
        }
    }

    pub fn integration_config(&self) -> IntegrationConfig {
        IntegrationConfig {
            learning_enabled: self.learning_enabled,
            lookup_enabled: self.skill_lookup_enabled,
            min_success_rate: self.min_skill_success_rate,
            min_tasks_for_learning: self.min_tasks_for_learning,
        }
    }
}

fn override_from<T, F>(env: &F, name: &str, target: &mut T)
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = env(name) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *target = value,
        Err(_) => warn!("Ignoring invalid AUTOSKILL_{}: {:?}", name, raw),
    }
}
