//! Autonomous Learning
//!
//! Closes the loop between observed behaviour and the skill library:
//! - **Learning loop**: periodic extraction, generation and pruning
//! - **Integration**: planner-facing lookup, batch learning and outcome
//!   recording

mod integration;
mod learning_loop;

pub use integration::{
    command_context, IntegrationConfig, IntegrationStats, PlannedSkill, Position,
    SkillIntegration, EXECUTE_SKILL_ACTION,
};
pub use learning_loop::{CycleReport, LearningLoop, LoopConfig, LoopStatus, RefinementCallback};
