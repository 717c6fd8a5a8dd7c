//! Autoskill
//!
//! Autonomous skill learning for task-executing agents.
//!
//! # Features
//!
//! - **Execution Tracking**: per-agent action streams, successful episodes kept
//! - **Pattern Extraction**: statistical clustering of episodes by signature
//! - **Pattern Detection**: loop, sequence and parameterized structure in task batches
//! - **Skill Generation**: template code with `{{name}}` / `{{name:quote}}` placeholders
//! - **Skill Library**: name, category and signature indexes plus semantic search
//! - **Effectiveness**: success rate, speed, trend and recommendations per skill
//! - **Learning Loop**: periodic generation and effectiveness-driven pruning
//!
//! # Architecture
//!
//! ```text
//! Executor ──► ExecutionTracker ──► PatternExtractor ──► SkillAutoGenerator ─┐
//!                                                                           ├─► SkillValidator ──► SkillLibrary
//! Planner ───► SkillIntegration ──► detect_patterns ───► SkillGenerator ─────┘          │
//!                   │                                                                   │
//!                   └──── outcomes ──► EffectivenessTracker ◄── LearningLoop ◄───────────┘
//! ```

pub mod autonomous;
pub mod config;
pub mod effectiveness;
pub mod patterns;
pub mod replay;
pub mod sequence;
pub mod skills;
pub mod task;
pub mod tracker;

pub use autonomous::{
    CycleReport, IntegrationConfig, LearningLoop, LoopConfig, LoopStatus, PlannedSkill, Position,
    SkillIntegration,
};
pub use config::Config;
pub use effectiveness::{EffectivenessConfig, EffectivenessTracker, Recommendation, Trend};
pub use patterns::{detect_patterns, ExtractorConfig, Pattern, PatternExtractor, TaskPattern};
pub use sequence::{ActionRecord, ExecutionSequence, SequenceBuilder};
pub use skills::{
    CodeEngine, ExecutableSkill, Skill, SkillAutoGenerator, SkillCategory, SkillContext,
    SkillGenerator, SkillLibrary, SkillValidator,
};
pub use task::{ActionOutcome, Task};
pub use tracker::{ExecutionTracker, TrackerConfig, TrackerStats};
