//! Skills
//!
//! Learned and built-in procedures the agent can run instead of planning.
//!
//! # Architecture
//!
//! ```text
//! Pattern ─────► SkillAutoGenerator ─┐
//!                                     ├─► SkillValidator ─► SkillLibrary
//! TaskPattern ─► SkillGenerator ─────┘        (cap, dupes,      (name, category,
//!                                              allowlist)        signature index)
//! ```
//!
//! # Templates
//!
//! Skill bodies are code templates rendered against a context map:
//!
//! ```text
//! var depth = {{depth}};
//! agent.placeBlock({{block:quote}}, startX, startY, startZ);
//! ```

pub mod auto_generator;
pub mod builtin;
pub mod generator;
pub mod library;
pub mod template;
pub mod types;
pub mod validator;

pub use auto_generator::{skill_name, SkillAutoGenerator};
pub use builtin::builtin_skills;
pub use generator::{GeneratorConfig, GeneratorStats, SkillGenerator};
pub use library::{skill_signature, LibraryStats, SkillLibrary};
pub use template::{render, SkillContext};
pub use types::{
    CodeEngine, ExecutableSkill, ExecutableSkillBuilder, Skill, SkillCategory,
    SkillValidationError,
};
pub use validator::{is_known_action, SkillValidator, KNOWN_ACTIONS};
