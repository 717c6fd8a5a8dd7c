//! Registration gate shared by both skill generators.
//!
//! A generated skill is admitted only when:
//! - the generation cap has not been reached
//! - no skill with the same name exists
//! - no skill with the same signature exists
//! - every required action is a known executor action
//!
//! Built-in skills bypass the gate and do not count toward the cap.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::library::SkillLibrary;
use super::types::Skill;

/// Actions the executor knows how to perform
pub const KNOWN_ACTIONS: &[&str] = &[
    "pathfind", "mine", "place", "craft", "attack", "follow", "gather", "build", "organize",
    "collect",
];

pub fn is_known_action(action: &str) -> bool {
    KNOWN_ACTIONS.contains(&action)
}

pub struct SkillValidator {
    library: Arc<SkillLibrary>,
    max_generated: usize,
    generated: AtomicUsize,
}

impl SkillValidator {
    pub fn new(library: Arc<SkillLibrary>, max_generated: usize) -> Self {
        Self {
            library,
            max_generated,
            generated: AtomicUsize::new(0),
        }
    }

    pub fn library(&self) -> &Arc<SkillLibrary> {
        &self.library
    }

    pub fn generated_count(&self) -> usize {
        self.generated.load(Ordering::SeqCst)
    }

    pub fn max_generated(&self) -> usize {
        self.max_generated
    }

    pub fn at_capacity(&self) -> bool {
        self.generated_count() >= self.max_generated
    }

    /// Check a generated skill against the cap, the library and the allowlist
    pub fn validate(&self, skill: &dyn Skill) -> bool {
        if self.at_capacity() {
            debug!(
                "Reached maximum auto-generated skills limit ({})",
                self.max_generated
            );
            return false;
        }

        if self.library.has_skill(skill.name()) {
            debug!("Skill with name '{}' already exists", skill.name());
            return false;
        }

        if self.library.has_signature(skill) {
            debug!("Skill '{}' duplicates an existing signature", skill.name());
            return false;
        }

        if let Some(action) = skill.required_actions().iter().find(|a| !is_known_action(a)) {
            warn!(
                "Skill '{}' requires unknown action '{}'",
                skill.name(),
                action
            );
            return false;
        }

        true
    }

    /// Validate and add a generated skill, counting it toward the cap
    pub fn register(&self, skill: Arc<dyn Skill>) -> bool {
        if !self.validate(skill.as_ref()) {
            return false;
        }

        let max = self.max_generated;
        let reserved = self
            .generated
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
            .is_ok();
        if !reserved {
            debug!("Generation cap reached while registering '{}'", skill.name());
            return false;
        }

        let name = skill.name().to_string();
        if self.library.add_skill(skill) {
            info!(
                "Registered generated skill '{}' ({}/{})",
                name,
                self.generated_count(),
                max
            );
            true
        } else {
            self.generated.fetch_sub(1, Ordering::SeqCst);
            false
        }
    }

    /// Reset the generated-skill counter
    pub fn reset(&self) {
        self.generated.store(0, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::types::ExecutableSkill;

    fn generated(name: &str, actions: &[&str]) -> Arc<dyn Skill> {
        Arc::new(
            ExecutableSkill::builder(name)
                .description(format!("Generated {}", name))
                .code_template("agent.run();")
                .required_actions(actions.iter().copied())
                .build()
                .unwrap(),
        )
    }

    #[test]
    fn test_unknown_action_rejected() {
        let validator = SkillValidator::new(Arc::new(SkillLibrary::empty()), 50);
        assert!(!validator.register(generated("a", &["teleport"])));
        assert_eq!(validator.generated_count(), 0);
    }

    #[test]
    fn test_cap_enforced() {
        let library = Arc::new(SkillLibrary::empty());
        let validator = SkillValidator::new(library.clone(), 2);

        assert!(validator.register(generated("a", &["mine"])));
        assert!(validator.register(generated("b", &["mine"])));

        let third = generated("c", &["mine"]);
        assert!(!validator.validate(third.as_ref()));
        assert!(!validator.register(third));
        assert_eq!(library.len(), 2);

        validator.reset();
        assert!(validator.register(generated("c", &["mine"])));
    }

    #[test]
    fn test_duplicate_does_not_consume_slot() {
        let validator = SkillValidator::new(Arc::new(SkillLibrary::empty()), 5);
        assert!(validator.register(generated("a", &["mine"])));
        assert!(!validator.register(generated("a", &["place"])));
        assert_eq!(validator.generated_count(), 1);
    }
}
