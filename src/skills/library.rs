//! Skill Library
//!
//! Thread-safe registry of built-in and learned skills.
//!
//! Every skill is indexed three ways:
//! - by name (primary key)
//! - by category
//! - by signature `category:hash(description):hash(required actions)`,
//!   used to reject behavioural duplicates registered under a new name

use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::builtin::builtin_skills;
use super::types::{Skill, SkillCategory};
use crate::task::Task;

/// Maximum results returned by semantic search
const SEARCH_LIMIT: usize = 10;

/// Score bonus for each exact word match
const EXACT_MATCH_BONUS: f64 = 0.2;

/// Library statistics snapshot
#[derive(Debug, Clone, Default, Serialize)]
pub struct LibraryStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
    pub total_executions: u64,
}

#[derive(Default)]
struct LibraryInner {
    skills: HashMap<String, Arc<dyn Skill>>,
    categories: HashMap<SkillCategory, BTreeSet<String>>,
    signatures: HashSet<String>,
}

/// Registry of all skills
pub struct SkillLibrary {
    inner: RwLock<LibraryInner>,
}

impl SkillLibrary {
    /// Create a library pre-loaded with the built-in skills
    pub fn new() -> Self {
        let library = Self::empty();
        for skill in builtin_skills() {
            library.add_skill(Arc::new(skill));
        }
        info!("SkillLibrary initialized with {} built-in skills", library.len());
        library
    }

    /// Create a library with no skills at all
    pub fn empty() -> Self {
        Self {
            inner: RwLock::new(LibraryInner::default()),
        }
    }

    /// Register a skill.
    ///
    /// Returns false when the name or the signature is already present.
    pub fn add_skill(&self, skill: Arc<dyn Skill>) -> bool {
        let name = skill.name().to_string();
        let signature = skill_signature(skill.as_ref());

        let mut inner = self.inner.write();

        if inner.skills.contains_key(&name) {
            debug!("Skill '{}' already exists in library", name);
            return false;
        }

        if inner.signatures.contains(&signature) {
            debug!("Skill with signature '{}' already exists", signature);
            return false;
        }

        let category = skill.category();
        inner.skills.insert(name.clone(), skill);
        inner.categories.entry(category).or_default().insert(name.clone());
        inner.signatures.insert(signature);

        info!(
            "Added skill '{}' to library (category: {}, total: {})",
            name,
            category,
            inner.skills.len()
        );
        true
    }

    pub fn get_skill(&self, name: &str) -> Option<Arc<dyn Skill>> {
        self.inner.read().skills.get(name).cloned()
    }

    pub fn has_skill(&self, name: &str) -> bool {
        self.inner.read().skills.contains_key(name)
    }

    /// Check whether a skill with the same behavioural signature exists
    pub fn has_signature(&self, skill: &dyn Skill) -> bool {
        self.inner.read().signatures.contains(&skill_signature(skill))
    }

    pub fn remove_skill(&self, name: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(removed) = inner.skills.remove(name) else {
            return false;
        };

        let category = removed.category();
        if let Some(names) = inner.categories.get_mut(&category) {
            names.remove(name);
            if names.is_empty() {
                inner.categories.remove(&category);
            }
        }
        inner.signatures.remove(&skill_signature(removed.as_ref()));

        info!("Removed skill '{}' from library", name);
        true
    }

    pub fn skills_by_category(&self, category: SkillCategory) -> Vec<Arc<dyn Skill>> {
        let inner = self.inner.read();
        inner
            .categories
            .get(&category)
            .map(|names| names.iter().filter_map(|n| inner.skills.get(n).cloned()).collect())
            .unwrap_or_default()
    }

    /// All skills, best success rate first
    pub fn skills_by_success_rate(&self) -> Vec<Arc<dyn Skill>> {
        let mut skills: Vec<_> = self.inner.read().skills.values().cloned().collect();
        sort_by_success_rate(&mut skills);
        skills
    }

    /// Skills that accept `task`, best success rate first
    pub fn find_applicable_skills(&self, task: &Task) -> Vec<Arc<dyn Skill>> {
        let mut skills: Vec<_> = self
            .inner
            .read()
            .skills
            .values()
            .filter(|s| s.is_applicable(task))
            .cloned()
            .collect();
        sort_by_success_rate(&mut skills);
        skills
    }

    /// Rank skills by how well their name and description match `query`.
    ///
    /// Returns at most ten skills with a non-zero score, best first.
    pub fn semantic_search(&self, query: &str) -> Vec<Arc<dyn Skill>> {
        let query = query.to_lowercase();
        let words: Vec<&str> = query.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(f64, Arc<dyn Skill>)> = self
            .inner
            .read()
            .skills
            .values()
            .filter_map(|skill| {
                let score = relevance(skill.as_ref(), &words);
                (score > 0.0).then(|| (score, skill.clone()))
            })
            .collect();

        scored.sort_by(|(a_score, a), (b_score, b)| {
            b_score
                .total_cmp(a_score)
                .then_with(|| a.name().cmp(b.name()))
        });

        scored
            .into_iter()
            .take(SEARCH_LIMIT)
            .map(|(_, skill)| skill)
            .collect()
    }

    /// Record an execution outcome; false when the skill is unknown
    pub fn record_outcome(&self, name: &str, success: bool) -> bool {
        match self.get_skill(name) {
            Some(skill) => {
                skill.record_success(success);
                debug!(
                    "Recorded outcome for skill '{}': {} (success rate: {:.2}%)",
                    name,
                    success,
                    skill.success_rate() * 100.0
                );
                true
            }
            None => {
                debug!("Cannot record outcome for unknown skill '{}'", name);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().skills.is_empty()
    }

    /// Skill names in alphabetical order
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().skills.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn stats(&self) -> LibraryStats {
        let inner = self.inner.read();
        LibraryStats {
            total: inner.skills.len(),
            by_category: inner
                .categories
                .iter()
                .map(|(category, names)| (category.to_string(), names.len()))
                .collect(),
            total_executions: inner.skills.values().map(|s| s.execution_count()).sum(),
        }
    }
}

impl Default for SkillLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Duplicate-detection key: category, description hash, required-actions hash
pub fn skill_signature(skill: &dyn Skill) -> String {
    format!(
        "{}:{}:{}",
        skill.category(),
        short_hash(skill.description()),
        short_hash(&skill.required_actions().join("\u{1f}"))
    )
}

pub(crate) fn short_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    hex::encode(&digest[..8])
}

fn sort_by_success_rate(skills: &mut [Arc<dyn Skill>]) {
    skills.sort_by(|a, b| {
        b.success_rate()
            .total_cmp(&a.success_rate())
            .then_with(|| a.name().cmp(b.name()))
    });
}

/// Fraction of query words found in name or description, plus a bonus per
/// exact match, weighted by success rate and clamped to 1.0
fn relevance(skill: &dyn Skill, words: &[&str]) -> f64 {
    let name = skill.name().to_lowercase();
    let description = skill.description().to_lowercase();

    let mut matches = 0usize;
    let mut exact = 0usize;
    for word in words {
        if name.contains(word) || description.contains(word) {
            matches += 1;
            if name == *word || description.starts_with(word) {
                exact += 1;
            }
        }
    }

    if matches == 0 {
        return 0.0;
    }

    let mut score = matches as f64 / words.len() as f64;
    score += exact as f64 * EXACT_MATCH_BONUS;
    score *= 0.5 + skill.success_rate();
    score.min(1.0)
}
