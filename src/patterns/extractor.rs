//! Pattern Extractor
//!
//! Offline analysis over stored execution sequences:
//! 1. Group sequences by signature
//! 2. Compute frequency and success statistics per group
//! 3. Infer which parameters vary between runs
//! 4. Name each group after its most common goal word
//! 5. Keep groups that clear the frequency and success-rate floors

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::sequence::{is_variable_parameter, ExecutionSequence};

/// Name used when no goal word is long enough
const DEFAULT_PATTERN_NAME: &str = "Pattern";

/// Goal words of this length or shorter are ignored for naming
const MIN_NAME_WORD_LEN: usize = 3;

/// Configuration for the pattern extractor
#[derive(Debug, Clone)]
pub struct ExtractorConfig {
    /// Minimum sequences sharing a signature
    pub min_frequency: usize,
    /// Minimum successful fraction of a group
    pub min_success_rate: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_frequency: 3,
            min_success_rate: 0.7,
        }
    }
}

/// A recurring action sequence discovered across stored episodes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    pub signature: String,
    pub name: String,
    pub action_sequence: Vec<String>,
    /// Parameter names that vary between runs
    pub parameters: BTreeSet<String>,
    pub frequency: usize,
    pub success_rate: f64,
    /// Mean total duration of the grouped sequences in milliseconds
    pub average_execution_ms: f64,
    pub success_count: usize,
    pub failure_count: usize,
}

impl Pattern {
    /// Success rate weighted 0.7, frequency (saturating at 10) weighted 0.3
    pub fn confidence(&self) -> f64 {
        self.success_rate * 0.7 + (self.frequency as f64 / 10.0).min(1.0) * 0.3
    }

    pub fn is_high_confidence(&self) -> bool {
        self.confidence() >= 0.8
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pattern[name={}, frequency={}, successRate={:.2}%, confidence={:.2}]",
            self.name,
            self.frequency,
            self.success_rate * 100.0,
            self.confidence()
        )
    }
}

/// Clusters execution sequences into patterns
pub struct PatternExtractor {
    config: ExtractorConfig,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self::with_config(ExtractorConfig::default())
    }

    pub fn with_config(config: ExtractorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract viable patterns, most frequent first.
    ///
    /// Groups keep first-encounter order before the (stable) sort, so equal
    /// input yields equal output.
    pub fn extract_patterns(&self, sequences: &[Arc<ExecutionSequence>]) -> Vec<Pattern> {
        if sequences.is_empty() {
            debug!("No sequences provided for pattern extraction");
            return Vec::new();
        }

        info!("Extracting patterns from {} sequences", sequences.len());

        let groups = group_by_signature(sequences);
        debug!(
            "Found {} unique signatures across {} sequences",
            groups.len(),
            sequences.len()
        );

        let mut patterns: Vec<Pattern> = groups
            .into_iter()
            .filter_map(|(signature, group)| create_pattern(signature, &group))
            .filter(|p| self.meets_thresholds(p))
            .collect();

        patterns.sort_by(|a, b| b.frequency.cmp(&a.frequency));

        info!(
            "Extracted {} viable patterns from {} sequences",
            patterns.len(),
            sequences.len()
        );

        patterns
    }

    fn meets_thresholds(&self, pattern: &Pattern) -> bool {
        if pattern.frequency < self.config.min_frequency {
            debug!(
                "Pattern '{}' below frequency threshold: {} < {}",
                pattern.name, pattern.frequency, self.config.min_frequency
            );
            return false;
        }

        if pattern.success_rate < self.config.min_success_rate {
            debug!(
                "Pattern '{}' below success rate threshold: {:.2} < {:.2}",
                pattern.name, pattern.success_rate, self.config.min_success_rate
            );
            return false;
        }

        true
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

fn group_by_signature(sequences: &[Arc<ExecutionSequence>]) -> Vec<(String, Vec<&ExecutionSequence>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<&ExecutionSequence>)> = Vec::new();

    for sequence in sequences {
        let sequence: &ExecutionSequence = sequence.as_ref();
        let signature = sequence.signature();
        match index.get(&signature) {
            Some(&i) => groups[i].1.push(sequence),
            None => {
                index.insert(signature.clone(), groups.len());
                groups.push((signature, vec![sequence]));
            }
        }
    }

    groups
}

fn create_pattern(signature: String, group: &[&ExecutionSequence]) -> Option<Pattern> {
    let first = group.first()?;

    let frequency = group.len();
    let success_count = group.iter().filter(|s| s.is_successful()).count();
    let success_rate = success_count as f64 / frequency as f64;

    let action_sequence = first
        .actions()
        .iter()
        .map(|a| a.action_type().to_string())
        .collect();

    let parameters = group
        .iter()
        .flat_map(|s| s.actions())
        .flat_map(|a| a.parameters().keys())
        .filter(|name| is_variable_parameter(name))
        .cloned()
        .collect();

    let total_ms: u64 = group.iter().map(|s| s.total_duration_ms()).sum();

    Some(Pattern {
        signature,
        name: pattern_name(group),
        action_sequence,
        parameters,
        frequency,
        success_rate,
        average_execution_ms: total_ms as f64 / frequency as f64,
        success_count,
        failure_count: frequency - success_count,
    })
}

/// Most frequent goal word longer than three characters, capitalized.
/// Ties go to the word seen first.
fn pattern_name(group: &[&ExecutionSequence]) -> String {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for sequence in group {
        for word in sequence.goal().to_lowercase().split_whitespace() {
            if word.chars().count() <= MIN_NAME_WORD_LEN {
                continue;
            }
            match index.get(word) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    index.insert(word.to_string(), counts.len());
                    counts.push((word.to_string(), 1));
                }
            }
        }
    }

    let mut best: Option<&(String, usize)> = None;
    for entry in &counts {
        if best.map_or(true, |b| entry.1 > b.1) {
            best = Some(entry);
        }
    }

    match best {
        Some((word, _)) => capitalize(word),
        None => DEFAULT_PATTERN_NAME.to_string(),
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::ActionRecord;
    use crate::task::Parameters;
    use serde_json::json;

    fn episode(goal: &str, x: i64, success: bool) -> Arc<ExecutionSequence> {
        let mut pathfind = Parameters::new();
        pathfind.insert("x".to_string(), json!(x));
        let mut mine = Parameters::new();
        mine.insert("block".to_string(), json!("iron_ore"));

        Arc::new(
            ExecutionSequence::builder("a1", goal)
                .with_action(ActionRecord::success("pathfind", pathfind, 100))
                .with_action(ActionRecord::success("mine", mine, 200))
                .build_with_outcome(success),
        )
    }

    #[test]
    fn test_groups_by_signature() {
        let sequences: Vec<_> = (0..4).map(|i| episode("mine iron ore", i, true)).collect();
        let patterns = PatternExtractor::new().extract_patterns(&sequences);

        assert_eq!(patterns.len(), 1);
        let pattern = &patterns[0];
        assert_eq!(pattern.frequency, 4);
        assert_eq!(pattern.success_rate, 1.0);
        assert_eq!(pattern.action_sequence, vec!["pathfind", "mine"]);
        assert!(pattern.parameters.contains("x"));
        assert!(!pattern.parameters.contains("block"));
        assert_eq!(pattern.average_execution_ms, 300.0);
        assert_eq!(pattern.name, "Mine");
    }

    #[test]
    fn test_below_frequency_is_dropped() {
        let sequences: Vec<_> = (0..2).map(|i| episode("mine iron", i, true)).collect();
        assert!(PatternExtractor::new().extract_patterns(&sequences).is_empty());
    }

    #[test]
    fn test_below_success_rate_is_dropped() {
        let sequences = vec![
            episode("mine iron", 0, true),
            episode("mine iron", 1, false),
            episode("mine iron", 2, false),
        ];
        assert!(PatternExtractor::new().extract_patterns(&sequences).is_empty());
    }

    #[test]
    fn test_name_ties_go_to_first_word() {
        let sequences = vec![
            episode("collect iron", 0, true),
            episode("iron collect", 1, true),
            episode("go", 2, true),
        ];
        let patterns = PatternExtractor::new().extract_patterns(&sequences);
        assert_eq!(patterns[0].name, "Collect");
    }

    #[test]
    fn test_default_name_without_long_words() {
        let sequences: Vec<_> = (0..3).map(|i| episode("dig it", i, true)).collect();
        let patterns = PatternExtractor::new().extract_patterns(&sequences);
        assert_eq!(patterns[0].name, "Pattern");
    }

    #[test]
    fn test_confidence() {
        let sequences: Vec<_> = (0..5).map(|i| episode("mine iron", i, true)).collect();
        let pattern = &PatternExtractor::new().extract_patterns(&sequences)[0];

        assert!((pattern.confidence() - 0.85).abs() < 1e-9);
        assert!(pattern.is_high_confidence());
    }
}
