//! Skill Effectiveness Tracking
//!
//! Rolling statistics per skill drive usage recommendations:
//! - lifetime totals (executions, successes, time) for the headline rates
//! - a bounded window of recent outcomes for trend detection only
//!
//! Effectiveness weighs success rate 0.7 and speed 0.3, where speed falls
//! linearly to zero at five seconds per execution.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Executions needed before any recommendation is made
const MIN_EXECUTIONS_FOR_RECOMMENDATION: u64 = 3;

/// Average duration at which the speed component reaches zero
const SLOW_EXECUTION_MS: f64 = 5000.0;

/// Hysteresis band between recent and lifetime success rate
const TREND_BAND: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct EffectivenessConfig {
    /// Size of the recent-outcome window, at least 1
    pub recent_window: usize,
}

impl EffectivenessConfig {
    pub fn new(recent_window: usize) -> Self {
        Self {
            recent_window: recent_window.max(1),
        }
    }
}

impl Default for EffectivenessConfig {
    fn default() -> Self {
        Self { recent_window: 10 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    /// Reliable and fast enough to prefer over planning
    Use,
    /// Unreliable or getting worse; should be removed
    Avoid,
    /// Usable with caution
    Consider,
    /// Mediocre; worth regenerating
    Refine,
    /// Not enough data
    Unknown,
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Use => "USE",
            Self::Avoid => "AVOID",
            Self::Consider => "CONSIDER",
            Self::Refine => "REFINE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Per-skill counters
pub struct SkillStats {
    total_executions: AtomicU64,
    success_count: AtomicU64,
    total_duration_ms: AtomicU64,
    recent: Mutex<VecDeque<bool>>,
    window: usize,
}

impl SkillStats {
    fn new(window: usize) -> Self {
        Self {
            total_executions: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            total_duration_ms: AtomicU64::new(0),
            recent: Mutex::new(VecDeque::with_capacity(window + 1)),
            window,
        }
    }

    fn record(&self, success: bool, duration_ms: u64) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        if success {
            self.success_count.fetch_add(1, Ordering::Relaxed);
        }
        self.total_duration_ms.fetch_add(duration_ms, Ordering::Relaxed);

        let mut recent = self.recent.lock();
        recent.push_back(success);
        while recent.len() > self.window {
            recent.pop_front();
        }
    }

    pub fn total_executions(&self) -> u64 {
        self.total_executions.load(Ordering::Relaxed)
    }

    pub fn success_count(&self) -> u64 {
        self.success_count.load(Ordering::Relaxed)
    }

    /// 0.0 when never executed
    pub fn success_rate(&self) -> f64 {
        match self.total_executions() {
            0 => 0.0,
            total => self.success_count() as f64 / total as f64,
        }
    }

    /// Whole milliseconds, 0 when never executed
    pub fn average_duration_ms(&self) -> u64 {
        match self.total_executions() {
            0 => 0,
            total => self.total_duration_ms.load(Ordering::Relaxed) / total,
        }
    }

    pub fn effectiveness(&self) -> f64 {
        if self.total_executions() == 0 {
            return 0.0;
        }
        let speed = (1.0 - self.average_duration_ms() as f64 / SLOW_EXECUTION_MS).max(0.0);
        (self.success_rate() * 0.7 + speed * 0.3).min(1.0)
    }

    /// Unknown until the recent window is full
    pub fn trend(&self) -> Trend {
        let recent_rate = {
            let recent = self.recent.lock();
            if recent.len() < self.window {
                return Trend::Unknown;
            }
            recent.iter().filter(|s| **s).count() as f64 / recent.len() as f64
        };

        let overall = self.success_rate();
        if recent_rate > overall + TREND_BAND {
            Trend::Improving
        } else if recent_rate < overall - TREND_BAND {
            Trend::Declining
        } else {
            Trend::Stable
        }
    }

    pub fn recommendation(&self) -> Recommendation {
        if self.total_executions() < MIN_EXECUTIONS_FOR_RECOMMENDATION {
            return Recommendation::Unknown;
        }

        let effectiveness = self.effectiveness();
        let trend = self.trend();

        if effectiveness >= 0.7 && matches!(trend, Trend::Stable | Trend::Improving) {
            Recommendation::Use
        } else if effectiveness < 0.4 || trend == Trend::Declining {
            Recommendation::Avoid
        } else if effectiveness >= 0.5 {
            Recommendation::Consider
        } else {
            Recommendation::Refine
        }
    }
}

/// Serializable view of one skill's statistics
#[derive(Debug, Clone, Serialize)]
pub struct SkillStatsSnapshot {
    pub skill_id: String,
    pub executions: u64,
    pub success_rate: f64,
    pub average_duration_ms: u64,
    pub effectiveness: f64,
    pub trend: Trend,
    pub recommendation: Recommendation,
}

/// Tracks effectiveness for every skill that has been used
pub struct EffectivenessTracker {
    config: EffectivenessConfig,
    stats: RwLock<HashMap<String, Arc<SkillStats>>>,
}

impl EffectivenessTracker {
    pub fn new() -> Self {
        Self::with_config(EffectivenessConfig::default())
    }

    pub fn with_config(mut config: EffectivenessConfig) -> Self {
        config.recent_window = config.recent_window.max(1);
        info!("Effectiveness tracker initialized (window: {})", config.recent_window);
        Self {
            config,
            stats: RwLock::new(HashMap::new()),
        }
    }

    fn get(&self, skill_id: &str) -> Option<Arc<SkillStats>> {
        self.stats.read().get(skill_id).cloned()
    }

    pub fn record_use(&self, skill_id: &str, success: bool, duration_ms: u64) {
        let stats = match self.get(skill_id) {
            Some(stats) => stats,
            None => self
                .stats
                .write()
                .entry(skill_id.to_string())
                .or_insert_with(|| Arc::new(SkillStats::new(self.config.recent_window)))
                .clone(),
        };

        stats.record(success, duration_ms);
        debug!(
            "Recorded skill execution: {} (success: {}, time: {}ms)",
            skill_id, success, duration_ms
        );
    }

    pub fn effectiveness_score(&self, skill_id: &str) -> f64 {
        self.get(skill_id).map_or(0.0, |s| s.effectiveness())
    }

    pub fn success_rate(&self, skill_id: &str) -> f64 {
        self.get(skill_id).map_or(0.0, |s| s.success_rate())
    }

    pub fn average_duration(&self, skill_id: &str) -> u64 {
        self.get(skill_id).map_or(0, |s| s.average_duration_ms())
    }

    pub fn execution_count(&self, skill_id: &str) -> u64 {
        self.get(skill_id).map_or(0, |s| s.total_executions())
    }

    pub fn trend(&self, skill_id: &str) -> Trend {
        self.get(skill_id).map_or(Trend::Unknown, |s| s.trend())
    }

    pub fn recommendation(&self, skill_id: &str) -> Recommendation {
        self.get(skill_id)
            .map_or(Recommendation::Unknown, |s| s.recommendation())
    }

    /// Human-readable reason for the current recommendation
    pub fn recommendation_explanation(&self, skill_id: &str) -> String {
        let Some(stats) = self.get(skill_id) else {
            return "Insufficient data to make recommendation".to_string();
        };

        let rate = stats.success_rate() * 100.0;
        let avg = stats.average_duration_ms();
        let uses = stats.total_executions();

        match stats.recommendation() {
            Recommendation::Unknown => "Insufficient data to make recommendation".to_string(),
            Recommendation::Use => format!(
                "Recommended: High success rate ({:.1}%) and good speed ({}ms avg over {} uses)",
                rate, avg, uses
            ),
            Recommendation::Avoid => format!(
                "Avoid: Low success rate ({:.1}%) or poor performance ({}ms avg over {} uses)",
                rate, avg, uses
            ),
            Recommendation::Consider => format!(
                "Use with caution: Moderate success rate ({:.1}%, {}ms avg over {} uses)",
                rate, avg, uses
            ),
            Recommendation::Refine => format!(
                "Needs refinement: Declining performance ({:.1}% success, {}ms avg over {} uses)",
                rate, avg, uses
            ),
        }
    }

    /// Ids of all tracked skills
    pub fn skill_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stats.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn reset_skill(&self, skill_id: &str) {
        if self.stats.write().remove(skill_id).is_some() {
            info!("Reset statistics for skill: {}", skill_id);
        }
    }

    pub fn clear(&self) {
        self.stats.write().clear();
        info!("Cleared all skill effectiveness statistics");
    }

    /// Statistics for every tracked skill, ordered by id
    pub fn snapshot(&self) -> Vec<SkillStatsSnapshot> {
        let mut snapshots: Vec<SkillStatsSnapshot> = self
            .stats
            .read()
            .iter()
            .map(|(id, s)| SkillStatsSnapshot {
                skill_id: id.clone(),
                executions: s.total_executions(),
                success_rate: s.success_rate(),
                average_duration_ms: s.average_duration_ms(),
                effectiveness: s.effectiveness(),
                trend: s.trend(),
                recommendation: s.recommendation(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.skill_id.cmp(&b.skill_id));
        snapshots
    }
}

impl Default for EffectivenessTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_skill_defaults() {
        let tracker = EffectivenessTracker::new();
        assert_eq!(tracker.effectiveness_score("nope"), 0.0);
        assert_eq!(tracker.trend("nope"), Trend::Unknown);
        assert_eq!(tracker.recommendation("nope"), Recommendation::Unknown);
    }

    #[test]
    fn test_score_two_of_three() {
        let tracker = EffectivenessTracker::new();
        tracker.record_use("x", true, 100);
        tracker.record_use("x", true, 100);
        tracker.record_use("x", false, 100);

        let expected = 0.7 * (2.0 / 3.0) + 0.3 * (1.0 - 100.0 / 5000.0);
        assert!((tracker.success_rate("x") - 2.0 / 3.0).abs() < 1e-9);
        assert!((tracker.effectiveness_score("x") - expected).abs() < 1e-9);
        assert_eq!(tracker.trend("x"), Trend::Unknown);
        assert_eq!(tracker.recommendation("x"), Recommendation::Consider);
    }

    #[test]
    fn test_slow_executions_lose_speed_component() {
        let tracker = EffectivenessTracker::new();
        for _ in 0..3 {
            tracker.record_use("slow", true, 9000);
        }
        assert!((tracker.effectiveness_score("slow") - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_trend_known_once_window_full() {
        let tracker = EffectivenessTracker::with_config(EffectivenessConfig { recent_window: 4 });
        for _ in 0..3 {
            tracker.record_use("s", true, 10);
        }
        assert_eq!(tracker.trend("s"), Trend::Unknown);

        tracker.record_use("s", true, 10);
        assert_eq!(tracker.trend("s"), Trend::Stable);
        assert_eq!(tracker.recommendation("s"), Recommendation::Use);
    }

    #[test]
    fn test_zero_window_is_clamped() {
        let tracker = EffectivenessTracker::with_config(EffectivenessConfig { recent_window: 0 });
        assert_eq!(tracker.trend("z"), Trend::Unknown);

        for _ in 0..4 {
            tracker.record_use("z", true, 10);
        }
        tracker.record_use("z", false, 10);
        assert_eq!(tracker.trend("z"), Trend::Declining);
        assert_eq!(EffectivenessConfig::new(0).recent_window, 1);
    }

    #[test]
    fn test_declining_trend_means_avoid() {
        let tracker = EffectivenessTracker::with_config(EffectivenessConfig { recent_window: 4 });
        for _ in 0..12 {
            tracker.record_use("d", true, 10);
        }
        for _ in 0..4 {
            tracker.record_use("d", false, 10);
        }

        assert_eq!(tracker.trend("d"), Trend::Declining);
        assert_eq!(tracker.recommendation("d"), Recommendation::Avoid);
        assert!(tracker.recommendation_explanation("d").starts_with("Avoid:"));
    }

    #[test]
    fn test_improving_trend() {
        let tracker = EffectivenessTracker::with_config(EffectivenessConfig { recent_window: 4 });
        for _ in 0..8 {
            tracker.record_use("i", false, 10);
        }
        for _ in 0..4 {
            tracker.record_use("i", true, 10);
        }
        assert_eq!(tracker.trend("i"), Trend::Improving);
    }

    #[test]
    fn test_refine_band() {
        let tracker = EffectivenessTracker::new();
        // 1 of 3 succeeds at 2500ms: 0.7/3 + 0.15 = 0.383 -> avoid
        tracker.record_use("r", true, 2500);
        tracker.record_use("r", false, 2500);
        tracker.record_use("r", false, 2500);
        assert_eq!(tracker.recommendation("r"), Recommendation::Avoid);

        // 3 of 4 at 2500ms: 0.525 + 0.15 = 0.675 -> consider
        for success in [true, true, true, false] {
            tracker.record_use("c", success, 2500);
        }
        assert_eq!(tracker.recommendation("c"), Recommendation::Consider);

        // 3 of 7 at 2500ms: 0.3 + 0.15 = 0.45 -> refine
        for success in [true, true, true, false, false, false, false] {
            tracker.record_use("q", success, 2500);
        }
        assert_eq!(tracker.recommendation("q"), Recommendation::Refine);
    }

    #[test]
    fn test_reset_and_snapshot() {
        let tracker = EffectivenessTracker::new();
        tracker.record_use("b", true, 10);
        tracker.record_use("a", false, 10);

        let ids: Vec<String> = tracker.snapshot().into_iter().map(|s| s.skill_id).collect();
        assert_eq!(ids, vec!["a", "b"]);

        tracker.reset_skill("a");
        assert_eq!(tracker.skill_ids(), vec!["b"]);
        tracker.clear();
        assert!(tracker.snapshot().is_empty());
    }
}
