//! Episode replay
//!
//! Loads recorded goal-pursuit episodes from JSON and drives them through an
//! `ExecutionTracker` exactly as a live executor would.
//!
//! ```json
//! [
//!   {
//!     "agent_id": "a1",
//!     "goal": "mine iron ore",
//!     "success": true,
//!     "actions": [
//!       { "action": "pathfind", "parameters": { "x": 10 }, "duration_ms": 400 },
//!       { "action": "mine", "success": false, "error": "no pickaxe" }
//!     ]
//!   }
//! ]
//! ```
//!
//! Omitted `success` on an action means it succeeded; omitted `success` on an
//! episode means "every action succeeded".

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::task::{ActionOutcome, Parameters, Task};
use crate::tracker::ExecutionTracker;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RecordedAction {
    pub action: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl RecordedAction {
    fn task(&self) -> Task {
        Task {
            action: self.action.clone(),
            parameters: self.parameters.clone(),
        }
    }

    fn outcome(&self) -> ActionOutcome {
        if self.success {
            ActionOutcome::success(self.duration_ms)
        } else {
            let message = self.error.as_deref().unwrap_or("action failed");
            ActionOutcome::failure(message, self.duration_ms)
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Episode {
    pub agent_id: String,
    pub goal: String,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub actions: Vec<RecordedAction>,
}

impl Episode {
    pub fn is_successful(&self) -> bool {
        self.success
            .unwrap_or_else(|| self.actions.iter().all(|a| a.success))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub episodes: usize,
    pub actions: usize,
    /// Episodes kept by the tracker
    pub stored: usize,
}

pub fn parse_episodes(raw: &str) -> Result<Vec<Episode>> {
    serde_json::from_str(raw).context("Failed to parse episodes")
}

pub fn load_episodes(path: &Path) -> Result<Vec<Episode>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read episode file {}", path.display()))?;
    let episodes =
        parse_episodes(&raw).with_context(|| format!("Invalid episode file {}", path.display()))?;
    info!("Loaded {} episodes from {}", episodes.len(), path.display());
    Ok(episodes)
}

/// Feed every episode through `tracker` in order
pub fn replay(tracker: &ExecutionTracker, episodes: &[Episode]) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for episode in episodes {
        tracker.start_tracking(&episode.agent_id, &episode.goal);
        for action in &episode.actions {
            tracker.record_action(&episode.agent_id, &action.task(), &action.outcome());
        }
        summary.actions += episode.actions.len();
        summary.episodes += 1;

        let success = episode.is_successful();
        if tracker.end_tracking(&episode.agent_id, success).is_some() && success {
            summary.stored += 1;
        }
        debug!(
            "Replayed episode '{}' for {} (success: {})",
            episode.goal, episode.agent_id, success
        );
    }

    info!(
        "Replayed {} episodes ({} actions, {} stored)",
        summary.episodes, summary.actions, summary.stored
    );
    summary
}
