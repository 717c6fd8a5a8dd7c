//! Execution Tracker
//!
//! Per-agent session recorder. Turns the live stream of action outcomes
//! coming from the executor into completed `ExecutionSequence`s.
//!
//! ```text
//! start_tracking ──► record_action* ──► end_tracking(success)
//!                                           │
//!                             success ──────┴────── failure
//!                                │                     │
//!                      bounded sequence store       dropped
//! ```
//!
//! The completed-sequence store is the only input of the learning loop, so
//! failed episodes never reach it.

use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::sequence::{ActionRecord, ExecutionSequence, SequenceBuilder};
use crate::task::{ActionOutcome, Task};

/// Configuration for the execution tracker
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Maximum completed sequences kept (oldest evicted first)
    pub max_sequences: usize,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self { max_sequences: 1000 }
    }
}

/// Snapshot of tracker state
#[derive(Debug, Clone, Default, Serialize)]
pub struct TrackerStats {
    pub total_sequences: usize,
    pub successful_sequences: usize,
    pub active_sessions: usize,
    pub total_actions: usize,
    pub average_actions_per_sequence: usize,
}

/// Records action streams per agent
pub struct ExecutionTracker {
    config: TrackerConfig,
    active_sessions: Mutex<HashMap<String, SequenceBuilder>>,
    completed: RwLock<VecDeque<Arc<ExecutionSequence>>>,
}

impl ExecutionTracker {
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default())
    }

    pub fn with_config(config: TrackerConfig) -> Self {
        info!("Execution tracker initialized (capacity: {})", config.max_sequences);
        Self {
            config,
            active_sessions: Mutex::new(HashMap::new()),
            completed: RwLock::new(VecDeque::new()),
        }
    }

    /// Open a session for `agent_id`.
    ///
    /// An unfinished session for the same agent is ended as failed first.
    pub fn start_tracking(&self, agent_id: &str, goal: &str) {
        if self.is_tracking(agent_id) {
            warn!(
                "Agent '{}' already has an active tracking session, ending previous session",
                agent_id
            );
            self.end_tracking(agent_id, false);
        }

        self.active_sessions
            .lock()
            .insert(agent_id.to_string(), SequenceBuilder::new(agent_id, goal));

        debug!("Started tracking for agent '{}' with goal: {}", agent_id, goal);
    }

    /// Append one executed action to the agent's active session.
    ///
    /// No-op when the agent has no active session.
    pub fn record_action(&self, agent_id: &str, task: &Task, outcome: &ActionOutcome) {
        let record = if outcome.success {
            ActionRecord::success(&task.action, task.parameters.clone(), outcome.elapsed_ms)
        } else {
            ActionRecord::failure(
                &task.action,
                task.parameters.clone(),
                outcome.elapsed_ms,
                outcome.message.as_deref().unwrap_or("unknown error"),
            )
        };

        let mut sessions = self.active_sessions.lock();
        match sessions.get_mut(agent_id) {
            Some(builder) => {
                builder.push_action(record);
                debug!(
                    "Recorded action for agent '{}': {} (success: {})",
                    agent_id, task.action, outcome.success
                );
            }
            None => {
                debug!(
                    "No active tracking session for agent '{}', action not recorded",
                    agent_id
                );
            }
        }
    }

    /// Attach context to the agent's active session
    pub fn add_context(&self, agent_id: &str, key: &str, value: Value) {
        let mut sessions = self.active_sessions.lock();
        match sessions.get_mut(agent_id) {
            Some(builder) => builder.insert_context(key, value),
            None => debug!(
                "No active tracking session for agent '{}', context not added",
                agent_id
            ),
        }
    }

    /// Finalize the agent's session.
    ///
    /// The sequence is stored only when `success` is true; it is returned
    /// either way so the caller can inspect it.
    pub fn end_tracking(&self, agent_id: &str, success: bool) -> Option<ExecutionSequence> {
        let builder = self.active_sessions.lock().remove(agent_id);
        let Some(builder) = builder else {
            debug!("No active tracking session for agent '{}'", agent_id);
            return None;
        };

        let sequence = builder.build_with_outcome(success);

        if success {
            info!(
                "Completed tracking for agent '{}': {} (successful, {} actions, {}ms)",
                agent_id,
                sequence.goal(),
                sequence.action_count(),
                sequence.total_duration_ms()
            );
            self.store_sequence(sequence.clone());
        } else {
            info!(
                "Completed tracking for agent '{}': {} (failed, {} actions)",
                agent_id,
                sequence.goal(),
                sequence.action_count()
            );
        }

        Some(sequence)
    }

    /// Discard the agent's session without storing anything
    pub fn cancel_tracking(&self, agent_id: &str) {
        if self.active_sessions.lock().remove(agent_id).is_some() {
            info!("Cancelled tracking for agent '{}'", agent_id);
        }
    }

    pub fn is_tracking(&self, agent_id: &str) -> bool {
        self.active_sessions.lock().contains_key(agent_id)
    }

    fn store_sequence(&self, sequence: ExecutionSequence) {
        let mut completed = self.completed.write();
        completed.push_back(Arc::new(sequence));

        while completed.len() > self.config.max_sequences {
            if let Some(removed) = completed.pop_front() {
                debug!("Evicted old sequence: {}", removed.id());
            }
        }
    }

    /// All stored sequences, oldest first
    pub fn sequences(&self) -> Vec<Arc<ExecutionSequence>> {
        self.completed.read().iter().cloned().collect()
    }

    pub fn successful_sequences(&self) -> Vec<Arc<ExecutionSequence>> {
        self.completed
            .read()
            .iter()
            .filter(|s| s.is_successful())
            .cloned()
            .collect()
    }

    /// Sequences whose goal contains `goal` (case-insensitive)
    pub fn sequences_by_goal(&self, goal: &str) -> Vec<Arc<ExecutionSequence>> {
        let needle = goal.to_lowercase();
        self.completed
            .read()
            .iter()
            .filter(|s| s.goal().to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn sequences_by_agent(&self, agent_id: &str) -> Vec<Arc<ExecutionSequence>> {
        self.completed
            .read()
            .iter()
            .filter(|s| s.agent_id() == agent_id)
            .cloned()
            .collect()
    }

    pub fn sequence_count(&self) -> usize {
        self.completed.read().len()
    }

    /// Drop stored sequences and active sessions
    pub fn clear(&self) {
        self.completed.write().clear();
        self.active_sessions.lock().clear();
        info!("Cleared all sequences and active sessions");
    }

    pub fn clear_sequences(&self) {
        self.completed.write().clear();
        info!("Cleared all completed sequences");
    }

    pub fn stats(&self) -> TrackerStats {
        let active_sessions = self.active_sessions.lock().len();
        let completed = self.completed.read();

        let total_actions: usize = completed.iter().map(|s| s.action_count()).sum();
        let average_actions_per_sequence = if completed.is_empty() {
            0
        } else {
            total_actions / completed.len()
        };

        TrackerStats {
            total_sequences: completed.len(),
            successful_sequences: completed.iter().filter(|s| s.is_successful()).count(),
            active_sessions,
            total_actions,
            average_actions_per_sequence,
        }
    }
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new()
    }
}
