//! Skill Learning Loop
//!
//! Background orchestrator tying the pipeline together:
//!
//! ```text
//!   ExecutionTracker ──successful sequences──▶ PatternExtractor
//!          ▲                                         │ patterns
//!          │                                         ▼
//!     (executor)                             SkillAutoGenerator
//!                                                    │ validated skills
//!   EffectivenessTracker ◀──outcomes──┐              ▼
//!          │                          └────── SkillLibrary
//!          └── every Nth cycle: REFINE → callback, AVOID → remove
//! ```
//!
//! One worker per loop. Cycles never overlap; stopping interrupts the sleep
//! between cycles but lets a running cycle finish.

use anyhow::{Context, Result};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::effectiveness::{EffectivenessTracker, Recommendation};
use crate::patterns::{ExtractorConfig, PatternExtractor};
use crate::skills::{SkillAutoGenerator, SkillLibrary, SkillValidator};
use crate::tracker::ExecutionTracker;

/// Called with `(skill_id, reason)` when a skill should be regenerated
pub type RefinementCallback = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// Configuration for the learning loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Sleep between learning cycles
    pub interval: Duration,
    /// Run the refinement pass every N cycles
    pub refinement_every_cycles: u64,
    /// Skills with fewer executions are not evaluated
    pub min_executions_for_evaluation: u64,
    /// Thresholds for pattern extraction
    pub extractor: ExtractorConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            refinement_every_cycles: 10,
            min_executions_for_evaluation: 5,
            extractor: ExtractorConfig::default(),
        }
    }
}

/// Result of one learning cycle
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CycleReport {
    /// Cycle number, starting at 1
    pub cycle: u64,
    pub sequences: usize,
    pub registered: usize,
    pub refinement_checked: bool,
    /// Skills handed to the refinement callback
    pub refined: Vec<String>,
    /// Skills removed from the library
    pub removed: Vec<String>,
}

/// Status snapshot for diagnostics
#[derive(Debug, Clone, Serialize)]
pub struct LoopStatus {
    pub running: bool,
    pub cycles_performed: u64,
    pub skill_library_size: usize,
    pub successful_sequences: usize,
}

/// Everything a cycle touches; shared with the worker task
struct Pipeline {
    config: LoopConfig,
    tracker: Arc<ExecutionTracker>,
    library: Arc<SkillLibrary>,
    effectiveness: Arc<EffectivenessTracker>,
    extractor: PatternExtractor,
    generator: SkillAutoGenerator,
    cycles: AtomicU64,
    /// Held for a whole cycle; forced and scheduled cycles never overlap
    cycle_lock: Mutex<()>,
    callback: RwLock<Option<RefinementCallback>>,
}

impl Pipeline {
    fn run_cycle(&self) -> CycleReport {
        let _running = self.cycle_lock.lock();
        let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let sequences = self.tracker.successful_sequences();

        let mut report = CycleReport {
            cycle,
            sequences: sequences.len(),
            ..Default::default()
        };

        if sequences.is_empty() {
            debug!("Learning cycle {}: no successful sequences to analyze", cycle);
        } else {
            debug!(
                "Learning cycle {}: analyzing {} successful sequences",
                cycle,
                sequences.len()
            );
            report.registered = self
                .generator
                .generate_and_register(&self.extractor, &sequences);
            if report.registered > 0 {
                info!(
                    "Learning cycle {} generated {} new skills",
                    cycle, report.registered
                );
            }
        }

        let every = self.config.refinement_every_cycles.max(1);
        if cycle % every == 0 {
            report.refinement_checked = true;
            self.check_for_refinement(&mut report);
        }

        report
    }

    fn check_for_refinement(&self, report: &mut CycleReport) {
        debug!("Checking for skills needing refinement...");
        let callback = self.callback.read().clone();

        for skill in self.library.skills_by_success_rate() {
            if skill.execution_count() < self.config.min_executions_for_evaluation {
                continue;
            }

            let skill_id = skill.name();
            match self.effectiveness.recommendation(skill_id) {
                Recommendation::Refine => {
                    let reason = self.effectiveness.recommendation_explanation(skill_id);
                    info!("Skill '{}' needs refinement: {}", skill_id, reason);
                    if let Some(callback) = &callback {
                        callback(skill_id, &reason);
                    }
                    report.refined.push(skill_id.to_string());
                }
                Recommendation::Avoid => {
                    warn!("Skill '{}' has poor effectiveness, removing from library", skill_id);
                    if self.library.remove_skill(skill_id) {
                        report.removed.push(skill_id.to_string());
                    }
                }
                _ => {}
            }
        }

        if !report.refined.is_empty() || !report.removed.is_empty() {
            info!(
                "Refinement check complete: {} skills flagged for refinement, {} skills removed",
                report.refined.len(),
                report.removed.len()
            );
        }
    }
}

struct Worker {
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Periodic learning orchestrator
pub struct LearningLoop {
    pipeline: Arc<Pipeline>,
    worker: Mutex<Option<Worker>>,
}

impl LearningLoop {
    pub fn new(
        tracker: Arc<ExecutionTracker>,
        validator: Arc<SkillValidator>,
        effectiveness: Arc<EffectivenessTracker>,
    ) -> Self {
        Self::with_config(LoopConfig::default(), tracker, validator, effectiveness)
    }

    pub fn with_config(
        config: LoopConfig,
        tracker: Arc<ExecutionTracker>,
        validator: Arc<SkillValidator>,
        effectiveness: Arc<EffectivenessTracker>,
    ) -> Self {
        info!(
            "Learning loop initialized (interval: {:?}, refinement every {} cycles)",
            config.interval, config.refinement_every_cycles
        );
        let pipeline = Pipeline {
            extractor: PatternExtractor::with_config(config.extractor.clone()),
            library: validator.library().clone(),
            generator: SkillAutoGenerator::new(validator),
            config,
            tracker,
            effectiveness,
            cycles: AtomicU64::new(0),
            cycle_lock: Mutex::new(()),
            callback: RwLock::new(None),
        };
        Self {
            pipeline: Arc::new(pipeline),
            worker: Mutex::new(None),
        }
    }

    pub fn set_refinement_callback(&self, callback: RefinementCallback) {
        *self.pipeline.callback.write() = Some(callback);
    }

    /// Launch the background worker on the current tokio runtime.
    ///
    /// Returns false when already running or when called outside a runtime.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            warn!("Learning loop already running");
            return false;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                warn!("Cannot start learning loop without a tokio runtime: {}", e);
                return false;
            }
        };

        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = runtime.spawn(run_worker(self.pipeline.clone(), shutdown_rx));
        *worker = Some(Worker { shutdown, handle });

        info!("Skill learning loop started");
        true
    }

    /// Signal the worker to stop; a cycle in progress runs to completion
    pub fn stop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.shutdown.send(true);
            info!("Skill learning loop stopped");
        }
    }

    /// Stop and wait for the worker to exit
    pub async fn shutdown(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.shutdown.send(true);
            if let Err(e) = worker.handle.await {
                error!("Learning loop worker ended abnormally: {}", e);
            }
            info!("Skill learning loop shut down");
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.lock().is_some()
    }

    /// Run one cycle on the calling thread, whatever the loop state.
    ///
    /// Waits for a worker cycle in progress to finish first.
    pub fn force_learning_cycle(&self) -> CycleReport {
        info!("Forcing learning cycle...");
        self.pipeline.run_cycle()
    }

    pub fn cycles_performed(&self) -> u64 {
        self.pipeline.cycles.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> LoopStatus {
        LoopStatus {
            running: self.is_running(),
            cycles_performed: self.cycles_performed(),
            skill_library_size: self.pipeline.library.len(),
            successful_sequences: self.pipeline.tracker.successful_sequences().len(),
        }
    }
}

impl Drop for LearningLoop {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            let _ = worker.shutdown.send(true);
        }
    }
}

async fn run_cycle_blocking(pipeline: Arc<Pipeline>) -> Result<CycleReport> {
    tokio::task::spawn_blocking(move || pipeline.run_cycle())
        .await
        .context("learning cycle aborted")
}

async fn run_worker(pipeline: Arc<Pipeline>, mut shutdown: watch::Receiver<bool>) {
    info!("Learning worker running");

    loop {
        tokio::select! {
            _ = tokio::time::sleep(pipeline.config.interval) => {
                match run_cycle_blocking(pipeline.clone()).await {
                    Ok(report) => debug!(
                        "Learning cycle {} done: {} sequences, {} registered",
                        report.cycle, report.sequences, report.registered
                    ),
                    Err(e) => error!("Error in learning cycle: {:#}", e),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Learning worker shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skills::ExecutableSkill;
    use crate::task::{ActionOutcome, Task};

    struct Fixture {
        tracker: Arc<ExecutionTracker>,
        library: Arc<SkillLibrary>,
        effectiveness: Arc<EffectivenessTracker>,
        learning: LearningLoop,
    }

    fn fixture(config: LoopConfig) -> Fixture {
        let tracker = Arc::new(ExecutionTracker::new());
        let library = Arc::new(SkillLibrary::empty());
        let validator = Arc::new(SkillValidator::new(library.clone(), 50));
        let effectiveness = Arc::new(EffectivenessTracker::new());
        let learning =
            LearningLoop::with_config(config, tracker.clone(), validator, effectiveness.clone());
        Fixture {
            tracker,
            library,
            effectiveness,
            learning,
        }
    }

    fn track_episodes(tracker: &ExecutionTracker, count: usize) {
        for i in 0..count {
            let agent = format!("agent{}", i);
            tracker.start_tracking(&agent, "mine iron ore");
            for action in ["pathfind", "mine", "place"] {
                let task = Task::new(action).with_param("x", i as i64);
                tracker.record_action(&agent, &task, &ActionOutcome::success(200));
            }
            tracker.end_tracking(&agent, true);
        }
    }

    fn has_learned(library: &SkillLibrary, prefix: &str) -> bool {
        let prefix = format!("{}_", prefix);
        library.names().iter().any(|name| name.starts_with(&prefix))
    }

    fn used_skill(
        library: &SkillLibrary,
        effectiveness: &EffectivenessTracker,
        name: &str,
        outcomes: &[(bool, u64)],
    ) {
        let skill = ExecutableSkill::builder(name)
            .description(format!("Skill {}", name))
            .code_template("agent.run();")
            .required_actions(["mine"])
            .build()
            .unwrap();
        library.add_skill(Arc::new(skill));
        for (success, ms) in outcomes {
            library.record_outcome(name, *success);
            effectiveness.record_use(name, *success, *ms);
        }
    }

    #[test]
    fn test_forced_cycle_generates_skill() {
        let f = fixture(LoopConfig::default());
        track_episodes(&f.tracker, 5);

        let report = f.learning.force_learning_cycle();
        assert_eq!(report.cycle, 1);
        assert_eq!(report.sequences, 5);
        assert_eq!(report.registered, 1);
        assert!(!report.refinement_checked);
        assert!(has_learned(&f.library, "mine"));

        // Same sequences again: the skill already exists
        assert_eq!(f.learning.force_learning_cycle().registered, 0);
        assert_eq!(f.learning.cycles_performed(), 2);
    }

    #[test]
    fn test_empty_cycle_still_counts() {
        let f = fixture(LoopConfig::default());
        let report = f.learning.force_learning_cycle();
        assert_eq!(report.sequences, 0);
        assert_eq!(report.registered, 0);
        assert_eq!(f.learning.status().cycles_performed, 1);
    }

    #[test]
    fn test_refinement_removes_avoided_skill() {
        let f = fixture(LoopConfig {
            refinement_every_cycles: 1,
            ..Default::default()
        });
        used_skill(&f.library, &f.effectiveness, "bad", &[(false, 100); 5]);
        used_skill(&f.library, &f.effectiveness, "young", &[(false, 100); 4]);

        let report = f.learning.force_learning_cycle();
        assert!(report.refinement_checked);
        assert_eq!(report.removed, vec!["bad".to_string()]);
        assert!(!f.library.has_skill("bad"));
        assert!(f.library.has_skill("young"));
    }

    #[test]
    fn test_refinement_callback_keeps_skill() {
        let f = fixture(LoopConfig {
            refinement_every_cycles: 1,
            ..Default::default()
        });
        // 3/5 successes at 5s each: effectiveness 0.42
        let outcomes = [(true, 5000), (false, 5000), (true, 5000), (false, 5000), (true, 5000)];
        used_skill(&f.library, &f.effectiveness, "meh", &outcomes);

        let flagged = Arc::new(Mutex::new(Vec::new()));
        let sink = flagged.clone();
        f.learning.set_refinement_callback(Arc::new(move |id: &str, reason: &str| {
            sink.lock().push((id.to_string(), reason.to_string()));
        }));

        let report = f.learning.force_learning_cycle();
        assert_eq!(report.refined, vec!["meh".to_string()]);
        assert!(f.library.has_skill("meh"));

        let flagged = flagged.lock();
        assert_eq!(flagged.len(), 1);
        assert!(flagged[0].1.starts_with("Needs refinement"));
    }

    #[test]
    fn test_refinement_interval() {
        let f = fixture(LoopConfig {
            refinement_every_cycles: 3,
            ..Default::default()
        });
        let checked: Vec<bool> = (0..6)
            .map(|_| f.learning.force_learning_cycle().refinement_checked)
            .collect();
        assert_eq!(checked, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_concurrent_cycles_do_not_overlap() {
        let f = fixture(LoopConfig {
            refinement_every_cycles: 1,
            ..Default::default()
        });
        let outcomes = [(true, 5000), (false, 5000), (true, 5000), (false, 5000), (true, 5000)];
        used_skill(&f.library, &f.effectiveness, "meh", &outcomes);

        let active = Arc::new(AtomicU64::new(0));
        let overlapped = Arc::new(AtomicU64::new(0));
        let (active_cb, overlapped_cb) = (active.clone(), overlapped.clone());
        f.learning.set_refinement_callback(Arc::new(move |_: &str, _: &str| {
            if active_cb.fetch_add(1, Ordering::SeqCst) > 0 {
                overlapped_cb.fetch_add(1, Ordering::SeqCst);
            }
            std::thread::sleep(Duration::from_millis(5));
            active_cb.fetch_sub(1, Ordering::SeqCst);
        }));

        let mut cycles: Vec<u64> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| {
                        (0..5)
                            .map(|_| f.learning.force_learning_cycle().cycle)
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        cycles.sort_unstable();
        assert_eq!(cycles, (1..=20).collect::<Vec<u64>>());
        assert_eq!(overlapped.load(Ordering::SeqCst), 0);
        assert_eq!(f.learning.cycles_performed(), 20);
    }

    #[test]
    fn test_start_outside_runtime() {
        let f = fixture(LoopConfig::default());
        assert!(!f.learning.start());
        assert!(!f.learning.is_running());
    }

    #[tokio::test]
    async fn test_start_stop_idempotent() {
        let f = fixture(LoopConfig {
            interval: Duration::from_secs(3600),
            ..Default::default()
        });

        assert!(f.learning.start());
        assert!(!f.learning.start());
        assert!(f.learning.status().running);

        f.learning.stop();
        f.learning.stop();
        assert!(!f.learning.is_running());

        assert!(f.learning.start());
        f.learning.shutdown().await;
        assert!(!f.learning.is_running());
        assert_eq!(f.learning.cycles_performed(), 0);
    }

    #[tokio::test]
    async fn test_worker_runs_cycles() {
        let f = fixture(LoopConfig {
            interval: Duration::from_millis(10),
            ..Default::default()
        });
        track_episodes(&f.tracker, 3);

        f.learning.start();
        for _ in 0..200 {
            if f.learning.cycles_performed() > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        f.learning.shutdown().await;

        assert!(f.learning.cycles_performed() > 0);
        assert!(has_learned(&f.library, "mine"));
    }
}
