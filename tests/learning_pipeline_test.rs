//! Learning Pipeline Integration Tests
//!
//! End-to-end behaviour of tracker, extractor, generators, library,
//! effectiveness tracking and the learning loop.

use autoskill::effectiveness::Trend;
use autoskill::replay;
use autoskill::skills::SkillValidator;
use autoskill::{
    ActionOutcome, EffectivenessTracker, ExecutableSkill, ExecutionTracker, LearningLoop,
    LoopConfig, Pattern, PatternExtractor, Skill, SkillAutoGenerator, SkillLibrary, Task,
};
use std::collections::BTreeSet;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

fn run_episode(tracker: &ExecutionTracker, agent: &str, goal: &str, x: i64, success: bool) {
    tracker.start_tracking(agent, goal);
    for action in ["pathfind", "mine", "place"] {
        let task = Task::new(action)
            .with_param("x", x)
            .with_param("block", "stone");
        tracker.record_action(agent, &task, &ActionOutcome::success(100));
    }
    tracker.end_tracking(agent, success);
}

fn learned_skill(library: &SkillLibrary, prefix: &str) -> Option<Arc<dyn Skill>> {
    let prefix = format!("{}_", prefix);
    library
        .names()
        .into_iter()
        .find(|name| name.starts_with(&prefix))
        .and_then(|name| library.get_skill(&name))
}

fn simple_skill(name: &str, description: &str, actions: &[&str]) -> Arc<dyn Skill> {
    Arc::new(
        ExecutableSkill::builder(name)
            .description(description)
            .code_template("agent.run();")
            .required_actions(actions.iter().copied())
            .build()
            .expect("valid skill"),
    )
}

#[test]
fn test_five_identical_episodes_yield_one_pattern() {
    let tracker = ExecutionTracker::new();
    for i in 0..5 {
        run_episode(&tracker, "a1", "mine", i, true);
    }

    let patterns = PatternExtractor::new().extract_patterns(&tracker.successful_sequences());
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].frequency, 5);
    assert_eq!(patterns[0].success_rate, 1.0);
    assert_eq!(patterns[0].action_sequence, vec!["pathfind", "mine", "place"]);
}

#[test]
fn test_two_successful_episodes_are_not_enough() {
    let tracker = ExecutionTracker::new();
    for i in 0..5 {
        run_episode(&tracker, "a1", "mine", i, i < 2);
    }

    assert_eq!(tracker.successful_sequences().len(), 2);
    let patterns = PatternExtractor::new().extract_patterns(&tracker.successful_sequences());
    assert!(patterns.is_empty());
}

#[test]
fn test_duplicate_skill_name_rejected() {
    let library = SkillLibrary::empty();
    assert!(library.add_skill(simple_skill("digStairs", "Dig stairs down", &["mine"])));
    assert!(!library.add_skill(simple_skill("digStairs", "Dig stairs up", &["mine", "place"])));
    assert_eq!(library.len(), 1);
}

#[test]
fn test_effectiveness_of_two_out_of_three() {
    let tracker = EffectivenessTracker::new();
    tracker.record_use("x", true, 100);
    tracker.record_use("x", true, 100);
    tracker.record_use("x", false, 100);

    assert!((tracker.success_rate("x") - 2.0 / 3.0).abs() < 1e-9);
    let expected = 0.7 * (2.0 / 3.0) + 0.3 * (1.0 - 100.0 / 5000.0);
    assert!((tracker.effectiveness_score("x") - expected).abs() < 1e-9);
    assert!((tracker.effectiveness_score("x") - 0.759).abs() < 0.002);
}

#[test]
fn test_record_action_without_session() {
    let tracker = ExecutionTracker::new();
    tracker.record_action("ghost", &Task::new("mine"), &ActionOutcome::success(10));

    assert!(!tracker.is_tracking("ghost"));
    assert!(tracker.end_tracking("ghost", true).is_none());
    assert_eq!(tracker.sequence_count(), 0);
    assert!(tracker.sequences_by_agent("ghost").is_empty());
}

#[test]
fn test_generation_cap_blocks_new_skills() {
    let library = Arc::new(SkillLibrary::empty());
    let validator = Arc::new(SkillValidator::new(library.clone(), 50));
    for i in 0..50 {
        let skill = simple_skill(&format!("gen{}", i), &format!("Generated skill {}", i), &["mine"]);
        assert!(validator.register(skill));
    }
    assert!(validator.at_capacity());

    let generator = SkillAutoGenerator::new(validator);
    let pattern = Pattern {
        signature: "pathfind->place".to_string(),
        name: "Bridge".to_string(),
        action_sequence: vec!["pathfind".to_string(), "place".to_string()],
        parameters: BTreeSet::new(),
        frequency: 4,
        success_rate: 1.0,
        average_execution_ms: 6000.0,
        success_count: 4,
        failure_count: 0,
    };

    let skill = generator.generate_skill(&pattern).expect("pattern is valid");
    assert!(!generator.validate_skill(&skill));
    assert_eq!(generator.register_patterns(&[pattern]), 0);
    assert!(learned_skill(&library, "bridge").is_none());
    assert_eq!(library.len(), 50);
}

#[test]
fn test_variable_parameters_share_signature() {
    let tracker = ExecutionTracker::new();
    run_episode(&tracker, "a1", "mine", 1, true);
    run_episode(&tracker, "a2", "mine", 999, true);

    let sequences = tracker.sequences();
    assert_eq!(sequences[0].signature(), sequences[1].signature());
    assert!(sequences[0].is_similar_to(&sequences[1]));
}

#[test]
fn test_extraction_respects_thresholds() {
    let tracker = ExecutionTracker::new();
    for i in 0..3 {
        run_episode(&tracker, "a1", "mine stone", i, true);
    }
    for _ in 0..2 {
        let task = Task::new("craft").with_param("item", "pickaxe");
        tracker.start_tracking("a2", "craft tools");
        tracker.record_action("a2", &task, &ActionOutcome::success(50));
        tracker.end_tracking("a2", true);
    }

    let extractor = PatternExtractor::new();
    let patterns = extractor.extract_patterns(&tracker.sequences());
    assert_eq!(patterns.len(), 1);
    for pattern in &patterns {
        assert!(pattern.frequency >= extractor.config().min_frequency);
        assert!(pattern.success_rate >= extractor.config().min_success_rate);
    }
}

#[test]
fn test_skill_success_rate_tracks_outcomes() {
    let skill = simple_skill("s", "Some skill", &["mine"]);
    assert_eq!(skill.success_rate(), 1.0);

    let outcomes = [true, false, false, true, true];
    let mut successes = 0;
    for (n, outcome) in outcomes.iter().enumerate() {
        skill.record_success(*outcome);
        if *outcome {
            successes += 1;
        }
        let expected = successes as f64 / (n + 1) as f64;
        assert!((skill.success_rate() - expected).abs() < 1e-9);
    }
    assert_eq!(skill.execution_count(), 5);
}

#[test]
fn test_trend_known_once_window_full() {
    let tracker = EffectivenessTracker::new();
    for i in 0..9 {
        tracker.record_use("t", i % 3 == 0, 100);
        assert_eq!(tracker.trend("t"), Trend::Unknown);
    }
    for i in 0..5 {
        tracker.record_use("t", i % 2 == 0, 100);
        assert_ne!(tracker.trend("t"), Trend::Unknown);
    }
}

#[test]
fn test_forced_cycle_learns_from_tracker() {
    let tracker = Arc::new(ExecutionTracker::new());
    let library = Arc::new(SkillLibrary::new());
    let builtins = library.len();
    let validator = Arc::new(SkillValidator::new(library.clone(), 50));
    let learning = LearningLoop::new(
        tracker.clone(),
        validator,
        Arc::new(EffectivenessTracker::new()),
    );

    for i in 0..4 {
        run_episode(&tracker, &format!("agent{}", i), "quarry granite", i, true);
    }

    let report = learning.force_learning_cycle();
    assert_eq!(report.registered, 1);
    assert_eq!(library.len(), builtins + 1);
    assert!(learned_skill(&library, "quarry").is_some());

    let status = learning.status();
    assert!(!status.running);
    assert_eq!(status.cycles_performed, 1);
    assert_eq!(status.successful_sequences, 4);
}

#[test]
fn test_goals_sharing_a_word_both_learned() {
    let tracker = Arc::new(ExecutionTracker::new());
    let library = Arc::new(SkillLibrary::empty());
    let validator = Arc::new(SkillValidator::new(library.clone(), 50));
    let learning = LearningLoop::new(
        tracker.clone(),
        validator,
        Arc::new(EffectivenessTracker::new()),
    );

    let episodes: [(&str, &[&str]); 2] = [
        ("mine iron", &["pathfind", "mine"]),
        ("mine coal", &["mine", "place", "craft"]),
    ];
    for (goal, actions) in episodes {
        for i in 0..3 {
            let agent = format!("{}-{}", goal, i);
            tracker.start_tracking(&agent, goal);
            for action in actions {
                tracker.record_action(&agent, &Task::new(*action), &ActionOutcome::success(100));
            }
            tracker.end_tracking(&agent, true);
        }
    }

    assert_eq!(learning.force_learning_cycle().registered, 2);
    assert_eq!(learning.force_learning_cycle().registered, 0);
    assert_eq!(library.len(), 2);
    assert!(library.names().iter().all(|name| name.starts_with("mine_")));
}

#[tokio::test]
async fn test_learning_loop_start_stop() {
    let tracker = Arc::new(ExecutionTracker::new());
    let library = Arc::new(SkillLibrary::empty());
    let validator = Arc::new(SkillValidator::new(library.clone(), 50));
    let learning = LearningLoop::with_config(
        LoopConfig {
            interval: Duration::from_millis(20),
            ..Default::default()
        },
        tracker.clone(),
        validator,
        Arc::new(EffectivenessTracker::new()),
    );

    for i in 0..3 {
        run_episode(&tracker, "a1", "mine stone", i, true);
    }

    assert!(learning.start());
    assert!(!learning.start());

    let mut waited = 0;
    while library.is_empty() && waited < 100 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += 1;
    }

    learning.shutdown().await;
    assert!(!learning.is_running());
    assert!(learned_skill(&library, "mine").is_some());

    let cycles = learning.cycles_performed();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(learning.cycles_performed(), cycles);
}

#[test]
fn test_replay_file_feeds_learning() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    let episode = |x: i64| {
        format!(
            r#"{{"agent_id": "a1", "goal": "harvest wheat", "actions": [
                {{"action": "pathfind", "parameters": {{"x": {x}}}, "duration_ms": 300}},
                {{"action": "gather", "parameters": {{"target": "wheat"}}, "duration_ms": 700}}
            ]}}"#
        )
    };
    let body = format!("[{}, {}, {}]", episode(1), episode(2), episode(3));
    file.write_all(body.as_bytes()).expect("write episodes");

    let episodes = replay::load_episodes(file.path()).expect("episodes load");
    let tracker = Arc::new(ExecutionTracker::new());
    let summary = replay::replay(&tracker, &episodes);
    assert_eq!(summary.stored, 3);
    assert_eq!(summary.actions, 6);

    let library = Arc::new(SkillLibrary::empty());
    let validator = Arc::new(SkillValidator::new(library.clone(), 50));
    let learning = LearningLoop::new(tracker, validator, Arc::new(EffectivenessTracker::new()));
    assert_eq!(learning.force_learning_cycle().registered, 1);

    let skill = learned_skill(&library, "harvest").expect("learned skill");
    assert_eq!(skill.required_actions(), ["pathfind", "gather"]);
    assert_eq!(skill.estimated_ticks(), 100);
}
