//! Autoskill - Entry Point
//!
//! Modes:
//! - --replay FILE: replay recorded episodes, run one learning cycle and
//!   print a JSON status report
//! - --watch / -w: run the learning loop until Ctrl-C (after replaying
//!   FILE when given)

use anyhow::Context;
use autoskill::{
    replay, Config, EffectivenessTracker, ExecutionTracker, LearningLoop, SkillLibrary,
    SkillValidator,
};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn arg_value(args: &[String], names: &[&str]) -> Option<String> {
    args.iter()
        .position(|a| names.contains(&a.as_str()))
        .and_then(|i| args.get(i + 1))
        .cloned()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Parse args
    let args: Vec<String> = std::env::args().collect();
    let json_logs = args.iter().any(|a| a == "--json");
    let watch_mode = args.iter().any(|a| a == "--watch" || a == "-w");
    let help_mode = args.iter().any(|a| a == "--help" || a == "-h");
    let config_path = arg_value(&args, &["--config", "-c"]).map(PathBuf::from);
    let replay_path = arg_value(&args, &["--replay", "-r"]).map(PathBuf::from);

    if help_mode || (!watch_mode && replay_path.is_none()) {
        println!("Autoskill v{}", env!("CARGO_PKG_VERSION"));
        println!();
        println!("Usage: autoskill [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --replay, -r FILE  Replay JSON episodes and run one learning cycle");
        println!("  --watch, -w        Run the learning loop until Ctrl-C");
        println!("  --config, -c FILE  TOML configuration file");
        println!("  --json             Log as JSON");
        println!("  --help, -h         Show this help");
        println!();
        println!("Environment variables:");
        println!("  RUST_LOG                        trace, debug, info, warn or error");
        println!("  AUTOSKILL_LEARNING_INTERVAL_SECS  Seconds between cycles (default: 30)");
        println!("  AUTOSKILL_MAX_GENERATED_SKILLS    Auto-generated skill cap (default: 50)");
        return Ok(());
    }

    // Setup logging
    let log_level = std::env::var("RUST_LOG")
        .map(|s| match s.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        })
        .unwrap_or(Level::INFO);

    if json_logs {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    info!("Autoskill v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(config_path.as_deref())?;

    // Composition root: one instance of each component
    let tracker = Arc::new(ExecutionTracker::with_config(config.tracker_config()));
    let library = Arc::new(SkillLibrary::new());
    let validator = Arc::new(SkillValidator::new(
        library.clone(),
        config.max_generated_skills,
    ));
    let effectiveness = Arc::new(EffectivenessTracker::with_config(
        config.effectiveness_config(),
    ));
    let learning = LearningLoop::with_config(
        config.loop_config(),
        tracker.clone(),
        validator,
        effectiveness.clone(),
    );
    learning.set_refinement_callback(Arc::new(|skill_id: &str, reason: &str| {
        info!("Refinement requested for '{}': {}", skill_id, reason);
    }));

    let summary = match &replay_path {
        Some(path) => {
            let episodes = replay::load_episodes(path)?;
            Some(replay::replay(&tracker, &episodes))
        }
        None => None,
    };

    if watch_mode {
        learning.start();
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;
        info!("Ctrl-C received, stopping");
        learning.shutdown().await;
    } else {
        let cycle = learning.force_learning_cycle();
        let report = json!({
            "replay": summary,
            "cycle": cycle,
            "loop": learning.status(),
            "tracker": tracker.stats(),
            "library": library.stats(),
            "skills": library.names(),
            "effectiveness": effectiveness.snapshot(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}
