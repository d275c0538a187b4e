//! CLI for running a single trial against a data directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rand::Rng;

use harness::core::goal::evaluate;
use harness::core::types::BookingKind;
use harness::exit_codes;
use harness::io::agent::CommandAgent;
use harness::io::catalog::catalog_json;
use harness::io::config::{HarnessConfig, load_config};
use harness::io::store::BookingStore;
use harness::looping::{DEFAULT_GOAL, TrialOutcome, run_trial};

#[derive(Parser)]
#[command(
    name = "harness",
    version,
    about = "Stateful orchestration harness for agent trip-booking trials"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reset the booking store, run one trial, and evaluate the goal predicate.
    Run {
        /// Trial directory (artifacts under it, booking store under `data/`).
        #[arg(long, default_value = ".harness")]
        dir: PathBuf,
        /// Config TOML path; defaults to `<dir>/config.toml` (or defaults).
        #[arg(long)]
        config: Option<PathBuf>,
        /// Override the user goal text.
        #[arg(long)]
        goal: Option<String>,
    },
    /// Clear all persisted booking confirmations.
    Reset {
        #[arg(long, default_value = ".harness")]
        dir: PathBuf,
    },
    /// Evaluate the goal predicate over the persisted confirmations.
    Evaluate {
        #[arg(long, default_value = ".harness")]
        dir: PathBuf,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the declared action catalog as JSON.
    Catalog,
}

fn main() {
    harness::logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run { dir, config, goal } => cmd_run(&dir, config.as_deref(), goal.as_deref()),
        Command::Reset { dir } => cmd_reset(&dir),
        Command::Evaluate { dir, config } => cmd_evaluate(&dir, config.as_deref()),
        Command::Catalog => cmd_catalog(),
    }
}

fn cmd_run(dir: &Path, config_path: Option<&Path>, goal: Option<&str>) -> Result<i32> {
    let config = load(dir, config_path)?;
    let agent = CommandAgent::new(config.agent.command.clone())?;
    let store = BookingStore::new(dir.join("data"));
    store.reset().context("reset booking store")?;

    let trial_id = generate_trial_id();
    let goal = goal.unwrap_or(DEFAULT_GOAL);
    let outcome = run_trial(&trial_id, dir, &agent, &store, &config, goal)?;

    let verdict = evaluate(
        &store.read_all(BookingKind::Flight)?,
        &store.read_all(BookingKind::Hotel)?,
        &config.target_span(),
    );
    print_summary(&outcome, &verdict)?;

    if outcome.aborted() {
        return Ok(exit_codes::ABORTED);
    }
    if verdict.success {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::GOAL_MISSED)
    }
}

fn cmd_reset(dir: &Path) -> Result<i32> {
    let store = BookingStore::new(dir.join("data"));
    store.reset().context("reset booking store")?;
    println!("reset: {}", store.data_dir().display());
    Ok(exit_codes::OK)
}

fn cmd_evaluate(dir: &Path, config_path: Option<&Path>) -> Result<i32> {
    let config = load(dir, config_path)?;
    let store = BookingStore::new(dir.join("data"));
    let verdict = evaluate(
        &store.read_all(BookingKind::Flight)?,
        &store.read_all(BookingKind::Hotel)?,
        &config.target_span(),
    );
    println!("{}", serde_json::to_string_pretty(&verdict)?);
    if verdict.success {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::GOAL_MISSED)
    }
}

fn cmd_catalog() -> Result<i32> {
    println!("{}", serde_json::to_string_pretty(&catalog_json())?);
    Ok(exit_codes::OK)
}

fn load(dir: &Path, config_path: Option<&Path>) -> Result<HarnessConfig> {
    let path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join("config.toml"));
    load_config(&path)
}

fn print_summary(
    outcome: &TrialOutcome,
    verdict: &harness::core::goal::GoalVerdict,
) -> Result<()> {
    let summary = serde_json::json!({
        "trial_id": outcome.trial_id,
        "turns_executed": outcome.turns_executed,
        "aborted": outcome.aborted(),
        "stop": outcome.stop,
        "success": verdict.success,
        "matched": verdict.matched,
        "usage": outcome.state.usage,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn generate_trial_id() -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect();
    format!("trial-{suffix}")
}
