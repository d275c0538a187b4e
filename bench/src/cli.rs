//! CLI command implementations.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use harness::io::agent::CommandAgent;
use harness::io::config::{HarnessConfig, load_config};
use harness::looping::DEFAULT_GOAL;

use crate::metrics::{MetricsWriter, log_file_name, sanitize_label};
use crate::report::aggregate_file;
use crate::trial::{TrialRequest, run_single_trial};
use crate::workspace::{config_fingerprint, create_workspace};

/// Options for `bench run`.
#[derive(Debug)]
pub struct RunArgs {
    pub root: PathBuf,
    pub trials: u32,
    pub label: String,
    pub config: Option<PathBuf>,
    pub agent_cmd: Vec<String>,
    pub no_snapshot: bool,
    pub goal: Option<String>,
}

/// Run N trials sequentially, each in its own workspace, appending one
/// metrics row per trial.
pub fn run_trials(args: &RunArgs) -> Result<()> {
    let config = effective_config(args)?;
    let label = sanitize_label(&args.label);
    let timestamp = Utc::now().format("%Y%m%d-%H%M%S").to_string();

    let logs_dir = args.root.join("logs");
    let jsonl_path = logs_dir.join(log_file_name(&timestamp, &label));
    let mut writer = MetricsWriter::create(&jsonl_path)?;
    write_run_meta(&logs_dir, &timestamp, &label, args, &config)?;

    info!(trials = args.trials, label = %label, "starting runs");
    let goal = args.goal.as_deref().unwrap_or(DEFAULT_GOAL);
    let mut successes = 0u32;
    let mut finished = 0u32;

    for run_id in 1..=args.trials {
        debug!(run_id, "starting trial");
        let workspace = create_workspace(&args.root.join("workspaces"), &label)
            .context("create workspace")?;
        let agent = CommandAgent::new(config.agent.command.clone())?;

        let row = run_single_trial(
            &TrialRequest {
                run_id,
                workspace: &workspace.root,
                config: &config,
                goal,
            },
            &agent,
        )
        .context("run trial")?;

        println!(
            "run: id={} success={} aborted={} turns={} actions={} workspace={}",
            row.run_id,
            row.success,
            row.aborted,
            row.turn_count,
            row.action_calls_total,
            workspace.root.display()
        );
        if row.success {
            successes += 1;
        }
        if row.finished {
            finished += 1;
        }
        writer.append(&row)?;
    }

    println!(
        "Finished {}/{} | Success {}/{}",
        finished, args.trials, successes, args.trials
    );
    println!("Wrote:\n  {}", jsonl_path.display());
    Ok(())
}

/// Show aggregated results for one JSONL log.
pub fn report_log(path: &Path) -> Result<()> {
    let (summary, warnings) = aggregate_file(path)?;
    println!("report: rows={}", summary.rows);
    println!(
        "report: success={} finished={} aborted={}",
        summary.success, summary.finished, summary.aborted
    );
    if let Some(avg) = summary.avg_turns {
        println!("report: avg_turns={avg:.2}");
    }
    if let Some(avg) = summary.avg_elapsed_sec {
        println!("report: avg_elapsed_sec={avg:.2}");
    }
    if let Some(avg) = summary.avg_total_tokens {
        println!("report: avg_total_tokens={avg:.0}");
    }
    for (name, total) in summary.action_totals {
        println!("report: action {name} {total}");
    }
    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    Ok(())
}

/// Remove workspaces and logs under the bench root.
pub fn clean(root: &Path) -> Result<()> {
    for sub in ["workspaces", "logs"] {
        let dir = root.join(sub);
        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("remove {}", dir.display()))?;
        }
    }
    println!("clean: {}", root.display());
    Ok(())
}

fn effective_config(args: &RunArgs) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    if !args.agent_cmd.is_empty() {
        config.agent.command = args.agent_cmd.clone();
    }
    if args.no_snapshot {
        // Baseline condition: the agent decides from the transcript alone.
        config.include_snapshot = false;
    }
    config.validate()?;
    Ok(config)
}

fn write_run_meta(
    logs_dir: &Path,
    timestamp: &str,
    label: &str,
    args: &RunArgs,
    config: &HarnessConfig,
) -> Result<()> {
    let meta = serde_json::json!({
        "label": label,
        "created_at": Utc::now().to_rfc3339(),
        "trials": args.trials,
        "agent_command": config.agent.command,
        "include_snapshot": config.include_snapshot,
        "config_fingerprint": config_fingerprint(config)?,
    });
    let path = logs_dir.join(format!("{timestamp}_{label}.meta.json"));
    let mut buf = serde_json::to_string_pretty(&meta).context("serialize run meta")?;
    buf.push('\n');
    fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
