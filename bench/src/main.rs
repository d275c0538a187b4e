mod cli;
mod metrics;
mod report;
mod trial;
mod workspace;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::cli::RunArgs;

#[derive(Parser)]
#[command(name = "bench", version, about = "Trial driver for the trip-booking harness")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run trials, each in an isolated workspace, writing JSONL metrics.
    Run {
        /// Directory holding `workspaces/` and `logs/`.
        #[arg(long, default_value = "bench-runs")]
        root: PathBuf,
        #[arg(long, default_value_t = 10)]
        trials: u32,
        /// Model/agent tag used in log and workspace names.
        #[arg(long, default_value = "agent")]
        label: String,
        /// Harness config TOML; defaults apply if omitted.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Agent command override (prompt on stdin, reply JSON on stdout).
        #[arg(long = "agent-cmd", num_args = 1.., value_name = "CMD")]
        agent_cmd: Vec<String>,
        /// Baseline condition: omit the structured state snapshot from prompts.
        #[arg(long)]
        no_snapshot: bool,
        /// Override the user goal text.
        #[arg(long)]
        goal: Option<String>,
    },
    /// Aggregate one JSONL metrics log.
    Report { path: PathBuf },
    /// Remove workspaces and logs.
    Clean {
        #[arg(long, default_value = "bench-runs")]
        root: PathBuf,
    },
}

/// Dev diagnostics via `RUST_LOG`; metric rows and workspaces are the product
/// output and are written regardless.
fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            root,
            trials,
            label,
            config,
            agent_cmd,
            no_snapshot,
            goal,
        } => cli::run_trials(&RunArgs {
            root,
            trials,
            label,
            config,
            agent_cmd,
            no_snapshot,
            goal,
        }),
        Command::Report { path } => cli::report_log(&path),
        Command::Clean { root } => cli::clean(&root),
    }
}
