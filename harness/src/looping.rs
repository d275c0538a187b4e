//! Multi-turn trial loop: drives turns until the agent finishes or the trial
//! aborts.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::core::state::TrialState;
use crate::io::agent::{Agent, write_reply_schema};
use crate::io::config::HarnessConfig;
use crate::io::store::BookingStore;
use crate::turn::{TurnContext, TurnOutcome, run_turn};

/// The user goal fed to the agent when the caller does not supply one.
pub const DEFAULT_GOAL: &str = "Find and, if possible, book a 7-night trip in Oct 2025 that fits \
the budget and favors warm weather with lots of rain. Check the weather for every candidate \
city first, then search spans in order and book the flight and hotel for one matching span. \
Finish with a short summary naming the city, dates, and any confirmation ids.";

/// Why a trial stopped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum TrialStop {
    /// The agent produced a final answer (or an empty batch).
    Done { answer: String },
    /// The turn budget was exhausted before a final answer.
    TurnBudgetExceeded { max_turns: u32 },
    /// The agent collaborator failed (timeout, crash, malformed reply).
    AgentFailed { error: String },
}

/// Summary of one trial. Aborted trials still carry whatever state had
/// accumulated; partial progress is never discarded.
#[derive(Debug, Clone, Serialize)]
pub struct TrialOutcome {
    pub trial_id: String,
    pub turns_executed: u32,
    pub stop: TrialStop,
    pub state: TrialState,
}

impl TrialOutcome {
    pub fn aborted(&self) -> bool {
        !matches!(self.stop, TrialStop::Done { .. })
    }
}

/// Run one trial to completion.
///
/// Returns `Ok` for every trial that ran, including aborted ones: budget
/// exhaustion and agent failure are outcomes, not errors. `Err` is reserved
/// for harness-internal I/O failures (unwritable trial directory, broken
/// store). The caller owns resetting the store beforehand and evaluating the
/// goal predicate afterwards.
pub fn run_trial<A: Agent>(
    trial_id: &str,
    trial_dir: &Path,
    agent: &A,
    store: &BookingStore,
    config: &HarnessConfig,
    goal: &str,
) -> Result<TrialOutcome> {
    config.validate()?;
    fs::create_dir_all(trial_dir)
        .with_context(|| format!("create trial dir {}", trial_dir.display()))?;
    let reply_schema_path = trial_dir.join("agent_reply.schema.json");
    write_reply_schema(&reply_schema_path)?;

    let ctx = TurnContext {
        trial_id,
        trial_dir,
        reply_schema_path: &reply_schema_path,
        store,
        config,
        goal,
    };

    info!(trial_id, max_turns = config.max_turns, "trial started");
    let mut state = TrialState::new(goal);

    loop {
        // Cancellation happens only at Deciding boundaries: a batch, once
        // dispatched, always runs to completion.
        if state.turn_count >= config.max_turns {
            warn!(trial_id, max_turns = config.max_turns, "turn budget exhausted");
            return finish(
                trial_id,
                trial_dir,
                TrialStop::TurnBudgetExceeded {
                    max_turns: config.max_turns,
                },
                state,
            );
        }

        match run_turn(&ctx, agent, &mut state) {
            Ok(TurnOutcome::Final { answer }) => {
                return finish(trial_id, trial_dir, TrialStop::Done { answer }, state);
            }
            Ok(TurnOutcome::Continue { .. }) => {}
            Err(err) => {
                let error = format!("{err:#}");
                warn!(trial_id, error = %error, "agent collaborator failed");
                return finish(trial_id, trial_dir, TrialStop::AgentFailed { error }, state);
            }
        }
    }
}

fn finish(
    trial_id: &str,
    trial_dir: &Path,
    stop: TrialStop,
    state: TrialState,
) -> Result<TrialOutcome> {
    let outcome = TrialOutcome {
        trial_id: trial_id.to_string(),
        turns_executed: state.turn_count,
        stop,
        state,
    };
    let outcome_path = trial_dir.join("outcome.json");
    let mut buf = serde_json::to_string_pretty(&outcome).context("serialize outcome")?;
    buf.push('\n');
    fs::write(&outcome_path, buf)
        .with_context(|| format!("write {}", outcome_path.display()))?;
    info!(
        trial_id = %outcome.trial_id,
        turns = outcome.turns_executed,
        aborted = outcome.aborted(),
        "trial finished"
    );
    Ok(outcome)
}
