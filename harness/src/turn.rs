//! Orchestration for a single trial turn.
//!
//! One turn is one Deciding -> Dispatching -> AwaitingResults -> Updating
//! cycle: ask the agent for its next move, record every requested action in
//! the attempt ledger, execute the batch in emission order, then commit
//! results, promotions, and transcript entries before the next Deciding step.
//! A batch, once dispatched, always runs to completion.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde_json::json;
use tracing::{debug, info};

use crate::core::ledger::{CanonicalKey, RequestDisposition, canonical_key_for};
use crate::core::state::{TrialState, UpdateSummary};
use crate::core::transcript::{Role, TranscriptEntry};
use crate::core::types::{ActionRequest, ActionResult, AgentReply};
use crate::io::agent::{Agent, DecideRequest, decide_and_load};
use crate::io::catalog::{catalog_json, execute};
use crate::io::config::HarnessConfig;
use crate::io::prompt::{PromptBuilder, PromptInputs, render_transcript};
use crate::io::store::BookingStore;
use crate::io::trial_log::{TurnMeta, TurnPaths, TurnWriteRequest, write_turn};

/// Everything one turn needs from its surrounding trial.
#[derive(Debug)]
pub struct TurnContext<'a> {
    pub trial_id: &'a str,
    /// Artifact root for this trial (`turns/<n>/` lives under it).
    pub trial_dir: &'a Path,
    /// Reply schema written once at trial start.
    pub reply_schema_path: &'a Path,
    pub store: &'a BookingStore,
    pub config: &'a HarnessConfig,
    pub goal: &'a str,
}

/// Result of a single turn.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The agent produced a final answer (or an empty batch).
    Final { answer: String },
    /// A batch was dispatched and committed; the loop continues.
    Continue { dispatched: usize },
}

struct PlannedDispatch {
    request: ActionRequest,
    key: CanonicalKey,
    disposition: RequestDisposition,
}

/// Execute one turn. Errors mean the agent collaborator failed; everything
/// the agent itself gets wrong (bad names, bad arguments) is absorbed into
/// structured error results and the loop advances.
pub fn run_turn<A: Agent>(
    ctx: &TurnContext<'_>,
    agent: &A,
    state: &mut TrialState,
) -> Result<TurnOutcome> {
    let start = Instant::now();
    let turn = state.turn_count + 1;
    let paths = TurnPaths::new(ctx.trial_dir, turn);

    // Deciding: bounded transcript window plus the structured state snapshot.
    let reply = decide(ctx, agent, state, turn, &paths)?;
    if let Some(usage) = reply.usage() {
        state.usage.accumulate(usage);
    }

    let requests = match &reply {
        AgentReply::Final { answer, .. } => {
            return finish_final(ctx, state, turn, &reply, answer.clone(), start);
        }
        AgentReply::Actions { requests, .. } if requests.is_empty() => {
            // Zero requests is a final turn with no prose.
            return finish_final(ctx, state, turn, &reply, String::new(), start);
        }
        AgentReply::Actions { requests, .. } => requests.clone(),
    };

    // Dispatching: record every request before anything executes. Duplicate
    // resolved attempts are still forwarded (the actions are idempotent), only
    // annotated so Updating surfaces the prior result.
    let mut planned = Vec::with_capacity(requests.len());
    for request in requests {
        state.transcript.append(TranscriptEntry::new(
            turn,
            Role::Agent,
            request.request_id.clone(),
            json!({ "name": request.name, "arguments": request.arguments }),
        ));
        let key = canonical_key_for(&request.name, &request.arguments);
        let disposition = state
            .ledger
            .record_request(&request.name, &key, &request.request_id);
        if disposition.repeated {
            debug!(
                action = %request.name,
                key = %key,
                request_id = %request.request_id,
                "repeat of a resolved attempt, forwarding anyway"
            );
        }
        planned.push(PlannedDispatch {
            request,
            key,
            disposition,
        });
    }

    // AwaitingResults: exactly one result per dispatched request, in order.
    let results: Vec<ActionResult> = planned
        .iter()
        .map(|p| execute(&p.request, ctx.store))
        .collect();

    // Updating: resolve ledger records, apply promotion rules, and append
    // both request and result entries idempotently.
    let mut summary = UpdateSummary::default();
    for (p, result) in planned.iter().zip(&results) {
        if p.disposition.repeated {
            // Surface the prior result under its original correlation id; the
            // transcript dedupe makes this a no-op, so no second result entry.
            let correlation = p
                .disposition
                .prior_request_id
                .clone()
                .unwrap_or_else(|| result.request_id.clone());
            let payload = p
                .disposition
                .prior_result
                .clone()
                .unwrap_or_else(|| result.payload.clone());
            state.transcript.append(TranscriptEntry::new(
                turn,
                Role::ActionResult,
                correlation,
                payload,
            ));
            continue;
        }
        state.ledger.record_result(
            &p.request.name,
            &p.key,
            &p.request.request_id,
            result.payload.clone(),
        );
        state.apply_result(&p.request.name, &p.request.arguments, &result.payload, &mut summary);
        state.transcript.append(TranscriptEntry::new(
            turn,
            Role::ActionResult,
            result.request_id.clone(),
            result.payload.clone(),
        ));
    }

    state.turn_count = turn;

    let repeated = planned.iter().filter(|p| p.disposition.repeated).count();
    let meta = TurnMeta {
        trial_id: ctx.trial_id.to_string(),
        turn,
        reply_kind: reply.kind_str().to_string(),
        dispatched: planned.len(),
        repeated,
        duration_ms: Some(start.elapsed().as_millis() as u64),
    };
    write_turn(&TurnWriteRequest {
        trial_dir: ctx.trial_dir,
        turn,
        meta: &meta,
        reply: &reply,
        results: &results,
        state_snapshot: &state.snapshot(),
    })?;

    info!(
        trial_id = %ctx.trial_id,
        turn,
        dispatched = planned.len(),
        repeated,
        destination = ?summary.destination_fixed,
        promoted = ?summary.promoted,
        "turn committed"
    );
    Ok(TurnOutcome::Continue {
        dispatched: planned.len(),
    })
}

fn decide<A: Agent>(
    ctx: &TurnContext<'_>,
    agent: &A,
    state: &TrialState,
    turn: u32,
    paths: &TurnPaths,
) -> Result<AgentReply> {
    let snapshot = ctx.config.include_snapshot.then(|| {
        serde_json::to_string_pretty(&state.snapshot())
            .unwrap_or_else(|_| state.snapshot().to_string())
    });
    let window = render_transcript(state.transcript.tail(ctx.config.transcript_window));
    let catalog = serde_json::to_string_pretty(&catalog_json())
        .unwrap_or_else(|_| catalog_json().to_string());

    let inputs = PromptInputs {
        goal: ctx.goal.to_string(),
        catalog,
        snapshot,
        transcript: (!window.is_empty()).then_some(window),
        turn,
        max_turns: ctx.config.max_turns,
    };
    let prompt = PromptBuilder::new(ctx.config.prompt_budget_bytes).build(&inputs);

    let request = DecideRequest {
        workdir: ctx.trial_dir.to_path_buf(),
        prompt: prompt.render(),
        output_schema_path: ctx.reply_schema_path.to_path_buf(),
        output_path: paths.reply_path.clone(),
        agent_log_path: paths.agent_log_path.clone(),
        timeout: Duration::from_secs(ctx.config.agent_timeout_secs),
        output_limit_bytes: ctx.config.agent_output_limit_bytes,
    };
    decide_and_load(agent, &request)
}

fn finish_final(
    ctx: &TurnContext<'_>,
    state: &mut TrialState,
    turn: u32,
    reply: &AgentReply,
    answer: String,
    start: Instant,
) -> Result<TurnOutcome> {
    state.transcript.append(TranscriptEntry::new(
        turn,
        Role::Agent,
        format!("final-{turn}"),
        json!({ "answer": answer }),
    ));
    state.turn_count = turn;

    let meta = TurnMeta {
        trial_id: ctx.trial_id.to_string(),
        turn,
        reply_kind: "final".to_string(),
        dispatched: 0,
        repeated: 0,
        duration_ms: Some(start.elapsed().as_millis() as u64),
    };
    write_turn(&TurnWriteRequest {
        trial_dir: ctx.trial_dir,
        turn,
        meta: &meta,
        reply,
        results: &[],
        state_snapshot: &state.snapshot(),
    })?;

    info!(trial_id = %ctx.trial_id, turn, "final turn");
    Ok(TurnOutcome::Final { answer })
}
