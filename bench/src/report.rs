//! Aggregation over JSONL metric logs.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::metrics::TrialRow;

#[derive(Debug, Default, PartialEq)]
pub struct ReportSummary {
    pub rows: usize,
    pub finished: usize,
    pub success: usize,
    pub aborted: usize,
    pub avg_turns: Option<f64>,
    pub avg_elapsed_sec: Option<f64>,
    pub avg_total_tokens: Option<f64>,
    pub action_totals: BTreeMap<String, u64>,
}

/// Aggregate one JSONL log file. Invalid lines are skipped with a warning so
/// a partially-written log from a crashed run still reports.
pub fn aggregate_file(path: &Path) -> Result<(ReportSummary, Vec<String>)> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;

    let mut summary = ReportSummary::default();
    let mut warnings = Vec::new();
    let mut turns_total = 0u64;
    let mut elapsed_total = 0.0f64;
    let mut tokens_total = 0u64;

    for (line_no, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let row: TrialRow = match serde_json::from_str(line) {
            Ok(row) => row,
            Err(err) => {
                warnings.push(format!("skip line {}: {err}", line_no + 1));
                continue;
            }
        };

        summary.rows += 1;
        if row.finished {
            summary.finished += 1;
        }
        if row.success {
            summary.success += 1;
        }
        if row.aborted {
            summary.aborted += 1;
        }
        turns_total += u64::from(row.turn_count);
        elapsed_total += row.elapsed_sec;
        tokens_total += row.total_tokens;
        for (name, count) in &row.action_calls_by_name {
            *summary.action_totals.entry(name.clone()).or_insert(0) += count;
        }
    }

    if summary.rows > 0 {
        let n = summary.rows as f64;
        summary.avg_turns = Some(turns_total as f64 / n);
        summary.avg_elapsed_sec = Some(elapsed_total / n);
        summary.avg_total_tokens = Some(tokens_total as f64 / n);
    }

    Ok((summary, warnings))
}
