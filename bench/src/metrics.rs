//! Per-trial metric rows and the JSONL writer.
//!
//! One row per trial, flushed as soon as it is written so a crashed run still
//! leaves every completed trial on disk.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Metrics for one trial, serialized as one JSONL row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRow {
    pub run_id: u32,
    pub trial_id: String,
    /// Whether the agent collaborator completed (false on agent failure).
    pub finished: bool,
    #[serde(default)]
    pub error: String,
    pub success: bool,
    pub aborted: bool,
    pub turn_count: u32,
    pub action_calls_total: u64,
    pub action_calls_by_name: BTreeMap<String, u64>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    pub elapsed_sec: f64,
    /// Transcript length at the end of the trial.
    pub entry_count: usize,
}

/// Append-only JSONL writer for trial rows.
pub struct MetricsWriter {
    file: File,
}

impl MetricsWriter {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create logs dir {}", parent.display()))?;
        }
        let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
        Ok(Self { file })
    }

    pub fn append(&mut self, row: &TrialRow) -> Result<()> {
        let line = serde_json::to_string(row).context("serialize trial row")?;
        writeln!(self.file, "{line}").context("write trial row")?;
        self.file.flush().context("flush trial row")?;
        Ok(())
    }
}

/// Make a model/agent label safe for file names: anything outside
/// `[A-Za-z0-9._-]` becomes `_`.
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "agent".to_string()
    } else {
        sanitized
    }
}

pub fn log_file_name(timestamp: &str, label: &str) -> String {
    format!("{timestamp}_{label}.jsonl")
}
