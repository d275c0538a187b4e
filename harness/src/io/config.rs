//! Harness configuration stored as TOML next to the trial directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::task::{DEFAULT_TARGET_SPAN, Span};

/// Harness configuration (TOML).
///
/// This file is intended to be edited by humans and must remain stable and
/// automatable. Missing fields default to sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HarnessConfig {
    /// Turn budget: the loop aborts after this many Deciding cycles.
    pub max_turns: u32,

    /// Number of trailing transcript entries shown to the agent each turn.
    pub transcript_window: usize,

    /// Maximum bytes for the rendered prompt before dropping sections.
    pub prompt_budget_bytes: usize,

    /// Wall-clock budget for one agent invocation, in seconds.
    pub agent_timeout_secs: u64,

    /// Truncate agent stdout/stderr logs beyond this many bytes.
    pub agent_output_limit_bytes: usize,

    /// Whether the Deciding prompt includes the structured state snapshot.
    /// Disabling it is the baseline condition: the ledger still records
    /// everything, the agent just does not see it.
    pub include_snapshot: bool,

    /// Span the goal predicate checks confirmations against.
    pub target_start: String,
    pub target_end: String,

    pub agent: AgentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Command invoked for each Deciding step. The rendered prompt is fed on
    /// stdin and the reply JSON is read from stdout.
    pub command: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: vec!["./agent.sh".to_string()],
        }
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_turns: 12,
            transcript_window: 10,
            prompt_budget_bytes: 40_000,
            agent_timeout_secs: 5 * 60,
            agent_output_limit_bytes: 100_000,
            include_snapshot: true,
            target_start: DEFAULT_TARGET_SPAN.0.to_string(),
            target_end: DEFAULT_TARGET_SPAN.1.to_string(),
            agent: AgentConfig::default(),
        }
    }
}

impl HarnessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_turns == 0 {
            return Err(anyhow!("max_turns must be > 0"));
        }
        if self.transcript_window == 0 {
            return Err(anyhow!("transcript_window must be > 0"));
        }
        if self.agent_timeout_secs == 0 {
            return Err(anyhow!("agent_timeout_secs must be > 0"));
        }
        if self.agent_output_limit_bytes == 0 {
            return Err(anyhow!("agent_output_limit_bytes must be > 0"));
        }
        if self.target_start.trim().is_empty() || self.target_end.trim().is_empty() {
            return Err(anyhow!("target span dates must be non-empty"));
        }
        if self.agent.command.is_empty() || self.agent.command[0].trim().is_empty() {
            return Err(anyhow!("agent.command must be a non-empty array"));
        }
        Ok(())
    }

    pub fn target_span(&self) -> Span {
        Span::new(self.target_start.clone(), self.target_end.clone())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HarnessConfig::default()`.
pub fn load_config(path: &Path) -> Result<HarnessConfig> {
    if !path.exists() {
        let cfg = HarnessConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HarnessConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HarnessConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
