//! Agent abstraction for the Deciding step.
//!
//! The [`Agent`] trait decouples turn orchestration from the actual model
//! backend. The production backend spawns a configured command, feeds the
//! rendered prompt on stdin, and reads the reply JSON from stdout. Tests use
//! scripted agents that return predetermined replies without spawning
//! processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use jsonschema::{Draft, Validator};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::types::AgentReply;
use crate::io::process::{CommandOutput, run_command_with_timeout};

const AGENT_REPLY_SCHEMA: &str = include_str!("../../schemas/agent_reply.schema.json");

static REPLY_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(AGENT_REPLY_SCHEMA).expect("embedded reply schema should parse");
    jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .expect("embedded reply schema should compile")
});

/// Parameters for one Deciding invocation.
#[derive(Debug, Clone)]
pub struct DecideRequest {
    /// Working directory for the agent process.
    pub workdir: PathBuf,
    /// Rendered prompt to feed to the agent.
    pub prompt: String,
    /// Path to the JSON Schema that constrains the reply.
    pub output_schema_path: PathBuf,
    /// Path where the reply JSON is written.
    pub output_path: PathBuf,
    /// Path to write the agent stdout/stderr log.
    pub agent_log_path: PathBuf,
    /// Maximum time to wait for the agent to reply.
    pub timeout: Duration,
    /// Truncate agent output logs beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// Abstraction over agent backends.
pub trait Agent {
    /// Produce one reply. Must write the reply JSON to `request.output_path`.
    fn decide(&self, request: &DecideRequest) -> Result<()>;
}

/// Agent that spawns a configured command.
///
/// The prompt arrives on stdin; stdout is taken verbatim as the reply JSON.
/// The reply schema path is exported as `AGENT_REPLY_SCHEMA` for wrappers
/// that can constrain their model's output.
pub struct CommandAgent {
    command: Vec<String>,
}

impl CommandAgent {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.is_empty() || command[0].trim().is_empty() {
            bail!("agent command must be non-empty");
        }
        Ok(Self { command })
    }
}

impl Agent for CommandAgent {
    #[instrument(skip_all, fields(timeout_secs = request.timeout.as_secs()))]
    fn decide(&self, request: &DecideRequest) -> Result<()> {
        info!(command = %self.command[0], workdir = %request.workdir.display(), "invoking agent");

        if let Some(parent) = request.output_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create output dir {}", parent.display()))?;
        }

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..])
            .env("AGENT_REPLY_SCHEMA", &request.output_schema_path)
            .current_dir(&request.workdir);

        let output = run_command_with_timeout(
            cmd,
            Some(request.prompt.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .context("run agent command")?;

        write_agent_log(&request.agent_log_path, &output, request.output_limit_bytes)?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "agent timed out");
            return Err(anyhow!("agent timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "agent command failed");
            return Err(anyhow!(
                "agent command failed with status {:?}",
                output.status.code()
            ));
        }

        fs::write(&request.output_path, &output.stdout)
            .with_context(|| format!("write agent reply {}", request.output_path.display()))?;
        debug!("agent reply captured");
        Ok(())
    }
}

/// Run the agent and load its schema-validated reply.
#[instrument(skip_all, fields(output_path = %request.output_path.display()))]
pub fn decide_and_load<A: Agent>(agent: &A, request: &DecideRequest) -> Result<AgentReply> {
    agent.decide(request)?;
    if !request.output_path.exists() {
        return Err(anyhow!(
            "missing agent reply {}",
            request.output_path.display()
        ));
    }
    let contents = fs::read_to_string(&request.output_path)
        .with_context(|| format!("read agent reply {}", request.output_path.display()))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("parse {}", request.output_path.display()))?;
    validate_reply(&value)?;
    let reply: AgentReply = serde_json::from_value(value).context("parse agent reply")?;
    debug!(kind = reply.kind_str(), "parsed agent reply");
    Ok(reply)
}

/// Validate a reply against the embedded schema (Draft 2020-12).
pub fn validate_reply(value: &Value) -> Result<()> {
    let messages: Vec<String> = REPLY_VALIDATOR
        .iter_errors(value)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        bail!("reply schema validation failed:\n- {}", messages.join("\n- "));
    }
    Ok(())
}

/// Write the embedded reply schema to disk so agent wrappers can use it.
pub fn write_reply_schema(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create reply schema dir {}", parent.display()))?;
    }
    fs::write(path, AGENT_REPLY_SCHEMA)
        .with_context(|| format!("write reply schema {}", path.display()))
}

fn write_agent_log(path: &Path, output: &CommandOutput, output_limit: usize) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create agent log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stdout));
    buf.push_str(&output.stdout_truncated_notice("agent"));
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&String::from_utf8_lossy(&output.stderr));
    buf.push_str(&output.stderr_truncated_notice("agent"));
    if output.timed_out {
        buf.push_str("\n[agent timed out]\n");
    }

    if buf.len() > output_limit {
        let truncated = format!(
            "{}\n[truncated {} bytes]\n",
            &buf[..output_limit],
            buf.len() - output_limit
        );
        fs::write(path, truncated)
            .with_context(|| format!("write agent log {}", path.display()))?;
        return Ok(());
    }

    fs::write(path, buf).with_context(|| format!("write agent log {}", path.display()))
}
