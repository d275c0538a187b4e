//! Per-turn artifact logging under `<trial dir>/turns/`.
//!
//! Always written, unaffected by `RUST_LOG`; these files are the product
//! record of a trial that downstream reporting reads back.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use crate::core::types::{ActionResult, AgentReply};

#[derive(Debug, Clone, Serialize)]
pub struct TurnMeta {
    pub trial_id: String,
    pub turn: u32,
    pub reply_kind: String,
    pub dispatched: usize,
    pub repeated: usize,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TurnPaths {
    pub dir: PathBuf,
    pub meta_path: PathBuf,
    pub reply_path: PathBuf,
    pub results_path: PathBuf,
    pub state_path: PathBuf,
    pub agent_log_path: PathBuf,
}

impl TurnPaths {
    pub fn new(trial_dir: &Path, turn: u32) -> Self {
        let dir = trial_dir.join("turns").join(turn.to_string());
        Self {
            dir: dir.clone(),
            meta_path: dir.join("meta.json"),
            reply_path: dir.join("reply.json"),
            results_path: dir.join("results.json"),
            state_path: dir.join("state.json"),
            agent_log_path: dir.join("agent.log"),
        }
    }
}

pub struct TurnWriteRequest<'a> {
    pub trial_dir: &'a Path,
    pub turn: u32,
    pub meta: &'a TurnMeta,
    pub reply: &'a AgentReply,
    pub results: &'a [ActionResult],
    pub state_snapshot: &'a Value,
}

pub fn write_turn(request: &TurnWriteRequest<'_>) -> Result<TurnPaths> {
    let paths = TurnPaths::new(request.trial_dir, request.turn);
    fs::create_dir_all(&paths.dir)
        .with_context(|| format!("create turn dir {}", paths.dir.display()))?;

    // Write in deterministic order to keep logs stable.
    write_json(&paths.meta_path, request.meta)?;
    write_json(&paths.reply_path, request.reply)?;
    write_json(&paths.results_path, &request.results)?;
    write_json(&paths.state_path, request.state_snapshot)?;

    Ok(paths)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value)?;
    buf.push('\n');
    fs::write(path, buf).with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn turn_paths_are_stable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let paths = TurnPaths::new(temp.path(), 3);

        assert!(paths.dir.ends_with(Path::new("turns/3")));
        assert!(paths.meta_path.ends_with("meta.json"));
        assert!(paths.reply_path.ends_with("reply.json"));
        assert!(paths.results_path.ends_with("results.json"));
        assert!(paths.state_path.ends_with("state.json"));
        assert!(paths.agent_log_path.ends_with("agent.log"));
    }

    #[test]
    fn writes_turn_artifacts() {
        let temp = tempfile::tempdir().expect("tempdir");
        let meta = TurnMeta {
            trial_id: "trial-1".to_string(),
            turn: 1,
            reply_kind: "actions".to_string(),
            dispatched: 1,
            repeated: 0,
            duration_ms: Some(12),
        };
        let reply = AgentReply::Actions {
            requests: Vec::new(),
            usage: None,
        };
        let results = vec![ActionResult {
            name: "get_weather_summary".to_string(),
            request_id: "call_1".to_string(),
            payload: json!({"city": "Bangkok", "summary": "Hot"}),
        }];

        let paths = write_turn(&TurnWriteRequest {
            trial_dir: temp.path(),
            turn: 1,
            meta: &meta,
            reply: &reply,
            results: &results,
            state_snapshot: &json!({"turn_count": 1}),
        })
        .expect("write turn");

        assert!(paths.meta_path.is_file());
        assert!(paths.reply_path.is_file());
        assert!(paths.results_path.is_file());
        assert!(paths.state_path.is_file());
    }
}
