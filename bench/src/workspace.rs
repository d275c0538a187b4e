//! Workspace creation and management.
//!
//! Each trial gets an isolated directory holding its booking store, turn
//! artifacts, and outcome. Isolation is what lets trials run back-to-back
//! (or concurrently) without interleaving inside another trial's
//! reset -> run -> evaluate window.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use sha2::{Digest, Sha256};

use harness::io::config::HarnessConfig;

/// An isolated workspace for running one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    /// Absolute path to the workspace root.
    pub root: PathBuf,
    /// Workspace directory name (includes label, timestamp, and random suffix).
    pub name: String,
}

/// Create an isolated workspace under `base_dir`.
pub fn create_workspace(base_dir: &Path, label: &str) -> Result<Workspace> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("create workspace dir {}", base_dir.display()))?;

    let timestamp = generate_timestamp();
    let short_id = generate_short_id();
    let name = build_workspace_name(label, &timestamp, &short_id);
    let root = base_dir.join(&name);
    fs::create_dir_all(root.join("data"))
        .with_context(|| format!("create workspace root {}", root.display()))?;

    Ok(Workspace { root, name })
}

pub fn build_workspace_name(label: &str, timestamp: &str, short_id: &str) -> String {
    format!("{label}_{timestamp}_{short_id}")
}

/// SHA-256 fingerprint of the effective config, for reproducibility tracking
/// in run metadata.
pub fn config_fingerprint(config: &HarnessConfig) -> Result<String> {
    let serialized = serde_json::to_string(config).context("serialize config")?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn workspace_name_uses_expected_format() {
        let name = build_workspace_name("qwen3-8b", "20261015_120000", "abc123");
        assert_eq!(name, "qwen3-8b_20261015_120000_abc123");
    }

    #[test]
    fn creates_workspace_with_data_dir() {
        let temp = tempdir().expect("tempdir");
        let workspace = create_workspace(temp.path(), "label").expect("workspace");
        assert!(workspace.root.join("data").is_dir());
        assert!(workspace.name.starts_with("label_"));
    }

    #[test]
    fn two_workspaces_do_not_collide() {
        let temp = tempdir().expect("tempdir");
        let a = create_workspace(temp.path(), "label").expect("a");
        let b = create_workspace(temp.path(), "label").expect("b");
        assert_ne!(a.root, b.root);
    }

    #[test]
    fn fingerprint_is_stable_for_equal_configs() {
        let a = config_fingerprint(&HarnessConfig::default()).expect("a");
        let b = config_fingerprint(&HarnessConfig::default()).expect("b");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let changed = HarnessConfig {
            max_turns: 5,
            ..HarnessConfig::default()
        };
        assert_ne!(a, config_fingerprint(&changed).expect("changed"));
    }
}
