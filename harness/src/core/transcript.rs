//! Deduplicating transcript: the ordered record of all turn events.
//!
//! Appends are idempotent by identity signature, so a resumed or re-observed
//! event stream never produces duplicate entries.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
    ActionResult,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::ActionResult => "action_result",
        }
    }
}

/// One turn event. The signature is a deterministic function of role,
/// correlation id, and payload content; it is what makes appends idempotent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub turn_index: u32,
    pub role: Role,
    pub correlation_id: String,
    pub payload: Value,
    pub signature: String,
}

impl TranscriptEntry {
    pub fn new(turn_index: u32, role: Role, correlation_id: impl Into<String>, payload: Value) -> Self {
        let correlation_id = correlation_id.into();
        let signature = identity_signature(role, &correlation_id, &payload);
        Self {
            turn_index,
            role,
            correlation_id,
            payload,
            signature,
        }
    }
}

/// SHA-256 over role, correlation id, and the canonical payload serialization.
///
/// The turn index is deliberately excluded: the same event re-observed in a
/// later window must still hash to the same signature.
pub fn identity_signature(role: Role, correlation_id: &str, payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(role.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(correlation_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Ordered, signature-deduplicated list of transcript entries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
    #[serde(skip)]
    seen: HashSet<String>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless one with the same signature already exists.
    /// Returns true when the entry was actually added.
    pub fn append(&mut self, entry: TranscriptEntry) -> bool {
        if !self.seen.insert(entry.signature.clone()) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// The last `n` entries in insertion order: the bounded window handed to
    /// the agent each turn. Older information is only available through the
    /// structured state snapshot.
    pub fn tail(&self, n: usize) -> &[TranscriptEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
