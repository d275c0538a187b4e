//! Persisted booking confirmations.
//!
//! Confirmations live in two JSON files under a per-trial data directory,
//! keyed by confirmation id. The store is reset at the start of every trial
//! and read back by the goal predicate at the end; concurrent trials must
//! each point at their own directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rand::Rng;
use serde_json::Value;
use tracing::debug;

use crate::core::types::BookingKind;

/// Key-value store of confirmation records, one JSON file per booking kind.
#[derive(Debug, Clone)]
pub struct BookingStore {
    data_dir: PathBuf,
}

impl BookingStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Clear all confirmations for a fresh trial.
    pub fn reset(&self) -> Result<()> {
        for kind in [BookingKind::Flight, BookingKind::Hotel] {
            self.save(kind, &BTreeMap::new())?;
        }
        debug!(data_dir = %self.data_dir.display(), "booking store reset");
        Ok(())
    }

    /// All confirmation records of one kind, in stable (id) order.
    pub fn read_all(&self, kind: BookingKind) -> Result<Vec<Value>> {
        Ok(self.load(kind)?.into_values().collect())
    }

    /// Persist a confirmation record, stamping it with a generated id.
    /// Returns the stored record including its `confirmation_id`.
    pub fn insert(&self, kind: BookingKind, mut record: Value) -> Result<Value> {
        let confirmation_id = generate_confirmation_id(kind);
        if let Some(fields) = record.as_object_mut() {
            fields.insert(
                "confirmation_id".to_string(),
                Value::String(confirmation_id.clone()),
            );
        }
        let mut records = self.load(kind)?;
        records.insert(confirmation_id.clone(), record.clone());
        self.save(kind, &records)?;
        debug!(kind = kind.as_str(), confirmation_id = %confirmation_id, "confirmation persisted");
        Ok(record)
    }

    fn file(&self, kind: BookingKind) -> PathBuf {
        let name = match kind {
            BookingKind::Flight => "flight_bookings.json",
            BookingKind::Hotel => "hotel_bookings.json",
        };
        self.data_dir.join(name)
    }

    fn load(&self, kind: BookingKind) -> Result<BTreeMap<String, Value>> {
        let path = self.file(kind);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents =
            fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))
    }

    fn save(&self, kind: BookingKind, records: &BTreeMap<String, Value>) -> Result<()> {
        let path = self.file(kind);
        fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("create {}", self.data_dir.display()))?;
        let mut buf = serde_json::to_string_pretty(records).context("serialize bookings")?;
        buf.push('\n');
        fs::write(&path, buf).with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}

/// `FL-`/`HT-` plus six lowercase hex chars, unique within a trial in practice.
fn generate_confirmation_id(kind: BookingKind) -> String {
    const HEX: &[u8] = b"0123456789abcdef";
    let prefix = match kind {
        BookingKind::Flight => "FL",
        BookingKind::Hotel => "HT",
    };
    let mut rng = rand::thread_rng();
    let suffix: String = (0..6)
        .map(|_| HEX[rng.gen_range(0..HEX.len())] as char)
        .collect();
    format!("{prefix}-{suffix}")
}
