//! Attempt ledger: structured memory of which actions have been tried.
//!
//! Records are keyed by `(action, canonical key)`. A request whose key already
//! resolved is a repeat: it shares the existing entry instead of creating a
//! second one, and the caller gets the prior result back so it can be surfaced
//! to the agent. Records are never deleted within a trial.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Normalized form of an action's arguments used for deduplication.
///
/// Weather lookups key on the place, searches on the `(place, window)` tuple.
/// Everything else, including malformed arguments and unknown actions, falls
/// back to the canonical serialization of the raw arguments, which disables
/// cross-request deduplication rather than failing closed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalKey {
    Place(String),
    Window {
        place: String,
        start: String,
        end: String,
    },
    Raw(String),
}

impl fmt::Display for CanonicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CanonicalKey::Place(place) => write!(f, "{place}"),
            CanonicalKey::Window { place, start, end } => write!(f, "{place} {start}..{end}"),
            CanonicalKey::Raw(raw) => write!(f, "{raw}"),
        }
    }
}

/// Derive the canonical key for a request.
///
/// `serde_json` maps are sorted by key, so the `Raw` fallback is a canonical
/// serialization: argument order in the wire payload does not matter.
pub fn canonical_key_for(action: &str, arguments: &Value) -> CanonicalKey {
    let key = match action {
        "get_weather_summary" => {
            string_field(arguments, "city").map(|city| CanonicalKey::Place(city.to_lowercase()))
        }
        "list_flights" => window_key(arguments, "dest", "dep", "ret"),
        "list_hotels" => window_key(arguments, "city", "checkin", "checkout"),
        _ => None,
    };
    key.unwrap_or_else(|| CanonicalKey::Raw(raw_arguments(arguments)))
}

fn window_key(arguments: &Value, place: &str, start: &str, end: &str) -> Option<CanonicalKey> {
    Some(CanonicalKey::Window {
        place: string_field(arguments, place)?,
        start: string_field(arguments, start)?,
        end: string_field(arguments, end)?,
    })
}

fn string_field(arguments: &Value, field: &str) -> Option<String> {
    let value = arguments.get(field)?.as_str()?.trim();
    if value.is_empty() {
        return None;
    }
    Some(value.to_string())
}

fn raw_arguments(arguments: &Value) -> String {
    serde_json::to_string(arguments).unwrap_or_else(|_| arguments.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Resolved,
}

/// One attempted action. Created `Pending` when the request is first recorded,
/// transitions to `Resolved` exactly once when its result arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub action: String,
    pub key: CanonicalKey,
    pub request_id: String,
    pub status: AttemptStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

/// What `record_request` decided about an incoming request.
///
/// `repeated` means a resolved record with the same key already exists; the
/// prior fields carry that record's correlation id and result so the loop can
/// surface them instead of producing a second result entry.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDisposition {
    pub repeated: bool,
    pub prior_request_id: Option<String>,
    pub prior_result: Option<Value>,
}

impl RequestDisposition {
    fn fresh() -> Self {
        Self {
            repeated: false,
            prior_request_id: None,
            prior_result: None,
        }
    }

    fn repeat_of(record: &AttemptRecord) -> Self {
        Self {
            repeated: true,
            prior_request_id: Some(record.request_id.clone()),
            prior_result: record.result.clone(),
        }
    }
}

/// Append-biased record of every action attempted in one trial.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AttemptLedger {
    records: Vec<AttemptRecord>,
}

impl AttemptLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an incoming request.
    ///
    /// If a resolved record with the same `(action, key)` exists, no new record
    /// is created and the disposition points at the prior attempt. A re-observed
    /// request id is likewise absorbed into its existing record. Otherwise a
    /// `Pending` record is appended; same-key pending duplicates are allowed
    /// (the agent may issue them within one batch) and are resolved
    /// individually by request id.
    pub fn record_request(
        &mut self,
        action: &str,
        key: &CanonicalKey,
        request_id: &str,
    ) -> RequestDisposition {
        if let Some(existing) = self.find_resolved(action, key) {
            return RequestDisposition::repeat_of(existing);
        }
        if self.records.iter().any(|r| r.request_id == request_id) {
            return RequestDisposition::fresh();
        }
        self.records.push(AttemptRecord {
            action: action.to_string(),
            key: key.clone(),
            request_id: request_id.to_string(),
            status: AttemptStatus::Pending,
            result: None,
        });
        RequestDisposition::fresh()
    }

    /// Resolve a pending record, attaching its result.
    ///
    /// Matches by request id first, falling back to the first pending record
    /// with the same `(action, key)`. Returns false (no-op) when nothing
    /// matches: out-of-order or duplicate delivery must not corrupt the ledger.
    pub fn record_result(
        &mut self,
        action: &str,
        key: &CanonicalKey,
        request_id: &str,
        result: Value,
    ) -> bool {
        let matched = self
            .records
            .iter()
            .position(|r| r.status == AttemptStatus::Pending && r.request_id == request_id)
            .or_else(|| {
                self.records.iter().position(|r| {
                    r.status == AttemptStatus::Pending && r.action == action && r.key == *key
                })
            });
        let Some(idx) = matched else {
            return false;
        };
        let record = &mut self.records[idx];
        record.status = AttemptStatus::Resolved;
        record.result = Some(result);
        true
    }

    /// Whether a resolved attempt exists for `(action, key)`.
    pub fn has_attempted(&self, action: &str, key: &CanonicalKey) -> bool {
        self.find_resolved(action, key).is_some()
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn find_resolved(&self, action: &str, key: &CanonicalKey) -> Option<&AttemptRecord> {
        self.records
            .iter()
            .find(|r| r.status == AttemptStatus::Resolved && r.action == action && r.key == *key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn weather_key() -> CanonicalKey {
        canonical_key_for("get_weather_summary", &json!({"city": "Bangkok"}))
    }

    #[test]
    fn derives_place_and_window_keys() {
        assert_eq!(weather_key(), CanonicalKey::Place("bangkok".to_string()));

        let key = canonical_key_for(
            "list_flights",
            &json!({"dest": "BKK", "dep": "2025-10-03", "ret": "2025-10-10"}),
        );
        assert_eq!(
            key,
            CanonicalKey::Window {
                place: "BKK".to_string(),
                start: "2025-10-03".to_string(),
                end: "2025-10-10".to_string(),
            }
        );
    }

    /// Malformed arguments fall back to a raw key instead of failing closed.
    #[test]
    fn malformed_arguments_get_raw_key() {
        let key = canonical_key_for("list_flights", &json!({"dest": "BKK"}));
        assert!(matches!(key, CanonicalKey::Raw(_)));

        let key = canonical_key_for("teleport", &json!({"to": "mars"}));
        assert!(matches!(key, CanonicalKey::Raw(_)));
    }

    /// Raw keys canonicalize argument order: two serializations of the same
    /// object produce the same key.
    #[test]
    fn raw_key_is_order_independent() {
        let a = canonical_key_for("convert_currency", &json!({"amount": 1.0, "from_currency": "THB", "to_currency": "USD"}));
        let b = canonical_key_for("convert_currency", &json!({"to_currency": "USD", "amount": 1.0, "from_currency": "THB"}));
        assert_eq!(a, b);
    }

    /// Repeat-avoidance: a request whose key already resolved shares the
    /// existing record instead of creating a second one.
    #[test]
    fn resolved_repeat_shares_single_entry() {
        let mut ledger = AttemptLedger::new();
        let key = weather_key();

        let first = ledger.record_request("get_weather_summary", &key, "call_1");
        assert!(!first.repeated);
        assert!(ledger.record_result(
            "get_weather_summary",
            &key,
            "call_1",
            json!({"summary": "hot"})
        ));

        let second = ledger.record_request("get_weather_summary", &key, "call_9");
        assert!(second.repeated);
        assert_eq!(second.prior_request_id.as_deref(), Some("call_1"));
        assert_eq!(second.prior_result, Some(json!({"summary": "hot"})));
        assert_eq!(ledger.len(), 1);
        assert!(ledger.has_attempted("get_weather_summary", &key));
    }

    /// Same-batch pending duplicates each get a record and resolve by
    /// request id, falling back to the key for unmatched ids.
    #[test]
    fn pending_duplicates_resolve_individually() {
        let mut ledger = AttemptLedger::new();
        let key = weather_key();

        ledger.record_request("get_weather_summary", &key, "call_1");
        ledger.record_request("get_weather_summary", &key, "call_2");
        assert_eq!(ledger.len(), 2);

        // Unknown request id falls back to the first pending match for the key.
        assert!(ledger.record_result("get_weather_summary", &key, "call_7", json!({"n": 1})));
        assert_eq!(ledger.records()[0].status, AttemptStatus::Resolved);
        assert_eq!(ledger.records()[1].status, AttemptStatus::Pending);

        assert!(ledger.record_result("get_weather_summary", &key, "call_2", json!({"n": 2})));
        assert_eq!(ledger.records()[1].result, Some(json!({"n": 2})));
    }

    /// Results with no matching pending record are dropped, not recorded.
    #[test]
    fn unmatched_result_is_a_noop() {
        let mut ledger = AttemptLedger::new();
        let key = weather_key();
        assert!(!ledger.record_result("get_weather_summary", &key, "call_1", json!({})));
        assert!(ledger.is_empty());

        ledger.record_request("get_weather_summary", &key, "call_1");
        assert!(ledger.record_result("get_weather_summary", &key, "call_1", json!({})));
        // Second delivery of the same result: record already resolved.
        assert!(!ledger.record_result("get_weather_summary", &key, "call_1", json!({})));
    }

    /// A re-observed request id does not create a duplicate pending record.
    #[test]
    fn redelivered_request_id_is_absorbed() {
        let mut ledger = AttemptLedger::new();
        let key = weather_key();
        ledger.record_request("get_weather_summary", &key, "call_1");
        let again = ledger.record_request("get_weather_summary", &key, "call_1");
        assert!(!again.repeated);
        assert_eq!(ledger.len(), 1);
    }
}
