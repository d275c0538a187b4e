//! Trial state: the structured memory one orchestration loop instance owns.
//!
//! Holds the attempt ledger, the transcript, the selected destination, and
//! the promoted bookings. A new trial always starts from a fresh instance;
//! nothing here is shared across trials.

use serde::Serialize;
use serde_json::Value;

use crate::core::ledger::AttemptLedger;
use crate::core::task::is_candidate_city;
use crate::core::transcript::{Role, Transcript, TranscriptEntry};
use crate::core::types::{ActionName, BookingKind, TokenUsage};

/// What a booking result promotion decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Promotion {
    /// Accepted as the authoritative booking for its kind.
    Promoted,
    /// Result carried no confirmation id (failed or malformed booking).
    NotConfirmed,
    /// Confirmed, but its span is not one of the fixed candidates; recorded in
    /// the ledger only, so a hallucinated span cannot be treated as a win.
    SpanMismatch,
}

/// Semantic updates applied while processing one batch of results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateSummary {
    /// Destination code fixed by this batch, if any (first-writer-wins).
    pub destination_fixed: Option<String>,
    /// Booking kinds promoted by this batch.
    pub promoted: Vec<BookingKind>,
}

/// Top-level state for one trial, owned exclusively by one loop instance.
#[derive(Debug, Clone, Serialize)]
pub struct TrialState {
    pub ledger: AttemptLedger,
    pub transcript: Transcript,
    pub selected_destination: Option<String>,
    pub flight_booking: Option<Value>,
    pub hotel_booking: Option<Value>,
    pub turn_count: u32,
    pub usage: TokenUsage,
}

impl TrialState {
    /// Fresh state seeded with the user goal as the first transcript entry.
    pub fn new(goal: &str) -> Self {
        let mut transcript = Transcript::new();
        transcript.append(TranscriptEntry::new(
            0,
            Role::User,
            "user-goal",
            serde_json::json!({ "goal": goal }),
        ));
        Self {
            ledger: AttemptLedger::new(),
            transcript,
            selected_destination: None,
            flight_booking: None,
            hotel_booking: None,
            turn_count: 0,
            usage: TokenUsage::default(),
        }
    }

    /// Fix the destination for the remainder of the trial.
    ///
    /// First writer wins: later conflicting destinations are recorded in the
    /// ledger but never overwrite. Returns true when this call fixed it.
    pub fn note_destination(&mut self, code: &str) -> bool {
        if self.selected_destination.is_some() || !is_candidate_city(code) {
            return false;
        }
        self.selected_destination = Some(code.to_string());
        true
    }

    /// Accept a booking result as authoritative for its kind, but only when
    /// its span fields exactly equal one of the fixed candidate spans.
    pub fn promote_booking(&mut self, kind: BookingKind, record: &Value) -> Promotion {
        if record.get("confirmation_id").and_then(Value::as_str).is_none() {
            return Promotion::NotConfirmed;
        }
        match kind.span_of(record) {
            Some(span) if span.is_candidate() => {
                let slot = match kind {
                    BookingKind::Flight => &mut self.flight_booking,
                    BookingKind::Hotel => &mut self.hotel_booking,
                };
                *slot = Some(record.clone());
                Promotion::Promoted
            }
            _ => Promotion::SpanMismatch,
        }
    }

    /// Apply the semantic promotion rules for one action result, in the order
    /// results were received.
    pub fn apply_result(
        &mut self,
        action: &str,
        arguments: &Value,
        payload: &Value,
        summary: &mut UpdateSummary,
    ) {
        match ActionName::parse(action) {
            Some(ActionName::ListFlights) => {
                self.fix_destination_from(arguments, "dest", summary);
            }
            Some(ActionName::ListHotels) => {
                self.fix_destination_from(arguments, "city", summary);
            }
            Some(ActionName::BookFlight) => {
                if self.promote_booking(BookingKind::Flight, payload) == Promotion::Promoted {
                    summary.promoted.push(BookingKind::Flight);
                }
            }
            Some(ActionName::BookHotel) => {
                if self.promote_booking(BookingKind::Hotel, payload) == Promotion::Promoted {
                    summary.promoted.push(BookingKind::Hotel);
                }
            }
            _ => {}
        }
    }

    fn fix_destination_from(&mut self, arguments: &Value, field: &str, summary: &mut UpdateSummary) {
        let Some(code) = arguments.get(field).and_then(Value::as_str) else {
            return;
        };
        if self.note_destination(code) {
            summary.destination_fixed = Some(code.to_string());
        }
    }

    /// Serialized snapshot handed to the agent each turn, so it can see which
    /// destinations, windows, and actions are already exhausted.
    pub fn snapshot(&self) -> Value {
        let attempts: Vec<Value> = self
            .ledger
            .records()
            .iter()
            .map(|r| {
                serde_json::json!({
                    "action": r.action,
                    "key": r.key.to_string(),
                    "status": r.status,
                    "result": r.result,
                })
            })
            .collect();
        serde_json::json!({
            "selected_destination": self.selected_destination,
            "flight_booking": self.flight_booking,
            "hotel_booking": self.hotel_booking,
            "attempts": attempts,
            "turn_count": self.turn_count,
        })
    }
}
