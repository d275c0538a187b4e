//! Goal predicate: pass/fail over persisted confirmations.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::core::task::Span;
use crate::core::types::BookingKind;

/// Result of evaluating persisted confirmations against the target span.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalVerdict {
    pub success: bool,
    /// Confirmation id matched per kind (first match wins).
    pub matched: BTreeMap<BookingKind, String>,
}

/// Scan confirmations of each required kind for one whose span-defining
/// fields exactly equal `target`.
///
/// String equality, no normalization: a one-day offset is a miss. Success
/// requires a match of every required kind; they need not come from the same
/// turn, only exist in persisted state at evaluation time. The predicate does
/// not assume at most one confirmation per span.
pub fn evaluate(flights: &[Value], hotels: &[Value], target: &Span) -> GoalVerdict {
    let mut matched = BTreeMap::new();
    if let Some(id) = first_match(BookingKind::Flight, flights, target) {
        matched.insert(BookingKind::Flight, id);
    }
    if let Some(id) = first_match(BookingKind::Hotel, hotels, target) {
        matched.insert(BookingKind::Hotel, id);
    }
    GoalVerdict {
        success: matched.len() == 2,
        matched,
    }
}

fn first_match(kind: BookingKind, records: &[Value], target: &Span) -> Option<String> {
    records.iter().find_map(|record| {
        if kind.span_of(record)? != *target {
            return None;
        }
        Some(record.get("confirmation_id")?.as_str()?.to_string())
    })
}
