//! Fixed parameters of the trip-booking task.
//!
//! The candidate spans and cities are the task's solution space: every attempt
//! and confirmation is partitioned by span, and success evaluation never pairs
//! records across spans.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered candidate date windows the agent is expected to try.
pub const CANDIDATE_SPANS: [(&str, &str); 3] = [
    ("2025-10-01", "2025-10-08"),
    ("2025-10-02", "2025-10-09"),
    ("2025-10-03", "2025-10-10"),
];

/// Candidate destinations as `(city name, city code)`.
pub const CANDIDATE_CITIES: [(&str, &str); 3] = [
    ("Bangkok", "BKK"),
    ("Dubai", "DXB"),
    ("Reykjavik", "REK"),
];

/// The span the goal predicate checks confirmations against by default.
pub const DEFAULT_TARGET_SPAN: (&str, &str) = ("2025-10-03", "2025-10-10");

/// An immutable candidate solution window: a `(start, end)` ISO date pair.
///
/// Spans compare by exact string equality. A one-day offset is a different
/// span, and there is deliberately no closest-span matching anywhere.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: String,
    pub end: String,
}

impl Span {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Whether this span is one of the fixed candidates.
    pub fn is_candidate(&self) -> bool {
        CANDIDATE_SPANS
            .iter()
            .any(|(start, end)| self.start == *start && self.end == *end)
    }

    pub fn candidates() -> impl Iterator<Item = Span> {
        CANDIDATE_SPANS
            .into_iter()
            .map(|(start, end)| Span::new(start, end))
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Whether `code` is one of the candidate destination codes.
pub fn is_candidate_city(code: &str) -> bool {
    CANDIDATE_CITIES.iter().any(|(_, c)| *c == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_spans_are_recognized() {
        for span in Span::candidates() {
            assert!(span.is_candidate(), "{span} should be a candidate");
        }
        assert!(!Span::new("2025-10-01", "2025-10-09").is_candidate());
        assert!(!Span::new("2025-10-04", "2025-10-11").is_candidate());
    }

    #[test]
    fn candidate_cities_match_codes_not_names() {
        assert!(is_candidate_city("BKK"));
        assert!(is_candidate_city("REK"));
        assert!(!is_candidate_city("Bangkok"));
        assert!(!is_candidate_city(""));
    }

    #[test]
    fn span_display_is_stable() {
        assert_eq!(
            Span::new("2025-10-03", "2025-10-10").to_string(),
            "2025-10-03..2025-10-10"
        );
    }
}
