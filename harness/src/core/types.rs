//! Shared deterministic types for the trial core.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::task::Span;

/// Actions the catalog declares. Wire names are `snake_case`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionName {
    GetWeatherSummary,
    ListFlights,
    ListHotels,
    ConvertCurrency,
    BookFlight,
    BookHotel,
}

impl ActionName {
    pub const ALL: [ActionName; 6] = [
        ActionName::GetWeatherSummary,
        ActionName::ListFlights,
        ActionName::ListHotels,
        ActionName::ConvertCurrency,
        ActionName::BookFlight,
        ActionName::BookHotel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionName::GetWeatherSummary => "get_weather_summary",
            ActionName::ListFlights => "list_flights",
            ActionName::ListHotels => "list_hotels",
            ActionName::ConvertCurrency => "convert_currency",
            ActionName::BookFlight => "book_flight",
            ActionName::BookHotel => "book_hotel",
        }
    }

    /// Parse a wire name. Unknown or empty names are agent protocol errors,
    /// handled by the dispatcher, so this returns `None` instead of failing.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }
}

/// The two booking kinds the goal predicate requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    Flight,
    Hotel,
}

impl BookingKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingKind::Flight => "flight",
            BookingKind::Hotel => "hotel",
        }
    }

    /// Names of the span-defining fields on a confirmation record of this kind.
    pub fn span_fields(&self) -> (&'static str, &'static str) {
        match self {
            BookingKind::Flight => ("departure", "return"),
            BookingKind::Hotel => ("check_in", "check_out"),
        }
    }

    /// Extract the span-defining fields from a confirmation record.
    pub fn span_of(&self, record: &Value) -> Option<Span> {
        let (start_field, end_field) = self.span_fields();
        let start = record.get(start_field)?.as_str()?;
        let end = record.get(end_field)?.as_str()?;
        Some(Span::new(start, end))
    }
}

/// A single action the agent asked for. `name` is untrusted wire data; the
/// dispatcher resolves it against the catalog. `request_id` is assigned by the
/// agent layer and is only a correlation key, never a uniqueness guarantee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
    pub request_id: String,
}

/// Token accounting reported by the agent layer, accumulated per trial.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }

    pub fn accumulate(&mut self, other: &TokenUsage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
    }
}

/// One decision from the agent: either a final free-text answer or a batch of
/// action requests for the current turn. An empty batch is treated as final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentReply {
    Final {
        answer: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
    Actions {
        requests: Vec<ActionRequest>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<TokenUsage>,
    },
}

impl AgentReply {
    pub fn usage(&self) -> Option<&TokenUsage> {
        match self {
            AgentReply::Final { usage, .. } | AgentReply::Actions { usage, .. } => usage.as_ref(),
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            AgentReply::Final { .. } => "final",
            AgentReply::Actions { .. } => "actions",
        }
    }

    /// Attach token usage to this reply.
    pub fn with_usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        let new_usage = Some(TokenUsage {
            prompt_tokens,
            completion_tokens,
        });
        match &mut self {
            AgentReply::Final { usage, .. } | AgentReply::Actions { usage, .. } => {
                *usage = new_usage;
            }
        }
        self
    }
}

/// The outcome of executing one dispatched request. Execution failures are
/// `{"error": ...}` payloads, never process-level errors, so the loop always
/// receives exactly one result per dispatched request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    pub name: String,
    pub request_id: String,
    pub payload: Value,
}

impl ActionResult {
    pub fn is_error(&self) -> bool {
        self.payload.get("error").is_some()
    }
}

/// Build a structured error payload in the shape the action tools use.
pub fn error_payload(message: impl Into<String>) -> Value {
    serde_json::json!({ "error": message.into() })
}
