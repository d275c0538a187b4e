//! Action catalog: the fixed set of invocable actions and their dispatcher.
//!
//! Each action declares a name, a description, and a JSON Schema for its
//! arguments. The dispatcher resolves untrusted wire names against the
//! catalog, validates arguments, and executes the action. Every failure mode
//! (unknown name, invalid arguments, execution failure) comes back as a
//! structured error payload so the loop always receives one result per
//! dispatched request.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use jsonschema::{Draft, Validator};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::core::types::{ActionName, ActionRequest, ActionResult, error_payload};
use crate::io::booking::{book_flight, book_hotel};
use crate::io::inventory::{convert_currency, list_flights, list_hotels, weather_summary};
use crate::io::store::BookingStore;

const DEFAULT_FLIGHT_LIMIT: usize = 8;
const DEFAULT_HOTEL_LIMIT: usize = 10;

/// One declared action.
#[derive(Debug, Clone, Copy)]
pub struct ActionSpec {
    pub name: ActionName,
    pub description: &'static str,
    pub arguments_schema: &'static str,
}

pub const CATALOG: [ActionSpec; 6] = [
    ActionSpec {
        name: ActionName::GetWeatherSummary,
        description: "Fixed weather summary for a candidate city (by name, e.g. 'Bangkok').",
        arguments_schema: include_str!("../../schemas/actions/get_weather_summary.json"),
    },
    ActionSpec {
        name: ActionName::ListFlights,
        description: "List round-trip flight offers for a destination code and date window.",
        arguments_schema: include_str!("../../schemas/actions/list_flights.json"),
    },
    ActionSpec {
        name: ActionName::ListHotels,
        description: "List hotel options for a city code and date window.",
        arguments_schema: include_str!("../../schemas/actions/list_hotels.json"),
    },
    ActionSpec {
        name: ActionName::ConvertCurrency,
        description: "Convert an amount between currencies at the current mock rate.",
        arguments_schema: include_str!("../../schemas/actions/convert_currency.json"),
    },
    ActionSpec {
        name: ActionName::BookFlight,
        description: "Confirm a flight offer by id; returns a confirmation record.",
        arguments_schema: include_str!("../../schemas/actions/book_flight.json"),
    },
    ActionSpec {
        name: ActionName::BookHotel,
        description: "Confirm a hotel offer by hotel and offer id; returns a confirmation record.",
        arguments_schema: include_str!("../../schemas/actions/book_hotel.json"),
    },
];

static VALIDATORS: LazyLock<BTreeMap<&'static str, Validator>> = LazyLock::new(|| {
    CATALOG
        .iter()
        .map(|spec| {
            let schema: Value = serde_json::from_str(spec.arguments_schema)
                .expect("embedded argument schema should parse");
            let validator = jsonschema::options()
                .with_draft(Draft::Draft202012)
                .build(&schema)
                .expect("embedded argument schema should compile");
            (spec.name.as_str(), validator)
        })
        .collect()
});

/// Look up a declared action by wire name.
pub fn spec_for(name: &str) -> Option<&'static ActionSpec> {
    CATALOG.iter().find(|spec| spec.name.as_str() == name)
}

/// The declared catalog as JSON, for the Deciding prompt and the CLI.
pub fn catalog_json() -> Value {
    let actions: Vec<Value> = CATALOG
        .iter()
        .map(|spec| {
            let schema: Value = serde_json::from_str(spec.arguments_schema)
                .expect("embedded argument schema should parse");
            json!({
                "name": spec.name.as_str(),
                "description": spec.description,
                "arguments": schema,
            })
        })
        .collect();
    Value::Array(actions)
}

/// Validate arguments against the action's declared schema.
pub fn validate_arguments(name: ActionName, arguments: &Value) -> Result<(), String> {
    let validator = VALIDATORS
        .get(name.as_str())
        .expect("every declared action has a compiled validator");
    let messages: Vec<String> = validator
        .iter_errors(arguments)
        .map(|err| err.to_string())
        .collect();
    if messages.is_empty() {
        return Ok(());
    }
    Err(format!("Invalid arguments: {}", messages.join("; ")))
}

/// Execute one request. Infallible by design: protocol errors, argument
/// validation failures, and execution failures are all `{"error": ...}`
/// payloads attached to the result.
pub fn execute(request: &ActionRequest, store: &BookingStore) -> ActionResult {
    let payload = execute_payload(request, store);
    if payload.get("error").is_some() {
        warn!(
            action = %request.name,
            request_id = %request.request_id,
            error = %payload["error"],
            "action returned error payload"
        );
    } else {
        debug!(action = %request.name, request_id = %request.request_id, "action executed");
    }
    ActionResult {
        name: request.name.clone(),
        request_id: request.request_id.clone(),
        payload,
    }
}

fn execute_payload(request: &ActionRequest, store: &BookingStore) -> Value {
    if request.name.trim().is_empty() {
        return error_payload("Empty action name.");
    }
    let Some(name) = ActionName::parse(&request.name) else {
        return error_payload(format!("Unknown action '{}'.", request.name));
    };
    if let Err(message) = validate_arguments(name, &request.arguments) {
        return error_payload(message);
    }

    let args = &request.arguments;
    match name {
        ActionName::GetWeatherSummary => weather_summary(str_arg(args, "city")),
        ActionName::ListFlights => list_flights(
            str_arg(args, "dest"),
            str_arg(args, "dep"),
            str_arg(args, "ret"),
            limit_arg(args, DEFAULT_FLIGHT_LIMIT),
        ),
        ActionName::ListHotels => list_hotels(
            str_arg(args, "city"),
            str_arg(args, "checkin"),
            str_arg(args, "checkout"),
            limit_arg(args, DEFAULT_HOTEL_LIMIT),
        ),
        ActionName::ConvertCurrency => convert_currency(
            args.get("amount").and_then(Value::as_f64).unwrap_or(0.0),
            str_arg(args, "from_currency"),
            str_arg(args, "to_currency"),
        ),
        ActionName::BookFlight => book_flight(
            store,
            str_arg(args, "flight_id"),
            str_arg(args, "departure"),
            str_arg(args, "return_date"),
            str_arg(args, "dest"),
        ),
        ActionName::BookHotel => book_hotel(
            store,
            str_arg(args, "hotel_id"),
            str_arg(args, "offer_id"),
            str_arg(args, "check_in"),
            str_arg(args, "check_out"),
            str_arg(args, "city"),
        ),
    }
}

// Arguments are schema-validated before these run; defaults only cover the
// optional fields.
fn str_arg<'a>(arguments: &'a Value, field: &str) -> &'a str {
    arguments.get(field).and_then(Value::as_str).unwrap_or("")
}

fn limit_arg(arguments: &Value, default: usize) -> usize {
    arguments
        .get("limit")
        .and_then(Value::as_u64)
        .map(|v| v as usize)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> (tempfile::TempDir, BookingStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = BookingStore::new(temp.path());
        store.reset().expect("reset");
        (temp, store)
    }

    fn request(name: &str, arguments: Value) -> ActionRequest {
        ActionRequest {
            name: name.to_string(),
            arguments,
            request_id: "call_1".to_string(),
        }
    }

    #[test]
    fn catalog_declares_all_actions() {
        let declared = catalog_json();
        let names: Vec<&str> = declared
            .as_array()
            .expect("array")
            .iter()
            .map(|a| a["name"].as_str().expect("name"))
            .collect();
        assert_eq!(names.len(), ActionName::ALL.len());
        assert!(names.contains(&"book_hotel"));
        assert!(spec_for("list_flights").is_some());
        assert!(spec_for("teleport").is_none());
    }

    #[test]
    fn unknown_and_empty_names_become_error_results() {
        let (_temp, store) = store();
        let result = execute(&request("teleport", json!({})), &store);
        assert_eq!(result.payload["error"], "Unknown action 'teleport'.");

        let result = execute(&request("", json!({})), &store);
        assert_eq!(result.payload["error"], "Empty action name.");
    }

    #[test]
    fn invalid_arguments_become_error_results() {
        let (_temp, store) = store();
        let result = execute(
            &request("list_flights", json!({"dest": "BKK", "dep": "October 3"})),
            &store,
        );
        let message = result.payload["error"].as_str().expect("message");
        assert!(message.starts_with("Invalid arguments:"), "{message}");
    }

    #[test]
    fn valid_request_executes_the_action() {
        let (_temp, store) = store();
        let result = execute(
            &request(
                "list_flights",
                json!({"dest": "BKK", "dep": "2025-10-03", "ret": "2025-10-10"}),
            ),
            &store,
        );
        assert!(!result.is_error());
        assert_eq!(result.payload.as_array().expect("offers").len(), 2);
        assert_eq!(result.request_id, "call_1");
    }

    #[test]
    fn booking_flows_through_to_the_store() {
        let (_temp, store) = store();
        let result = execute(
            &request(
                "book_hotel",
                json!({
                    "hotel_id": "HT-BKK-301",
                    "offer_id": "OF-301",
                    "check_in": "2025-10-03",
                    "check_out": "2025-10-10",
                    "city": "BKK",
                }),
            ),
            &store,
        );
        assert!(!result.is_error());
        assert_eq!(
            store
                .read_all(crate::core::types::BookingKind::Hotel)
                .expect("read")
                .len(),
            1
        );
    }
}
