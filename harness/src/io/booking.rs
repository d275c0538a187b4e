//! Booking actions: confirm a flight or hotel and persist the confirmation.
//!
//! Validation failures and unavailable windows come back as `{"error": ...}`
//! payloads. A store that cannot be written is an execution error, also
//! surfaced as a payload so the loop always receives a result.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Value, json};
use tracing::warn;

use crate::core::types::{BookingKind, error_payload};
use crate::io::inventory::{
    BLOCKED_FLIGHT_WINDOWS, BLOCKED_HOTEL_WINDOWS, find_flight_offer, find_hotel_offer,
};
use crate::io::store::BookingStore;

static ISO_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date regex should compile"));

fn is_iso_date(value: &str) -> bool {
    ISO_DATE.is_match(value)
}

// ISO dates compare correctly as strings once the shape is validated.
fn is_date_order_valid(start: &str, end: &str) -> bool {
    start < end
}

fn is_valid_id(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Confirm a round-trip flight.
///
/// The offer is resolved by id alone; the confirmation is stamped with the
/// window and destination recorded in the inventory, so a hallucinated span
/// in the arguments cannot forge a matching confirmation.
pub fn book_flight(
    store: &BookingStore,
    flight_id: &str,
    _departure: &str,
    _return_date: &str,
    _dest: &str,
) -> Value {
    if !is_valid_id(flight_id) {
        return error_payload("Flight id is required.");
    }
    let Some(offer) = find_flight_offer(flight_id) else {
        return error_payload("Flight not found.");
    };
    if BLOCKED_FLIGHT_WINDOWS.contains(&(offer.span.start.as_str(), offer.span.end.as_str())) {
        return error_payload(
            "Flights are unavailable for these dates. Please choose a different date window.",
        );
    }
    let record = json!({
        "flight_id": flight_id,
        "departure": offer.span.start,
        "return": offer.span.end,
        "destination": offer.destination,
    });
    persist(store, BookingKind::Flight, record)
}

/// Confirm a hotel stay for a date range in a specific city.
pub fn book_hotel(
    store: &BookingStore,
    hotel_id: &str,
    offer_id: &str,
    check_in: &str,
    check_out: &str,
    city: &str,
) -> Value {
    if !is_valid_id(hotel_id) {
        return error_payload("Hotel id is required.");
    }
    if !is_valid_id(offer_id) {
        return error_payload("Offer id is required.");
    }
    if !is_iso_date(check_in) || !is_iso_date(check_out) {
        return error_payload("Dates must be in ISO format YYYY-MM-DD.");
    }
    if !is_date_order_valid(check_in, check_out) {
        return error_payload("Check-in must be earlier than check-out.");
    }
    if !is_valid_id(city) {
        return error_payload("City (IATA/city code) is required.");
    }
    if let Err(message) = find_hotel_offer(city, check_in, check_out, hotel_id, offer_id) {
        return error_payload(message);
    }
    if BLOCKED_HOTEL_WINDOWS.contains(&(check_in, check_out)) {
        return error_payload(
            "Hotels are unavailable for these dates. Please choose a different date window.",
        );
    }
    let record = json!({
        "hotel_id": hotel_id,
        "offer_id": offer_id,
        "check_in": check_in,
        "check_out": check_out,
        "city": city,
    });
    persist(store, BookingKind::Hotel, record)
}

fn persist(store: &BookingStore, kind: BookingKind, record: Value) -> Value {
    match store.insert(kind, record) {
        Ok(stored) => stored,
        Err(err) => {
            warn!(kind = kind.as_str(), err = %format!("{err:#}"), "booking store write failed");
            error_payload(format!("Booking store unavailable: {err:#}"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, BookingStore) {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = BookingStore::new(temp.path());
        store.reset().expect("reset");
        (temp, store)
    }

    #[test]
    fn flight_confirmation_uses_inventory_dates_not_arguments() {
        let (_temp, store) = store();
        // Agent claims the target window but the offer is for 2025-10-02..09.
        let result = book_flight(&store, "FL-BKK-201", "2025-10-03", "2025-10-10", "BKK");
        assert!(result["confirmation_id"].is_string());
        assert_eq!(result["departure"], "2025-10-02");
        assert_eq!(result["return"], "2025-10-09");

        let persisted = store.read_all(BookingKind::Flight).expect("read");
        assert_eq!(persisted.len(), 1);
    }

    #[test]
    fn unknown_flight_id_is_an_error_payload() {
        let (_temp, store) = store();
        let result = book_flight(&store, "FL-XXX-999", "2025-10-03", "2025-10-10", "BKK");
        assert_eq!(result["error"], "Flight not found.");
        assert!(store.read_all(BookingKind::Flight).expect("read").is_empty());
    }

    #[test]
    fn empty_flight_id_is_rejected() {
        let (_temp, store) = store();
        let result = book_flight(&store, "  ", "2025-10-03", "2025-10-10", "BKK");
        assert_eq!(result["error"], "Flight id is required.");
    }

    #[test]
    fn hotel_booking_validates_dates_and_offer() {
        let (_temp, store) = store();

        let bad_date = book_hotel(&store, "HT-BKK-301", "OF-301", "Oct 3", "2025-10-10", "BKK");
        assert_eq!(bad_date["error"], "Dates must be in ISO format YYYY-MM-DD.");

        let bad_order = book_hotel(&store, "HT-BKK-301", "OF-301", "2025-10-10", "2025-10-03", "BKK");
        assert_eq!(bad_order["error"], "Check-in must be earlier than check-out.");

        let wrong_offer =
            book_hotel(&store, "HT-BKK-301", "OF-999", "2025-10-03", "2025-10-10", "BKK");
        assert!(wrong_offer["error"].as_str().expect("msg").contains("OF-999"));

        let ok = book_hotel(&store, "HT-BKK-301", "OF-301", "2025-10-03", "2025-10-10", "BKK");
        assert!(ok["confirmation_id"].as_str().expect("id").starts_with("HT-"));
        assert_eq!(ok["check_in"], "2025-10-03");
        assert_eq!(ok["check_out"], "2025-10-10");
    }

    #[test]
    fn blocked_hotel_window_refuses_booking() {
        let (_temp, store) = store();
        // No inventory exists for the blocked window, so the lookup fails first;
        // either way the booking must not persist.
        let result = book_hotel(&store, "HT-BKK-301", "OF-301", "2025-10-02", "2025-10-09", "BKK");
        assert!(result["error"].is_string());
        assert!(store.read_all(BookingKind::Hotel).expect("read").is_empty());
    }
}
