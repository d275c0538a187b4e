//! End-to-end trial scenarios driven by scripted agents.

use serde_json::json;

use harness::core::goal::evaluate;
use harness::core::transcript::Role;
use harness::core::types::{ActionRequest, BookingKind};
use harness::io::config::HarnessConfig;
use harness::io::store::BookingStore;
use harness::looping::{DEFAULT_GOAL, TrialOutcome, TrialStop, run_trial};
use harness::test_support::{ScriptedAgent, actions_reply, final_reply, request};

struct Fixture {
    _temp: tempfile::TempDir,
    trial_dir: std::path::PathBuf,
    store: BookingStore,
    config: HarnessConfig,
}

fn fixture() -> Fixture {
    let temp = tempfile::tempdir().expect("tempdir");
    let trial_dir = temp.path().join("trial");
    let store = BookingStore::new(trial_dir.join("data"));
    store.reset().expect("reset");
    Fixture {
        _temp: temp,
        trial_dir,
        store,
        config: HarnessConfig::default(),
    }
}

fn run(fixture: &Fixture, agent: &ScriptedAgent) -> TrialOutcome {
    run_trial(
        "trial-e2e",
        &fixture.trial_dir,
        agent,
        &fixture.store,
        &fixture.config,
        DEFAULT_GOAL,
    )
    .expect("trial")
}

fn weather(city: &str, id: &str) -> ActionRequest {
    request("get_weather_summary", json!({"city": city}), id)
}

fn search_flights(dep: &str, ret: &str, id: &str) -> ActionRequest {
    request(
        "list_flights",
        json!({"dest": "BKK", "dep": dep, "ret": ret}),
        id,
    )
}

fn search_hotels(checkin: &str, checkout: &str, id: &str) -> ActionRequest {
    request(
        "list_hotels",
        json!({"city": "BKK", "checkin": checkin, "checkout": checkout}),
        id,
    )
}

/// Scenario: the first span comes back empty, the next span matches, and the
/// agent books flight and hotel for it in one mixed batch. The goal predicate
/// accepts the pair and both confirmations carry the matching span.
#[test]
fn booking_after_span_fallback_succeeds() {
    let fixture = fixture();
    let agent = ScriptedAgent::new(vec![
        actions_reply(vec![
            weather("Bangkok", "call_1"),
            weather("Dubai", "call_2"),
            weather("Reykjavik", "call_3"),
        ]),
        actions_reply(vec![search_flights("2025-10-01", "2025-10-08", "call_4")]),
        actions_reply(vec![
            search_flights("2025-10-03", "2025-10-10", "call_5"),
            search_hotels("2025-10-03", "2025-10-10", "call_6"),
        ]),
        actions_reply(vec![
            request(
                "convert_currency",
                json!({"amount": 14800.0, "from_currency": "THB", "to_currency": "USD"}),
                "call_7",
            ),
            request(
                "book_flight",
                json!({
                    "flight_id": "FL-BKK-301",
                    "departure": "2025-10-03",
                    "return_date": "2025-10-10",
                    "dest": "BKK",
                }),
                "call_8",
            ),
            request(
                "book_hotel",
                json!({
                    "hotel_id": "HT-BKK-301",
                    "offer_id": "OF-301",
                    "check_in": "2025-10-03",
                    "check_out": "2025-10-10",
                    "city": "BKK",
                }),
                "call_9",
            ),
        ]),
        final_reply("Booked Bangkok, 2025-10-03 to 2025-10-10."),
    ]);

    let outcome = run(&fixture, &agent);
    assert_eq!(outcome.turns_executed, 5);
    assert!(matches!(outcome.stop, TrialStop::Done { .. }));

    // The empty first-span search is in the ledger, resolved with no offers.
    let empty_search = outcome
        .state
        .ledger
        .records()
        .iter()
        .find(|r| r.key.to_string() == "BKK 2025-10-01..2025-10-08")
        .expect("first span attempt");
    assert_eq!(empty_search.result, Some(json!([])));

    // Both bookings were promoted into trial state.
    assert_eq!(outcome.state.selected_destination.as_deref(), Some("BKK"));
    assert!(outcome.state.flight_booking.is_some());
    assert!(outcome.state.hotel_booking.is_some());

    let flights = fixture.store.read_all(BookingKind::Flight).expect("flights");
    let hotels = fixture.store.read_all(BookingKind::Hotel).expect("hotels");
    let verdict = evaluate(&flights, &hotels, &fixture.config.target_span());
    assert!(verdict.success);

    let flight_id = verdict.matched[&BookingKind::Flight].as_str();
    let matched_flight = flights
        .iter()
        .find(|r| r["confirmation_id"] == flight_id)
        .expect("matched flight");
    assert_eq!(matched_flight["departure"], "2025-10-03");
    assert_eq!(matched_flight["return"], "2025-10-10");

    let hotel_id = verdict.matched[&BookingKind::Hotel].as_str();
    let matched_hotel = hotels
        .iter()
        .find(|r| r["confirmation_id"] == hotel_id)
        .expect("matched hotel");
    assert_eq!(matched_hotel["check_in"], "2025-10-03");
    assert_eq!(matched_hotel["check_out"], "2025-10-10");
}

/// Scenario: a flight on one span and a hotel on another both persist, but
/// the predicate refuses the cross-span pairing.
#[test]
fn cross_span_bookings_do_not_pass_evaluation() {
    let fixture = fixture();
    let agent = ScriptedAgent::new(vec![
        actions_reply(vec![
            // Offer FL-BKK-201 is for 2025-10-02..09.
            request(
                "book_flight",
                json!({
                    "flight_id": "FL-BKK-201",
                    "departure": "2025-10-02",
                    "return_date": "2025-10-09",
                    "dest": "BKK",
                }),
                "call_1",
            ),
            request(
                "book_hotel",
                json!({
                    "hotel_id": "HT-BKK-301",
                    "offer_id": "OF-301",
                    "check_in": "2025-10-03",
                    "check_out": "2025-10-10",
                    "city": "BKK",
                }),
                "call_2",
            ),
        ]),
        final_reply("Booked."),
    ]);

    let outcome = run(&fixture, &agent);
    assert!(matches!(outcome.stop, TrialStop::Done { .. }));

    let flights = fixture.store.read_all(BookingKind::Flight).expect("flights");
    let hotels = fixture.store.read_all(BookingKind::Hotel).expect("hotels");
    assert_eq!(flights.len(), 1);
    assert_eq!(hotels.len(), 1);

    let verdict = evaluate(&flights, &hotels, &fixture.config.target_span());
    assert!(!verdict.success, "cross-span pair must not pass");
    // Only the hotel matches the target span.
    assert!(!verdict.matched.contains_key(&BookingKind::Flight));
    assert!(verdict.matched.contains_key(&BookingKind::Hotel));
}

/// Scenario: the same weather check issued twice leaves exactly one resolved
/// ledger record, two agent-visible request entries, and one result entry.
#[test]
fn duplicate_weather_check_is_deduplicated() {
    let fixture = fixture();
    let agent = ScriptedAgent::new(vec![
        actions_reply(vec![weather("Bangkok", "call_1")]),
        actions_reply(vec![weather("Bangkok", "call_2")]),
        final_reply("done"),
    ]);

    let outcome = run(&fixture, &agent);

    let weather_records: Vec<_> = outcome
        .state
        .ledger
        .records()
        .iter()
        .filter(|r| r.action == "get_weather_summary")
        .collect();
    assert_eq!(weather_records.len(), 1);
    assert!(weather_records[0].result.is_some());

    let request_entries = outcome
        .state
        .transcript
        .entries()
        .iter()
        .filter(|e| e.role == Role::Agent && e.payload.get("name").is_some())
        .count();
    let result_entries = outcome
        .state
        .transcript
        .entries()
        .iter()
        .filter(|e| e.role == Role::ActionResult)
        .count();
    assert_eq!(request_entries, 2);
    assert_eq!(result_entries, 1);
}

/// Scenario: the agent answers immediately without calling any action.
#[test]
fn immediate_final_answer_fails_the_goal() {
    let fixture = fixture();
    let agent = ScriptedAgent::new(vec![final_reply("no booking needed")]);

    let outcome = run(&fixture, &agent);
    assert_eq!(outcome.turns_executed, 1);
    assert!(matches!(outcome.stop, TrialStop::Done { .. }));

    let verdict = evaluate(
        &fixture.store.read_all(BookingKind::Flight).expect("flights"),
        &fixture.store.read_all(BookingKind::Hotel).expect("hotels"),
        &fixture.config.target_span(),
    );
    assert!(!verdict.success);
    assert!(verdict.matched.is_empty());
}

/// A booking whose inventory span is not the one the agent claimed is still
/// persisted with the true span, so the predicate judges the real window.
#[test]
fn hallucinated_span_cannot_forge_success() {
    let fixture = fixture();
    let agent = ScriptedAgent::new(vec![
        actions_reply(vec![request(
            "book_flight",
            // Agent claims the target window; the offer is for 2025-10-02..09.
            json!({
                "flight_id": "FL-BKK-201",
                "departure": "2025-10-03",
                "return_date": "2025-10-10",
                "dest": "BKK",
            }),
            "call_1",
        )]),
        final_reply("booked"),
    ]);

    let outcome = run(&fixture, &agent);
    assert!(matches!(outcome.stop, TrialStop::Done { .. }));

    let flights = fixture.store.read_all(BookingKind::Flight).expect("flights");
    assert_eq!(flights.len(), 1);
    assert_eq!(flights[0]["departure"], "2025-10-02");

    let verdict = evaluate(&flights, &[], &fixture.config.target_span());
    assert!(!verdict.success);
}
