//! Static mock inventory backing the search, weather, and currency actions.
//!
//! Offers exist only for specific `(place, window)` pairs, and two windows are
//! deliberately blocked to simulate temporary unavailability: flights for
//! `2025-10-01..08` and hotels for `2025-10-02..09`. Only `2025-10-03..10`
//! has both a flight and a hotel within budget.

use rand::Rng;
use serde_json::{Value, json};

use crate::core::task::{CANDIDATE_CITIES, Span};
use crate::core::types::error_payload;

/// Date windows for which flight search returns no offers.
pub const BLOCKED_FLIGHT_WINDOWS: [(&str, &str); 1] = [("2025-10-01", "2025-10-08")];
/// Date windows for which hotel search returns no offers.
pub const BLOCKED_HOTEL_WINDOWS: [(&str, &str); 1] = [("2025-10-02", "2025-10-09")];

struct FlightSeed {
    id: &'static str,
    dest: &'static str,
    dep: &'static str,
    ret: &'static str,
    price_total: &'static str,
    currency: &'static str,
    dep_time: &'static str,
    arr_time: &'static str,
    stops: u32,
}

struct HotelSeed {
    hotel_id: &'static str,
    name: &'static str,
    offer_id: &'static str,
    city: &'static str,
    checkin: &'static str,
    checkout: &'static str,
    price_total: &'static str,
    currency: &'static str,
    cancellable: bool,
}

const FLIGHTS: [FlightSeed; 6] = [
    FlightSeed {
        id: "FL-BKK-201",
        dest: "BKK",
        dep: "2025-10-02",
        ret: "2025-10-09",
        price_total: "869.40",
        currency: "USD",
        dep_time: "2025-10-02T08:15",
        arr_time: "2025-10-09T21:40",
        stops: 1,
    },
    FlightSeed {
        id: "FL-BKK-202",
        dest: "BKK",
        dep: "2025-10-02",
        ret: "2025-10-09",
        price_total: "912.00",
        currency: "USD",
        dep_time: "2025-10-02T13:05",
        arr_time: "2025-10-09T18:25",
        stops: 0,
    },
    FlightSeed {
        id: "FL-BKK-301",
        dest: "BKK",
        dep: "2025-10-03",
        ret: "2025-10-10",
        price_total: "845.60",
        currency: "USD",
        dep_time: "2025-10-03T09:30",
        arr_time: "2025-10-10T20:10",
        stops: 1,
    },
    FlightSeed {
        id: "FL-BKK-302",
        dest: "BKK",
        dep: "2025-10-03",
        ret: "2025-10-10",
        price_total: "1180.00",
        currency: "USD",
        dep_time: "2025-10-03T11:00",
        arr_time: "2025-10-10T16:45",
        stops: 0,
    },
    FlightSeed {
        id: "FL-DXB-301",
        dest: "DXB",
        dep: "2025-10-03",
        ret: "2025-10-10",
        price_total: "1320.00",
        currency: "USD",
        dep_time: "2025-10-03T07:20",
        arr_time: "2025-10-10T23:55",
        stops: 0,
    },
    FlightSeed {
        id: "FL-REK-301",
        dest: "REK",
        dep: "2025-10-03",
        ret: "2025-10-10",
        price_total: "980.00",
        currency: "USD",
        dep_time: "2025-10-03T10:40",
        arr_time: "2025-10-10T17:30",
        stops: 1,
    },
];

const HOTELS: [HotelSeed; 6] = [
    HotelSeed {
        hotel_id: "HT-BKK-101",
        name: "Riverside Grand",
        offer_id: "OF-101",
        city: "BKK",
        checkin: "2025-10-01",
        checkout: "2025-10-08",
        price_total: "15800.00",
        currency: "THB",
        cancellable: true,
    },
    HotelSeed {
        hotel_id: "HT-BKK-102",
        name: "Sathorn Suites",
        offer_id: "OF-102",
        city: "BKK",
        checkin: "2025-10-01",
        checkout: "2025-10-08",
        price_total: "430.00",
        currency: "USD",
        cancellable: false,
    },
    HotelSeed {
        hotel_id: "HT-BKK-301",
        name: "Siam Garden Resort",
        offer_id: "OF-301",
        city: "BKK",
        checkin: "2025-10-03",
        checkout: "2025-10-10",
        price_total: "14800.00",
        currency: "THB",
        cancellable: true,
    },
    HotelSeed {
        hotel_id: "HT-BKK-302",
        name: "Old Town Boutique",
        offer_id: "OF-302",
        city: "BKK",
        checkin: "2025-10-03",
        checkout: "2025-10-10",
        price_total: "455.00",
        currency: "USD",
        cancellable: false,
    },
    HotelSeed {
        hotel_id: "HT-DXB-301",
        name: "Marina Sky Tower",
        offer_id: "OF-311",
        city: "DXB",
        checkin: "2025-10-03",
        checkout: "2025-10-10",
        price_total: "780.00",
        currency: "USD",
        cancellable: true,
    },
    HotelSeed {
        hotel_id: "HT-REK-301",
        name: "Harbour Lights Hotel",
        offer_id: "OF-321",
        city: "REK",
        checkin: "2025-10-03",
        checkout: "2025-10-10",
        price_total: "520.00",
        currency: "USD",
        cancellable: true,
    },
];

const WEATHER_SUMMARIES: [(&str, &str); 3] = [
    ("Bangkok", "Hot, humid, lots of rain"),
    ("Dubai", "Very hot, dry, no rain"),
    ("Reykjavik", "Very cold with snow, little rain"),
];

/// Base exchange rates; the live rate fluctuates around these.
const RATES: [(&str, f64); 11] = [
    ("THB_USD", 0.028),
    ("USD_THB", 35.71),
    ("USD_USD", 1.0),
    ("THB_THB", 1.0),
    ("AED_USD", 0.272),
    ("USD_AED", 3.67),
    ("EUR_USD", 1.09),
    ("USD_EUR", 0.918),
    ("EUR_THB", 38.92),
    ("THB_EUR", 0.026),
    ("EUR_EUR", 1.0),
];

/// Fixed weather summary per candidate city, case-insensitive on the name.
pub fn weather_summary(city: &str) -> Value {
    let wanted = city.trim();
    let found = WEATHER_SUMMARIES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(wanted));
    match found {
        Some((name, summary)) => json!({ "city": name, "summary": summary }),
        None => error_payload(format!("Unknown city: {city}")),
    }
}

/// Flight offers for `(dest, dep..ret)`, cheapest-first as seeded.
/// Blocked windows return an empty list, exactly like an exhausted search.
pub fn list_flights(dest: &str, dep: &str, ret: &str, limit: usize) -> Value {
    if BLOCKED_FLIGHT_WINDOWS.contains(&(dep, ret)) {
        return json!([]);
    }
    let offers: Vec<Value> = FLIGHTS
        .iter()
        .filter(|f| f.dest == dest && f.dep == dep && f.ret == ret)
        .take(limit)
        .map(|f| {
            json!({
                "id": f.id,
                "price": { "total": f.price_total, "currency": f.currency },
                "dep_time": f.dep_time,
                "arr_time": f.arr_time,
                "stops": f.stops,
            })
        })
        .collect();
    Value::Array(offers)
}

/// Hotel options for `(city, checkin..checkout)` with cheapest offer details.
pub fn list_hotels(city: &str, checkin: &str, checkout: &str, limit: usize) -> Value {
    if BLOCKED_HOTEL_WINDOWS.contains(&(checkin, checkout)) {
        return json!([]);
    }
    let options: Vec<Value> = HOTELS
        .iter()
        .filter(|h| h.city == city && h.checkin == checkin && h.checkout == checkout)
        .take(limit)
        .map(|h| {
            json!({
                "hotelId": h.hotel_id,
                "name": h.name,
                "offerId": h.offer_id,
                "priceTotal": h.price_total,
                "currency": h.currency,
                "cancellable": h.cancellable,
            })
        })
        .collect();
    Value::Array(options)
}

/// Convert an amount between currencies at the fluctuating mock rate.
pub fn convert_currency(amount: f64, from: &str, to: &str) -> Value {
    let rate_key = format!("{from}_{to}");
    let Some((_, base_rate)) = RATES.iter().find(|(key, _)| *key == rate_key) else {
        return error_payload(format!(
            "Conversion rate not available for {from} to {to}"
        ));
    };
    // Simulate dynamic pricing: fluctuate the rate by +/- 5%.
    let fluctuation: f64 = rand::thread_rng().gen_range(-0.05..=0.05);
    let dynamic_rate = round4(base_rate * (1.0 + fluctuation));
    json!({
        "original_amount": amount,
        "original_currency": from,
        "converted_amount": round2(amount * dynamic_rate),
        "target_currency": to,
        "exchange_rate": dynamic_rate,
    })
}

/// Resolved flight offer metadata: the destination and window come from the
/// inventory, never from booking arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct FlightLookup {
    pub destination: String,
    pub span: Span,
}

/// Locate a flight offer by its globally unique id.
pub fn find_flight_offer(flight_id: &str) -> Option<FlightLookup> {
    FLIGHTS.iter().find(|f| f.id == flight_id).map(|f| FlightLookup {
        destination: f.dest.to_string(),
        span: Span::new(f.dep, f.ret),
    })
}

/// Locate a hotel and a specific room offer within `(city, window)`.
pub fn find_hotel_offer(
    city: &str,
    checkin: &str,
    checkout: &str,
    hotel_id: &str,
    offer_id: &str,
) -> Result<(), String> {
    if !CANDIDATE_CITIES.iter().any(|(_, code)| *code == city) {
        return Err(format!("Unknown city '{city}'."));
    }
    let hotel = HOTELS
        .iter()
        .find(|h| h.city == city && h.checkin == checkin && h.checkout == checkout && h.hotel_id == hotel_id);
    let Some(hotel) = hotel else {
        return Err(format!(
            "No hotel with id '{hotel_id}' for {city} on {checkin} to {checkout}."
        ));
    };
    if hotel.offer_id != offer_id {
        return Err(format!(
            "No offer with id '{offer_id}' for hotel '{hotel_id}' on {city} {checkin} to {checkout}."
        ));
    }
    Ok(())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}
