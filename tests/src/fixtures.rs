//! Test fixtures and request bodies.

use chrono::{DateTime, Duration, TimeZone, Utc};
use habit_core::{DateKey, DateRange};

/// 23:00 on 2024-03-08 to 07:00 on 2024-03-09, UTC. Filed under 2024-03-09.
pub fn night() -> DateRange {
    night_shifted(0)
}

/// The night `days` after [`night`].
pub fn night_shifted(days: i64) -> DateRange {
    let start: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 3, 8, 23, 0, 0).unwrap() + Duration::days(days);
    DateRange::new(start, start + Duration::hours(8)).unwrap()
}

pub fn night_key() -> DateKey {
    night().date_key()
}

/// Sleep-period payload as a wearable would report it.
pub fn sleep_payload() -> serde_json::Value {
    serde_json::json!({
        "stages": [
            { "stage": "core", "minutes": 210 },
            { "stage": "deep", "minutes": 95 },
            { "stage": "rem", "minutes": 120 }
        ],
        "source": "watch"
    })
}

/// `POST /sessions` body for `range`.
pub fn session_body(range: DateRange) -> serde_json::Value {
    serde_json::json!({
        "start": range.start(),
        "end": range.end(),
        "sleep": sleep_payload(),
    })
}

/// `POST /sessions` body whose end precedes its start.
pub fn inverted_session_body() -> serde_json::Value {
    let range = night();
    serde_json::json!({
        "start": range.end(),
        "end": range.start(),
    })
}
