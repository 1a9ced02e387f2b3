//! India Standard Time formatting for timestamps coming back from the service.
//!
//! The service stores UTC; operators read IST (UTC+05:30, no DST).

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};

use crate::error::ConsoleError;

const IST_OFFSET_SECS: i32 = 5 * 3600 + 30 * 60;

/// Display format for full timestamps, e.g. `16/10/2026 14:03:05`.
const IST_DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M:%S";
const IST_DATE_FORMAT: &str = "%d/%m/%Y";

pub fn ist_offset() -> FixedOffset {
    FixedOffset::east_opt(IST_OFFSET_SECS).expect("IST offset is within +/-24h")
}

/// Parse a timestamp as returned by PostgREST.
///
/// Accepts RFC 3339 (`2026-10-16T08:33:05.123+00:00`), Postgres text output
/// (`2026-10-16 08:33:05+00`) and offset-less values, which are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    None
}

pub fn format_ist(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&ist_offset())
        .format(IST_DATETIME_FORMAT)
        .to_string()
}

/// Convert a UTC timestamp string to IST for display.
/// Empty input gives an empty string; unparseable input is passed through.
pub fn to_ist(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    match parse_timestamp(raw) {
        Some(dt) => format_ist(dt),
        None => raw.to_string(),
    }
}

/// Calendar date of a UTC timestamp in IST, e.g. `16/10/2026`.
pub fn to_ist_date(raw: &str) -> String {
    match parse_timestamp(raw) {
        Some(dt) => dt
            .with_timezone(&ist_offset())
            .format(IST_DATE_FORMAT)
            .to_string(),
        None => raw.to_string(),
    }
}

/// The current calendar date in IST.
pub fn today_ist(now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&ist_offset()).date_naive()
}

/// First and last second of `date` as UTC ISO strings, the bounds used for
/// single-day history filters.
pub fn utc_day_bounds(date: NaiveDate) -> (String, String) {
    let day = date.format("%Y-%m-%d");
    (
        format!("{}T00:00:00.000Z", day),
        format!("{}T23:59:59.000Z", day),
    )
}

/// Parse an operator-entered `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate, ConsoleError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
        ConsoleError::Validation(format!("Invalid date '{}' (expected YYYY-MM-DD): {}", raw, e))
    })
}
