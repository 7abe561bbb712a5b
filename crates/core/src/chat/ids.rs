//! Identifier minting and timestamp formatting.
//!
//! Ids are UUIDv7: a 48-bit millisecond timestamp followed by random bits,
//! so their canonical lowercase form sorts by creation time. Collisions are
//! treated as a transient, retryable event by the callers.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

/// Latest timestamp handed out by [`now`], in microseconds.
static LAST_MINTED_MICROS: AtomicI64 = AtomicI64::new(i64::MIN);

/// Mints a new time-ordered unique identifier.
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}

/// Current time, truncated to the precision stored in keys.
///
/// Never earlier than a timestamp previously returned in this process, so
/// records minted in sequence keep their order if the wall clock steps back.
pub fn now() -> DateTime<Utc> {
    let wall = truncate(Utc::now());
    let micros = wall.timestamp_micros();
    let previous = LAST_MINTED_MICROS.fetch_max(micros, Ordering::AcqRel);
    if previous > micros {
        DateTime::from_timestamp_micros(previous).unwrap_or(wall)
    } else {
        wall
    }
}

/// Formats a timestamp for embedding in keys and attributes.
///
/// Fixed microsecond precision with a `Z` suffix keeps lexicographic and
/// chronological order identical.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a timestamp written by [`format_timestamp`].
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Drops sub-microsecond precision, which keys and attributes do not store.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    let nanos = ts.timestamp_subsec_nanos();
    ts - chrono::Duration::nanoseconds(i64::from(nanos % 1_000))
}
