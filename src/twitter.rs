//! Twitter-specific conventions: snowflake id timestamps and API datetimes.
//!
//! Pure functions only. Timestamp inference is testable on integer inputs
//! alone; nothing here touches JSON or performs I/O.

use chrono::{DateTime, TimeZone, Utc};

/// Smallest status id minted under the snowflake scheme. Ids at or below
/// this value predate snowflake and carry no embedded timestamp.
pub const SNOWFLAKE_MINIMUM: u64 = 100_000_000_000_000;

/// Twitter's snowflake epoch in epoch milliseconds (2010-11-04T01:42:54.657Z).
pub const SNOWFLAKE_EPOCH_MS: u64 = 1_288_834_974_657;

/// Datetime format used by `created_at` fields in the streaming API,
/// e.g. `Wed Sep 16 05:12:08 +0000 2020`.
pub const DATE_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// Whether a status id was minted under the snowflake scheme.
#[must_use]
pub const fn is_snowflake(status_id: u64) -> bool {
    status_id > SNOWFLAKE_MINIMUM
}

/// Infer the creation time embedded in a snowflake status id, as epoch
/// milliseconds. Bits 22..63 hold the offset from the snowflake epoch.
#[must_use]
pub const fn extract_timestamp_millis(status_id: u64) -> Option<u64> {
    if is_snowflake(status_id) {
        Some((status_id >> 22) + SNOWFLAKE_EPOCH_MS)
    } else {
        None
    }
}

/// Infer the creation time embedded in a snowflake status id.
#[must_use]
pub fn extract_timestamp(status_id: u64) -> Option<DateTime<Utc>> {
    extract_timestamp_millis(status_id).and_then(from_millis)
}

/// Parse a `created_at` datetime value from the Twitter API.
#[must_use]
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(input, DATE_FORMAT)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert epoch milliseconds to a UTC datetime. Returns `None` for values
/// outside chrono's representable range.
#[must_use]
pub fn from_millis(millis: u64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(i64::try_from(millis).ok()?).single()
}

/// Epoch milliseconds for a UTC datetime. Pre-1970 datetimes clamp to zero;
/// archive records never legitimately predate the epoch.
#[must_use]
pub fn to_millis(datetime: DateTime<Utc>) -> u64 {
    u64::try_from(datetime.timestamp_millis()).unwrap_or(0)
}
