//! Stream-archive line decoder.
//!
//! Each archive entry is a sequence of JSON lines. A line is either a tweet
//! payload or a deletion envelope of the form
//! `{"delete": {"status": {...}, "timestamp_ms": "..."}}`. Decoding is pure:
//! it does no I/O and holds no state, so it runs unchanged on any worker.

use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::model::{Delete, Item, Tweet};
use crate::twitter;

/// Why a line could not be decoded into an [`Item`].
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON")]
    Json(#[from] serde_json::Error),
    #[error("line is not a JSON object")]
    NotAnObject,
    #[error("missing or invalid field: {field}")]
    Field { field: &'static str },
}

/// Decode one raw archive line. Dispatches on the presence of a `delete`
/// key; everything else is treated as a tweet payload.
pub fn decode_line(line: &[u8]) -> Result<Item, DecodeError> {
    let value: Value = serde_json::from_slice(line)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject);
    }
    match value.get("delete") {
        Some(delete) => decode_delete(delete).map(Item::Delete),
        None => decode_tweet_value(value, None, None).map(Item::Tweet),
    }
}

/// Decode a tweet object. `source_status_id` and `snapshot` thread the
/// enclosing tweet's capture context into quoted and retweeted statuses;
/// both are `None` at the top level.
pub fn decode_tweet(
    value: &Value,
    source_status_id: Option<u64>,
    snapshot: Option<DateTime<Utc>>,
) -> Result<Tweet, DecodeError> {
    decode_tweet_value(value.clone(), source_status_id, snapshot)
}

fn decode_tweet_value(
    value: Value,
    source_status_id: Option<u64>,
    snapshot: Option<DateTime<Utc>>,
) -> Result<Tweet, DecodeError> {
    let status_id = get_u64(&value, "id_str").ok_or(DecodeError::Field { field: "id_str" })?;
    let user = value.get("user").ok_or(DecodeError::Field { field: "user" })?;
    let user_id = get_u64(user, "id_str").ok_or(DecodeError::Field { field: "user.id_str" })?;
    let screen_name = get_str(user, "screen_name")
        .ok_or(DecodeError::Field { field: "user.screen_name" })?
        .to_string();
    let display_name = get_str(user, "name")
        .ok_or(DecodeError::Field { field: "user.name" })?
        .to_string();

    Ok(Tweet::new(
        status_id,
        source_status_id,
        snapshot,
        user_id,
        screen_name,
        display_name,
        value,
    ))
}

fn decode_delete(delete: &Value) -> Result<Delete, DecodeError> {
    let status = delete
        .get("status")
        .ok_or(DecodeError::Field { field: "delete.status" })?;
    let status_id = get_u64(status, "id_str").ok_or(DecodeError::Field {
        field: "delete.status.id_str",
    })?;
    let user_id = get_u64(status, "user_id_str").ok_or(DecodeError::Field {
        field: "delete.status.user_id_str",
    })?;
    let timestamp = get_u64(delete, "timestamp_ms").and_then(twitter::from_millis);

    Ok(Delete {
        status_id,
        user_id,
        timestamp,
    })
}

/// Read a u64 field that the stream serializes either as a decimal string
/// or as a bare number.
pub(crate) fn get_u64(value: &Value, field: &str) -> Option<u64> {
    match value.get(field)? {
        Value::String(raw) => raw.parse().ok(),
        other => other.as_u64(),
    }
}

pub(crate) fn get_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value.get(field)?.as_str()
}

pub(crate) fn get_bool(value: &Value, field: &str) -> Option<bool> {
    value.get(field)?.as_bool()
}
