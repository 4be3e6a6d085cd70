//! Stored value format for seen keys.
//!
//! Each entry's value is the insertion time as Unix epoch nanoseconds,
//! encoded as 8 big-endian bytes.

use chrono::{DateTime, TimeDelta, Utc};
use std::time::Duration;

use crate::Error;

/// Size of an encoded timestamp.
pub const TIMESTAMP_LEN: usize = 8;

/// Encode an insertion time.
///
/// Times past the representable range (year 2262) saturate.
pub fn encode(at: DateTime<Utc>) -> [u8; TIMESTAMP_LEN] {
    at.timestamp_nanos_opt().unwrap_or(i64::MAX).to_be_bytes()
}

/// Decode a stored insertion time.
pub fn decode(bytes: &[u8]) -> Result<DateTime<Utc>, Error> {
    let raw: [u8; TIMESTAMP_LEN] = bytes
        .try_into()
        .map_err(|_| Error::CorruptEntry(format!("expected {TIMESTAMP_LEN} bytes, got {}", bytes.len())))?;
    Ok(DateTime::from_timestamp_nanos(i64::from_be_bytes(raw)))
}

/// Whether an entry inserted at `inserted_at` is past `ttl` at `now`.
///
/// An entry exactly `ttl` old is still live. Entries from the future
/// (clock stepped backwards) count as live.
pub fn is_expired(inserted_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
    now.signed_duration_since(inserted_at) > ttl
}
