//! Identifier generation.
//!
//! Identifiers are UUID version 7 values rendered as lowercase hyphenated hex.
//! The leading 48 bits are the Unix timestamp in milliseconds, so the string
//! form sorts by generation time; the remaining bits are a per-process
//! monotonic counter and random data.

use uuid::Uuid;

/// Length of a generated identifier in characters.
pub const IDENTIFIER_LEN: usize = 36;

/// Generate a new identifier. Never fails.
pub fn generate() -> String {
    Uuid::now_v7().hyphenated().to_string()
}

/// Millisecond timestamp embedded in an identifier produced by [`generate`].
///
/// Returns `None` for values that are not version 7 UUIDs, e.g. identifiers
/// written by hand or by other tools.
pub fn timestamp_millis(identifier: &str) -> Option<u64> {
    let uuid = Uuid::parse_str(identifier).ok()?;
    if uuid.get_version_num() != 7 {
        return None;
    }
    let (secs, nanos) = uuid.get_timestamp()?.to_unix();
    Some(secs * 1000 + u64::from(nanos) / 1_000_000)
}
