//! Canonical serialization and timestamps.

use crate::error::ChainError;
use serde::Serialize;

/// Serializes any value to its canonical form: compact JSON with object
/// keys in sorted order. Hashes and signatures are always computed over
/// these bytes.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<String, ChainError> {
    // `serde_json::Map` is ordered by key, so going through `Value`
    // normalizes key order regardless of struct field order.
    let value = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&value)?)
}

/// Current UTC time as whole seconds since the epoch, as a string.
pub fn gen_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}
