//! Helper functions for type conversion
//!
//! ## Type Mapping
//!
//! | Domain Type                        | SQL Type | Strategy                                   |
//! |------------------------------------|----------|--------------------------------------------|
//! | StoreId, RecordId, TaskId          | TEXT     | UUID string via `.to_string()` / `FromStr` |
//! | AccountId, CloudNativeId           | TEXT     | String via `.as_str()` / `new()`           |
//! | Vendor, ResourceType, enums        | TEXT     | `.as_str()` / `FromStr`                    |
//! | DateTime<Utc>                      | TEXT     | RFC 3339, microseconds, `Z` suffix         |
//! | Attributes, RecycleDetail          | TEXT     | serde_json serialization                   |

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use stratus_core::ports::MAX_BATCH_SIZE;

use crate::StoreError;

/// Format a datetime so that string order matches time order
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a DateTime<Utc> from an RFC 3339 string
pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            StoreError::SerializationError(format!("Failed to parse datetime '{}': {}", s, e))
        })
}

/// Parse any stored enum or identifier through its `FromStr` impl
pub(crate) fn parse_column<T>(column: &str, value: &str) -> Result<T, StoreError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| {
        StoreError::SerializationError(format!("Invalid {} '{}': {}", column, value, e))
    })
}

/// Reject batches above the per-call limit
pub(crate) fn check_batch_size(size: usize) -> Result<(), StoreError> {
    if size > MAX_BATCH_SIZE {
        return Err(StoreError::BatchTooLarge {
            size,
            limit: MAX_BATCH_SIZE,
        });
    }
    Ok(())
}

/// Build `?, ?, ?` for an `IN (...)` clause
pub(crate) fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
