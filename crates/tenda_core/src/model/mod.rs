//! Domain records for the exchange and contact features.
//!
//! # Responsibility
//! - Define the records written to and read from the document store.
//! - Validate user submissions before any store call.
//!
//! # Invariants
//! - Store documents are decoded leniently: unknown kinds are filtered, never
//!   raised as errors to the UI.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod contact;
pub mod exchange_item;

/// Current wall-clock time as Unix epoch milliseconds.
///
/// Clocks set before 1970 report `0`.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
