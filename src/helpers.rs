//! Shared numeric and time helpers.
//!
//! Coordinate rounding feeds the forecast cache key (4 decimal places,
//! ≈11 m — nearby requests share an entry); fixed-dp rounding feeds the
//! payload builders; hour truncation feeds the training join.

use chrono::{NaiveDateTime, Timelike};

/// Round a coordinate to 4 decimal places.
pub(crate) fn round_coord(v: f64) -> f64 {
    round_to(v, 4)
}

/// Round to a fixed number of decimal places.
pub(crate) fn round_to(v: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (v * factor).round() / factor
}

/// Truncate a timestamp down to the containing hour.
pub(crate) fn truncate_to_hour(ts: NaiveDateTime) -> NaiveDateTime {
    ts.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}
