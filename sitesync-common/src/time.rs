//! Timestamp utilities

use chrono::{Local, Utc};

/// Display format for material timestamps (minute resolution)
pub const MINUTE_STAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Current Unix epoch time in milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Current local time formatted for display on material records
///
/// Not an ordering key: two records added in the same minute share a stamp.
pub fn minute_stamp() -> String {
    Local::now().format(MINUTE_STAMP_FORMAT).to_string()
}
