//! Timestamp utilities
//!
//! Lead `created_at` values are naive wall-clock times of the source system.
//! Delivery and processing times are naive UTC.

use chrono::{Local, NaiveDateTime, Utc};

/// Wire/storage format for lead timestamps
pub const LEAD_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Current UTC time without zone, second precision
pub fn now_utc_naive() -> NaiveDateTime {
    truncate_subsec(Utc::now().naive_utc())
}

/// Current local wall-clock time without zone, second precision
pub fn now_local_naive() -> NaiveDateTime {
    truncate_subsec(Local::now().naive_local())
}

/// Parse a `YYYY-MM-DD HH:MM:SS` timestamp (surrounding whitespace ignored)
pub fn parse_lead_timestamp(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), LEAD_TIMESTAMP_FORMAT).ok()
}

pub fn format_lead_timestamp(value: &NaiveDateTime) -> String {
    value.format(LEAD_TIMESTAMP_FORMAT).to_string()
}

fn truncate_subsec(value: NaiveDateTime) -> NaiveDateTime {
    parse_lead_timestamp(&format_lead_timestamp(&value)).unwrap_or(value)
}
