//! Pacific time normalization and display formatting.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::America::Los_Angeles;
use chrono_tz::Tz;
use regex::Regex;

/// Fixed reference time zone for every date and time shown to staff.
pub const REFERENCE_TZ: Tz = Los_Angeles;

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d{1,2}):(\d{2})\s*(AM|PM)?").expect("valid time regex")
});

/// Calendar date of `instant` in Pacific time, `YYYY-MM-DD`.
pub fn pacific_date(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&REFERENCE_TZ).format("%Y-%m-%d").to_string()
}

/// Civil time of `instant` in Pacific time, `H:MM AM/PM`.
pub fn pacific_time(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&REFERENCE_TZ).format("%-I:%M %p").to_string()
}

/// Medium date plus short time in Pacific time, e.g. `Mar 5, 2024, 3:15 PM`.
pub fn pacific_timestamp(instant: DateTime<Utc>) -> String {
    instant
        .with_timezone(&REFERENCE_TZ)
        .format("%b %-d, %Y, %-I:%M %p")
        .to_string()
}

/// `YYYY-MM-DD` to `M/D`. `None` when the input is not a calendar date.
pub fn format_date(date: &str) -> Option<String> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    Some(date.format("%-m/%-d").to_string())
}

/// Normalize a 12- or 24-hour time string to `H:MM AM/PM`.
///
/// The first `H:MM` occurrence is used, so decorated strings such as
/// `"3:45 PM (Pacific Time)"` work. `None` when no time is found or the
/// clock values are out of range (minutes past 59, hours past 23, or past
/// 12 with a meridiem). `0` with a meridiem reads as 12.
pub fn normalize_time(time: &str) -> Option<String> {
    let caps = TIME_RE.captures(time)?;
    let hours: u32 = caps[1].parse().ok()?;
    let minutes: u32 = caps[2].parse().ok()?;
    if minutes > 59 {
        return None;
    }

    let (hours, period) = match caps.get(3) {
        Some(meridiem) => {
            if hours > 12 {
                return None;
            }
            let hours = if hours == 0 { 12 } else { hours };
            (hours, meridiem.as_str().to_ascii_uppercase())
        }
        None => {
            if hours > 23 {
                return None;
            }
            let period = if hours >= 12 { "PM" } else { "AM" };
            let hours = match hours % 12 {
                0 => 12,
                h => h,
            };
            (hours, period.to_string())
        }
    };
    Some(format!("{hours}:{minutes:02} {period}"))
}

/// Like `normalize_time`, passing unrecognized input through unchanged.
pub fn format_time(time: &str) -> String {
    normalize_time(time).unwrap_or_else(|| time.to_string())
}
