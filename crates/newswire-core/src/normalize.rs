//! Normalization helpers shared by every provider adapter.
//!
//! Adapters map provider records field by field; these helpers are the
//! only place where blank strings and timestamp formats are interpreted,
//! so all providers treat them the same way.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Trim a string and turn blanks into `None`.
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else if trimmed.len() == s.len() {
            Some(s)
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Parse a provider timestamp into UTC.
///
/// Accepted formats, tried in order:
///
/// | Format | Example |
/// |--------|---------|
/// | RFC 3339 | `2024-05-01T12:00:00Z` |
/// | RFC 2822 | `Wed, 01 May 2024 12:00:00 +0000` |
/// | naive date-time (assumed UTC) | `2024-05-01 12:00:00` |
/// | date only (midnight UTC) | `2024-05-01` |
///
/// Anything else, including blanks, yields `None`. A bad timestamp never
/// causes a record to be skipped.
pub fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
