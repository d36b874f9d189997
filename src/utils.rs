//! Utility functions for dates, hashing, and log-friendly string handling.
//!
//! This module provides helpers used throughout the application:
//! - Long-form date stamping and lenient date parsing for store ordering
//! - A stable 32-bit FNV-1a hash for fallback images and file revisions
//! - String truncation for logging oracle replies

use chrono::{DateTime, Local, NaiveDate};

/// Today's local date in long US form, e.g. `"October 18, 2026"`.
pub fn long_date_today() -> String {
    format_long_date(Local::now().date_naive())
}

/// Format a date the way entries carry it: `"%B %-d, %Y"`.
pub fn format_long_date(date: NaiveDate) -> String {
    date.format("%B %-d, %Y").to_string()
}

/// Parse an entry date string into a calendar date.
///
/// Accepts the long form the oracle is asked for (`"January 3, 2026"`), the
/// abbreviated month variant, ISO dates, and RFC 3339 timestamps. Anything
/// else yields `None`.
pub fn parse_entry_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    for fmt in ["%B %d, %Y", "%b %d, %Y", "%Y-%m-%d", "%m/%d/%Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(raw, fmt) {
            return Some(d);
        }
    }
    DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive())
}

/// Stable 32-bit FNV-1a hash of a string.
///
/// Unlike `std`'s hasher this is fixed across builds and platforms, so the
/// same title always maps to the same value.
pub fn stable_hash(s: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for b in s.as_bytes() {
        hash ^= u32::from(*b);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut at `max` characters with an ellipsis and a count
/// of the dropped bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Collapse runs of whitespace into single spaces and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte_boundary() {
        let s = "ééééé";
        assert_eq!(truncate_for_log(s, 2), "éé…(+6 bytes)");
    }

    #[test]
    fn test_parse_entry_date_formats() {
        let jan3 = NaiveDate::from_ymd_opt(2026, 1, 3).unwrap();
        assert_eq!(parse_entry_date("January 3, 2026"), Some(jan3));
        assert_eq!(parse_entry_date("January 03, 2026"), Some(jan3));
        assert_eq!(parse_entry_date("Jan 3, 2026"), Some(jan3));
        assert_eq!(parse_entry_date("2026-01-03"), Some(jan3));
        assert_eq!(parse_entry_date("2026-01-03T10:00:00Z"), Some(jan3));
        assert_eq!(parse_entry_date("yesterday"), None);
    }

    #[test]
    fn test_format_long_date_has_no_padding() {
        let d = NaiveDate::from_ymd_opt(2026, 10, 8).unwrap();
        assert_eq!(format_long_date(d), "October 8, 2026");
        assert_eq!(parse_entry_date(&format_long_date(d)), Some(d));
    }

    #[test]
    fn test_stable_hash_known_values() {
        assert_eq!(stable_hash(""), 0x811c_9dc5);
        assert_eq!(stable_hash("a"), 0xe40c_292c);
        assert_eq!(stable_hash("Marathon record"), stable_hash("Marathon record"));
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Boston\n\t  Marathon  "), "Boston Marathon");
    }
}
