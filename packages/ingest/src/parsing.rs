//! Shared cell parsing for raw extracts.
//!
//! Dates, postal codes, and counts arrive as loosely formatted strings
//! (spreadsheet exports turn `110001` into `110001.0`, dates flip between
//! `dd-mm-yyyy` and ISO). These helpers normalise them.

use chrono::{NaiveDate, NaiveDateTime};

const DATE_FORMATS: &[&str] = &["%d-%m-%Y", "%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

/// Parses a calendar date in any of the accepted extract formats.
///
/// ISO datetimes (`2025-03-01T10:00:00`, `2025-03-01 10:00:00`) are
/// truncated to their date.
#[must_use]
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date);
        }
    }

    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt.date());
        }
    }

    None
}

/// Normalises a postal code cell. Returns `None` for blank cells.
///
/// Integral float renderings (`"110001.0"`) collapse to their integer form.
#[must_use]
pub fn normalize_postal_code(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(integral) = s.strip_suffix(".0")
        && !integral.is_empty()
        && integral.bytes().all(|b| b.is_ascii_digit())
    {
        return Some(integral.to_string());
    }

    Some(s.to_string())
}

/// Outcome of parsing a single count cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountCell {
    /// A usable non-negative count (blank cells are zero).
    Value(u64),
    /// Non-numeric, fractional, or negative; contributes zero.
    Malformed,
}

/// Parses a count cell.
#[must_use]
pub fn parse_count(s: &str) -> CountCell {
    let s = s.trim();
    if s.is_empty() {
        return CountCell::Value(0);
    }

    if let Ok(n) = s.parse::<u64>() {
        return CountCell::Value(n);
    }

    match s.parse::<f64>() {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        Ok(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => CountCell::Value(f as u64),
        _ => CountCell::Malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_day_first_dates() {
        let d = parse_date("02-03-2025").unwrap();
        assert_eq!(d, NaiveDate::from_ymd_opt(2025, 3, 2).unwrap());
    }

    #[test]
    fn parses_iso_dates_and_datetimes() {
        let expected = NaiveDate::from_ymd_opt(2024, 11, 30).unwrap();
        assert_eq!(parse_date("2024-11-30"), Some(expected));
        assert_eq!(parse_date("2024-11-30T08:15:00"), Some(expected));
        assert_eq!(parse_date("2024-11-30 08:15:00.250"), Some(expected));
    }

    #[test]
    fn rejects_garbage_dates() {
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("31-02-2025").is_none());
    }

    #[test]
    fn normalizes_float_postal_codes() {
        assert_eq!(normalize_postal_code(" 110001.0 ").as_deref(), Some("110001"));
        assert_eq!(normalize_postal_code("560034").as_deref(), Some("560034"));
        assert_eq!(normalize_postal_code("   "), None);
    }

    #[test]
    fn parses_counts() {
        assert_eq!(parse_count("17"), CountCell::Value(17));
        assert_eq!(parse_count(""), CountCell::Value(0));
        assert_eq!(parse_count("12.0"), CountCell::Value(12));
        assert_eq!(parse_count("-3"), CountCell::Malformed);
        assert_eq!(parse_count("1.5"), CountCell::Malformed);
        assert_eq!(parse_count("n/a"), CountCell::Malformed);
    }
}
