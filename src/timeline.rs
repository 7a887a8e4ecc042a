use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer};

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_utc());
    }

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(parsed);
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
}

// Bad or non-string dates become `None` instead of failing the record.
pub fn lenient_datetime<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw
        .as_ref()
        .and_then(serde_json::Value::as_str)
        .and_then(parse_timestamp))
}

/// Start of a `since_days` window ending at `as_of`. Windows reaching past
/// the representable range start at `NaiveDateTime::MIN`.
pub fn cutoff_date(as_of: NaiveDateTime, since_days: i64) -> NaiveDateTime {
    Duration::try_days(since_days.max(1))
        .and_then(|window| as_of.checked_sub_signed(window))
        .unwrap_or(NaiveDateTime::MIN)
}

/// Rolling-window membership: on or after the cutoff. Missing dates never match.
pub fn within_window(date: Option<NaiveDateTime>, cutoff: NaiveDateTime) -> bool {
    date.is_some_and(|date| date >= cutoff)
}

pub fn month_in_year(date: Option<NaiveDateTime>, year: i32) -> Option<usize> {
    let date = date?;
    (date.year() == year).then(|| date.month0() as usize)
}

pub fn hours_between(earlier: NaiveDateTime, later: NaiveDateTime) -> f64 {
    (later - earlier).num_seconds() as f64 / 3600.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(date: &str) -> NaiveDateTime {
        parse_timestamp(date).unwrap()
    }

    #[test]
    fn parses_supported_formats() {
        let expected = NaiveDate::from_ymd_opt(2026, 3, 1)
            .unwrap()
            .and_hms_opt(9, 30, 0)
            .unwrap();
        assert_eq!(parse_timestamp("2026-03-01T09:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-01T09:30:00.000Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-01T11:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-03-01 09:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2026-03-01"),
            Some(expected.date().and_hms_opt(0, 0, 0).unwrap())
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("March 1st"), None);
        assert_eq!(parse_timestamp("2026-13-01"), None);
    }

    #[test]
    fn cutoff_date_respects_since_days() {
        let now = at("2026-10-19T12:00:00");
        assert_eq!(cutoff_date(now, 30), at("2026-09-19T12:00:00"));
        assert_eq!(cutoff_date(now, 0), at("2026-10-18T12:00:00"));
    }

    #[test]
    fn huge_windows_cover_everything() {
        let now = at("2026-10-19T12:00:00");
        assert_eq!(cutoff_date(now, 1_000_000_000), NaiveDateTime::MIN);
        assert_eq!(cutoff_date(now, i64::MAX), NaiveDateTime::MIN);
        assert!(within_window(Some(at("1900-01-01")), cutoff_date(now, 1_000_000_000)));
    }

    #[test]
    fn window_is_inclusive_of_cutoff() {
        let cutoff = at("2026-09-19T12:00:00");
        assert!(within_window(Some(cutoff), cutoff));
        assert!(within_window(Some(at("2026-10-01")), cutoff));
        assert!(!within_window(Some(at("2026-09-19T11:59:59")), cutoff));
        assert!(!within_window(None, cutoff));
    }

    #[test]
    fn month_lookup_isolates_years() {
        assert_eq!(month_in_year(Some(at("2026-03-15")), 2026), Some(2));
        assert_eq!(month_in_year(Some(at("2025-03-15")), 2026), None);
        assert_eq!(month_in_year(None, 2026), None);
    }

    #[test]
    fn hours_between_is_fractional() {
        let gap = hours_between(at("2026-03-01T09:00:00"), at("2026-03-01T10:30:00"));
        assert!((gap - 1.5).abs() < f64::EPSILON);
    }
}
