use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use thiserror::Error;

use crate::time_zone::{ZoneFormatter, lookup};

const DAYTIME_START_HOUR: u32 = 6;
const DAYTIME_END_HOUR: u32 = 18;

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum DisplayError {
    #[error("Unknown timezone: {0}")]
    UnknownTimeZone(String),
    #[error(
        "Unknown datetime: {0}. Please ensure the value is written in the format of YYYY-MM-DDTHH:mm:ss.sssZ."
    )]
    InvalidDateTime(String),
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ZoneRow {
    pub label: String,
    pub time_zone: String,
    pub time: String,
    pub full_date: String,
    pub utc_offset: String,
    pub zone_name: String,
    pub daytime: bool,
}

impl ZoneRow {
    pub fn time_of_day_marker(&self) -> &'static str {
        if self.daytime { "☀️" } else { "🌑" }
    }
}

pub fn resolve_now(
    custom_date_time: Option<&str>,
    now_ms: i64,
    viewer_zone: &str,
) -> Result<DateTime<Utc>, DisplayError> {
    match custom_date_time {
        Some(value) => parse_custom_date_time(value, viewer_zone),
        None => Utc
            .timestamp_millis_opt(now_ms)
            .single()
            .ok_or_else(|| DisplayError::InvalidDateTime(now_ms.to_string())),
    }
}

pub fn parse_custom_date_time(
    value: &str,
    viewer_zone: &str,
) -> Result<DateTime<Utc>, DisplayError> {
    let trimmed = value.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let naive = parse_naive_date_time(trimmed)
        .ok_or_else(|| DisplayError::InvalidDateTime(value.to_string()))?;
    let zone = lookup(viewer_zone)?;
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(first, _second) => Ok(first.with_timezone(&Utc)),
        LocalResult::None => Err(DisplayError::InvalidDateTime(value.to_string())),
    }
}

fn parse_naive_date_time(input: &str) -> Option<NaiveDateTime> {
    [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M",
    ]
    .iter()
    .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
}

pub fn zone_row(
    label: &str,
    time_zone: &str,
    custom_date_time: Option<&str>,
    now_ms: i64,
    viewer_zone: &str,
    formatter: &dyn ZoneFormatter,
) -> Result<ZoneRow, DisplayError> {
    if !formatter.is_known(time_zone) {
        return Err(DisplayError::UnknownTimeZone(time_zone.to_string()));
    }
    let now = resolve_now(custom_date_time, now_ms, viewer_zone)?;
    let hour = formatter.hour(now, time_zone)?;

    Ok(ZoneRow {
        label: label.to_string(),
        time_zone: time_zone.to_string(),
        time: formatter.medium_time(now, time_zone)?,
        full_date: formatter.full_date(now, time_zone)?,
        utc_offset: formatter.utc_offset(now, time_zone)?,
        zone_name: formatter.zone_name(now, time_zone)?,
        daytime: (DAYTIME_START_HOUR..DAYTIME_END_HOUR).contains(&hour),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_zone::{ChronoTzFormatter, Locale};

    fn formatter() -> ChronoTzFormatter {
        ChronoTzFormatter::new(Locale::parse("en-US"))
    }

    fn ms(rfc3339: &str) -> i64 {
        DateTime::parse_from_rfc3339(rfc3339)
            .expect("valid instant")
            .timestamp_millis()
    }

    #[test]
    fn parses_rfc3339_and_local_overrides() {
        let utc = parse_custom_date_time("2024-03-01T12:00:00Z", "Asia/Tokyo").expect("rfc3339");
        assert_eq!(utc.timestamp_millis(), ms("2024-03-01T12:00:00Z"));

        let local = parse_custom_date_time("2024-03-01T12:00", "Asia/Tokyo").expect("local");
        assert_eq!(local.timestamp_millis(), ms("2024-03-01T03:00:00Z"));

        let spaced =
            parse_custom_date_time("2024-03-01 12:00:30.250", "UTC").expect("space separated");
        assert_eq!(spaced.timestamp_millis(), ms("2024-03-01T12:00:30.250Z"));
    }

    #[test]
    fn rejects_unparsable_override() {
        let err = parse_custom_date_time("next tuesday", "UTC").expect_err("invalid");
        assert_eq!(err, DisplayError::InvalidDateTime("next tuesday".to_string()));
        assert!(err.to_string().starts_with("Unknown datetime: next tuesday."));
    }

    #[test]
    fn skipped_local_time_is_rejected_and_ambiguous_takes_first() {
        let err = parse_custom_date_time("2026-03-08T02:30:00", "America/New_York")
            .expect_err("nonexistent local time");
        assert!(matches!(err, DisplayError::InvalidDateTime(_)));

        let first = parse_custom_date_time("2026-11-01T01:30:00", "America/New_York")
            .expect("ambiguous local time");
        assert_eq!(first.timestamp_millis(), ms("2026-11-01T05:30:00Z"));
    }

    #[test]
    fn zone_row_formats_every_field() {
        let row = zone_row(
            "Tokyo office",
            "Asia/Tokyo",
            None,
            ms("2024-01-15T00:30:00Z"),
            "UTC",
            &formatter(),
        )
        .expect("row");
        assert_eq!(row.label, "Tokyo office");
        assert_eq!(row.time, "9:30:00 AM");
        assert_eq!(row.full_date, "1/15/2024, 9:30:00 AM GMT+09:00");
        assert_eq!(row.utc_offset, "GMT+09:00");
        assert_eq!(row.zone_name, "JST");
        assert!(row.daytime);
        assert_eq!(row.time_of_day_marker(), "☀️");
    }

    #[test]
    fn zone_row_uses_override_over_clock() {
        let row = zone_row(
            "UTC",
            "UTC",
            Some("2024-01-15T23:00:00Z"),
            ms("2024-01-15T12:00:00Z"),
            "UTC",
            &formatter(),
        )
        .expect("row");
        assert_eq!(row.time, "11:00:00 PM");
        assert!(!row.daytime);
    }

    #[test]
    fn zone_row_refuses_unknown_zone_and_bad_override() {
        let unknown = zone_row("x", "Nowhere/Land", None, 0, "UTC", &formatter())
            .expect_err("unknown zone");
        assert_eq!(unknown.to_string(), "Unknown timezone: Nowhere/Land");

        let bad = zone_row("x", "UTC", Some("garbage"), 0, "UTC", &formatter())
            .expect_err("bad override");
        assert!(matches!(bad, DisplayError::InvalidDateTime(_)));
    }
}
