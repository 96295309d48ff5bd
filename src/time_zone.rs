use std::env;

use chrono::{DateTime, Datelike, Offset, TimeZone, Timelike, Utc};
use chrono_tz::{TZ_VARIANTS, Tz};
use thiserror::Error;
use tracing::debug;

use crate::display::DisplayError;

pub const UTC_SENTINEL: &str = "UTC";
const DEFAULT_LOCALE: &str = "en";
const MAX_SUGGESTIONS: usize = 5;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TimeDisplayMode {
    Hour24,
    Hour12,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Locale {
    tag: String,
}

impl Default for Locale {
    fn default() -> Self {
        Self {
            tag: DEFAULT_LOCALE.to_string(),
        }
    }
}

impl Locale {
    pub fn parse(raw: &str) -> Self {
        let without_encoding = raw.split(['.', '@']).next().unwrap_or_default().trim();
        if without_encoding.is_empty()
            || without_encoding.eq_ignore_ascii_case("C")
            || without_encoding.eq_ignore_ascii_case("POSIX")
        {
            return Self::default();
        }

        let mut parts = without_encoding.split(['-', '_']);
        let language = parts.next().unwrap_or(DEFAULT_LOCALE).to_ascii_lowercase();
        let tag = match parts.next() {
            Some(region) if !region.is_empty() => {
                format!("{language}-{}", region.to_ascii_uppercase())
            }
            _ => language,
        };
        Self { tag }
    }

    pub fn detect() -> Self {
        ["LC_ALL", "LC_TIME", "LANG"]
            .iter()
            .filter_map(|key| env::var(key).ok())
            .find(|value| !value.trim().is_empty())
            .map(|value| Self::parse(&value))
            .unwrap_or_default()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    fn language(&self) -> &str {
        self.tag.split('-').next().unwrap_or(DEFAULT_LOCALE)
    }

    fn region(&self) -> Option<&str> {
        self.tag.split('-').nth(1)
    }

    pub fn display_mode(&self) -> TimeDisplayMode {
        let twelve_hour_region = matches!(
            self.region(),
            Some("US" | "CA" | "AU" | "NZ" | "IN" | "PH")
        );
        if twelve_hour_region || (self.language() == "en" && self.region().is_none()) {
            TimeDisplayMode::Hour12
        } else {
            TimeDisplayMode::Hour24
        }
    }
}

#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum ZoneLookupError {
    #[error("unknown time zone '{query}'{}", suggestion_hint(.suggestions))]
    Unknown {
        query: String,
        suggestions: Vec<String>,
    },
    #[error("time zone '{query}' is ambiguous{}", suggestion_hint(.candidates))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
    },
}

fn suggestion_hint(names: &[String]) -> String {
    if names.is_empty() {
        String::new()
    } else {
        format!("; did you mean: {}", names.join(", "))
    }
}

pub trait ZoneFormatter: Send + Sync {
    fn locale(&self) -> &Locale;
    fn all_time_zones(&self) -> Vec<String>;
    fn is_known(&self, time_zone: &str) -> bool;
    fn short_time(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError>;
    fn medium_time(&self, instant: DateTime<Utc>, time_zone: &str)
    -> Result<String, DisplayError>;
    fn full_date(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError>;
    fn utc_offset(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError>;
    fn zone_name(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError>;
    fn hour(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<u32, DisplayError>;

    fn search(&self, query: &str) -> Vec<String> {
        let needle = query.trim().to_ascii_lowercase();
        self.all_time_zones()
            .into_iter()
            .filter(|name| name.to_ascii_lowercase().contains(&needle))
            .collect()
    }

    fn resolve(&self, query: &str) -> Result<String, ZoneLookupError> {
        let trimmed = query.trim();
        if self.is_known(trimmed) {
            return Ok(trimmed.to_string());
        }
        let normalized = trimmed.replace(' ', "_");
        let all = self.all_time_zones();
        if let Some(name) = all
            .iter()
            .find(|name| name.eq_ignore_ascii_case(&normalized))
        {
            return Ok(name.clone());
        }

        let mut hits = self.search(&normalized);
        match hits.len() {
            1 => Ok(hits.remove(0)),
            0 => Err(ZoneLookupError::Unknown {
                query: trimmed.to_string(),
                suggestions: Vec::new(),
            }),
            _ => {
                hits.truncate(MAX_SUGGESTIONS);
                Err(ZoneLookupError::Ambiguous {
                    query: trimmed.to_string(),
                    candidates: hits,
                })
            }
        }
    }
}

pub struct ChronoTzFormatter {
    locale: Locale,
}

impl ChronoTzFormatter {
    pub fn new(locale: Locale) -> Self {
        Self { locale }
    }

    fn zoned(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<DateTime<Tz>, DisplayError> {
        Ok(instant.with_timezone(&lookup(time_zone)?))
    }
}

impl ZoneFormatter for ChronoTzFormatter {
    fn locale(&self) -> &Locale {
        &self.locale
    }

    fn all_time_zones(&self) -> Vec<String> {
        let mut names = TZ_VARIANTS
            .iter()
            .map(|tz| tz.name().to_string())
            .collect::<Vec<_>>();
        names.sort();
        names
    }

    fn is_known(&self, time_zone: &str) -> bool {
        lookup(time_zone).is_ok()
    }

    fn short_time(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError> {
        let zoned = self.zoned(instant, time_zone)?;
        Ok(clock_text(&zoned, self.locale.display_mode(), false))
    }

    fn medium_time(
        &self,
        instant: DateTime<Utc>,
        time_zone: &str,
    ) -> Result<String, DisplayError> {
        let zoned = self.zoned(instant, time_zone)?;
        Ok(clock_text(&zoned, self.locale.display_mode(), true))
    }

    fn full_date(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError> {
        let zoned = self.zoned(instant, time_zone)?;
        let mode = self.locale.display_mode();
        let date = match mode {
            TimeDisplayMode::Hour12 => {
                format!("{}/{}/{:04}", zoned.month(), zoned.day(), zoned.year())
            }
            TimeDisplayMode::Hour24 => {
                format!("{:02}/{:02}/{:04}", zoned.day(), zoned.month(), zoned.year())
            }
        };
        Ok(format!(
            "{date}, {} {}",
            clock_text(&zoned, mode, true),
            long_offset(&zoned)
        ))
    }

    fn utc_offset(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError> {
        let zoned = self.zoned(instant, time_zone)?;
        Ok(long_offset(&zoned))
    }

    fn zone_name(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<String, DisplayError> {
        let zoned = self.zoned(instant, time_zone)?;
        Ok(zoned.format("%Z").to_string())
    }

    fn hour(&self, instant: DateTime<Utc>, time_zone: &str) -> Result<u32, DisplayError> {
        Ok(self.zoned(instant, time_zone)?.hour())
    }
}

pub fn lookup(time_zone: &str) -> Result<Tz, DisplayError> {
    if time_zone == UTC_SENTINEL {
        return Ok(Tz::UTC);
    }
    time_zone
        .parse::<Tz>()
        .map_err(|_| DisplayError::UnknownTimeZone(time_zone.to_string()))
}

pub fn zone_label(time_zone: &str) -> String {
    time_zone.replace('_', " ")
}

pub fn detect_viewer_time_zone() -> String {
    match iana_time_zone::get_timezone() {
        Ok(name) if lookup(&name).is_ok() => name,
        Ok(name) => {
            debug!(zone = %name, "host time zone not in database, using UTC");
            UTC_SENTINEL.to_string()
        }
        Err(err) => {
            debug!(error = %err, "could not detect host time zone, using UTC");
            UTC_SENTINEL.to_string()
        }
    }
}

fn clock_text<Z: TimeZone>(dt: &DateTime<Z>, mode: TimeDisplayMode, with_seconds: bool) -> String {
    match mode {
        TimeDisplayMode::Hour24 => {
            if with_seconds {
                format!("{:02}:{:02}:{:02}", dt.hour(), dt.minute(), dt.second())
            } else {
                format!("{:02}:{:02}", dt.hour(), dt.minute())
            }
        }
        TimeDisplayMode::Hour12 => {
            let (is_pm, hour12) = dt.hour12();
            let meridiem = if is_pm { "PM" } else { "AM" };
            if with_seconds {
                format!(
                    "{}:{:02}:{:02} {}",
                    hour12,
                    dt.minute(),
                    dt.second(),
                    meridiem
                )
            } else {
                format!("{}:{:02} {}", hour12, dt.minute(), meridiem)
            }
        }
    }
}

fn long_offset<Z: TimeZone>(dt: &DateTime<Z>) -> String {
    let seconds = dt.offset().fix().local_minus_utc();
    if seconds == 0 {
        return "GMT".to_string();
    }
    let sign = if seconds < 0 { '-' } else { '+' };
    let minutes = seconds.abs() / 60;
    format!("GMT{sign}{:02}:{:02}", minutes / 60, minutes % 60)
}
