//! Publication date normalization.
//!
//! Feeds in the wild disagree on date formats, so [`normalize`] tries a fixed
//! list of layouts in order and keeps the first that parses. Some layouts are
//! structurally looser than others, which is why [`LAYOUTS`] order is part of
//! the contract.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unparseable timestamp: {0:?}")]
pub struct Unparseable(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    Rfc1123Z,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `2006-01-02T15:04:05Z07:00`
    Rfc3339,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `02 Jan 06 15:04 -0700`
    Rfc822Z,
    /// `2006-01-02T15:04:05Z`
    IsoUtc,
    /// `2006-01-02 15:04:05`, read as UTC
    SpaceSeparated,
    /// `02 Jan 2006 15:04:05 -0700`
    DayMonthYearZ,
    /// `02 Jan 2006 15:04:05 MST`
    DayMonthYearAbbr,
}

/// Layouts in the order they are attempted.
pub const LAYOUTS: [Layout; 9] = [
    Layout::Rfc1123Z,
    Layout::Rfc1123,
    Layout::Rfc3339,
    Layout::Rfc822,
    Layout::Rfc822Z,
    Layout::IsoUtc,
    Layout::SpaceSeparated,
    Layout::DayMonthYearZ,
    Layout::DayMonthYearAbbr,
];

impl Layout {
    pub fn parse(self, s: &str) -> Option<DateTime<Utc>> {
        match self {
            Layout::Rfc1123Z => {
                strip_weekday(s).and_then(|rest| with_numeric_zone(rest, "%d %b %Y %H:%M:%S %z"))
            }
            Layout::Rfc1123 => {
                strip_weekday(s).and_then(|rest| with_zone_abbreviation(rest, "%d %b %Y %H:%M:%S"))
            }
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            Layout::Rfc822 => with_zone_abbreviation(s, "%d %b %y %H:%M"),
            Layout::Rfc822Z => with_numeric_zone(s, "%d %b %y %H:%M %z"),
            Layout::IsoUtc => as_utc(s, "%Y-%m-%dT%H:%M:%SZ"),
            Layout::SpaceSeparated => as_utc(s, "%Y-%m-%d %H:%M:%S"),
            Layout::DayMonthYearZ => with_numeric_zone(s, "%d %b %Y %H:%M:%S %z"),
            Layout::DayMonthYearAbbr => with_zone_abbreviation(s, "%d %b %Y %H:%M:%S"),
        }
    }

    /// Render `instant` in this layout, in UTC.
    ///
    /// The RFC 822 layouts carry no seconds, so seconds are dropped.
    pub fn format(self, instant: DateTime<Utc>) -> String {
        match self {
            Layout::Rfc1123Z => instant.format("%a, %d %b %Y %H:%M:%S %z").to_string(),
            Layout::Rfc1123 => instant.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            Layout::Rfc3339 => instant.to_rfc3339_opts(SecondsFormat::Secs, true),
            Layout::Rfc822 => instant.format("%d %b %y %H:%M GMT").to_string(),
            Layout::Rfc822Z => instant.format("%d %b %y %H:%M %z").to_string(),
            Layout::IsoUtc => instant.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            Layout::SpaceSeparated => instant.format("%Y-%m-%d %H:%M:%S").to_string(),
            Layout::DayMonthYearZ => instant.format("%d %b %Y %H:%M:%S %z").to_string(),
            Layout::DayMonthYearAbbr => instant.format("%d %b %Y %H:%M:%S GMT").to_string(),
        }
    }
}

/// Convert a raw feed date into a UTC instant.
pub fn normalize(raw: &str) -> Result<DateTime<Utc>, Unparseable> {
    let s = raw.trim();
    LAYOUTS
        .iter()
        .find_map(|layout| layout.parse(s))
        .ok_or_else(|| Unparseable(raw.to_string()))
}

/// The first layout that accepts `raw`, if any.
#[cfg(test)]
fn matching_layout(raw: &str) -> Option<Layout> {
    let s = raw.trim();
    LAYOUTS.iter().copied().find(|layout| layout.parse(s).is_some())
}

const WEEKDAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];

/// Drop a leading `"Mon, "`. The name must be a real weekday but need not
/// agree with the date.
fn strip_weekday(s: &str) -> Option<&str> {
    let (day, rest) = s.split_once(", ")?;
    WEEKDAYS
        .iter()
        .any(|w| w.eq_ignore_ascii_case(day))
        .then_some(rest)
}

fn with_numeric_zone(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(s, fmt)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn as_utc(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, fmt)
        .ok()
        .map(|naive| naive.and_utc())
}

fn with_zone_abbreviation(s: &str, fmt: &str) -> Option<DateTime<Utc>> {
    let (head, zone) = s.rsplit_once(' ')?;
    let offset = zone_offset(zone)?;
    let naive = NaiveDateTime::parse_from_str(head.trim_end(), fmt).ok()?;
    offset
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// RFC 822 zone names. Any other alphabetic abbreviation is taken as UTC.
fn zone_offset(zone: &str) -> Option<FixedOffset> {
    if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let hours = match zone.to_ascii_uppercase().as_str() {
        "EDT" => -4,
        "EST" | "CDT" => -5,
        "CST" | "MDT" => -6,
        "MST" | "PDT" => -7,
        "PST" => -8,
        _ => 0,
    };
    FixedOffset::east_opt(hours * 3600)
}
