//! Event date parsing
//!
//! Accepted forms:
//! - `YYYY-MM-DD` and compact `YYYYMMDD`
//! - `YYYY-MM-DDTHH:MM[:SS]` and `YYYY-MM-DD HH:MM[:SS]`
//! - either of the above with `Z` or a UTC offset (RFC 3339)
//!
//! Values without an offset are taken as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const OFFSET_DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M:%S%:z"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y%m%d"];

/// Which end of a date-only value to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    /// 00:00:00
    Start,
    /// 23:59:59
    End,
}

/// Parse a raw date or date-time into a UTC instant
pub fn parse_instant(raw: &str, bound: DateBound) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_DATE_TIME_FORMATS {
        if let Ok(parsed) = DateTime::parse_from_str(raw, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    let naive = raw
        .strip_suffix('Z')
        .or_else(|| raw.strip_suffix('z'))
        .unwrap_or(raw);
    for format in NAIVE_DATE_TIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(naive, format) {
            return Some(parsed.and_utc());
        }
    }

    let time = match bound {
        DateBound::Start => NaiveTime::MIN,
        DateBound::End => NaiveTime::from_hms_opt(23, 59, 59)?,
    };
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .map(|date| date.and_time(time).and_utc())
}

/// Darwin Core `eventDate` for a start/end pair
pub fn format_event_date(start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let start_text = start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    if start == end {
        start_text
    } else {
        format!(
            "{}/{}",
            start_text,
            end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )
    }
}
