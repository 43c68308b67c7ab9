//! ISO-8601 date-times that keep their UTC offset.
//!
//! Output always carries the offset (`Z` for UTC) and shows fractional
//! seconds only when they are non-zero. Input accepts full RFC 3339
//! timestamps, minute precision and date-only values. An explicit offset is
//! retained as parsed; a value without one is taken to be local time.

use std::sync::OnceLock;

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone,
};
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

use super::parse_offset;

static DATE_TIME_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_date_time_regex() -> &'static Regex {
    DATE_TIME_REGEX.get_or_init(|| {
        Regex::new(
            r"^(\d{4}-\d{2}-\d{2})(?:T(\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?))?(Z|[+-]\d{2}(?::?\d{2})?)?$",
        )
        .expect("Failed to compile date-time regex")
    })
}

pub fn format(value: &DateTime<FixedOffset>) -> String {
    value.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Parse an ISO-8601 date-time, or `None` if `text` is not one
pub fn parse(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed);
    }

    let captures = get_date_time_regex().captures(text)?;
    let date = NaiveDate::parse_from_str(&captures[1], "%Y-%m-%d").ok()?;
    let time = match captures.get(2) {
        Some(time) => parse_time(time.as_str())?,
        None => NaiveTime::MIN,
    };
    let naive = NaiveDateTime::new(date, time);

    match captures.get(3) {
        Some(designator) => parse_offset(designator.as_str())?
            .from_local_datetime(&naive)
            .single(),
        None => Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|local| local.fixed_offset()),
    }
}

fn parse_time(text: &str) -> Option<NaiveTime> {
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|format| NaiveTime::parse_from_str(text, format).ok())
}

pub fn serialize<S>(value: &DateTime<FixedOffset>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 date-time '{}'", text)))
}

pub mod option {
    use super::*;

    pub fn serialize<S>(
        value: &Option<DateTime<FixedOffset>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(&format(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<FixedOffset>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) if !text.trim().is_empty() => parse(&text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 date-time '{}'", text))),
            _ => Ok(None),
        }
    }
}
