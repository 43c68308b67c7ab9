//! ISO-8601 calendar dates without a time zone.
//!
//! Output is `YYYY-MM-DD`. Input may carry a trailing `Z` or UTC offset,
//! as `xs:date` allows; the offset is accepted and then discarded.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

use super::parse_offset;

const DATE_FORMAT: &str = "%Y-%m-%d";

static LOCAL_DATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_local_date_regex() -> &'static Regex {
    LOCAL_DATE_REGEX.get_or_init(|| {
        Regex::new(r"^(\d{4}-\d{2}-\d{2})(Z|[+-]\d{2}(?::?\d{2})?)?$")
            .expect("Failed to compile local date regex")
    })
}

pub fn format(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

pub fn parse(text: &str) -> Option<NaiveDate> {
    let captures = get_local_date_regex().captures(text.trim())?;
    if let Some(designator) = captures.get(2) {
        parse_offset(designator.as_str())?;
    }
    NaiveDate::parse_from_str(&captures[1], DATE_FORMAT).ok()
}

pub fn serialize<S>(value: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    parse(&text).ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 date '{}'", text)))
}

pub mod option {
    use super::*;

    pub fn serialize<S>(value: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(value) => serializer.serialize_some(&format(value)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) if !text.trim().is_empty() => parse(&text)
                .map(Some)
                .ok_or_else(|| D::Error::custom(format!("invalid ISO-8601 date '{}'", text))),
            _ => Ok(None),
        }
    }
}
