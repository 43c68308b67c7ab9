//! Value adapters for use with `#[serde(with = "...")]`.
//!
//! - [`cdata`] wraps text in CDATA markers on output
//! - [`date_time`] converts `DateTime<FixedOffset>` to and from ISO-8601,
//!   keeping the parsed offset
//! - [`local_date`] converts `NaiveDate` to and from ISO-8601 dates
//!
//! Each has an `option` submodule for `Option<_>` fields. Combine it with
//! `#[serde(default)]` so that a missing element reads as `None`.

pub mod cdata;
pub mod date_time;
pub mod local_date;

use chrono::FixedOffset;

/// Parse a `Z`, `±HH`, `±HHMM` or `±HH:MM` zone designator
pub(crate) fn parse_offset(designator: &str) -> Option<FixedOffset> {
    if designator == "Z" {
        return FixedOffset::east_opt(0);
    }

    let (sign, digits) = match designator.split_at_checked(1)? {
        ("+", rest) => (1, rest),
        ("-", rest) => (-1, rest),
        _ => return None,
    };
    let digits = digits.replacen(':', "", 1);
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = match digits.len() {
        2 => (digits.parse::<i32>().ok()?, 0),
        4 => (digits[..2].parse::<i32>().ok()?, digits[2..].parse::<i32>().ok()?),
        _ => return None,
    };
    if hours > 23 || minutes > 59 {
        return None;
    }
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}
