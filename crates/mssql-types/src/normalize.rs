//! Cell normalization applied before values are written to MariaDB.
//!
//! The command-line clients render `datetime` values verbosely, e.g.
//! `Apr  1 2025 12:00AM`, which MariaDB refuses. Such values are re-rendered
//! in [`CANONICAL_DATETIME_FORMAT`]. Everything else is only stripped of
//! line-breaking control characters and surrounding whitespace.

use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use sync_core::{Cell, Row};
use tracing::warn;

/// MariaDB `DATETIME` literal format.
pub const CANONICAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

static VERBOSE_DATETIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^([A-Za-z]{3})\s+(\d{1,2})\s+(\d{4})\s+(\d{1,2}):(\d{2})(?::(\d{2}))?\s*([AaPp][Mm])$",
    )
    .expect("verbose datetime pattern is valid")
});

/// Whether a trimmed value looks like the clients' verbose datetime rendering.
pub fn is_verbose_datetime(value: &str) -> bool {
    VERBOSE_DATETIME.is_match(value)
}

/// Whether a trimmed value is a datetime in canonical form, optionally with
/// fractional seconds, or a bare `YYYY-MM-DD` date.
pub fn is_canonical_datetime(value: &str) -> bool {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

/// Clean a single cell.
///
/// NUL and CR are removed, LF becomes a space, the result is trimmed and an
/// empty result becomes `None`. Verbose datetimes are converted to the
/// canonical form; if such a value does not denote a real instant it is
/// passed through unchanged and a warning is logged.
pub fn clean(value: Cell) -> Cell {
    let value = value?;

    let cleaned: String = value
        .chars()
        .filter(|c| *c != '\0' && *c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return None;
    }

    if is_verbose_datetime(cleaned) {
        match parse_verbose_datetime(cleaned) {
            Some(datetime) => {
                return Some(datetime.format(CANONICAL_DATETIME_FORMAT).to_string());
            }
            None => warn!("Could not convert datetime '{}', keeping it as is", cleaned),
        }
    }

    Some(cleaned.to_string())
}

/// Clean every cell of a row.
pub fn clean_row(row: Row) -> Row {
    row.into_iter().map(clean).collect()
}

fn parse_verbose_datetime(value: &str) -> Option<NaiveDateTime> {
    let caps = VERBOSE_DATETIME.captures(value)?;

    let date_text = format!("{} {} {}", &caps[1], &caps[2], &caps[3]);
    let date = NaiveDate::parse_from_str(&date_text, "%b %d %Y").ok()?;

    let hour12: u32 = caps[4].parse().ok()?;
    let minute: u32 = caps[5].parse().ok()?;
    let second: u32 = match caps.get(6) {
        Some(s) => s.as_str().parse().ok()?,
        None => 0,
    };
    if !(1..=12).contains(&hour12) {
        return None;
    }

    let pm = caps[7].eq_ignore_ascii_case("pm");
    let hour = match (hour12, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, false) => h,
        (h, true) => h + 12,
    };

    date.and_hms_opt(hour, minute, second)
}
