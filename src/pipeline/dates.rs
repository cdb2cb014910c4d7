//! Date normalisation for `issue_date` / `due_date`.
//!
//! The prompt asks for `YYYY-MM-DD`, and most replies comply. The rest are
//! usually the day-first forms printed on Colombian invoices. Those are
//! rewritten when they name a real calendar date; everything else is left
//! for the caller to keep verbatim.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Result of looking at one date string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateOutcome {
    /// Already a valid `YYYY-MM-DD` date.
    Iso,
    /// A recognised form, rewritten to `YYYY-MM-DD`.
    Rewritten(String),
    /// Not a recognisable calendar date.
    Unrecognised,
}

static ISO: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})-(\d{1,2})-(\d{1,2})$").expect("valid regex"));

static DAY_FIRST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})$").expect("valid regex"));

static YEAR_FIRST_SLASH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})/(\d{1,2})/(\d{1,2})$").expect("valid regex"));

/// Classify `value` and, where possible, produce its ISO form.
pub fn normalize_date(value: &str) -> DateOutcome {
    let value = value.trim();

    if let Some(c) = ISO.captures(value) {
        return match to_date(&c[1], &c[2], &c[3]) {
            Some(date) => {
                let iso = date.format("%Y-%m-%d").to_string();
                if iso == value {
                    DateOutcome::Iso
                } else {
                    DateOutcome::Rewritten(iso)
                }
            }
            None => DateOutcome::Unrecognised,
        };
    }

    let parsed = if let Some(c) = DAY_FIRST.captures(value) {
        to_date(&c[3], &c[2], &c[1])
    } else if let Some(c) = YEAR_FIRST_SLASH.captures(value) {
        to_date(&c[1], &c[2], &c[3])
    } else {
        None
    };

    match parsed {
        Some(date) => DateOutcome::Rewritten(date.format("%Y-%m-%d").to_string()),
        None => DateOutcome::Unrecognised,
    }
}

fn to_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}
