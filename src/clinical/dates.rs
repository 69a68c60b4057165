//! Date parsing and elapsed-time arithmetic for clinical records
//!
//! Clinical exports mix `2019-03-04`, `2019_03_04` and `03/04/2019 10:15:00 AM`
//! styles. Strings are normalised (time-of-day dropped, `_` turned into `-`)
//! before the configured formats are tried.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::config::DateFormatConfig;
use crate::error::{FaceAgeError, Result};

/// Unit returned by [`time_between`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    /// Whole days
    Days,
    /// Days divided by 365
    Years,
}

/// Normalise a raw date string: trim, keep the date part, unify separators
#[must_use]
pub fn normalize_date_string(raw: &str) -> String {
    raw.trim()
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .replace('_', "-")
}

/// Parse a date string with every configured format
///
/// Returns `None` for empty strings or when no format matches.
#[must_use]
pub fn parse_date_string(raw: &str, config: &DateFormatConfig) -> Option<NaiveDate> {
    let normalized = normalize_date_string(raw);
    if normalized.is_empty() {
        return None;
    }
    config
        .date_formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&normalized, format).ok())
}

/// Parse a date string, failing with [`FaceAgeError::DateParse`]
pub fn parse_date(raw: &str, config: &DateFormatConfig) -> Result<NaiveDate> {
    parse_date_string(raw, config).ok_or_else(|| FaceAgeError::DateParse(raw.to_string()))
}

/// Absolute time between two dates, in days or fractional years
#[must_use]
pub fn time_between(d1: NaiveDate, d2: NaiveDate, mode: TimeMode) -> f64 {
    let days = (d2 - d1).num_days().abs() as f64;
    match mode {
        TimeMode::Days => days,
        TimeMode::Years => days / 365.0,
    }
}

/// [`time_between`] on raw strings, as the clinical tables store them
pub fn time_between_str(
    d1: &str,
    d2: &str,
    mode: TimeMode,
    config: &DateFormatConfig,
) -> Result<f64> {
    Ok(time_between(parse_date(d1, config)?, parse_date(d2, config)?, mode))
}
