//! Extraction of the `YYYY-MM-DD` date embedded in storage object keys.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use thiserror::Error;

static DATE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]{4}-[0-9]{2}-[0-9]{2}").expect("date pattern compiles"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum KeyError {
    #[error("no YYYY-MM-DD date in key {0:?}")] NoDate(String),
    #[error("key {key:?} carries more than one date ({first} and {second})")] AmbiguousDate { key: String, first: String, second: String },
    #[error("key {key:?} contains {raw:?} which is not a calendar date")] InvalidDate { key: String, raw: String },
}

/// Return the single date embedded in `key`. Digit runs longer than a date
/// (`12021-01-01`) are not dates; the same date repeated twice is accepted.
pub fn extract_date(key: &str) -> Result<NaiveDate, KeyError> {
    let bytes = key.as_bytes();
    let mut found: Option<&str> = None;
    for m in DATE_PATTERN.find_iter(key) {
        let digit_before = m.start() > 0 && bytes[m.start() - 1].is_ascii_digit();
        let digit_after = bytes.get(m.end()).is_some_and(|b| b.is_ascii_digit());
        if digit_before || digit_after { continue; }
        match found {
            None => found = Some(m.as_str()),
            Some(prev) if prev == m.as_str() => {}
            Some(prev) => return Err(KeyError::AmbiguousDate { key: key.into(), first: prev.into(), second: m.as_str().into() }),
        }
    }
    let raw = found.ok_or_else(|| KeyError::NoDate(key.into()))?;
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| KeyError::InvalidDate { key: key.into(), raw: raw.into() })
}

/// An object key together with the date parsed out of it.
///
/// Ordering is by date first and by key second, so among keys sharing a date
/// the lexicographically greatest key ranks highest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatedKey {
    pub key: String,
    pub date: NaiveDate,
}

impl DatedKey {
    pub fn parse(key: impl Into<String>) -> Result<Self, KeyError> {
        let key = key.into();
        let date = extract_date(&key)?;
        Ok(Self { key, date })
    }
}

impl Ord for DatedKey {
    fn cmp(&self, other: &Self) -> Ordering { self.date.cmp(&other.date).then_with(|| self.key.cmp(&other.key)) }
}

impl PartialOrd for DatedKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
