//! Column <-> Rust type conversions shared by every `store::*` module.
//!
//! Dates are stored as ISO-8601 text (`spec.md` §6); decoding accepts both
//! `YYYY-MM-DD` and `YYYY-MM-DD HH:MM:SS` forms and truncates the latter,
//! mirroring `database.py::_parse_date`'s tolerance for datetime-shaped
//! date columns.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};

pub(super) fn date_to_text(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub(super) fn text_to_date(text: &str) -> Result<NaiveDate> {
    let date_part = text.split(' ').next().unwrap_or(text);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .with_context(|| format!("parse date column {text:?}"))
}

pub(super) fn datetime_to_text(dt: NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

pub(super) fn text_to_datetime(text: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d").map(|d| d.and_hms_opt(0, 0, 0).unwrap()))
        .with_context(|| format!("parse datetime column {text:?}"))
}

pub(super) fn weekday_mask_to_json(mask: &[u8]) -> String {
    serde_json::to_string(mask).expect("Vec<u8> always serializes")
}

pub(super) fn weekday_mask_from_json(text: &str) -> Result<Vec<u8>> {
    Ok(serde_json::from_str(text)?)
}

pub(super) fn hours_to_json(hours: &[u32]) -> String {
    serde_json::to_string(hours).expect("Vec<u32> always serializes")
}

pub(super) fn hours_from_json(text: &str) -> Result<Vec<u32>> {
    Ok(serde_json::from_str(text)?)
}
