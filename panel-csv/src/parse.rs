//! Field-level parsing shared by every source.

use std::fmt;

use chrono::NaiveDateTime;
use panel_core::{EntityKey, MISSING_ID, TIMESTAMP_FORMAT};

/// Why a source row could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    Timestamp(String),
    Identifier(String),
    ItemCode(String),
}

impl fmt::Display for RowIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowIssue::Timestamp(raw) => write!(f, "unparsable charttime {raw:?}"),
            RowIssue::Identifier(raw) => write!(f, "unparsable identifier {raw:?}"),
            RowIssue::ItemCode(raw) => write!(f, "unparsable itemid {raw:?}"),
        }
    }
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, RowIssue> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
        .map_err(|_| RowIssue::Timestamp(raw.to_string()))
}

/// Numeric value; anything unparsable or non-finite reads as "no value".
pub fn parse_value(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_item_code(raw: &str) -> Result<i64, RowIssue> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| RowIssue::ItemCode(raw.to_string()))
}

// `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
const I64_LOWER: f64 = i64::MIN as f64;
const I64_UPPER: f64 = i64::MAX as f64;

/// Identifier column; blanks and `nan` map to [`MISSING_ID`], `12.0` reads as 12.
pub fn parse_id(raw: &str) -> Result<i64, RowIssue> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return Ok(MISSING_ID);
    }
    if let Ok(id) = trimmed.parse::<i64>() {
        return Ok(id);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && (I64_LOWER..I64_UPPER).contains(&value) => {
            Ok(value as i64)
        }
        _ => Err(RowIssue::Identifier(raw.to_string())),
    }
}

pub fn parse_key(subject_id: &str, hadm_id: &str, icustay_id: &str) -> Result<EntityKey, RowIssue> {
    Ok(EntityKey::new(
        parse_id(subject_id)?,
        parse_id(hadm_id)?,
        parse_id(icustay_id)?,
    ))
}
