//! Accessor view over the opaque raw-content document attached to each ad.
//!
//! The remote library returns ad records as free-form JSON. The sync core only
//! ever cares about two facts buried in that document — whether the ad is
//! still running, and when it started — so the parsing (and the fallback
//! behavior when parsing fails) is centralized here rather than duplicated at
//! every call site.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

/// An ad whose content cannot be parsed is treated as still active. Losing
/// track of a live ad is worse than keeping a dead one around for one more
/// reconciliation pass.
pub const DEFAULT_ACTIVE_ON_PARSE_ERROR: bool = true;

/// An ad whose content yields no usable start time is dated by its local
/// ingestion time instead.
pub const FALLBACK_TO_CREATED_AT_ON_DATE_PARSE_ERROR: bool = true;

/// Borrowed view over one ad's raw-content document.
#[derive(Debug, Clone, Copy)]
pub struct AdContent<'a> {
    doc: &'a Value,
}

impl<'a> AdContent<'a> {
    #[must_use]
    pub fn new(doc: &'a Value) -> Self {
        Self { doc }
    }

    /// The remote active flag, if the document carries one.
    ///
    /// Both spellings seen in the wild are accepted: `is_active` and
    /// `isActive`.
    #[must_use]
    pub fn active_flag(&self) -> Option<bool> {
        self.doc
            .get("is_active")
            .or_else(|| self.doc.get("isActive"))
            .and_then(Value::as_bool)
    }

    /// The active flag with the fail-open policy applied: a missing or
    /// unparseable flag counts as active.
    #[must_use]
    pub fn is_active_or_default(&self) -> bool {
        self.active_flag().unwrap_or(DEFAULT_ACTIVE_ON_PARSE_ERROR)
    }

    /// The remote start timestamp, if one can be parsed.
    ///
    /// `start_date` is checked first (epoch seconds as a number, or a string
    /// holding epoch seconds / RFC 3339 / `YYYY-MM-DD`), then
    /// `start_date_string`.
    #[must_use]
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.doc
            .get("start_date")
            .and_then(parse_timestamp)
            .or_else(|| self.doc.get("start_date_string").and_then(parse_timestamp))
    }

    /// The remote end timestamp, if one can be parsed.
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.doc
            .get("end_date")
            .and_then(parse_timestamp)
            .or_else(|| self.doc.get("end_date_string").and_then(parse_timestamp))
    }

    /// The date used to order this ad against a sync boundary: the remote
    /// start time when parseable, else `created_at` (the fail-closed policy).
    #[must_use]
    pub fn effective_date(&self, created_at: DateTime<Utc>) -> DateTime<Utc> {
        self.start_time().unwrap_or(created_at)
    }
}

/// Returns a copy of `doc` with the active flag set to `active`.
///
/// Updates whichever spelling the document already uses; documents carrying
/// neither spelling (or that are not objects) gain an `is_active` key.
#[must_use]
pub fn with_active_flag(doc: &Value, active: bool) -> Value {
    let mut out = doc.clone();
    match out.as_object_mut() {
        Some(map) => {
            if map.contains_key("isActive") && !map.contains_key("is_active") {
                map.insert("isActive".to_string(), Value::Bool(active));
            } else {
                map.insert("is_active".to_string(), Value::Bool(active));
            }
            out
        }
        None => serde_json::json!({ "is_active": active }),
    }
}

/// Parse a JSON value into a UTC timestamp.
///
/// Numbers are epoch seconds. Strings may hold epoch seconds, an RFC 3339
/// datetime, or a bare `YYYY-MM-DD` date (interpreted as midnight UTC).
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => DateTime::from_timestamp(n.as_i64()?, 0),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(secs) = s.parse::<i64>() {
                return DateTime::from_timestamp(secs, 0);
            }
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|ndt| ndt.and_utc())
        }
        _ => None,
    }
}
