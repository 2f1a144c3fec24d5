pub mod blog;
pub mod bookings;
pub mod contact;
pub mod dashboard;
pub mod experiences;
pub mod instagram;
pub mod payment_events;
pub mod rate_limits;
pub mod testimonials;
pub mod users;

use chrono::{NaiveDate, NaiveDateTime, Utc};

pub(crate) const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

pub(crate) fn now_ts() -> String {
    Utc::now().naive_utc().format(TS_FORMAT).to_string()
}

pub(crate) fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub(crate) fn parse_ts(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).unwrap_or_else(|_| Utc::now().naive_utc())
}

pub(crate) fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

pub(crate) fn parse_date(s: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Maps an unknown enum value stored in column `idx` to a conversion error.
pub(crate) fn known<T>(idx: usize, raw: &str, parsed: Option<T>) -> rusqlite::Result<T> {
    parsed.ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unknown value {raw:?}").into(),
        )
    })
}

pub(crate) fn today() -> String {
    Utc::now().date_naive().format(DATE_FORMAT).to_string()
}

pub(crate) fn to_json_list(items: &[String]) -> anyhow::Result<String> {
    Ok(serde_json::to_string(items)?)
}

pub(crate) fn from_json_list(s: &str) -> Vec<String> {
    serde_json::from_str(s).unwrap_or_default()
}

/// Slug and email columns are UNIQUE; callers turn this into a 400.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
