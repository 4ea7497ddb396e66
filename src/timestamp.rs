//! Timestamp text format shared by Rust code and the SQL defaults.
//!
//! Every `DATETIME` column holds UTC text with millisecond precision,
//! `YYYY-MM-DD HH:MM:SS.sss`, so lexical order equals time order. That only
//! holds for four-digit years, hence [`MIN_YEAR`]..=[`MAX_YEAR`].

use crate::{Error, Result};
use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Utc};

pub const MIN_YEAR: i32 = 1000;
pub const MAX_YEAR: i32 = 9999;

/// strftime pattern used by Rust when binding timestamps
pub const FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// SQL expression producing the current time in [`FORMAT`]
pub const SQL_NOW: &str = "strftime('%Y-%m-%d %H:%M:%f', 'now')";

/// Format a timestamp for storage
pub fn format(ts: &DateTime<Utc>) -> String {
    ts.format(FORMAT).to_string()
}

/// Whether `ts` falls in 1000-01-01 ..= 9999-12-31 23:59:59.999
pub fn in_range(ts: &DateTime<Utc>) -> bool {
    (MIN_YEAR..=MAX_YEAR).contains(&ts.year())
}

/// Parse a stored timestamp. Accepts the storage format, with or without
/// fractional seconds, and RFC 3339 input from users.
pub fn parse(s: &str) -> Result<DateTime<Utc>> {
    let trimmed = s.trim();
    let parsed = match DateTime::parse_from_rfc3339(trimmed) {
        Ok(dt) => dt.with_timezone(&Utc),
        Err(_) => NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f")
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f"))
            .map(|naive| Utc.from_utc_datetime(&naive))
            .map_err(|e| Error::Timestamp(format!("{trimmed}: {e}")))?,
    };
    if !in_range(&parsed) {
        return Err(Error::Timestamp(format!(
            "{trimmed}: year must be between {MIN_YEAR} and {MAX_YEAR}"
        )));
    }
    Ok(parsed)
}

/// Current time truncated to storage precision
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

/// Drop sub-millisecond precision so a value survives a storage round trip
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    let millis = ts.timestamp_millis();
    Utc.timestamp_millis_opt(millis).single().unwrap_or(ts)
}
