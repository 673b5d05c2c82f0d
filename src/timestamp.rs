use chrono::{DateTime, NaiveDateTime};

const SECONDS_PER_MINUTE: i64 = 60;
const MINUTE_FORMAT: &str = "%Y-%m-%d %H:%M";
const REPORT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("Malformed timestamp {value:?}, expected YYYY-MM-DD HH:MM:SS")]
    Malformed { value: String },
}

/// Turns an event timestamp like `2018-12-26 18:11:08.509654` into whole
/// minutes since the Unix epoch.
///
/// Everything after the last `:` (seconds, fractions, zone suffixes) is
/// dropped, so events are bucketed by the minute they happened in. Times are
/// read as naive wall-clock times, no timezone conversion happens.
pub fn parse_event_minute(value: &str) -> Result<i64, TimestampError> {
    let malformed = || TimestampError::Malformed {
        value: value.to_string(),
    };

    let trimmed = value.trim();
    let cut = trimmed.rfind(':').ok_or_else(malformed)?;
    let parsed =
        NaiveDateTime::parse_from_str(&trimmed[..cut], MINUTE_FORMAT).map_err(|_| malformed())?;

    Ok(parsed
        .and_utc()
        .timestamp()
        .div_euclid(SECONDS_PER_MINUTE))
}

/// Formats a minute since the epoch as `YYYY-MM-DD HH:MM:SS`.
pub fn format_minute(minute: i64) -> String {
    minute
        .checked_mul(SECONDS_PER_MINUTE)
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
        .map(|date| date.naive_utc().format(REPORT_FORMAT).to_string())
        .unwrap_or_else(|| format!("{minute}"))
}
