//! Time handling for scene acquisition dates and compositing intervals.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Parse an ISO 8601 timestamp or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_date(s: &str) -> Result<DateTime<Utc>, TimeParseError> {
    let s = s.trim();

    // Try full datetime with timezone
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // Try without timezone (assume UTC)
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    // Try date only
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(ndt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Utc.from_utc_datetime(&ndt));
        }
    }

    Err(TimeParseError::InvalidFormat(s.to_string()))
}

/// Parse a fixed-width interval such as `14D`, `2W` or `12H`.
///
/// Calendar units (months, years) are rejected because their width varies.
pub fn parse_interval(s: &str) -> Result<Duration, TimeParseError> {
    let s = s.trim();
    let split = s
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| TimeParseError::InvalidInterval(s.to_string()))?;
    let (count, unit) = s.split_at(split);

    let count: i64 = count
        .parse()
        .map_err(|_| TimeParseError::InvalidInterval(s.to_string()))?;
    if count <= 0 {
        return Err(TimeParseError::InvalidInterval(s.to_string()));
    }

    match unit.to_ascii_uppercase().as_str() {
        "H" => Ok(Duration::hours(count)),
        "D" => Ok(Duration::days(count)),
        "W" => Ok(Duration::weeks(count)),
        _ => Err(TimeParseError::UnsupportedUnit(unit.to_string())),
    }
}

/// Day label used in titles and file names.
pub fn date_label(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// A closed time range for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, TimeParseError> {
        if end < start {
            return Err(TimeParseError::InvertedRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(Self { start, end })
    }

    /// Parse a pair of dates, extending a date-only end to the end of that day.
    pub fn from_dates(start: &str, end: &str) -> Result<Self, TimeParseError> {
        let start_dt = parse_date(start)?;
        let mut end_dt = parse_date(end)?;
        if NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d").is_ok() {
            end_dt = end_dt + Duration::days(1) - Duration::seconds(1);
        }
        Self::new(start_dt, end_dt)
    }

    /// Whether `dt` falls inside the range, both ends inclusive.
    pub fn contains(&self, dt: &DateTime<Utc>) -> bool {
        dt >= &self.start && dt <= &self.end
    }

    /// `start/end` interval string as accepted by the STAC `datetime` filter.
    pub fn to_stac_interval(&self) -> String {
        format!(
            "{}/{}",
            self.start.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TimeParseError {
    #[error("Invalid time format: {0}")]
    InvalidFormat(String),

    #[error("Invalid interval '{0}', expected <count><unit> such as 14D")]
    InvalidInterval(String),

    #[error("Unsupported interval unit '{0}', expected H, D or W")]
    UnsupportedUnit(String),

    #[error("Time range end {end} is before start {start}")]
    InvertedRange { start: String, end: String },
}
