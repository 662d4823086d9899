//! CSV row shape and field parsing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use saferoute_accident_models::RawAccidentRecord;
use serde::Deserialize;

/// One row of an accident CSV.
///
/// Expected headers: `lat,lng,severity,weather,road_type,reported_at`,
/// optionally followed by `city,state`.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvRow {
    pub lat: f64,
    pub lng: f64,
    pub severity: String,
    #[serde(default)]
    pub weather: String,
    #[serde(default)]
    pub road_type: String,
    pub reported_at: String,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
}

impl CsvRow {
    /// Converts the row into a raw record, parsing the timestamp.
    ///
    /// Returns `None` if `reported_at` is not a recognised timestamp.
    #[must_use]
    pub fn into_raw(self) -> Option<RawAccidentRecord> {
        let reported_at = parse_timestamp(&self.reported_at)?;
        Some(RawAccidentRecord {
            lat: self.lat,
            lng: self.lng,
            severity: self.severity,
            weather: self.weather,
            road_type: self.road_type,
            reported_at,
            city: self.city,
            state: self.state,
        })
    }
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date (midnight
/// UTC).
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
