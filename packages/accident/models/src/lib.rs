#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Accident record, severity, coordinate, and hotspot types.
//!
//! This crate defines the canonical data model shared by the aggregation
//! pipeline, the route-risk engine, and the HTTP API. Raw records coming
//! from CSV files or live user reports are validated into
//! [`AccidentRecord`] values here, and the aggregated [`Hotspot`] shape
//! consumed by every downstream component lives here too.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// A WGS84 coordinate.
///
/// Fields are public so that callers can build coordinates from external
/// data cheaply; anything coming across a trust boundary must go through
/// [`Coordinate::new`] or [`Coordinate::validate`] before use.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `[-90, 90]`.
    pub lat: f64,
    /// Longitude in degrees, `[-180, 180]`.
    pub lng: f64,
}

impl Coordinate {
    /// Creates a validated coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] if either component is non-finite or out
    /// of range.
    pub fn new(lat: f64, lng: f64) -> Result<Self, CoordinateError> {
        let coord = Self { lat, lng };
        coord.validate()?;
        Ok(coord)
    }

    /// Checks that both components are finite and within range.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinateError`] describing the first violation found.
    pub fn validate(&self) -> Result<(), CoordinateError> {
        if !self.lat.is_finite() || !self.lng.is_finite() {
            return Err(CoordinateError::NonFinite {
                lat: self.lat,
                lng: self.lng,
            });
        }
        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(CoordinateError::LatitudeOutOfRange { lat: self.lat });
        }
        if !(-180.0..=180.0).contains(&self.lng) {
            return Err(CoordinateError::LongitudeOutOfRange { lng: self.lng });
        }
        Ok(())
    }

    /// Returns `true` if [`Self::validate`] would succeed.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.lat, self.lng)
    }
}

/// Error returned when a coordinate fails validation.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum CoordinateError {
    /// Latitude or longitude is NaN or infinite.
    #[error("non-finite coordinate ({lat}, {lng})")]
    NonFinite {
        /// The offending latitude.
        lat: f64,
        /// The offending longitude.
        lng: f64,
    },
    /// Latitude outside `[-90, 90]`.
    #[error("latitude {lat} out of range [-90, 90]")]
    LatitudeOutOfRange {
        /// The offending latitude.
        lat: f64,
    },
    /// Longitude outside `[-180, 180]`.
    #[error("longitude {lng} out of range [-180, 180]")]
    LongitudeOutOfRange {
        /// The offending longitude.
        lng: f64,
    },
}

/// Severity of a road accident.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum AccidentSeverity {
    /// At least one person killed.
    Fatal,
    /// Grievous injuries requiring hospitalisation.
    Serious,
    /// Minor injuries or property damage only.
    Minor,
}

impl AccidentSeverity {
    /// Parses a free-form severity label as found in accident datasets.
    ///
    /// Accepts the canonical names plus common synonyms (`killed`,
    /// `grievous`, `slight`, ...), case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::UnknownSeverity`] for anything else.
    pub fn from_label(label: &str) -> Result<Self, RecordError> {
        match label.trim().to_ascii_lowercase().as_str() {
            "fatal" | "killed" | "death" | "fatality" => Ok(Self::Fatal),
            "serious" | "grievous" | "grievous injury" | "major" | "severe" => Ok(Self::Serious),
            "minor" | "slight" | "slight injury" | "non-injury" | "damage only" => {
                Ok(Self::Minor)
            }
            _ => Err(RecordError::UnknownSeverity {
                label: label.to_string(),
            }),
        }
    }

    /// Returns all variants, most severe first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Fatal, Self::Serious, Self::Minor]
    }
}

/// An accident record as supplied by a record source, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAccidentRecord {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Severity label, e.g. `"Fatal"`.
    pub severity: String,
    /// Weather condition at the time of the accident.
    pub weather: String,
    /// Road type (highway, arterial, ...).
    pub road_type: String,
    /// When the accident was reported.
    pub reported_at: DateTime<Utc>,
    /// City label, if the source carries one.
    #[serde(default)]
    pub city: Option<String>,
    /// State label, if the source carries one.
    #[serde(default)]
    pub state: Option<String>,
}

/// A validated, immutable accident record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccidentRecord {
    /// Where the accident happened.
    pub coordinate: Coordinate,
    /// How severe it was.
    pub severity: AccidentSeverity,
    /// Weather condition label.
    pub weather: String,
    /// Road type label.
    pub road_type: String,
    /// When the accident was reported.
    pub reported_at: DateTime<Utc>,
    /// City label, if known.
    pub city: Option<String>,
    /// State label, if known.
    pub state: Option<String>,
}

impl TryFrom<RawAccidentRecord> for AccidentRecord {
    type Error = RecordError;

    fn try_from(raw: RawAccidentRecord) -> Result<Self, Self::Error> {
        let coordinate = Coordinate::new(raw.lat, raw.lng)?;
        let severity = AccidentSeverity::from_label(&raw.severity)?;

        Ok(Self {
            coordinate,
            severity,
            weather: raw.weather.trim().to_string(),
            road_type: raw.road_type.trim().to_string(),
            reported_at: raw.reported_at,
            city: non_empty(raw.city),
            state: non_empty(raw.state),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Error returned when a record cannot be accepted into an aggregate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RecordError {
    /// The record's coordinate is invalid.
    #[error(transparent)]
    Coordinate(#[from] CoordinateError),

    /// The severity label is not recognised.
    #[error("unknown severity label {label:?}")]
    UnknownSeverity {
        /// The label that failed to parse.
        label: String,
    },
}

/// A point reported live by a user (as opposed to a historical dataset).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveReport {
    /// Where the accident was reported.
    pub coordinate: Coordinate,
    /// Reported severity.
    pub severity: AccidentSeverity,
    /// Weather condition, if the reporter supplied one.
    #[serde(default)]
    pub weather: Option<String>,
    /// Road type, if the reporter supplied one.
    #[serde(default)]
    pub road_type: Option<String>,
    /// When the report was submitted.
    pub reported_at: DateTime<Utc>,
}

/// Stable identity that groups records into one hotspot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LocationKey {
    /// A named city/state pair carried on the records.
    Label {
        /// City name.
        city: String,
        /// State name.
        state: String,
    },
    /// A lat/lng grid cell, stored as integer multiples of the cell size.
    Cell {
        /// Latitude cell index.
        lat_index: i64,
        /// Longitude cell index.
        lng_index: i64,
    },
}

impl LocationKey {
    /// Returns the grid cell containing `coordinate` for the given cell size
    /// in degrees.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn cell(coordinate: Coordinate, cell_degrees: f64) -> Self {
        Self::Cell {
            lat_index: (coordinate.lat / cell_degrees).round() as i64,
            lng_index: (coordinate.lng / cell_degrees).round() as i64,
        }
    }
}

/// Where a hotspot came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "camelCase")]
pub enum HotspotProvenance {
    /// Aggregated from a historical record set.
    Historical,
    /// A single live user report.
    Live {
        /// When the report was submitted.
        reported_at: DateTime<Utc>,
    },
}

/// An aggregate of accident records sharing a location identity.
///
/// `total_accidents == fatal_accidents + serious_accidents + minor_accidents`
/// always holds for hotspots produced by the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hotspot {
    /// Grouping identity.
    pub key: LocationKey,
    /// Human-readable label (`"City, State"`), when known.
    pub label: Option<String>,
    /// Centroid latitude of the member records.
    pub lat: f64,
    /// Centroid longitude of the member records.
    pub lng: f64,
    /// Number of member records.
    pub total_accidents: u32,
    /// Fatal records.
    pub fatal_accidents: u32,
    /// Serious records.
    pub serious_accidents: u32,
    /// Minor records.
    pub minor_accidents: u32,
    /// Weather label -> occurrence count.
    pub weather_breakdown: BTreeMap<String, u32>,
    /// Road type label -> occurrence count.
    pub road_type_breakdown: BTreeMap<String, u32>,
    /// Heatmap intensity in `[0, 1]`.
    pub intensity: f64,
    /// Historical aggregate or live report.
    pub provenance: HotspotProvenance,
}

impl Hotspot {
    /// Returns the hotspot's position.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }

    /// Returns the most severe category present in this hotspot.
    #[must_use]
    pub const fn worst_severity(&self) -> Option<AccidentSeverity> {
        if self.fatal_accidents > 0 {
            Some(AccidentSeverity::Fatal)
        } else if self.serious_accidents > 0 {
            Some(AccidentSeverity::Serious)
        } else if self.minor_accidents > 0 {
            Some(AccidentSeverity::Minor)
        } else {
            None
        }
    }

    /// Returns the count for one severity category.
    #[must_use]
    pub const fn count_for(&self, severity: AccidentSeverity) -> u32 {
        match severity {
            AccidentSeverity::Fatal => self.fatal_accidents,
            AccidentSeverity::Serious => self.serious_accidents,
            AccidentSeverity::Minor => self.minor_accidents,
        }
    }
}

/// Criteria for a filtered aggregate.
///
/// Dimensions are ANDed; values within a dimension are ORed; an empty
/// dimension does not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotFilter {
    /// Accepted severities.
    #[serde(default)]
    pub severities: Vec<AccidentSeverity>,
    /// Accepted weather labels (case-insensitive).
    #[serde(default)]
    pub weather_types: Vec<String>,
    /// Accepted road type labels (case-insensitive).
    #[serde(default)]
    pub road_types: Vec<String>,
}

impl HotspotFilter {
    /// Returns `true` if no dimension is constrained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.severities.is_empty() && self.weather_types.is_empty() && self.road_types.is_empty()
    }

    /// Returns `true` if `record` satisfies every constrained dimension.
    #[must_use]
    pub fn matches(&self, record: &AccidentRecord) -> bool {
        (self.severities.is_empty() || self.severities.contains(&record.severity))
            && label_matches(&self.weather_types, &record.weather)
            && label_matches(&self.road_types, &record.road_type)
    }
}

fn label_matches(accepted: &[String], value: &str) -> bool {
    accepted.is_empty() || accepted.iter().any(|a| a.eq_ignore_ascii_case(value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(lat: f64, lng: f64, severity: &str) -> RawAccidentRecord {
        RawAccidentRecord {
            lat,
            lng,
            severity: severity.to_string(),
            weather: "Clear".to_string(),
            road_type: "Highway".to_string(),
            reported_at: DateTime::<Utc>::default(),
            city: Some(" Hyderabad ".to_string()),
            state: Some(String::new()),
        }
    }

    #[test]
    fn coordinate_rejects_non_finite_and_out_of_range() {
        assert!(Coordinate::new(17.4, 78.4).is_ok());
        assert!(matches!(
            Coordinate::new(f64::NAN, 78.4),
            Err(CoordinateError::NonFinite { .. })
        ));
        assert!(matches!(
            Coordinate::new(90.5, 0.0),
            Err(CoordinateError::LatitudeOutOfRange { .. })
        ));
        assert!(matches!(
            Coordinate::new(0.0, -180.1),
            Err(CoordinateError::LongitudeOutOfRange { .. })
        ));
        assert!(Coordinate::new(-90.0, 180.0).is_ok());
    }

    #[test]
    fn severity_labels_parse_case_insensitively() {
        assert_eq!(
            AccidentSeverity::from_label(" FATAL ").unwrap(),
            AccidentSeverity::Fatal
        );
        assert_eq!(
            AccidentSeverity::from_label("Grievous Injury").unwrap(),
            AccidentSeverity::Serious
        );
        assert_eq!(
            AccidentSeverity::from_label("slight").unwrap(),
            AccidentSeverity::Minor
        );
        assert!(AccidentSeverity::from_label("catastrophic").is_err());
        assert_eq!(
            "serious".parse::<AccidentSeverity>().unwrap(),
            AccidentSeverity::Serious
        );
        assert_eq!(AccidentSeverity::Fatal.to_string(), "FATAL");
    }

    #[test]
    fn raw_record_conversion_validates_and_trims() {
        let record = AccidentRecord::try_from(raw(17.4, 78.4, "Minor")).unwrap();
        assert_eq!(record.city.as_deref(), Some("Hyderabad"));
        assert_eq!(record.state, None);

        assert!(matches!(
            AccidentRecord::try_from(raw(f64::INFINITY, 78.4, "Minor")),
            Err(RecordError::Coordinate(_))
        ));
        assert!(matches!(
            AccidentRecord::try_from(raw(17.4, 78.4, "unknown")),
            Err(RecordError::UnknownSeverity { .. })
        ));
    }

    #[test]
    fn filter_ands_dimensions_and_ors_values() {
        let record = AccidentRecord::try_from(raw(17.4, 78.4, "Fatal")).unwrap();

        assert!(HotspotFilter::default().matches(&record));

        let filter = HotspotFilter {
            severities: vec![AccidentSeverity::Serious, AccidentSeverity::Fatal],
            weather_types: vec!["rain".to_string(), "clear".to_string()],
            road_types: Vec::new(),
        };
        assert!(filter.matches(&record));

        let filter = HotspotFilter {
            severities: vec![AccidentSeverity::Fatal],
            weather_types: vec!["Fog".to_string()],
            road_types: Vec::new(),
        };
        assert!(!filter.matches(&record));
    }

    #[test]
    fn location_key_cells_round_to_nearest() {
        let a = LocationKey::cell(Coordinate { lat: 17.401, lng: 78.479 }, 0.01);
        let b = LocationKey::cell(Coordinate { lat: 17.399, lng: 78.481 }, 0.01);
        assert_eq!(a, b);
    }

    #[test]
    fn provenance_serializes_with_source_tag() {
        let json = serde_json::to_value(HotspotProvenance::Historical).unwrap();
        assert_eq!(json, serde_json::json!({ "source": "historical" }));
    }
}
