#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Place search for SafeRoute.
//!
//! Answers "candidate places for this partial query" from three layers:
//!
//! 1. **Gazetteer** ([`gazetteer`]): a curated list of Indian places
//!    embedded at compile time and scored with a fuzzy matcher.
//! 2. **API cache** ([`cache`]): previously fetched remote results, bounded
//!    by entry count and time-to-live.
//! 3. **Remote geocoder** ([`nominatim`]): Nominatim / `OpenStreetMap`,
//!    configured via the [`service_registry`]. Treated as unreliable: every
//!    failure falls back to local results.
//!
//! [`search::GeoSearch`] runs the lookup state machine and
//! [`search::SearchSession`] discards results of superseded queries.

pub mod cache;
pub mod gazetteer;
pub mod merge;
pub mod nominatim;
pub mod retry;
pub mod search;
pub mod service_registry;

use std::sync::LazyLock;

use regex::Regex;
use saferoute_accident_models::Coordinate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use cache::ApiCache;
pub use gazetteer::Gazetteer;
pub use merge::merge_results;
pub use search::{GeoSearch, RemoteGeocoder, SearchSession};

/// Queries shorter than this (after trimming) never match anything.
pub const MIN_QUERY_CHARS: usize = 2;

/// Where a candidate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CandidateSource {
    /// The embedded gazetteer.
    Local,
    /// The remote geocoder (possibly via the cache).
    Remote,
    /// The query itself was a coordinate pair.
    Coordinate,
}

/// A place offered for a search query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceCandidate {
    /// Provider place identifier. Gazetteer entries use `1_000_000 + index`.
    pub place_id: u64,
    /// Short name.
    pub name: String,
    /// Full comma-separated display name.
    pub display_name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Place type (`"city"`, `"attraction"`, `"village"`, ...).
    pub kind: String,
    /// Provider importance in `[0, 1]`.
    pub importance: f64,
    /// State, if known.
    #[serde(default)]
    pub state: Option<String>,
    /// Country, if known.
    #[serde(default)]
    pub country: Option<String>,
    /// Origin of the candidate.
    pub source: CandidateSource,
}

impl PlaceCandidate {
    /// Position of the place.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate {
            lat: self.lat,
            lng: self.lng,
        }
    }

    /// Identity used to detect the same place from two sources: the
    /// coordinate rounded to 0.01 degrees (roughly 1 km).
    ///
    /// Two places either side of a rounding boundary get different keys,
    /// and longitude wraparound at ±180° is not considered.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn dedupe_key(&self) -> (i64, i64) {
        (
            (self.lat * 100.0).round() as i64,
            (self.lng * 100.0).round() as i64,
        )
    }
}

/// Errors from remote geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("Geocoder returned HTTP {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The request did not finish in time.
    #[error("Geocoder timed out after {millis} ms")]
    Timeout {
        /// The deadline that elapsed.
        millis: u64,
    },
}

/// A display name split for two-line rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayName {
    /// First comma-separated part.
    pub primary: String,
    /// Up to three following parts, comma-joined.
    pub secondary: String,
}

/// Splits `"Charminar, Hyderabad, Telangana, 500002, India"` into
/// `"Charminar"` and `"Hyderabad, Telangana, 500002"`.
#[must_use]
pub fn format_display_name(display_name: &str) -> DisplayName {
    let parts: Vec<&str> = display_name
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    match parts.split_first() {
        None => DisplayName {
            primary: "Unknown Location".to_string(),
            secondary: String::new(),
        },
        Some((first, rest)) => DisplayName {
            primary: (*first).to_string(),
            secondary: rest.iter().take(3).copied().collect::<Vec<_>>().join(", "),
        },
    }
}

static COORDINATE_QUERY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-?\d+\.?\d*)\s*,\s*(-?\d+\.?\d*)$").unwrap_or_else(|_| unreachable!())
});

/// Parses a `"lat, lng"` query. Returns `None` unless the query has that
/// exact shape and both numbers are in range.
#[must_use]
pub fn parse_coordinate_query(query: &str) -> Option<Coordinate> {
    let caps = COORDINATE_QUERY.captures(query.trim())?;
    let lat = caps[1].parse::<f64>().ok()?;
    let lng = caps[2].parse::<f64>().ok()?;
    Coordinate::new(lat, lng).ok()
}

/// Candidate for a coordinate query.
#[must_use]
pub fn coordinate_candidate(coordinate: Coordinate) -> PlaceCandidate {
    let label = coordinate.to_string();
    PlaceCandidate {
        place_id: 0,
        name: label.clone(),
        display_name: label,
        lat: coordinate.lat,
        lng: coordinate.lng,
        kind: "coordinate".to_string(),
        importance: 1.0,
        state: None,
        country: None,
        source: CandidateSource::Coordinate,
    }
}

/// Normalises a query for matching and cache keys: trimmed and lower-cased.
#[must_use]
pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}
