#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the SafeRoute server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the engine types so the API contract can evolve independently, and
//! they carry the presentation strings (`"12.4 km"`, `"28 min"`) the map
//! client displays verbatim.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use saferoute_accident_models::{
    AccidentSeverity, Coordinate, Hotspot, HotspotFilter, HotspotProvenance, LiveReport,
    RecordError,
};
use saferoute_geocoder::search::{Resolution, SearchOutcome};
use saferoute_geocoder::{CandidateSource, PlaceCandidate, format_display_name};
use saferoute_hotspot::stats::HotspotStats;
use saferoute_risk_models::{AdvisoryStep, AssessedRoute, RoutePlan, RouteSegment};
use saferoute_routing::ManeuverIcon;
use serde::{Deserialize, Serialize};

/// Formats a distance in meters: `"12.4 km"` from 1 km up, else `"850 m"`.
#[must_use]
pub fn format_distance(meters: f64) -> String {
    if meters >= 1000.0 {
        format!("{:.1} km", meters / 1000.0)
    } else {
        format!("{:.0} m", meters.max(0.0))
    }
}

/// Formats a duration in seconds: `"1h 5m"` from one hour up, else
/// `"28 min"`. Rounds to the nearest minute first.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn format_duration(seconds: f64) -> String {
    let total_minutes = (seconds.max(0.0) / 60.0).round() as u64;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes} min")
    }
}

/// Parses `"lat,lng"`.
#[must_use]
pub fn parse_lat_lng(value: &str) -> Option<Coordinate> {
    let (lat, lng) = value.split_once(',')?;
    Coordinate::new(lat.trim().parse().ok()?, lng.trim().parse().ok()?).ok()
}

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Current hotspot generation number.
    pub hotspot_generation: u64,
    /// Number of hotspots in the current generation.
    pub hotspot_count: usize,
    /// Whether place search can reach a remote geocoder.
    pub remote_search: bool,
}

/// Query parameters for the hotspots endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotQueryParams {
    /// Comma-separated severities to include (`fatal,serious`).
    pub severities: Option<String>,
    /// Comma-separated weather labels to include.
    pub weather: Option<String>,
    /// Comma-separated road types to include.
    pub road_types: Option<String>,
}

impl HotspotQueryParams {
    /// Builds the record filter.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for an unknown severity label.
    pub fn to_filter(&self) -> Result<HotspotFilter, RecordError> {
        Ok(HotspotFilter {
            severities: split_list(self.severities.as_deref())
                .map(AccidentSeverity::from_label)
                .collect::<Result<_, _>>()?,
            weather_types: split_list(self.weather.as_deref())
                .map(String::from)
                .collect(),
            road_types: split_list(self.road_types.as_deref())
                .map(String::from)
                .collect(),
        })
    }
}

fn split_list(value: Option<&str>) -> impl Iterator<Item = &str> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// A hotspot as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHotspot {
    /// Display label, if the hotspot has one.
    pub label: Option<String>,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Total accidents.
    pub total_accidents: u32,
    /// Fatal accidents.
    pub fatal_accidents: u32,
    /// Serious accidents.
    pub serious_accidents: u32,
    /// Minor accidents.
    pub minor_accidents: u32,
    /// Accidents per weather condition.
    pub weather_breakdown: BTreeMap<String, u32>,
    /// Accidents per road type.
    pub road_type_breakdown: BTreeMap<String, u32>,
    /// Heat-map weight in `[0, 1]`.
    pub intensity: f64,
    /// Most severe category present.
    pub worst_severity: Option<AccidentSeverity>,
    /// Historical or live.
    pub provenance: HotspotProvenance,
}

impl From<&Hotspot> for ApiHotspot {
    fn from(hotspot: &Hotspot) -> Self {
        Self {
            label: hotspot.label.clone(),
            lat: hotspot.lat,
            lng: hotspot.lng,
            total_accidents: hotspot.total_accidents,
            fatal_accidents: hotspot.fatal_accidents,
            serious_accidents: hotspot.serious_accidents,
            minor_accidents: hotspot.minor_accidents,
            weather_breakdown: hotspot.weather_breakdown.clone(),
            road_type_breakdown: hotspot.road_type_breakdown.clone(),
            intensity: hotspot.intensity,
            worst_severity: hotspot.worst_severity(),
            provenance: hotspot.provenance.clone(),
        }
    }
}

/// Response from the hotspots endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHotspotsResponse {
    /// Generation the hotspots were computed from.
    pub generation: u64,
    /// Hotspots, most dangerous first.
    pub hotspots: Vec<ApiHotspot>,
}

/// Response from the stats endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStats {
    /// Generation the statistics were computed from.
    pub generation: u64,
    /// Historical records dropped during aggregation.
    pub excluded_records: usize,
    /// The statistics.
    #[serde(flatten)]
    pub stats: HotspotStats,
}

/// Body of a live accident report.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRequest {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Severity label.
    pub severity: String,
    /// Weather condition.
    #[serde(default)]
    pub weather: Option<String>,
    /// Road type.
    #[serde(default)]
    pub road_type: Option<String>,
}

impl ReportRequest {
    /// Validates the request into a live report stamped `reported_at`.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError`] for an invalid coordinate or unknown
    /// severity.
    pub fn into_live_report(self, reported_at: DateTime<Utc>) -> Result<LiveReport, RecordError> {
        let coordinate = Coordinate::new(self.lat, self.lng)?;
        let severity = AccidentSeverity::from_label(&self.severity)?;
        Ok(LiveReport {
            coordinate,
            severity,
            weather: self.weather.filter(|w| !w.trim().is_empty()),
            road_type: self.road_type.filter(|r| !r.trim().is_empty()),
            reported_at,
        })
    }
}

/// Response to an accepted report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    /// Generation that includes the report.
    pub generation: u64,
    /// Hotspot count in that generation.
    pub hotspot_count: usize,
}

/// Query parameters for the routes endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteQueryParams {
    /// Start as `"lat,lng"`.
    pub from: String,
    /// Destination as `"lat,lng"`.
    pub to: String,
}

/// A contiguous run of route coordinates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSegment {
    /// `[lat, lng]` pairs.
    pub coordinates: Vec<[f64; 2]>,
    /// Whether the run is near a hotspot.
    pub is_danger: bool,
}

impl From<&RouteSegment> for ApiSegment {
    fn from(segment: &RouteSegment) -> Self {
        Self {
            coordinates: lat_lng_pairs(&segment.coords),
            is_danger: segment.is_danger,
        }
    }
}

fn lat_lng_pairs(coordinates: &[Coordinate]) -> Vec<[f64; 2]> {
    coordinates.iter().map(|c| [c.lat, c.lng]).collect()
}

/// A scored route.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoute {
    /// Position in the provider's answer.
    pub index: usize,
    /// Whether this is the recommended route.
    pub is_safest: bool,
    /// Length in meters.
    pub distance_meters: f64,
    /// Travel time in seconds.
    pub duration_seconds: f64,
    /// Formatted length.
    pub distance: String,
    /// Formatted travel time.
    pub duration: String,
    /// Risk score in `[10, 95]`.
    pub risk_score: f64,
    /// Reasons behind the score.
    pub risk_factors: Vec<String>,
    /// Hotspots near the route.
    pub nearby_hotspots: Vec<ApiHotspot>,
    /// Full geometry as `[lat, lng]` pairs.
    pub coordinates: Vec<[f64; 2]>,
    /// Danger/safe partition of the geometry.
    pub segments: Vec<ApiSegment>,
}

impl ApiRoute {
    /// Converts route `index` of a plan.
    #[must_use]
    pub fn new(index: usize, route: &AssessedRoute, is_safest: bool) -> Self {
        let candidate = &route.route;
        let assessment = &route.assessment;
        Self {
            index,
            is_safest,
            distance_meters: candidate.distance_meters,
            duration_seconds: candidate.duration_seconds,
            distance: format_distance(candidate.distance_meters),
            duration: format_duration(candidate.duration_seconds),
            risk_score: assessment.risk_score,
            risk_factors: assessment.risk_factors.clone(),
            nearby_hotspots: assessment.nearby_hotspots.iter().map(ApiHotspot::from).collect(),
            coordinates: lat_lng_pairs(&candidate.geometry.coordinates),
            segments: assessment.segments.iter().map(ApiSegment::from).collect(),
        }
    }
}

/// A navigation step with an optional hotspot caution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiAdvisory {
    /// Instruction text.
    pub instruction: String,
    /// Street the step follows.
    pub street_name: String,
    /// Formatted step length.
    pub distance: String,
    /// Formatted step time.
    pub duration: String,
    /// Direction symbol.
    pub icon: ManeuverIcon,
    /// `[lat, lng]` of the maneuver.
    pub location: [f64; 2],
    /// Whether a hotspot is close to the maneuver.
    pub caution: bool,
    /// Recommended speed near the hotspot.
    pub recommended_speed_kmh: Option<u32>,
    /// Nearest-hotspot summary.
    pub hotspot_summary: Option<String>,
}

impl From<&AdvisoryStep> for ApiAdvisory {
    fn from(advisory: &AdvisoryStep) -> Self {
        let step = &advisory.step;
        Self {
            instruction: step.instruction.clone(),
            street_name: step.street_name.clone(),
            distance: format_distance(step.distance_meters),
            duration: format_duration(step.duration_seconds),
            icon: ManeuverIcon::for_maneuver(&step.maneuver_type, step.modifier.as_deref()),
            location: [step.location.lat, step.location.lng],
            caution: advisory.caution.is_some(),
            recommended_speed_kmh: advisory.caution.as_ref().map(|c| c.recommended_speed_kmh),
            hotspot_summary: advisory.caution.as_ref().map(|c| c.summary.clone()),
        }
    }
}

/// Response from the routes endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRoutesResponse {
    /// Hotspot generation the routes were scored against.
    pub generation: u64,
    /// Scored routes in provider order.
    pub routes: Vec<ApiRoute>,
    /// Index of the recommended route.
    pub safest_index: Option<usize>,
    /// Steps of the recommended route.
    pub advisories: Vec<ApiAdvisory>,
    /// Provider routes dropped for invalid geometry.
    pub rejected_routes: usize,
}

impl ApiRoutesResponse {
    /// Converts a route plan.
    #[must_use]
    pub fn new(generation: u64, plan: &RoutePlan) -> Self {
        Self {
            generation,
            routes: plan
                .routes
                .iter()
                .enumerate()
                .map(|(i, route)| ApiRoute::new(i, route, plan.safest_index == Some(i)))
                .collect(),
            safest_index: plan.safest_index,
            advisories: plan.advisories.iter().map(ApiAdvisory::from).collect(),
            rejected_routes: plan.rejected_routes,
        }
    }
}

/// Query parameters for the search endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchQueryParams {
    /// Search text.
    pub q: String,
}

/// A place as returned by the API.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPlace {
    /// Provider place identifier.
    pub place_id: u64,
    /// Short name.
    pub name: String,
    /// Full display name.
    pub display_name: String,
    /// First line for two-line display.
    pub primary: String,
    /// Second line for two-line display.
    pub secondary: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Place type.
    pub kind: String,
    /// Where the candidate came from.
    pub source: CandidateSource,
}

impl From<&PlaceCandidate> for ApiPlace {
    fn from(candidate: &PlaceCandidate) -> Self {
        let display = format_display_name(&candidate.display_name);
        Self {
            place_id: candidate.place_id,
            name: candidate.name.clone(),
            display_name: candidate.display_name.clone(),
            primary: display.primary,
            secondary: display.secondary,
            lat: candidate.lat,
            lng: candidate.lng,
            kind: candidate.kind.clone(),
            source: candidate.source,
        }
    }
}

/// Response from the search endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSearchResponse {
    /// The query as given.
    pub query: String,
    /// Layer that answered.
    pub resolution: Resolution,
    /// Ranked places.
    pub results: Vec<ApiPlace>,
}

impl From<&SearchOutcome> for ApiSearchResponse {
    fn from(outcome: &SearchOutcome) -> Self {
        Self {
            query: outcome.query.clone(),
            resolution: outcome.resolution,
            results: outcome.candidates.iter().map(ApiPlace::from).collect(),
        }
    }
}

/// Query parameters for the reverse geocoding endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ReverseQueryParams {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
}

/// Response from the reverse geocoding endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReverse {
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Place name, or the formatted coordinate if none is known.
    pub display_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distances_format_by_magnitude() {
        assert_eq!(format_distance(12_400.0), "12.4 km");
        assert_eq!(format_distance(1000.0), "1.0 km");
        assert_eq!(format_distance(850.4), "850 m");
        assert_eq!(format_distance(0.0), "0 m");
    }

    #[test]
    fn durations_format_by_magnitude() {
        assert_eq!(format_duration(1680.0), "28 min");
        assert_eq!(format_duration(3900.0), "1h 5m");
        assert_eq!(format_duration(3599.0), "1h 0m");
        assert_eq!(format_duration(20.0), "0 min");
    }

    #[test]
    fn lat_lng_parameter_parses() {
        let c = parse_lat_lng("17.385, 78.4867").unwrap();
        assert!((c.lat - 17.385).abs() < 1e-9);
        assert!(parse_lat_lng("17.385").is_none());
        assert!(parse_lat_lng("91,0").is_none());
        assert!(parse_lat_lng("a,b").is_none());
    }

    #[test]
    fn hotspot_params_build_filter() {
        let params = HotspotQueryParams {
            severities: Some("fatal, Serious".to_string()),
            weather: Some("Rain,,Fog".to_string()),
            road_types: None,
        };
        let filter = params.to_filter().unwrap();
        assert_eq!(
            filter.severities,
            vec![AccidentSeverity::Fatal, AccidentSeverity::Serious]
        );
        assert_eq!(filter.weather_types, vec!["Rain", "Fog"]);
        assert!(filter.road_types.is_empty());
        assert!(HotspotQueryParams::default().to_filter().unwrap().is_empty());
    }

    #[test]
    fn unknown_severity_rejects_the_filter() {
        let params = HotspotQueryParams {
            severities: Some("fatal,bogus".to_string()),
            ..HotspotQueryParams::default()
        };
        assert!(params.to_filter().is_err());
    }

    #[test]
    fn report_request_validates() {
        let now = Utc::now();
        let report = ReportRequest {
            lat: 17.4,
            lng: 78.5,
            severity: "fatal".to_string(),
            weather: Some(" ".to_string()),
            road_type: Some("Highway".to_string()),
        }
        .into_live_report(now)
        .unwrap();
        assert_eq!(report.severity, AccidentSeverity::Fatal);
        assert!(report.weather.is_none());
        assert_eq!(report.reported_at, now);

        let bad = ReportRequest {
            lat: 200.0,
            lng: 78.5,
            severity: "fatal".to_string(),
            weather: None,
            road_type: None,
        };
        assert!(matches!(
            bad.into_live_report(now),
            Err(RecordError::Coordinate(_))
        ));
    }

    #[test]
    fn place_serializes_camel_case_with_split_name() {
        let place = PlaceCandidate {
            place_id: 5,
            name: "Charminar".to_string(),
            display_name: "Charminar, Hyderabad, Telangana, 500002, India".to_string(),
            lat: 17.3616,
            lng: 78.4747,
            kind: "attraction".to_string(),
            importance: 0.8,
            state: None,
            country: None,
            source: CandidateSource::Local,
        };
        let json = serde_json::to_value(ApiPlace::from(&place)).unwrap();
        assert_eq!(json["placeId"], 5);
        assert_eq!(json["primary"], "Charminar");
        assert_eq!(json["secondary"], "Hyderabad, Telangana, 500002");
        assert_eq!(json["source"], "local");
    }
}
