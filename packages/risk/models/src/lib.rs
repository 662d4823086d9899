#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route and risk types shared by the routing adapter, the risk engine, and
//! the HTTP API.
//!
//! Also hosts [`RiskConfig`], the scoring constants. Defaults are embedded
//! from `risk.toml` at compile time and can be overridden from a file.

use std::path::Path;

use saferoute_accident_models::{AccidentSeverity, Coordinate, CoordinateError, Hotspot};
use serde::{Deserialize, Serialize};

/// An ordered polyline for one candidate route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteGeometry {
    /// Route points in travel order.
    pub coordinates: Vec<Coordinate>,
    /// Set by the risk engine on the route it selects.
    #[serde(default)]
    pub is_candidate_safest: bool,
}

impl RouteGeometry {
    /// Builds a geometry, validating every point.
    ///
    /// # Errors
    ///
    /// * [`RouteError::TooFewPoints`] if fewer than two points are given
    /// * [`RouteError::InvalidCoordinate`] for the first invalid point
    pub fn new(coordinates: Vec<Coordinate>) -> Result<Self, RouteError> {
        let geometry = Self {
            coordinates,
            is_candidate_safest: false,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Builds a geometry from `[lng, lat]` pairs as returned by `GeoJSON`
    /// route providers.
    ///
    /// # Errors
    ///
    /// Same as [`Self::new`].
    pub fn from_lng_lat(pairs: &[[f64; 2]]) -> Result<Self, RouteError> {
        Self::new(
            pairs
                .iter()
                .map(|[lng, lat]| Coordinate {
                    lat: *lat,
                    lng: *lng,
                })
                .collect(),
        )
    }

    /// Checks the geometry invariants.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn validate(&self) -> Result<(), RouteError> {
        if self.coordinates.len() < 2 {
            return Err(RouteError::TooFewPoints {
                points: self.coordinates.len(),
            });
        }
        for (index, c) in self.coordinates.iter().enumerate() {
            c.validate()
                .map_err(|source| RouteError::InvalidCoordinate { index, source })?;
        }
        Ok(())
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    /// Returns `true` if the geometry holds no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }
}

/// One turn-by-turn instruction from the route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationStep {
    /// Human-readable instruction, e.g. `"Turn left onto MG Road"`.
    pub instruction: String,
    /// Street the step travels on; empty when unnamed.
    #[serde(default)]
    pub street_name: String,
    pub distance_meters: f64,
    pub duration_seconds: f64,
    /// Provider maneuver type (`"turn"`, `"depart"`, `"arrive"`, ...).
    pub maneuver_type: String,
    /// Maneuver modifier (`"left"`, `"slight right"`, ...), if any.
    #[serde(default)]
    pub modifier: Option<String>,
    /// Where the maneuver happens.
    pub location: Coordinate,
}

/// A candidate route as supplied by the route provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteCandidate {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub geometry: RouteGeometry,
    #[serde(default)]
    pub steps: Vec<NavigationStep>,
}

impl RouteCandidate {
    /// Average speed in metres per second, or `None` when the duration is
    /// not positive or either metric is non-finite.
    #[must_use]
    pub fn average_speed_mps(&self) -> Option<f64> {
        if !self.distance_meters.is_finite()
            || !self.duration_seconds.is_finite()
            || self.duration_seconds <= 0.0
            || self.distance_meters < 0.0
        {
            return None;
        }
        Some(self.distance_meters / self.duration_seconds)
    }
}

/// A contiguous run of route points sharing one danger classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteSegment {
    pub coords: Vec<Coordinate>,
    pub is_danger: bool,
}

/// Risk evaluation of one route against one hotspot generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// Score in `[10, 95]` with the default configuration.
    pub risk_score: f64,
    /// Hotspots within the wide threshold of any route point, in order of
    /// first encounter along the route.
    pub nearby_hotspots: Vec<Hotspot>,
    /// Human-readable reasons, most significant first.
    pub risk_factors: Vec<String>,
    /// Danger/safe partition of the route. Empty when no hotspots exist.
    pub segments: Vec<RouteSegment>,
}

/// Caution attached to a navigation step near a hotspot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Caution {
    pub recommended_speed_kmh: u32,
    /// Worst severity recorded at the hotspot.
    pub severity: AccidentSeverity,
    pub distance_km: f64,
    pub hotspot_lat: f64,
    pub hotspot_lng: f64,
    /// Short summary such as `"2 fatal, 1 serious accidents within 0.4 km"`.
    pub summary: String,
}

/// A navigation step with an optional hotspot caution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryStep {
    #[serde(flatten)]
    pub step: NavigationStep,
    #[serde(default)]
    pub caution: Option<Caution>,
}

/// A candidate route together with its assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessedRoute {
    pub route: RouteCandidate,
    pub assessment: RiskAssessment,
}

/// Result of assessing a set of candidate routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlan {
    /// Accepted routes in provider order.
    pub routes: Vec<AssessedRoute>,
    /// Index into `routes` of the safest route; `None` when no route was
    /// accepted.
    pub safest_index: Option<usize>,
    /// Steps of the safest route with hotspot cautions attached.
    pub advisories: Vec<AdvisoryStep>,
    /// Candidates rejected for invalid geometry.
    pub rejected_routes: usize,
}

impl RoutePlan {
    /// The safest route, if any.
    #[must_use]
    pub fn safest(&self) -> Option<&AssessedRoute> {
        self.safest_index.and_then(|i| self.routes.get(i))
    }
}

/// Error for routes rejected at the engine boundary.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RouteError {
    /// A route needs at least two points.
    #[error("route has {points} point(s); at least 2 are required")]
    TooFewPoints {
        /// Number of points supplied.
        points: usize,
    },

    /// A route point failed validation.
    #[error("route point {index} is invalid: {source}")]
    InvalidCoordinate {
        /// Position of the point in the route.
        index: usize,
        /// Why it is invalid.
        source: CoordinateError,
    },
}

/// Error loading a [`RiskConfig`] override.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read risk config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for [`RiskConfig`].
    #[error("failed to parse risk config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The values parse but cannot be used for scoring.
    #[error("invalid risk config: {message}")]
    Invalid {
        /// Which constraint failed.
        message: String,
    },
}

/// Proximity thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Wide threshold used for nearby-hotspot reporting.
    pub wide_km: f64,
    /// Narrow threshold used for segmentation and advisories.
    pub narrow_km: f64,
    /// Hotspot count above which an R-tree replaces linear scans.
    pub index_min_hotspots: usize,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            wide_km: 2.0,
            narrow_km: 1.5,
            index_min_hotspots: 64,
        }
    }
}

/// Score bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    pub baseline: f64,
    pub min: f64,
    pub max: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            baseline: 50.0,
            min: 10.0,
            max: 95.0,
        }
    }
}

/// Average-speed adjustment curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeedConfig {
    pub fast_mps: f64,
    pub slow_mps: f64,
    /// Magnitude of the adjustment at either end of the curve.
    pub adjustment: f64,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            fast_mps: 17.0,
            slow_mps: 8.0,
            adjustment: 15.0,
        }
    }
}

/// Severity weights for the hotspot penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HazardConfig {
    pub fatal_weight: f64,
    pub serious_weight: f64,
    pub minor_weight: f64,
    pub max_penalty: f64,
    pub scale: f64,
}

impl Default for HazardConfig {
    fn default() -> Self {
        Self {
            fatal_weight: 5.0,
            serious_weight: 3.0,
            minor_weight: 1.0,
            max_penalty: 30.0,
            scale: 20.0,
        }
    }
}

impl HazardConfig {
    /// Weight of one record of the given severity.
    #[must_use]
    pub const fn weight(&self, severity: AccidentSeverity) -> f64 {
        match severity {
            AccidentSeverity::Fatal => self.fatal_weight,
            AccidentSeverity::Serious => self.serious_weight,
            AccidentSeverity::Minor => self.minor_weight,
        }
    }
}

/// Recommended speeds near hotspots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisoryConfig {
    pub fatal_speed_kmh: u32,
    pub serious_speed_kmh: u32,
    pub minor_speed_kmh: u32,
}

impl Default for AdvisoryConfig {
    fn default() -> Self {
        Self {
            fatal_speed_kmh: 30,
            serious_speed_kmh: 40,
            minor_speed_kmh: 50,
        }
    }
}

impl AdvisoryConfig {
    /// Recommended speed for a hotspot whose worst record has `severity`.
    #[must_use]
    pub const fn speed_for(&self, severity: AccidentSeverity) -> u32 {
        match severity {
            AccidentSeverity::Fatal => self.fatal_speed_kmh,
            AccidentSeverity::Serious => self.serious_speed_kmh,
            AccidentSeverity::Minor => self.minor_speed_kmh,
        }
    }
}

/// All route-risk constants.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub thresholds: ThresholdConfig,
    pub score: ScoreConfig,
    pub speed: SpeedConfig,
    pub hazard: HazardConfig,
    pub advisory: AdvisoryConfig,
}

const EMBEDDED_RISK_CONFIG: &str = include_str!("../risk.toml");

impl RiskConfig {
    /// Returns the compile-time embedded configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded `risk.toml` is malformed (a build-time bug).
    #[must_use]
    pub fn embedded() -> Self {
        toml::from_str(EMBEDDED_RISK_CONFIG)
            .unwrap_or_else(|e| panic!("Failed to parse embedded risk.toml: {e}"))
    }

    /// Parses a configuration override. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for invalid TOML and
    /// [`ConfigError::Invalid`] if [`Self::validate`] rejects the values.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every constant is usable: all values finite, positive
    /// thresholds, `score.min <= score.max`, `speed.slow_mps <
    /// speed.fast_mps`, and non-negative weights.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first failed check.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let values = [
            ("thresholds.wide_km", self.thresholds.wide_km),
            ("thresholds.narrow_km", self.thresholds.narrow_km),
            ("score.baseline", self.score.baseline),
            ("score.min", self.score.min),
            ("score.max", self.score.max),
            ("speed.fast_mps", self.speed.fast_mps),
            ("speed.slow_mps", self.speed.slow_mps),
            ("speed.adjustment", self.speed.adjustment),
            ("hazard.fatal_weight", self.hazard.fatal_weight),
            ("hazard.serious_weight", self.hazard.serious_weight),
            ("hazard.minor_weight", self.hazard.minor_weight),
            ("hazard.max_penalty", self.hazard.max_penalty),
            ("hazard.scale", self.hazard.scale),
        ];
        let invalid = |message: String| Err(ConfigError::Invalid { message });

        if let Some((name, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return invalid(format!("{name} must be finite, got {value}"));
        }
        if self.thresholds.wide_km <= 0.0 || self.thresholds.narrow_km <= 0.0 {
            return invalid("thresholds must be positive".to_string());
        }
        if self.score.min > self.score.max {
            return invalid(format!(
                "score.min ({}) exceeds score.max ({})",
                self.score.min, self.score.max
            ));
        }
        if self.speed.slow_mps >= self.speed.fast_mps {
            return invalid(format!(
                "speed.slow_mps ({}) must be below speed.fast_mps ({})",
                self.speed.slow_mps, self.speed.fast_mps
            ));
        }
        if let Some((name, value)) = values[7..].iter().find(|(_, v)| *v < 0.0) {
            return invalid(format!("{name} must not be negative, got {value}"));
        }
        Ok(())
    }

    /// Loads a configuration override from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}
