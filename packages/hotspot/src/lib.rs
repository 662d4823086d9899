#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregation of raw accident records into spatial hotspots.
//!
//! Records are grouped by [`LocationKey`](saferoute_accident_models::LocationKey)
//! (a city/state label when the record carries one, otherwise a rounded
//! lat/lng cell), counted per severity, and broken down by weather and road
//! type. Each aggregation pass is a pure function of its input: filtering
//! re-runs the aggregation over the matching subset rather than patching
//! existing hotspots, and live reports are appended as single-record
//! hotspots.
//!
//! [`store::HotspotStore`] publishes whole generations of hotspots so that
//! concurrent route-risk queries never observe a partially rebuilt set.

pub mod aggregate;
pub mod stats;
pub mod store;

use serde::{Deserialize, Serialize};

use saferoute_accident_models::{AccidentSeverity, Hotspot};

pub use aggregate::{aggregate, filter, merge_external};

/// Size of a grid cell used as the location identity for unlabeled records.
pub const DEFAULT_CELL_DEGREES: f64 = 0.01;

/// Minimum intensity assigned to any aggregated hotspot.
pub const DEFAULT_INTENSITY_FLOOR: f64 = 0.3;

/// Intensity added on top of the floor for the busiest hotspot of a pass.
pub const DEFAULT_INTENSITY_SPAN: f64 = 0.7;

/// Intensity of a single live report, per severity.
pub const DEFAULT_LIVE_FATAL_INTENSITY: f64 = 1.0;
/// See [`DEFAULT_LIVE_FATAL_INTENSITY`].
pub const DEFAULT_LIVE_SERIOUS_INTENSITY: f64 = 0.7;
/// See [`DEFAULT_LIVE_FATAL_INTENSITY`].
pub const DEFAULT_LIVE_MINOR_INTENSITY: f64 = 0.4;

/// Live reports kept by the store; the oldest are dropped past this.
pub const DEFAULT_MAX_LIVE_REPORTS: usize = 1000;

/// Label used when a record has an empty weather or road type field.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Tunable constants for the aggregation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AggregationConfig {
    /// Grid cell size in degrees for unlabeled records.
    pub cell_degrees: f64,
    /// Intensity floor.
    pub intensity_floor: f64,
    /// Intensity span above the floor.
    pub intensity_span: f64,
    /// Intensity of a live fatal report.
    pub live_fatal_intensity: f64,
    /// Intensity of a live serious report.
    pub live_serious_intensity: f64,
    /// Intensity of a live minor report.
    pub live_minor_intensity: f64,
    /// Retention cap for live reports.
    pub max_live_reports: usize,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            cell_degrees: DEFAULT_CELL_DEGREES,
            intensity_floor: DEFAULT_INTENSITY_FLOOR,
            intensity_span: DEFAULT_INTENSITY_SPAN,
            live_fatal_intensity: DEFAULT_LIVE_FATAL_INTENSITY,
            live_serious_intensity: DEFAULT_LIVE_SERIOUS_INTENSITY,
            live_minor_intensity: DEFAULT_LIVE_MINOR_INTENSITY,
            max_live_reports: DEFAULT_MAX_LIVE_REPORTS,
        }
    }
}

impl AggregationConfig {
    /// Heatmap intensity for a hotspot with `total` records when the
    /// busiest hotspot of the pass has `peak` records.
    ///
    /// Monotonically non-decreasing in `total` and bounded to `[0, 1]`.
    #[must_use]
    pub fn intensity(&self, total: u32, peak: u32) -> f64 {
        if peak == 0 {
            return self.intensity_floor.clamp(0.0, 1.0);
        }
        let ratio = f64::from(total) / f64::from(peak);
        self.intensity_span
            .mul_add(ratio, self.intensity_floor)
            .clamp(0.0, 1.0)
    }

    /// Intensity of a single live report.
    #[must_use]
    pub fn live_intensity(&self, severity: AccidentSeverity) -> f64 {
        let value = match severity {
            AccidentSeverity::Fatal => self.live_fatal_intensity,
            AccidentSeverity::Serious => self.live_serious_intensity,
            AccidentSeverity::Minor => self.live_minor_intensity,
        };
        value.clamp(0.0, 1.0)
    }
}

/// Counts of records accepted into and excluded from an aggregate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationReport {
    /// Records that contributed to a hotspot.
    pub accepted: usize,
    /// Records dropped for an invalid coordinate.
    pub invalid_coordinates: usize,
}

impl AggregationReport {
    /// Total number of dropped records.
    #[must_use]
    pub const fn excluded(&self) -> usize {
        self.invalid_coordinates
    }

    /// Adds another report's counts to this one.
    pub const fn absorb(&mut self, other: Self) {
        self.accepted += other.accepted;
        self.invalid_coordinates += other.invalid_coordinates;
    }
}

/// Output of one aggregation pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    /// Hotspots, ordered by location key.
    pub hotspots: Vec<Hotspot>,
    /// Diagnostics for the pass.
    pub report: AggregationReport,
}

/// Sorts hotspots most dangerous first: descending fatal, then serious,
/// then total count. The sort is stable, so equal hotspots keep their
/// relative order.
///
/// Route-risk matching takes the first hotspot within range, so this order
/// decides which hotspot is reported when thresholds overlap.
pub fn order_by_severity(hotspots: &mut [Hotspot]) {
    hotspots.sort_by(|a, b| {
        b.fatal_accidents
            .cmp(&a.fatal_accidents)
            .then_with(|| b.serious_accidents.cmp(&a.serious_accidents))
            .then_with(|| b.total_accidents.cmp(&a.total_accidents))
    });
}
