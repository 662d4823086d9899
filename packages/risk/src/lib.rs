#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Route risk engine.
//!
//! Scores candidate routes against a hotspot set, selects the safest,
//! splits its geometry into danger and safe segments, and annotates its
//! navigation steps with hotspot cautions.
//!
//! Every proximity decision uses "first hotspot within the threshold, in
//! the caller's order". Callers pass hotspots ordered most dangerous first
//! (see `saferoute_hotspot::order_by_severity`) so that overlapping
//! thresholds resolve to the worst hotspot. Large hotspot sets are matched
//! through an R-tree that gives the same answer as the linear scan.

pub mod advisory;
pub mod score;
pub mod segment;

use saferoute_accident_models::{Coordinate, Hotspot};
use saferoute_risk_models::{AssessedRoute, RiskConfig, RouteCandidate, RoutePlan};
use saferoute_spatial::{ProximityIndex, distance_km};

pub use advisory::build_advisories;
pub use score::{score_route, select_safest};
pub use segment::segment_by_safety;

/// Returns the first hotspot (in slice order) within `threshold_km` of
/// `point`.
#[must_use]
pub fn is_near_hotspot(point: Coordinate, hotspots: &[Hotspot], threshold_km: f64) -> Option<&Hotspot> {
    hotspots
        .iter()
        .find(|h| distance_km(point, h.coordinate()) <= threshold_km)
}

/// First-match proximity lookup over a hotspot slice.
///
/// Uses a linear scan for small sets and a [`ProximityIndex`] once the set
/// is larger than `index_min_hotspots`. Both strategies return the same
/// hotspot.
pub struct HotspotMatcher<'a> {
    hotspots: &'a [Hotspot],
    index: Option<ProximityIndex>,
}

impl<'a> HotspotMatcher<'a> {
    /// Prepares a matcher for `hotspots`.
    #[must_use]
    pub fn new(hotspots: &'a [Hotspot], index_min_hotspots: usize) -> Self {
        let index = (hotspots.len() > index_min_hotspots)
            .then(|| ProximityIndex::new(hotspots.iter().map(Hotspot::coordinate)));
        Self { hotspots, index }
    }

    /// Same contract as [`is_near_hotspot`], returning the hotspot's
    /// position alongside it.
    #[must_use]
    pub fn first_within(&self, point: Coordinate, threshold_km: f64) -> Option<(usize, &'a Hotspot)> {
        let hotspots = self.hotspots;
        match &self.index {
            Some(index) => index
                .first_within(point, threshold_km)
                .map(|i| (i, &hotspots[i])),
            None => hotspots
                .iter()
                .enumerate()
                .find(|(_, h)| distance_km(point, h.coordinate()) <= threshold_km),
        }
    }

    /// Returns `true` if there are no hotspots to match against.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.hotspots.is_empty()
    }
}

/// Unique hotspots within `threshold_km` of any point of `route`, in the
/// order they are first encountered walking the route.
#[must_use]
pub fn nearby_hotspots<'a>(
    route: &[Coordinate],
    matcher: &HotspotMatcher<'a>,
    threshold_km: f64,
) -> Vec<&'a Hotspot> {
    let mut seen = vec![false; matcher.hotspots.len()];
    let mut nearby = Vec::new();

    for point in route {
        let hits: Vec<usize> = match &matcher.index {
            Some(index) => index.all_within(*point, threshold_km),
            None => matcher
                .hotspots
                .iter()
                .enumerate()
                .filter(|(_, h)| distance_km(*point, h.coordinate()) <= threshold_km)
                .map(|(i, _)| i)
                .collect(),
        };
        for i in hits {
            if !seen[i] {
                seen[i] = true;
                nearby.push(&matcher.hotspots[i]);
            }
        }
    }

    nearby
}

/// Scores every candidate, marks the safest, and builds advisories for it.
///
/// Candidates whose geometry fails validation are skipped and counted in
/// [`RoutePlan::rejected_routes`]. An empty or fully rejected input yields
/// a plan with no safest route.
#[must_use]
pub fn assess_routes(
    candidates: Vec<RouteCandidate>,
    hotspots: &[Hotspot],
    config: &RiskConfig,
) -> RoutePlan {
    let mut plan = RoutePlan::default();

    for mut route in candidates {
        if let Err(e) = route.geometry.validate() {
            log::warn!("Skipping route candidate: {e}");
            plan.rejected_routes += 1;
            continue;
        }
        route.geometry.is_candidate_safest = false;
        let assessment = score_route(&route, hotspots, config);
        plan.routes.push(AssessedRoute { route, assessment });
    }

    let assessments: Vec<_> = plan.routes.iter().map(|r| &r.assessment).collect();
    plan.safest_index = select_safest(&assessments);

    if let Some(index) = plan.safest_index {
        let count = plan.routes.len();
        let safest = &mut plan.routes[index];
        safest.route.geometry.is_candidate_safest = true;
        plan.advisories = build_advisories(&safest.route.steps, hotspots, config);
        log::debug!(
            "Selected route {index} of {count} (score {:.1})",
            safest.assessment.risk_score
        );
    }

    plan
}
