//! Hotspot cautions for turn-by-turn steps.

use saferoute_accident_models::Hotspot;
use saferoute_risk_models::{AdvisoryStep, Caution, NavigationStep, RiskConfig};
use saferoute_spatial::distance_km;

use crate::HotspotMatcher;

/// Annotates each step whose maneuver location lies within the narrow
/// threshold of a hotspot.
///
/// Every step is returned, in order; steps away from hotspots have no
/// caution. With no hotspots, no step gets a caution.
#[must_use]
pub fn build_advisories(
    steps: &[NavigationStep],
    hotspots: &[Hotspot],
    config: &RiskConfig,
) -> Vec<AdvisoryStep> {
    let matcher = HotspotMatcher::new(hotspots, config.thresholds.index_min_hotspots);
    let threshold = config.thresholds.narrow_km;

    steps
        .iter()
        .map(|step| {
            let caution = if step.location.is_valid() {
                matcher
                    .first_within(step.location, threshold)
                    .and_then(|(_, hotspot)| caution_for(step, hotspot, config))
            } else {
                None
            };
            AdvisoryStep {
                step: step.clone(),
                caution,
            }
        })
        .collect()
}

fn caution_for(step: &NavigationStep, hotspot: &Hotspot, config: &RiskConfig) -> Option<Caution> {
    let severity = hotspot.worst_severity()?;
    let distance = distance_km(step.location, hotspot.coordinate());

    Some(Caution {
        recommended_speed_kmh: config.advisory.speed_for(severity),
        severity,
        distance_km: distance,
        hotspot_lat: hotspot.lat,
        hotspot_lng: hotspot.lng,
        summary: summarize(hotspot, distance),
    })
}

fn summarize(hotspot: &Hotspot, distance: f64) -> String {
    let mut parts = Vec::new();
    if hotspot.fatal_accidents > 0 {
        parts.push(format!("{} fatal", hotspot.fatal_accidents));
    }
    if hotspot.serious_accidents > 0 {
        parts.push(format!("{} serious", hotspot.serious_accidents));
    }
    if hotspot.minor_accidents > 0 {
        parts.push(format!("{} minor", hotspot.minor_accidents));
    }
    let noun = if hotspot.total_accidents == 1 {
        "accident"
    } else {
        "accidents"
    };
    let place = hotspot
        .label
        .as_ref()
        .map_or_else(String::new, |label| format!(" near {label}"));

    format!("{} {noun}{place} within {distance:.1} km", parts.join(", "))
}
