//! Route risk scoring and safest-route selection.

use std::borrow::Borrow;

use saferoute_accident_models::{AccidentSeverity, Hotspot};
use saferoute_risk_models::{RiskAssessment, RiskConfig, RouteCandidate, SpeedConfig};

use crate::{HotspotMatcher, nearby_hotspots, segment::segment_with_matcher};

/// Score adjustment for the route's average speed.
///
/// Positive below `slow_mps`, negative above `fast_mps`, linear in between.
/// Non-increasing in speed. Routes without a usable speed get `0`.
#[must_use]
pub fn speed_adjustment(route: &RouteCandidate, speed: &SpeedConfig) -> f64 {
    let Some(mps) = route.average_speed_mps() else {
        return 0.0;
    };
    if mps <= speed.slow_mps {
        return speed.adjustment;
    }
    if mps >= speed.fast_mps {
        return -speed.adjustment;
    }
    let t = (mps - speed.slow_mps) / (speed.fast_mps - speed.slow_mps);
    (2.0 * speed.adjustment).mul_add(-t, speed.adjustment)
}

/// Scores `route` against `hotspots`.
///
/// The score is the configured baseline plus the speed adjustment plus a
/// saturating penalty for the severity-weighted hotspot count near the
/// route, clamped to the configured bounds. The assessment also carries
/// the route's danger/safe segmentation at the narrow threshold.
#[must_use]
pub fn score_route(route: &RouteCandidate, hotspots: &[Hotspot], config: &RiskConfig) -> RiskAssessment {
    let matcher = HotspotMatcher::new(hotspots, config.thresholds.index_min_hotspots);
    let coords = &route.geometry.coordinates;

    let nearby = nearby_hotspots(coords, &matcher, config.thresholds.wide_km);

    let (fatal, serious, minor) = nearby.iter().fold((0u32, 0u32, 0u32), |(f, s, m), h| {
        (
            f + h.fatal_accidents,
            s + h.serious_accidents,
            m + h.minor_accidents,
        )
    });
    let hazard: f64 = [
        (AccidentSeverity::Fatal, fatal),
        (AccidentSeverity::Serious, serious),
        (AccidentSeverity::Minor, minor),
    ]
    .into_iter()
    .map(|(severity, count)| f64::from(count) * config.hazard.weight(severity))
    .sum();
    let penalty = if config.hazard.scale > 0.0 {
        config.hazard.max_penalty * (1.0 - (-hazard / config.hazard.scale).exp())
    } else {
        0.0
    };

    let speed = speed_adjustment(route, &config.speed);
    let raw = config.score.baseline + speed + penalty;
    let risk_score = raw.clamp(config.score.min, config.score.max);

    let risk_factors = risk_factors(fatal, serious, minor, speed, nearby.is_empty(), config);
    let segments = segment_with_matcher(coords, &matcher, config.thresholds.narrow_km);

    log::debug!(
        "Scored route: {} points, {} nearby hotspots, hazard {hazard:.1}, speed {speed:+.1}, score {risk_score:.1}",
        coords.len(),
        nearby.len()
    );

    RiskAssessment {
        risk_score,
        nearby_hotspots: nearby.into_iter().cloned().collect(),
        risk_factors,
        segments,
    }
}

fn risk_factors(
    fatal: u32,
    serious: u32,
    minor: u32,
    speed: f64,
    no_hotspots: bool,
    config: &RiskConfig,
) -> Vec<String> {
    let mut factors = Vec::new();
    let wide = config.thresholds.wide_km;

    if fatal > 0 {
        factors.push(format!("{fatal} fatal {} nearby", plural(fatal)));
    }
    if serious > 0 {
        factors.push(format!("{serious} serious {} nearby", plural(serious)));
    }
    if minor > 0 {
        factors.push(format!("{minor} minor {} nearby", plural(minor)));
    }

    if speed > 0.0 {
        factors.push("low average speed".to_string());
    } else if speed < 0.0 {
        factors.push("high average speed".to_string());
    }

    if no_hotspots {
        factors.push(format!("No accident hotspots within {wide} km"));
    }

    factors
}

const fn plural(count: u32) -> &'static str {
    if count == 1 { "accident" } else { "accidents" }
}

/// Index of the assessment with the strictly lowest score; the first one
/// wins ties. `None` for an empty slice.
#[must_use]
pub fn select_safest<A: Borrow<RiskAssessment>>(assessments: &[A]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, a) in assessments.iter().enumerate() {
        let score = a.borrow().risk_score;
        match best {
            Some((_, lowest)) if score >= lowest => {}
            _ => best = Some((i, score)),
        }
    }
    best.map(|(i, _)| i)
}
