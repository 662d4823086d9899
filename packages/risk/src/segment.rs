//! Danger/safe partitioning of route geometry.

use saferoute_accident_models::{Coordinate, Hotspot};
use saferoute_risk_models::RouteSegment;

use crate::HotspotMatcher;

/// Splits `route` into runs of points that are (or are not) within
/// `threshold_km` of a hotspot.
///
/// At each classification change the transition point ends the closing
/// segment and starts the next, so consecutive segments share an endpoint.
/// Segments with fewer than two points are dropped. Returns no segments
/// when there are no hotspots or the route has fewer than two points.
#[must_use]
pub fn segment_by_safety(
    route: &[Coordinate],
    hotspots: &[Hotspot],
    threshold_km: f64,
) -> Vec<RouteSegment> {
    segment_with_matcher(route, &HotspotMatcher::new(hotspots, usize::MAX), threshold_km)
}

pub(crate) fn segment_with_matcher(
    route: &[Coordinate],
    matcher: &HotspotMatcher<'_>,
    threshold_km: f64,
) -> Vec<RouteSegment> {
    if matcher.is_empty() || route.len() < 2 {
        return Vec::new();
    }

    let mut segments = Vec::new();
    let mut current = RouteSegment {
        coords: Vec::new(),
        is_danger: matcher.first_within(route[0], threshold_km).is_some(),
    };

    for point in route {
        let is_danger = matcher.first_within(*point, threshold_km).is_some();
        if is_danger != current.is_danger {
            current.coords.push(*point);
            let closed = std::mem::replace(
                &mut current,
                RouteSegment {
                    coords: vec![*point],
                    is_danger,
                },
            );
            push_segment(&mut segments, closed);
        } else {
            current.coords.push(*point);
        }
    }
    push_segment(&mut segments, current);

    segments
}

fn push_segment(segments: &mut Vec<RouteSegment>, segment: RouteSegment) {
    if segment.coords.len() >= 2 {
        segments.push(segment);
    }
}
