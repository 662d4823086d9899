#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Great-circle distance and in-memory proximity lookups.
//!
//! [`distance_km`] is the shared primitive for every proximity test in the
//! system. [`ProximityIndex`] bulk-loads a list of points into an R-tree
//! and answers "which is the first point (in the caller's order) within
//! `threshold_km` of this location?" with the same result as a linear scan
//! over the list, so large hotspot sets can be matched without changing
//! the public contract of the callers.
//!
//! Longitude wraparound is not modelled for index envelopes: a query whose
//! search window crosses the antimeridian falls back to the full longitude
//! band, which is correct but slower.

use rstar::primitives::GeomWithData;
use rstar::{AABB, RTree};
use saferoute_accident_models::Coordinate;

/// Mean Earth radius used for all distance computations.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Relative slack applied to index search windows so that points lying
/// exactly on the threshold are never excluded by floating-point error.
const ENVELOPE_SLACK: f64 = 1.0 + 1e-6;

/// Great-circle distance between two coordinates in kilometres.
///
/// Uses the haversine formula with the intermediate term clamped to
/// `[0, 1]`, which keeps the result stable for antipodal and polar inputs.
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0)
        .sin()
        .mul_add(
            (d_lat / 2.0).sin(),
            lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2),
        )
        .clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// R-tree over a list of points, keyed by each point's position in the
/// original list.
pub struct ProximityIndex {
    tree: RTree<IndexedPoint>,
    len: usize,
}

impl ProximityIndex {
    /// Builds an index over `points`, remembering their order.
    #[must_use]
    pub fn new(points: impl IntoIterator<Item = Coordinate>) -> Self {
        let entries: Vec<IndexedPoint> = points
            .into_iter()
            .enumerate()
            .map(|(i, c)| GeomWithData::new([c.lng, c.lat], i))
            .collect();
        let len = entries.len();
        log::debug!("Building proximity index over {len} points");

        Self {
            tree: RTree::bulk_load(entries),
            len,
        }
    }

    /// Number of indexed points.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the index holds no points.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the lowest original position among the points within
    /// `threshold_km` of `point`.
    ///
    /// Equivalent to scanning the original list front to back and taking
    /// the first point whose [`distance_km`] is `<= threshold_km`.
    #[must_use]
    pub fn first_within(&self, point: Coordinate, threshold_km: f64) -> Option<usize> {
        self.candidates(point, threshold_km)
            .filter(|(_, distance)| *distance <= threshold_km)
            .map(|(index, _)| index)
            .min()
    }

    /// Returns the original positions of every point within
    /// `threshold_km` of `point`, in ascending order.
    #[must_use]
    pub fn all_within(&self, point: Coordinate, threshold_km: f64) -> Vec<usize> {
        let mut hits: Vec<usize> = self
            .candidates(point, threshold_km)
            .filter(|(_, distance)| *distance <= threshold_km)
            .map(|(index, _)| index)
            .collect();
        hits.sort_unstable();
        hits
    }

    fn candidates(
        &self,
        point: Coordinate,
        threshold_km: f64,
    ) -> impl Iterator<Item = (usize, f64)> + '_ {
        let envelope = search_envelope(point, threshold_km);
        self.tree
            .locate_in_envelope(&envelope)
            .map(move |entry| {
                let [lng, lat] = *entry.geom();
                (entry.data, distance_km(point, Coordinate { lat, lng }))
            })
    }
}

/// Computes a lng/lat bounding box guaranteed to contain every point within
/// `radius_km` of `center`.
///
/// Based on the spherical bounding-coordinates construction: the latitude
/// band is `lat ± r`, and the longitude half-width is
/// `asin(sin(r) / cos(lat))`, widened to the full band when the circle
/// touches a pole or crosses the antimeridian.
fn search_envelope(center: Coordinate, radius_km: f64) -> AABB<[f64; 2]> {
    let angular = (radius_km.max(0.0) / EARTH_RADIUS_KM) * ENVELOPE_SLACK;
    let lat = center.lat.to_radians();

    let min_lat = lat - angular;
    let max_lat = lat + angular;

    let full_band = || {
        AABB::from_corners(
            [-180.0, min_lat.to_degrees().max(-90.0)],
            [180.0, max_lat.to_degrees().min(90.0)],
        )
    };

    if min_lat <= -std::f64::consts::FRAC_PI_2 || max_lat >= std::f64::consts::FRAC_PI_2 {
        return full_band();
    }

    let ratio = angular.sin() / lat.cos();
    if ratio >= 1.0 {
        return full_band();
    }

    let d_lng = ratio.asin().to_degrees() * ENVELOPE_SLACK;
    let min_lng = center.lng - d_lng;
    let max_lng = center.lng + d_lng;
    if min_lng < -180.0 || max_lng > 180.0 {
        return full_band();
    }

    AABB::from_corners(
        [min_lng, min_lat.to_degrees()],
        [max_lng, max_lat.to_degrees()],
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(lat: f64, lng: f64) -> Coordinate {
        Coordinate { lat, lng }
    }

    #[test]
    fn distance_between_identical_points_is_zero() {
        assert!(distance_km(c(17.385, 78.4867), c(17.385, 78.4867)).abs() < 1e-9);
    }

    #[test]
    fn distance_matches_known_city_pair() {
        // Hyderabad -> Bangalore is roughly 500 km as the crow flies.
        let d = distance_km(c(17.3850, 78.4867), c(12.9716, 77.5946));
        assert!((d - 500.0).abs() < 10.0, "got {d}");
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = distance_km(c(10.0, 78.0), c(11.0, 78.0));
        assert!((d - 111.195).abs() < 0.01, "got {d}");
    }

    #[test]
    fn distance_is_symmetric_and_stable_at_extremes() {
        let pole = c(90.0, 0.0);
        let other_pole = c(-90.0, 0.0);
        let d = distance_km(pole, other_pole);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_KM).abs() < 1e-6);

        let a = c(0.0, 179.9);
        let b = c(0.0, -179.9);
        assert!((distance_km(a, b) - distance_km(b, a)).abs() < 1e-12);
        assert!(distance_km(a, b) < 25.0);

        let antipodal = distance_km(c(0.0, 0.0), c(0.0, 180.0));
        assert!(antipodal.is_finite());
    }

    #[test]
    fn index_matches_linear_scan_first_hit() {
        let points: Vec<Coordinate> = (0..200)
            .map(|i| {
                let f = f64::from(i);
                c(17.0 + (f * 0.013) % 1.0, 78.0 + (f * 0.029) % 1.0)
            })
            .collect();
        let index = ProximityIndex::new(points.iter().copied());
        assert_eq!(index.len(), 200);

        for q in 0..50 {
            let f = f64::from(q);
            let query = c(17.0 + (f * 0.021) % 1.0, 78.0 + (f * 0.017) % 1.0);
            for threshold in [0.5, 1.5, 2.0, 10.0] {
                let linear = points
                    .iter()
                    .position(|p| distance_km(query, *p) <= threshold);
                assert_eq!(index.first_within(query, threshold), linear);
            }
        }
    }

    #[test]
    fn all_within_is_sorted_and_complete() {
        let points = vec![c(17.40, 78.48), c(17.30, 78.30), c(17.401, 78.481)];
        let index = ProximityIndex::new(points);
        assert_eq!(index.all_within(c(17.40, 78.48), 1.0), vec![0, 2]);
        assert!(index.all_within(c(10.0, 70.0), 1.0).is_empty());
    }

    #[test]
    fn empty_index_never_matches() {
        let index = ProximityIndex::new(Vec::new());
        assert!(index.is_empty());
        assert_eq!(index.first_within(c(0.0, 0.0), 100.0), None);
    }

    #[test]
    fn envelope_near_pole_uses_full_band() {
        let index = ProximityIndex::new(vec![c(89.99, 170.0)]);
        assert_eq!(index.first_within(c(89.99, -10.0), 5.0), Some(0));
    }
}
