//! Summary statistics over a hotspot set.

use serde::{Deserialize, Serialize};

use saferoute_accident_models::{Hotspot, HotspotProvenance};

/// Number of locations reported in [`HotspotStats::top_locations`] by
/// default.
pub const DEFAULT_TOP_LOCATIONS: usize = 10;

/// One entry in the accident-prone locations ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLocation {
    /// Display label, or the rounded coordinate when the hotspot has none.
    pub label: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Total accidents at the location.
    pub total_accidents: u32,
    /// Fatal accidents at the location.
    pub fatal_accidents: u32,
}

/// Totals across every hotspot in a set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotStats {
    pub total_accidents: u64,
    pub fatal_accidents: u64,
    pub serious_accidents: u64,
    pub minor_accidents: u64,
    /// Number of hotspots.
    pub location_count: usize,
    /// Hotspots that came from live reports.
    pub live_report_count: usize,
    /// Busiest locations, most accidents first.
    pub top_locations: Vec<TopLocation>,
}

impl HotspotStats {
    /// Computes statistics for `hotspots`, keeping the `top` busiest
    /// locations.
    #[must_use]
    pub fn compute(hotspots: &[Hotspot], top: usize) -> Self {
        let mut stats = Self {
            location_count: hotspots.len(),
            ..Self::default()
        };

        for h in hotspots {
            stats.total_accidents += u64::from(h.total_accidents);
            stats.fatal_accidents += u64::from(h.fatal_accidents);
            stats.serious_accidents += u64::from(h.serious_accidents);
            stats.minor_accidents += u64::from(h.minor_accidents);
            if h.provenance != HotspotProvenance::Historical {
                stats.live_report_count += 1;
            }
        }

        let mut ranked: Vec<&Hotspot> = hotspots.iter().collect();
        ranked.sort_by(|a, b| {
            b.total_accidents
                .cmp(&a.total_accidents)
                .then_with(|| b.fatal_accidents.cmp(&a.fatal_accidents))
        });

        stats.top_locations = ranked
            .into_iter()
            .take(top)
            .map(|h| TopLocation {
                label: h
                    .label
                    .clone()
                    .unwrap_or_else(|| h.coordinate().to_string()),
                lat: h.lat,
                lng: h.lng,
                total_accidents: h.total_accidents,
                fatal_accidents: h.fatal_accidents,
            })
            .collect();

        stats
    }
}
