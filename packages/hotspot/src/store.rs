//! Generation-swapped hotspot storage.
//!
//! Every write builds a complete new [`HotspotGeneration`] from the current
//! one and publishes it by swapping an [`Arc`]. Readers take a snapshot
//! (a cheap `Arc` clone) and keep using it for the whole request, so a
//! route-risk query never sees hotspots from two different generations.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use saferoute_accident_models::{AccidentRecord, Hotspot, HotspotFilter, LiveReport};

use crate::{
    Aggregation, AggregationConfig, AggregationReport, aggregate, filter, merge_external,
    order_by_severity,
};

/// An immutable, fully built hotspot set.
#[derive(Debug, Clone, Default)]
pub struct HotspotGeneration {
    /// Monotonic generation number; `0` is the empty initial generation.
    pub generation: u64,
    /// Historical records the hotspots were built from.
    pub records: Arc<Vec<AccidentRecord>>,
    /// Live reports merged on top of the historical hotspots.
    pub live_reports: Arc<Vec<LiveReport>>,
    /// Hotspots ordered most dangerous first.
    pub hotspots: Arc<Vec<Hotspot>>,
    /// Diagnostics from the historical aggregation pass.
    pub report: AggregationReport,
}

/// Holder of the current [`HotspotGeneration`].
pub struct HotspotStore {
    config: AggregationConfig,
    current: RwLock<Arc<HotspotGeneration>>,
    writer: Mutex<()>,
}

impl HotspotStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new(config: AggregationConfig) -> Self {
        Self {
            config,
            current: RwLock::new(Arc::new(HotspotGeneration::default())),
            writer: Mutex::new(()),
        }
    }

    /// Aggregation settings used for every rebuild.
    #[must_use]
    pub const fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Returns the current generation.
    #[must_use]
    pub fn snapshot(&self) -> Arc<HotspotGeneration> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replaces the historical record set and publishes a rebuilt
    /// generation. Live reports are carried over.
    pub fn replace_records(&self, records: Vec<AccidentRecord>) -> Arc<HotspotGeneration> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.snapshot();
        self.publish(&previous, Arc::new(records), Arc::clone(&previous.live_reports))
    }

    /// Appends live reports and publishes a rebuilt generation.
    ///
    /// At most [`AggregationConfig::max_live_reports`] are kept; the oldest
    /// arrivals are dropped first.
    pub fn add_live_reports(
        &self,
        reports: impl IntoIterator<Item = LiveReport>,
    ) -> Arc<HotspotGeneration> {
        let _guard = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let previous = self.snapshot();

        let mut live = previous.live_reports.as_ref().clone();
        live.extend(reports);
        let overflow = live.len().saturating_sub(self.config.max_live_reports);
        if overflow > 0 {
            log::debug!("Dropping {overflow} oldest live reports");
            live.drain(..overflow);
        }

        self.publish(&previous, Arc::clone(&previous.records), Arc::new(live))
    }

    /// [`Self::filtered_in`] over the current generation.
    #[must_use]
    pub fn filtered(&self, criteria: &HotspotFilter) -> Aggregation {
        self.filtered_in(&self.snapshot(), criteria)
    }

    /// Aggregates `current`'s historical records through `criteria` and
    /// merges its live reports on top, severity ordered.
    ///
    /// The returned hotspots are a fresh pass and do not affect the
    /// published generation.
    #[must_use]
    pub fn filtered_in(&self, current: &HotspotGeneration, criteria: &HotspotFilter) -> Aggregation {
        if criteria.is_empty() {
            return Aggregation {
                hotspots: current.hotspots.as_ref().clone(),
                report: current.report,
            };
        }

        let historical = filter(&current.records, criteria, &self.config);
        let live: Vec<LiveReport> = current
            .live_reports
            .iter()
            .filter(|r| live_matches(criteria, r))
            .cloned()
            .collect();
        let mut merged = merge_external(&historical.hotspots, &live, &self.config);
        order_by_severity(&mut merged.hotspots);
        merged.report.absorb(historical.report);
        merged
    }

    fn publish(
        &self,
        previous: &HotspotGeneration,
        records: Arc<Vec<AccidentRecord>>,
        live_reports: Arc<Vec<LiveReport>>,
    ) -> Arc<HotspotGeneration> {
        let historical = aggregate(&records, &self.config);
        let merged = merge_external(&historical.hotspots, &live_reports, &self.config);
        let mut hotspots = merged.hotspots;
        order_by_severity(&mut hotspots);

        let next = Arc::new(HotspotGeneration {
            generation: previous.generation + 1,
            records,
            live_reports,
            hotspots: Arc::new(hotspots),
            report: historical.report,
        });

        log::info!(
            "Published hotspot generation {} ({} hotspots, {} live reports)",
            next.generation,
            next.hotspots.len(),
            next.live_reports.len()
        );

        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&next);
        next
    }
}

impl Default for HotspotStore {
    fn default() -> Self {
        Self::new(AggregationConfig::default())
    }
}

fn live_matches(criteria: &HotspotFilter, report: &LiveReport) -> bool {
    let label_ok = |accepted: &[String], value: Option<&String>| {
        accepted.is_empty()
            || value.is_some_and(|v| accepted.iter().any(|a| a.eq_ignore_ascii_case(v.trim())))
    };
    (criteria.severities.is_empty() || criteria.severities.contains(&report.severity))
        && label_ok(&criteria.weather_types, report.weather.as_ref())
        && label_ok(&criteria.road_types, report.road_type.as_ref())
}
