//! Record-to-hotspot aggregation passes.

use std::collections::BTreeMap;

use saferoute_accident_models::{
    AccidentRecord, AccidentSeverity, Hotspot, HotspotFilter, HotspotProvenance, LiveReport,
    LocationKey,
};

use crate::{Aggregation, AggregationConfig, AggregationReport, UNKNOWN_LABEL};

/// Running totals for one location while a pass is in progress.
#[derive(Default)]
struct HotspotBuilder {
    label: Option<String>,
    lat_sum: f64,
    lng_sum: f64,
    fatal: u32,
    serious: u32,
    minor: u32,
    weather: BTreeMap<String, u32>,
    road_types: BTreeMap<String, u32>,
}

impl HotspotBuilder {
    fn add(&mut self, record: &AccidentRecord) {
        self.lat_sum += record.coordinate.lat;
        self.lng_sum += record.coordinate.lng;
        match record.severity {
            AccidentSeverity::Fatal => self.fatal += 1,
            AccidentSeverity::Serious => self.serious += 1,
            AccidentSeverity::Minor => self.minor += 1,
        }
        *self.weather.entry(category(&record.weather)).or_default() += 1;
        *self.road_types.entry(category(&record.road_type)).or_default() += 1;
        if self.label.is_none() {
            self.label = record_label(record);
        }
    }

    const fn total(&self) -> u32 {
        self.fatal + self.serious + self.minor
    }

    fn build(self, key: LocationKey, intensity: f64) -> Hotspot {
        let total = self.total();
        let n = f64::from(total.max(1));
        Hotspot {
            key,
            label: self.label,
            lat: self.lat_sum / n,
            lng: self.lng_sum / n,
            total_accidents: total,
            fatal_accidents: self.fatal,
            serious_accidents: self.serious,
            minor_accidents: self.minor,
            weather_breakdown: self.weather,
            road_type_breakdown: self.road_types,
            intensity,
            provenance: HotspotProvenance::Historical,
        }
    }
}

fn category(label: &str) -> String {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        UNKNOWN_LABEL.to_string()
    } else {
        trimmed.to_string()
    }
}

fn record_label(record: &AccidentRecord) -> Option<String> {
    match (&record.city, &record.state) {
        (Some(city), Some(state)) => Some(format!("{city}, {state}")),
        (Some(city), None) => Some(city.clone()),
        (None, _) => None,
    }
}

fn location_key(record: &AccidentRecord, config: &AggregationConfig) -> LocationKey {
    match (&record.city, &record.state) {
        (Some(city), Some(state)) => LocationKey::Label {
            city: city.to_lowercase(),
            state: state.to_lowercase(),
        },
        _ => LocationKey::cell(record.coordinate, config.cell_degrees),
    }
}

/// Groups `records` into hotspots.
///
/// Records with an invalid coordinate are dropped and counted in the
/// returned [`AggregationReport`]; they never abort the pass. Output
/// hotspots are ordered by location key.
#[must_use]
pub fn aggregate(records: &[AccidentRecord], config: &AggregationConfig) -> Aggregation {
    let mut report = AggregationReport::default();
    let mut groups: BTreeMap<LocationKey, HotspotBuilder> = BTreeMap::new();

    for record in records {
        if let Err(e) = record.coordinate.validate() {
            log::debug!("Dropping accident record: {e}");
            report.invalid_coordinates += 1;
            continue;
        }
        report.accepted += 1;
        groups
            .entry(location_key(record, config))
            .or_default()
            .add(record);
    }

    if report.excluded() > 0 {
        log::warn!(
            "Aggregation dropped {} of {} records (invalid coordinates)",
            report.excluded(),
            records.len()
        );
    }

    let peak = groups.values().map(HotspotBuilder::total).max().unwrap_or(0);

    let hotspots: Vec<Hotspot> = groups
        .into_iter()
        .map(|(key, builder)| {
            let intensity = config.intensity(builder.total(), peak);
            builder.build(key, intensity)
        })
        .collect();

    log::debug!(
        "Aggregated {} records into {} hotspots (peak {peak})",
        report.accepted,
        hotspots.len()
    );

    Aggregation { hotspots, report }
}

/// Aggregates only the records matching `criteria`.
///
/// Produces exactly what [`aggregate`] produces for the pre-filtered list,
/// including intensities normalised against the filtered peak.
#[must_use]
pub fn filter(
    records: &[AccidentRecord],
    criteria: &HotspotFilter,
    config: &AggregationConfig,
) -> Aggregation {
    if criteria.is_empty() {
        return aggregate(records, config);
    }
    let subset: Vec<AccidentRecord> = records
        .iter()
        .filter(|r| criteria.matches(r))
        .cloned()
        .collect();
    aggregate(&subset, config)
}

/// Appends live reports to an existing hotspot list as single-record
/// hotspots.
///
/// No cross-source merging is done: a live report at the same spot as a
/// historical hotspot stays a separate hotspot. Reports with an invalid
/// coordinate are dropped and counted.
#[must_use]
pub fn merge_external(
    hotspots: &[Hotspot],
    live_reports: &[LiveReport],
    config: &AggregationConfig,
) -> Aggregation {
    let mut report = AggregationReport::default();
    let mut merged = hotspots.to_vec();

    for live in live_reports {
        if let Err(e) = live.coordinate.validate() {
            log::warn!("Dropping live report: {e}");
            report.invalid_coordinates += 1;
            continue;
        }
        report.accepted += 1;
        merged.push(live_hotspot(live, config));
    }

    Aggregation {
        hotspots: merged,
        report,
    }
}

fn live_hotspot(live: &LiveReport, config: &AggregationConfig) -> Hotspot {
    let single = |label: Option<&String>| {
        let mut map = BTreeMap::new();
        map.insert(category(label.map_or("", String::as_str)), 1);
        map
    };

    Hotspot {
        key: LocationKey::cell(live.coordinate, config.cell_degrees),
        label: None,
        lat: live.coordinate.lat,
        lng: live.coordinate.lng,
        total_accidents: 1,
        fatal_accidents: u32::from(live.severity == AccidentSeverity::Fatal),
        serious_accidents: u32::from(live.severity == AccidentSeverity::Serious),
        minor_accidents: u32::from(live.severity == AccidentSeverity::Minor),
        weather_breakdown: single(live.weather.as_ref()),
        road_type_breakdown: single(live.road_type.as_ref()),
        intensity: config.live_intensity(live.severity),
        provenance: HotspotProvenance::Live {
            reported_at: live.reported_at,
        },
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use saferoute_accident_models::Coordinate;

    use super::*;

    fn record(lat: f64, lng: f64, severity: AccidentSeverity, weather: &str) -> AccidentRecord {
        AccidentRecord {
            coordinate: Coordinate { lat, lng },
            severity,
            weather: weather.to_string(),
            road_type: "Highway".to_string(),
            reported_at: DateTime::<Utc>::default(),
            city: None,
            state: None,
        }
    }

    fn labeled(city: &str, state: &str, severity: AccidentSeverity) -> AccidentRecord {
        AccidentRecord {
            city: Some(city.to_string()),
            state: Some(state.to_string()),
            ..record(17.38, 78.48, severity, "Clear")
        }
    }

    fn sample() -> Vec<AccidentRecord> {
        vec![
            record(17.401, 78.481, AccidentSeverity::Fatal, "Rain"),
            record(17.399, 78.479, AccidentSeverity::Fatal, "Clear"),
            record(17.400, 78.480, AccidentSeverity::Minor, "Rain"),
            record(17.300, 78.300, AccidentSeverity::Serious, "Fog"),
            record(f64::NAN, 78.300, AccidentSeverity::Serious, "Fog"),
        ]
    }

    #[test]
    fn totals_equal_sum_of_severities() {
        let result = aggregate(&sample(), &AggregationConfig::default());
        let total: u32 = result.hotspots.iter().map(|h| h.total_accidents).sum();
        let by_severity: u32 = result
            .hotspots
            .iter()
            .map(|h| h.fatal_accidents + h.serious_accidents + h.minor_accidents)
            .sum();
        assert_eq!(total, by_severity);
        assert_eq!(total, 4);
        for h in &result.hotspots {
            assert_eq!(
                h.total_accidents,
                h.fatal_accidents + h.serious_accidents + h.minor_accidents
            );
        }
    }

    #[test]
    fn nearby_records_share_a_cell_and_breakdowns_count() {
        let result = aggregate(&sample(), &AggregationConfig::default());
        assert_eq!(result.hotspots.len(), 2);

        let busy = result
            .hotspots
            .iter()
            .find(|h| h.total_accidents == 3)
            .unwrap();
        assert_eq!(busy.fatal_accidents, 2);
        assert_eq!(busy.minor_accidents, 1);
        assert_eq!(busy.weather_breakdown.get("Rain"), Some(&2));
        assert_eq!(busy.weather_breakdown.get("Clear"), Some(&1));
        assert_eq!(busy.road_type_breakdown.get("Highway"), Some(&3));
        assert!((busy.lat - 17.4).abs() < 1e-9);
        assert!((busy.intensity - 1.0).abs() < 1e-12);

        let quiet = result
            .hotspots
            .iter()
            .find(|h| h.total_accidents == 1)
            .unwrap();
        assert!((quiet.intensity - (0.3 + 0.7 / 3.0)).abs() < 1e-12);
    }

    #[test]
    fn malformed_records_are_counted_not_fatal() {
        let result = aggregate(&sample(), &AggregationConfig::default());
        assert_eq!(result.report.accepted, 4);
        assert_eq!(result.report.invalid_coordinates, 1);
    }

    #[test]
    fn labeled_records_group_by_city_and_state() {
        let records = vec![
            labeled("Hyderabad", "Telangana", AccidentSeverity::Minor),
            labeled("hyderabad", "TELANGANA", AccidentSeverity::Serious),
            labeled("Pune", "Maharashtra", AccidentSeverity::Minor),
        ];
        let result = aggregate(&records, &AggregationConfig::default());
        assert_eq!(result.hotspots.len(), 2);
        let hyd = result
            .hotspots
            .iter()
            .find(|h| h.total_accidents == 2)
            .unwrap();
        assert_eq!(hyd.label.as_deref(), Some("Hyderabad, Telangana"));
    }

    #[test]
    fn filter_equals_aggregate_of_prefiltered_records() {
        let config = AggregationConfig::default();
        let records = sample();
        let criteria = HotspotFilter {
            severities: vec![AccidentSeverity::Fatal, AccidentSeverity::Serious],
            weather_types: vec!["rain".to_string(), "FOG".to_string()],
            road_types: Vec::new(),
        };

        let filtered = filter(&records, &criteria, &config);
        let prefiltered: Vec<AccidentRecord> = records
            .iter()
            .filter(|r| criteria.matches(r))
            .cloned()
            .collect();
        assert_eq!(filtered, aggregate(&prefiltered, &config));
        assert_eq!(filtered.hotspots.len(), 2);
        assert!(filtered.hotspots.iter().all(|h| h.minor_accidents == 0));
    }

    #[test]
    fn empty_filter_is_plain_aggregate() {
        let config = AggregationConfig::default();
        let records = sample();
        assert_eq!(
            filter(&records, &HotspotFilter::default(), &config),
            aggregate(&records, &config)
        );
    }

    #[test]
    fn live_reports_stay_distinct_from_historical_hotspots() {
        let config = AggregationConfig::default();
        let base = aggregate(&sample(), &config);
        let live = vec![
            LiveReport {
                coordinate: Coordinate {
                    lat: 17.400,
                    lng: 78.480,
                },
                severity: AccidentSeverity::Serious,
                weather: Some("Rain".to_string()),
                road_type: None,
                reported_at: DateTime::<Utc>::default(),
            },
            LiveReport {
                coordinate: Coordinate {
                    lat: 200.0,
                    lng: 78.480,
                },
                severity: AccidentSeverity::Minor,
                weather: None,
                road_type: None,
                reported_at: DateTime::<Utc>::default(),
            },
        ];

        let merged = merge_external(&base.hotspots, &live, &config);
        assert_eq!(merged.hotspots.len(), base.hotspots.len() + 1);
        assert_eq!(merged.report.invalid_coordinates, 1);

        let added = merged.hotspots.last().unwrap();
        assert_eq!(added.total_accidents, 1);
        assert_eq!(added.serious_accidents, 1);
        assert!((added.intensity - 0.7).abs() < 1e-12);
        assert!(matches!(added.provenance, HotspotProvenance::Live { .. }));
        assert_eq!(added.road_type_breakdown.get(UNKNOWN_LABEL), Some(&1));
    }

    #[test]
    fn empty_input_yields_no_hotspots() {
        let result = aggregate(&[], &AggregationConfig::default());
        assert!(result.hotspots.is_empty());
        assert_eq!(result.report, AggregationReport::default());
    }
}
