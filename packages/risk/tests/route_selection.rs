use chrono::{DateTime, Utc};
use saferoute_accident_models::{AccidentRecord, AccidentSeverity, Coordinate};
use saferoute_hotspot::{AggregationConfig, aggregate, order_by_severity};
use saferoute_risk::{assess_routes, segment_by_safety, select_safest};
use saferoute_risk_models::{NavigationStep, RiskConfig, RouteCandidate, RouteGeometry};
use saferoute_spatial::distance_km;

fn record(lat: f64, lng: f64, severity: AccidentSeverity) -> AccidentRecord {
    AccidentRecord {
        coordinate: Coordinate { lat, lng },
        severity,
        weather: "Clear".to_string(),
        road_type: "Arterial".to_string(),
        reported_at: DateTime::<Utc>::default(),
        city: None,
        state: None,
    }
}

fn north_south(lng: f64) -> RouteCandidate {
    let coordinates: Vec<Coordinate> = (0..=20)
        .map(|i| Coordinate {
            lat: 0.005f64.mul_add(f64::from(i), 17.35),
            lng,
        })
        .collect();
    let steps = vec![
        NavigationStep {
            instruction: "Start on the road".to_string(),
            street_name: String::new(),
            distance_meters: 5500.0,
            duration_seconds: 600.0,
            maneuver_type: "depart".to_string(),
            modifier: None,
            location: coordinates[10],
        },
        NavigationStep {
            instruction: "Arrive at your destination".to_string(),
            street_name: String::new(),
            distance_meters: 0.0,
            duration_seconds: 0.0,
            maneuver_type: "arrive".to_string(),
            modifier: None,
            location: coordinates[20],
        },
    ];
    RouteCandidate {
        distance_meters: 11_000.0,
        duration_seconds: 1200.0,
        geometry: RouteGeometry::new(coordinates).unwrap(),
        steps,
    }
}

#[test]
fn safest_route_avoids_fatal_hotspot() {
    let records = vec![
        record(17.40, 78.48, AccidentSeverity::Fatal),
        record(17.40, 78.48, AccidentSeverity::Fatal),
        record(17.30, 78.30, AccidentSeverity::Minor),
    ];
    let mut hotspots = aggregate(&records, &AggregationConfig::default()).hotspots;
    order_by_severity(&mut hotspots);
    assert_eq!(hotspots[0].fatal_accidents, 2);

    let through = north_south(78.48);
    let bypass = north_south(78.53);
    let danger_point = Coordinate {
        lat: 17.40,
        lng: 78.48,
    };
    for p in &bypass.geometry.coordinates {
        assert!(distance_km(*p, danger_point) > 5.0);
    }

    let config = RiskConfig::embedded();
    let plan = assess_routes(vec![through.clone(), bypass], &hotspots, &config);

    assert_eq!(plan.safest_index, Some(1));
    let assessments: Vec<_> = plan.routes.iter().map(|r| &r.assessment).collect();
    assert_eq!(select_safest(&assessments), Some(1));
    assert_eq!(select_safest(&assessments), plan.safest_index);

    let risky = &plan.routes[0].assessment;
    assert_eq!(risky.nearby_hotspots.len(), 1);
    assert_eq!(risky.risk_factors[0], "2 fatal accidents nearby");
    assert!(risky.risk_score > plan.routes[1].assessment.risk_score);

    let segments = segment_by_safety(
        &through.geometry.coordinates,
        &hotspots,
        config.thresholds.narrow_km,
    );
    let nearest = through
        .geometry
        .coordinates
        .iter()
        .copied()
        .min_by(|a, b| distance_km(*a, danger_point).total_cmp(&distance_km(*b, danger_point)))
        .unwrap();
    assert!(
        segments
            .iter()
            .any(|s| s.is_danger && s.coords.contains(&nearest))
    );
    assert_eq!(segments, risky.segments);

    assert_eq!(plan.advisories.len(), 2);
    assert!(plan.advisories.iter().all(|a| a.caution.is_none()));
}

#[test]
fn empty_hotspot_set_degrades_to_baseline() {
    let config = RiskConfig::embedded();
    let plan = assess_routes(vec![north_south(78.48), north_south(78.53)], &[], &config);

    assert_eq!(plan.safest_index, Some(0));
    let first = &plan.routes[0].assessment;
    let second = &plan.routes[1].assessment;
    assert!((first.risk_score - second.risk_score).abs() < f64::EPSILON);
    assert!(first.segments.is_empty());
    assert!(plan.advisories.iter().all(|a| a.caution.is_none()));
}
