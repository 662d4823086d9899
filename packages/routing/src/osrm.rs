//! OSRM route client.
//!
//! See <https://project-osrm.org/docs/v5.24.0/api/#route-service>

use std::time::Duration;

use async_trait::async_trait;
use saferoute_accident_models::Coordinate;
use saferoute_risk_models::{NavigationStep, RouteCandidate, RouteGeometry};

use crate::instructions::format_instruction;
use crate::service::RoutingService;
use crate::{RouteProvider, RoutingError};

/// Client for an OSRM `route` service.
#[derive(Debug, Clone)]
pub struct OsrmClient {
    client: reqwest::Client,
    service: RoutingService,
}

impl OsrmClient {
    /// Creates a client for `service`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::Http`] if the HTTP client cannot be built.
    pub fn new(service: RoutingService) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(service.timeout_secs))
            .user_agent(concat!("saferoute/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, service })
    }

    /// The service this client talks to.
    #[must_use]
    pub const fn service(&self) -> &RoutingService {
        &self.service
    }

    /// Builds the route request URL for `start` → `end`.
    #[must_use]
    pub fn route_url(&self, start: Coordinate, end: Coordinate) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson&alternatives=true&steps=true",
            self.service.base_url, self.service.profile, start.lng, start.lat, end.lng, end.lat
        )
    }
}

#[async_trait]
impl RouteProvider for OsrmClient {
    async fn fetch_routes(
        &self,
        start: Coordinate,
        end: Coordinate,
    ) -> Result<Vec<RouteCandidate>, RoutingError> {
        let url = self.route_url(start, end);
        log::debug!("Fetching routes from OSRM: {url}");

        let resp = self.client.get(&url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            log::warn!("OSRM returned HTTP {status}");
            return Err(RoutingError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await?;
        let routes = parse_response(&body)?;
        log::info!("Found {} routes from {start} to {end}", routes.len());
        Ok(routes)
    }
}

/// Parses an OSRM `route` response.
///
/// Steps with zero distance are dropped except for the final `arrive`.
/// Routes whose geometry is invalid are skipped.
///
/// # Errors
///
/// * [`RoutingError::NoRoutes`] if `code` is not `"Ok"` or no usable route
///   remains
/// * [`RoutingError::Parse`] if the payload is structurally malformed
pub fn parse_response(body: &serde_json::Value) -> Result<Vec<RouteCandidate>, RoutingError> {
    let code = body["code"].as_str().ok_or_else(|| RoutingError::Parse {
        message: "Missing code in OSRM response".to_string(),
    })?;
    if code != "Ok" {
        return Err(RoutingError::NoRoutes {
            code: code.to_string(),
        });
    }

    let routes = body["routes"].as_array().ok_or_else(|| RoutingError::Parse {
        message: "OSRM routes is not an array".to_string(),
    })?;

    let mut candidates = Vec::with_capacity(routes.len());
    for (i, route) in routes.iter().enumerate() {
        match parse_route(route) {
            Ok(candidate) => candidates.push(candidate),
            Err(e) => log::warn!("Skipping OSRM route {i}: {e}"),
        }
    }

    if candidates.is_empty() {
        return Err(RoutingError::NoRoutes {
            code: code.to_string(),
        });
    }
    Ok(candidates)
}

fn parse_route(route: &serde_json::Value) -> Result<RouteCandidate, RoutingError> {
    let distance_meters = number(route, "distance")?;
    let duration_seconds = number(route, "duration")?;

    let pairs: Vec<[f64; 2]> = route["geometry"]["coordinates"]
        .as_array()
        .ok_or_else(|| RoutingError::Parse {
            message: "Missing geometry.coordinates in OSRM route".to_string(),
        })?
        .iter()
        .map(lng_lat)
        .collect::<Result<_, _>>()?;

    let geometry = RouteGeometry::from_lng_lat(&pairs).map_err(|e| RoutingError::Parse {
        message: e.to_string(),
    })?;

    let mut steps = Vec::new();
    if let Some(legs) = route["legs"].as_array() {
        for leg in legs {
            for step in leg["steps"].as_array().into_iter().flatten() {
                if let Some(step) = parse_step(step)? {
                    steps.push(step);
                }
            }
        }
    }

    Ok(RouteCandidate {
        distance_meters,
        duration_seconds,
        geometry,
        steps,
    })
}

fn parse_step(step: &serde_json::Value) -> Result<Option<NavigationStep>, RoutingError> {
    let maneuver = &step["maneuver"];
    let maneuver_type = maneuver["type"].as_str().unwrap_or_default().to_string();
    let distance_meters = number(step, "distance")?;

    if distance_meters <= 0.0 && maneuver_type != "arrive" {
        return Ok(None);
    }

    let modifier = maneuver["modifier"].as_str().map(String::from);
    let street_name = step["name"].as_str().unwrap_or_default().to_string();
    let [lng, lat] = lng_lat(&maneuver["location"])?;

    Ok(Some(NavigationStep {
        instruction: format_instruction(&maneuver_type, modifier.as_deref(), &street_name),
        street_name,
        distance_meters,
        duration_seconds: number(step, "duration")?,
        maneuver_type,
        modifier,
        location: Coordinate { lat, lng },
    }))
}

fn number(value: &serde_json::Value, field: &str) -> Result<f64, RoutingError> {
    value[field].as_f64().ok_or_else(|| RoutingError::Parse {
        message: format!("Missing {field} in OSRM response"),
    })
}

fn lng_lat(value: &serde_json::Value) -> Result<[f64; 2], RoutingError> {
    match value.as_array().map(Vec::as_slice) {
        Some([lng, lat, ..]) => match (lng.as_f64(), lat.as_f64()) {
            (Some(lng), Some(lat)) => Ok([lng, lat]),
            _ => Err(RoutingError::Parse {
                message: "Non-numeric coordinate in OSRM response".to_string(),
            }),
        },
        _ => Err(RoutingError::Parse {
            message: "Malformed coordinate in OSRM response".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> serde_json::Value {
        serde_json::json!({
            "code": "Ok",
            "routes": [
                {
                    "distance": 12400.0,
                    "duration": 1680.0,
                    "geometry": {
                        "coordinates": [[78.4867, 17.385], [78.49, 17.39], [78.50, 17.40]]
                    },
                    "legs": [{
                        "steps": [
                            {
                                "distance": 800.0,
                                "duration": 60.0,
                                "name": "MG Road",
                                "maneuver": { "type": "depart", "location": [78.4867, 17.385] }
                            },
                            {
                                "distance": 0.0,
                                "duration": 0.0,
                                "name": "",
                                "maneuver": { "type": "new name", "location": [78.49, 17.39] }
                            },
                            {
                                "distance": 11600.0,
                                "duration": 1620.0,
                                "name": "",
                                "maneuver": {
                                    "type": "turn",
                                    "modifier": "left",
                                    "location": [78.49, 17.39]
                                }
                            },
                            {
                                "distance": 0.0,
                                "duration": 0.0,
                                "name": "",
                                "maneuver": { "type": "arrive", "location": [78.50, 17.40] }
                            }
                        ]
                    }]
                },
                {
                    "distance": 10800.0,
                    "duration": 1440.0,
                    "geometry": { "coordinates": [[78.4867, 17.385], [78.50, 17.40]] },
                    "legs": []
                }
            ]
        })
    }

    #[test]
    fn parses_routes_and_filters_empty_steps() {
        let routes = parse_response(&fixture()).unwrap();
        assert_eq!(routes.len(), 2);

        let first = &routes[0];
        assert!((first.distance_meters - 12400.0).abs() < f64::EPSILON);
        assert_eq!(first.geometry.len(), 3);
        assert!((first.geometry.coordinates[0].lat - 17.385).abs() < 1e-9);
        assert!((first.geometry.coordinates[0].lng - 78.4867).abs() < 1e-9);

        let instructions: Vec<&str> = first.steps.iter().map(|s| s.instruction.as_str()).collect();
        assert_eq!(
            instructions,
            vec![
                "Start on MG Road",
                "Turn left onto the road",
                "Arrive at your destination"
            ]
        );
        assert_eq!(first.steps[1].modifier.as_deref(), Some("left"));
        assert!((first.steps[2].location.lat - 17.40).abs() < 1e-9);

        assert!(routes[1].steps.is_empty());
    }

    #[test]
    fn non_ok_code_is_no_routes() {
        let body = serde_json::json!({ "code": "NoRoute", "routes": [] });
        assert!(matches!(
            parse_response(&body),
            Err(RoutingError::NoRoutes { code }) if code == "NoRoute"
        ));
    }

    #[test]
    fn empty_route_list_is_no_routes() {
        let body = serde_json::json!({ "code": "Ok", "routes": [] });
        assert!(matches!(parse_response(&body), Err(RoutingError::NoRoutes { .. })));
    }

    #[test]
    fn malformed_payload_is_parse_error() {
        let body = serde_json::json!({ "routes": [] });
        assert!(matches!(parse_response(&body), Err(RoutingError::Parse { .. })));
    }

    #[test]
    fn routes_with_bad_geometry_are_skipped() {
        let body = serde_json::json!({
            "code": "Ok",
            "routes": [
                { "distance": 1.0, "duration": 1.0, "geometry": { "coordinates": [[78.0, 17.0]] } },
                { "distance": 1.0, "duration": 1.0, "geometry": { "coordinates": [[78.0, 17.0], [78.1, 17.1]] } }
            ]
        });
        let routes = parse_response(&body).unwrap();
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn route_url_uses_lng_lat_order() {
        let client = OsrmClient::new(RoutingService::osrm().with_base_url("http://osrm.local"))
            .unwrap();
        let url = client.route_url(
            Coordinate {
                lat: 17.385,
                lng: 78.4867,
            },
            Coordinate {
                lat: 12.9716,
                lng: 77.5946,
            },
        );
        assert_eq!(
            url,
            "http://osrm.local/route/v1/driving/78.4867,17.385;77.5946,12.9716?overview=full&geometries=geojson&alternatives=true&steps=true"
        );
    }
}
