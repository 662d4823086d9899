//! HTTP handler functions for the SafeRoute API.

use actix_web::{HttpResponse, web};
use saferoute_accident_models::Coordinate;
use saferoute_hotspot::stats::{DEFAULT_TOP_LOCATIONS, HotspotStats};
use saferoute_routing::RoutingError;
use saferoute_server_models::{
    ApiHealth, ApiHotspot, ApiHotspotsResponse, ApiReverse, ApiRoutesResponse, ApiSearchResponse,
    ApiStats, HotspotQueryParams, ReportRequest, ReportResponse, ReverseQueryParams,
    RouteQueryParams, SearchQueryParams, parse_lat_lng,
};

use crate::AppState;

fn error_json(message: impl std::fmt::Display) -> serde_json::Value {
    serde_json::json!({ "error": message.to_string() })
}

/// `GET /api/health`
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let current = state.hotspots.snapshot();
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
        hotspot_generation: current.generation,
        hotspot_count: current.hotspots.len(),
        remote_search: state.search.has_remote(),
    })
}

/// `GET /api/hotspots`
///
/// Returns hotspots, most dangerous first, optionally filtered by
/// severity, weather and road type.
pub async fn hotspots(
    state: web::Data<AppState>,
    params: web::Query<HotspotQueryParams>,
) -> HttpResponse {
    let criteria = match params.to_filter() {
        Ok(criteria) => criteria,
        Err(e) => return HttpResponse::BadRequest().json(error_json(e)),
    };
    let current = state.hotspots.snapshot();
    let aggregation = state.hotspots.filtered_in(&current, &criteria);

    HttpResponse::Ok().json(ApiHotspotsResponse {
        generation: current.generation,
        hotspots: aggregation.hotspots.iter().map(ApiHotspot::from).collect(),
    })
}

/// `GET /api/stats`
pub async fn stats(state: web::Data<AppState>) -> HttpResponse {
    let current = state.hotspots.snapshot();
    HttpResponse::Ok().json(ApiStats {
        generation: current.generation,
        excluded_records: current.report.excluded(),
        stats: HotspotStats::compute(&current.hotspots, DEFAULT_TOP_LOCATIONS),
    })
}

/// `POST /api/reports`
///
/// Accepts a live accident report and publishes a new hotspot generation
/// that includes it.
pub async fn report(state: web::Data<AppState>, body: web::Json<ReportRequest>) -> HttpResponse {
    let report = match body.into_inner().into_live_report(chrono::Utc::now()) {
        Ok(report) => report,
        Err(e) => return HttpResponse::BadRequest().json(error_json(e)),
    };

    log::info!(
        "Live {:?} report at {}",
        report.severity,
        report.coordinate
    );
    let published = state.hotspots.add_live_reports(std::iter::once(report));

    HttpResponse::Created().json(ReportResponse {
        generation: published.generation,
        hotspot_count: published.hotspots.len(),
    })
}

/// `GET /api/routes?from=lat,lng&to=lat,lng`
///
/// Fetches candidate routes, scores each against the current hotspots and
/// returns them with the safest marked and its advisories.
pub async fn routes(
    state: web::Data<AppState>,
    params: web::Query<RouteQueryParams>,
) -> HttpResponse {
    let (Some(start), Some(end)) = (parse_lat_lng(&params.from), parse_lat_lng(&params.to)) else {
        return HttpResponse::BadRequest()
            .json(error_json("from and to must be \"lat,lng\" coordinates"));
    };

    let candidates = match state.routes.fetch_routes(start, end).await {
        Ok(candidates) => candidates,
        Err(e @ RoutingError::NoRoutes { .. }) => {
            return HttpResponse::NotFound().json(error_json(e));
        }
        Err(e) => {
            log::error!("Failed to fetch routes: {e}");
            return HttpResponse::BadGateway().json(error_json("Failed to fetch routes"));
        }
    };

    let current = state.hotspots.snapshot();
    let plan = saferoute_risk::assess_routes(candidates, &current.hotspots, &state.risk);
    if plan.routes.is_empty() {
        return HttpResponse::NotFound().json(error_json("No usable routes found"));
    }

    HttpResponse::Ok().json(ApiRoutesResponse::new(current.generation, &plan))
}

/// `GET /api/search?q=`
pub async fn search(
    state: web::Data<AppState>,
    params: web::Query<SearchQueryParams>,
) -> HttpResponse {
    let outcome = state.search.search(&params.q).await;
    HttpResponse::Ok().json(ApiSearchResponse::from(&outcome))
}

/// `GET /api/reverse?lat=&lng=`
///
/// Names a coordinate, falling back to the formatted coordinate when no
/// geocoder is configured or it cannot answer.
pub async fn reverse(
    state: web::Data<AppState>,
    params: web::Query<ReverseQueryParams>,
) -> HttpResponse {
    let coordinate = match Coordinate::new(params.lat, params.lng) {
        Ok(coordinate) => coordinate,
        Err(e) => return HttpResponse::BadRequest().json(error_json(e)),
    };

    let display_name = match &state.reverse {
        Some(client) => client.reverse(coordinate).await,
        None => coordinate.to_string(),
    };

    HttpResponse::Ok().json(ApiReverse {
        lat: coordinate.lat,
        lng: coordinate.lng,
        display_name,
    })
}
