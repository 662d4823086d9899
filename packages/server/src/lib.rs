#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for SafeRoute.
//!
//! Holds the hotspot store, place search, route provider and risk
//! constants in shared state and serves the JSON API under `/api`. The
//! accident CSV and the search cache are loaded once at startup; the
//! cache is written back when the server stops.

pub mod config;
mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use saferoute_geocoder::cache::{DEFAULT_CAPACITY, DEFAULT_TTL_DAYS};
use saferoute_geocoder::nominatim::NominatimClient;
use saferoute_geocoder::{ApiCache, GeoSearch, GeocodeError, Gazetteer, RemoteGeocoder, service_registry};
use saferoute_hotspot::AggregationConfig;
use saferoute_hotspot::store::HotspotStore;
use saferoute_ingest::IngestError;
use saferoute_risk_models::{ConfigError, RiskConfig};
use saferoute_routing::service::RoutingService;
use saferoute_routing::{OsrmClient, RouteProvider, RoutingError};
use thiserror::Error;

pub use config::ServerConfig;

/// Errors building the server state.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The risk constants override is unusable.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The accident CSV could not be imported.
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// The route provider client could not be built.
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// The geocoder client could not be built.
    #[error(transparent)]
    Geocode(#[from] GeocodeError),
}

/// Shared application state.
pub struct AppState {
    /// Current hotspot generation and its history.
    pub hotspots: Arc<HotspotStore>,
    /// Layered place search.
    pub search: Arc<GeoSearch>,
    /// Reverse geocoder, absent when running offline.
    pub reverse: Option<Arc<NominatimClient>>,
    /// Candidate route source.
    pub routes: Arc<dyn RouteProvider>,
    /// Risk scoring constants.
    pub risk: Arc<RiskConfig>,
}

/// Builds the application state from `config`.
///
/// # Errors
///
/// Returns [`ServerError`] if the risk override or accident CSV cannot be
/// loaded, or an HTTP client cannot be built. A missing or unreadable
/// search cache only yields an empty cache.
pub fn build_state(config: &ServerConfig) -> Result<AppState, ServerError> {
    let risk = match &config.risk_config {
        Some(path) => {
            log::info!("Loading risk config from {}", path.display());
            RiskConfig::from_path(path)?
        }
        None => RiskConfig::embedded(),
    };

    let hotspots = HotspotStore::new(AggregationConfig::default());
    if let Some(path) = &config.accidents_csv {
        let import = saferoute_ingest::load_csv_path(path)?;
        let generation = hotspots.replace_records(import.records);
        log::info!(
            "Built {} hotspots (generation {})",
            generation.hotspots.len(),
            generation.generation
        );
    } else {
        log::warn!("No accident CSV configured; starting with an empty hotspot set");
    }

    let mut routing = RoutingService::osrm();
    if let Some(url) = &config.osrm_base_url {
        routing = routing.with_base_url(url);
    }
    log::info!("Routing via {} at {}", routing.name, routing.base_url);
    let routes: Arc<dyn RouteProvider> = Arc::new(OsrmClient::new(routing)?);

    let reverse = if config.offline {
        None
    } else {
        service_registry::nominatim()
            .map(|nominatim| {
                let nominatim = match &config.nominatim_base_url {
                    Some(url) => nominatim.with_base_url(url),
                    None => nominatim,
                };
                NominatimClient::new(nominatim).map(Arc::new)
            })
            .transpose()?
    };

    let cache = config.cache_path.as_ref().map_or_else(ApiCache::default, |path| {
        ApiCache::load(path, DEFAULT_CAPACITY, chrono::Duration::days(DEFAULT_TTL_DAYS))
    });
    let remote = reverse
        .clone()
        .map(|client| client as Arc<dyn RemoteGeocoder>);
    let search = GeoSearch::new(Gazetteer::embedded(), cache, remote);

    Ok(AppState {
        hotspots: Arc::new(hotspots),
        search: Arc::new(search),
        reverse,
        routes,
        risk: Arc::new(risk),
    })
}

/// Registers the `/api` routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .route("/health", web::get().to(handlers::health))
            .route("/hotspots", web::get().to(handlers::hotspots))
            .route("/stats", web::get().to(handlers::stats))
            .route("/reports", web::post().to(handlers::report))
            .route("/routes", web::get().to(handlers::routes))
            .route("/search", web::get().to(handlers::search))
            .route("/reverse", web::get().to(handlers::reverse)),
    );
}

/// Starts the SafeRoute API server.
///
/// Builds the state, serves until shutdown, then saves the search cache if
/// a cache path is configured. The caller provides the async runtime
/// (e.g. `#[actix_web::main]`) and initialises logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the state cannot be built, the
/// HTTP server fails to bind, or it encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    let state = web::Data::new(build_state(&config).map_err(std::io::Error::other)?);
    let search = Arc::clone(&state.search);

    let bind_addr = config.bind_addr.clone();
    let port = config.port;
    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await?;

    if let Some(path) = &config.cache_path {
        match search.save_cache(path) {
            Ok(()) => log::info!("Saved search cache to {}", path.display()),
            Err(e) => log::warn!("Failed to save search cache: {e}"),
        }
    }

    Ok(())
}
