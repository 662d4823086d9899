#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line entry point for SafeRoute.
//!
//! Aggregates accident CSVs into hotspots, searches places, scores routes
//! between two points, and runs the API server.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use saferoute_geocoder::cache::{DEFAULT_CAPACITY, DEFAULT_TTL_DAYS};
use saferoute_geocoder::nominatim::NominatimClient;
use saferoute_geocoder::{ApiCache, Gazetteer, GeoSearch, RemoteGeocoder, service_registry};
use saferoute_hotspot::stats::{DEFAULT_TOP_LOCATIONS, HotspotStats};
use saferoute_server::{ServerConfig, build_state, run_server};
use saferoute_server_models::{
    ApiHotspot, ApiRoutesResponse, ApiSearchResponse, HotspotQueryParams, parse_lat_lng,
};

#[derive(Parser)]
#[command(name = "saferoute", about = "Accident-aware route planning")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate an accident CSV into hotspots
    Hotspots {
        /// Accident CSV file
        #[arg(long)]
        csv: PathBuf,
        /// Comma-separated severities to include (e.g. "fatal,serious")
        #[arg(long)]
        severities: Option<String>,
        /// Comma-separated weather labels to include
        #[arg(long)]
        weather: Option<String>,
        /// Comma-separated road types to include
        #[arg(long)]
        road_types: Option<String>,
        /// Number of hotspots to print
        #[arg(long, default_value = "20")]
        limit: usize,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Search for a place by name or "lat, lng"
    Search {
        /// Place name or coordinate
        query: String,
        /// Search the built-in gazetteer only
        #[arg(long)]
        offline: bool,
        /// Search cache file, read before and written after the search
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Print JSON instead of a list
        #[arg(long)]
        json: bool,
    },
    /// Score the routes between two points and print the safest
    Route {
        /// Accident CSV file used to build hotspots
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Start as "lat,lng"
        #[arg(long)]
        from: String,
        /// Destination as "lat,lng"
        #[arg(long)]
        to: String,
        /// Risk constants TOML overriding the built-in defaults
        #[arg(long)]
        risk_config: Option<PathBuf>,
        /// OSRM server base URL
        #[arg(long)]
        osrm_url: Option<String>,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// Run the HTTP API server
    Serve {
        /// Accident CSV file (overrides `SAFEROUTE_ACCIDENTS_CSV`)
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Search cache file (overrides `SAFEROUTE_CACHE_PATH`)
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Port to bind (overrides `PORT`)
        #[arg(long)]
        port: Option<u16>,
        /// Disable remote place search
        #[arg(long)]
        offline: bool,
    },
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Hotspots {
            csv,
            severities,
            weather,
            road_types,
            limit,
            json,
        } => {
            let config = ServerConfig {
                accidents_csv: Some(csv),
                offline: true,
                ..ServerConfig::default()
            };
            let state = build_state(&config)?;
            let params = HotspotQueryParams {
                severities,
                weather,
                road_types,
            };
            let hotspots = state.hotspots.filtered(&params.to_filter()?).hotspots;

            if json {
                let api: Vec<ApiHotspot> = hotspots.iter().take(limit).map(ApiHotspot::from).collect();
                println!("{}", serde_json::to_string_pretty(&api)?);
                return Ok(());
            }

            let stats = HotspotStats::compute(&hotspots, DEFAULT_TOP_LOCATIONS);
            println!(
                "{} hotspots from {} accidents ({} fatal, {} serious, {} minor)",
                stats.location_count,
                stats.total_accidents,
                stats.fatal_accidents,
                stats.serious_accidents,
                stats.minor_accidents
            );
            println!();
            println!(
                "{:>4} {:>10} {:>10} {:>6} {:>6} {:>8} {:>6} {:>9}  LABEL",
                "#", "LAT", "LNG", "TOTAL", "FATAL", "SERIOUS", "MINOR", "INTENSITY"
            );
            println!("{}", "-".repeat(80));
            for (i, h) in hotspots.iter().take(limit).enumerate() {
                println!(
                    "{:>4} {:>10.4} {:>10.4} {:>6} {:>6} {:>8} {:>6} {:>9.2}  {}",
                    i + 1,
                    h.lat,
                    h.lng,
                    h.total_accidents,
                    h.fatal_accidents,
                    h.serious_accidents,
                    h.minor_accidents,
                    h.intensity,
                    h.label.as_deref().unwrap_or("")
                );
            }
        }
        Commands::Search {
            query,
            offline,
            cache,
            json,
        } => {
            let api_cache = cache.as_ref().map_or_else(ApiCache::default, |path| {
                ApiCache::load(path, DEFAULT_CAPACITY, chrono::Duration::days(DEFAULT_TTL_DAYS))
            });
            let remote = if offline {
                None
            } else {
                service_registry::nominatim()
                    .map(NominatimClient::new)
                    .transpose()?
                    .map(|client| Arc::new(client) as Arc<dyn RemoteGeocoder>)
            };

            let search = GeoSearch::new(Gazetteer::embedded(), api_cache, remote);
            let outcome = search.search(&query).await;

            if let Some(path) = &cache {
                search.save_cache(path)?;
            }

            let response = ApiSearchResponse::from(&outcome);
            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            if response.results.is_empty() {
                println!("No places found for {query:?}");
            }
            for place in &response.results {
                println!("{:<40} {:>9.4}, {:>9.4}  {}", place.primary, place.lat, place.lng, place.secondary);
            }
        }
        Commands::Route {
            csv,
            from,
            to,
            risk_config,
            osrm_url,
            json,
        } => {
            let start = parse_lat_lng(&from).ok_or_else(|| format!("Invalid --from: {from}"))?;
            let end = parse_lat_lng(&to).ok_or_else(|| format!("Invalid --to: {to}"))?;

            let config = ServerConfig {
                accidents_csv: csv,
                risk_config,
                osrm_base_url: osrm_url,
                offline: true,
                ..ServerConfig::default()
            };
            let state = build_state(&config)?;
            let candidates = state.routes.fetch_routes(start, end).await?;

            let current = state.hotspots.snapshot();
            let plan = saferoute_risk::assess_routes(candidates, &current.hotspots, &state.risk);
            let response = ApiRoutesResponse::new(current.generation, &plan);

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            for route in &response.routes {
                println!(
                    "{} Route {}: {} / {}, risk {:.1}",
                    if route.is_safest { "*" } else { " " },
                    route.index + 1,
                    route.distance,
                    route.duration,
                    route.risk_score
                );
                for factor in &route.risk_factors {
                    println!("      - {factor}");
                }
            }

            if !response.advisories.is_empty() {
                println!();
                println!("Directions:");
                for step in &response.advisories {
                    println!("  {} ({})", step.instruction, step.distance);
                    if let Some(summary) = &step.hotspot_summary {
                        let speed = step
                            .recommended_speed_kmh
                            .map(|s| format!(", keep below {s} km/h"))
                            .unwrap_or_default();
                        println!("    ! {summary}{speed}");
                    }
                }
            }
        }
        Commands::Serve {
            csv,
            cache,
            port,
            offline,
        } => {
            let mut config = ServerConfig::from_env();
            if csv.is_some() {
                config.accidents_csv = csv;
            }
            if cache.is_some() {
                config.cache_path = cache;
            }
            if let Some(port) = port {
                config.port = port;
            }
            config.offline = offline;

            // actix-web needs its own system runtime.
            tokio::task::spawn_blocking(|| actix_web::rt::System::new().block_on(run_server(config)))
                .await??;
        }
    }

    Ok(())
}
