//! Runtime settings read from the environment.

use std::path::PathBuf;

/// Server settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Interface to bind (`BIND_ADDR`, default `127.0.0.1`).
    pub bind_addr: String,
    /// Port to bind (`PORT`, default `8080`).
    pub port: u16,
    /// Accident CSV loaded at startup (`SAFEROUTE_ACCIDENTS_CSV`).
    pub accidents_csv: Option<PathBuf>,
    /// Search cache file, loaded at startup and saved on shutdown
    /// (`SAFEROUTE_CACHE_PATH`).
    pub cache_path: Option<PathBuf>,
    /// Risk constants override (`SAFEROUTE_RISK_CONFIG`).
    pub risk_config: Option<PathBuf>,
    /// OSRM server (`OSRM_BASE_URL`).
    pub osrm_base_url: Option<String>,
    /// Nominatim server (`NOMINATIM_BASE_URL`).
    pub nominatim_base_url: Option<String>,
    /// Disable remote place search.
    pub offline: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8080,
            accidents_csv: None,
            cache_path: None,
            risk_config: None,
            osrm_base_url: None,
            nominatim_base_url: None,
            offline: false,
        }
    }
}

impl ServerConfig {
    /// Reads settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Empty values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: get("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            accidents_csv: get("SAFEROUTE_ACCIDENTS_CSV").map(PathBuf::from),
            cache_path: get("SAFEROUTE_CACHE_PATH").map(PathBuf::from),
            risk_config: get("SAFEROUTE_RISK_CONFIG").map(PathBuf::from),
            osrm_base_url: get("OSRM_BASE_URL"),
            nominatim_base_url: get("NOMINATIM_BASE_URL"),
            offline: false,
        }
    }
}
