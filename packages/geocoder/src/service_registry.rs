//! Compile-time registry of remote geocoder configurations.
//!
//! Each provider is defined in a TOML file under `services/`. The
//! registry embeds these at compile time and exposes them via
//! [`all_services`] and [`enabled_services`].

use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// A geocoding service configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct GeocodingService {
    /// Unique identifier (e.g., `"nominatim"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Whether this service is used for remote search.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lookup order; lower values are tried first.
    pub priority: u32,
    /// Provider-specific configuration.
    pub provider: ProviderConfig,
}

/// Provider-specific configuration, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Nominatim / `OpenStreetMap` geocoder.
    Nominatim(NominatimConfig),
}

/// Settings for a Nominatim instance.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NominatimConfig {
    /// Free-text search endpoint.
    pub search_url: String,
    /// Reverse geocoding endpoint.
    pub reverse_url: String,
    /// `countrycodes` request parameter.
    pub country_codes: String,
    /// Lower-cased country name a result must mention.
    pub country_name: String,
    /// Lower-cased country names that disqualify a result.
    #[serde(default)]
    pub excluded_countries: Vec<String>,
    /// `limit` request parameter.
    pub limit: u32,
    /// Results kept after merging all variants.
    pub max_results: usize,
    /// Retries per request.
    pub max_retries: u32,
    /// Base retry delay in milliseconds.
    pub retry_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Query templates; `{q}` is replaced by the user query.
    pub query_variants: Vec<String>,
}

impl NominatimConfig {
    /// Retry policy for requests to this instance.
    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }

    /// Expands the query variants for `query`.
    #[must_use]
    pub fn variants(&self, query: &str) -> Vec<String> {
        if self.query_variants.is_empty() {
            return vec![query.to_string()];
        }
        self.query_variants
            .iter()
            .map(|template| template.replace("{q}", query))
            .collect()
    }

    /// Points both endpoints at another host, keeping their paths.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        self.search_url = format!("{base}/search");
        self.reverse_url = format!("{base}/reverse");
        self
    }
}

const fn default_true() -> bool {
    true
}

impl GeocodingService {
    /// Returns the provider's search URL regardless of variant.
    #[must_use]
    pub fn base_url(&self) -> &str {
        match &self.provider {
            ProviderConfig::Nominatim(config) => &config.search_url,
        }
    }
}

// ── Compile-time embedded TOML files ────────────────────────────────

const SERVICE_TOMLS: &[(&str, &str)] = &[("nominatim", include_str!("../services/nominatim.toml"))];

#[cfg(test)]
const EXPECTED_SERVICE_COUNT: usize = 1;

/// Returns all geocoding service configurations (enabled and disabled).
///
/// # Panics
///
/// Panics if any TOML config is malformed (this is a compile-time guarantee
/// since the configs are embedded).
#[must_use]
pub fn all_services() -> Vec<GeocodingService> {
    SERVICE_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            toml::de::from_str(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse geocoding service '{name}': {e}"))
        })
        .collect()
}

/// Returns only enabled services, sorted by priority (ascending).
#[must_use]
pub fn enabled_services() -> Vec<GeocodingService> {
    let mut services: Vec<GeocodingService> =
        all_services().into_iter().filter(|s| s.enabled).collect();
    services.sort_by_key(|s| s.priority);
    services
}

/// The Nominatim configuration of the first enabled Nominatim service.
#[must_use]
pub fn nominatim() -> Option<NominatimConfig> {
    enabled_services()
        .into_iter()
        .map(|s| match s.provider {
            ProviderConfig::Nominatim(config) => config,
        })
        .next()
}
