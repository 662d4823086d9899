//! Compile-time embedded route provider configuration.
//!
//! The provider is described by `services/osrm.toml`; a different server
//! can be selected at runtime with [`RoutingService::with_base_url`].

use serde::Deserialize;

/// A route provider configuration loaded from TOML.
#[derive(Debug, Clone, Deserialize)]
pub struct RoutingService {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Server base URL without a trailing slash.
    pub base_url: String,
    /// OSRM routing profile (`"driving"`).
    pub profile: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

const fn default_timeout() -> u64 {
    15
}

const OSRM_TOML: &str = include_str!("../services/osrm.toml");

impl RoutingService {
    /// Returns the embedded OSRM configuration.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the config is embedded).
    #[must_use]
    pub fn osrm() -> Self {
        toml::de::from_str(OSRM_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse routing service 'osrm': {e}"))
    }

    /// Returns a copy pointing at `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}
