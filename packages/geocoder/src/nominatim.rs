//! Nominatim / OpenStreetMap geocoder client.
//!
//! Free-text search is restricted to one country twice over: by the
//! `countrycodes` parameter and by a display-name check on every result,
//! since Nominatim still leaks border-region places from neighbours.
//! A query is fanned out into the configured variants (`"{q} city"`,
//! `"{q} village"`, ...) so that small localities surface too.
//!
//! The public instance allows about one request per second; retries with
//! backoff are handled by [`crate::retry`].
//!
//! See <https://nominatim.org/release-docs/develop/api/Search/>

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use saferoute_accident_models::Coordinate;

use crate::retry::{self, RetryPolicy};
use crate::search::RemoteGeocoder;
use crate::service_registry::NominatimConfig;
use crate::{CandidateSource, GeocodeError, PlaceCandidate};

/// Client for a Nominatim instance.
#[derive(Debug, Clone)]
pub struct NominatimClient {
    client: reqwest::Client,
    config: NominatimConfig,
    policy: RetryPolicy,
}

impl NominatimClient {
    /// Creates a client for `config`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(config: NominatimConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("saferoute/", env!("CARGO_PKG_VERSION")))
            .build()?;
        let policy = config.retry_policy();
        Ok(Self {
            client,
            config,
            policy,
        })
    }

    /// The configuration this client uses.
    #[must_use]
    pub const fn config(&self) -> &NominatimConfig {
        &self.config
    }

    /// Runs one search request for a single query variant.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails after retries or the
    /// response is malformed.
    pub async fn search_variant(&self, query: &str) -> Result<Vec<PlaceCandidate>, GeocodeError> {
        let limit = self.config.limit.to_string();
        let body = retry::send_json(&self.policy, || {
            self.client
                .get(&self.config.search_url)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en")
                .query(&[
                    ("q", query),
                    ("format", "json"),
                    ("limit", limit.as_str()),
                    ("addressdetails", "1"),
                    ("dedupe", "1"),
                    ("countrycodes", self.config.country_codes.as_str()),
                ])
        })
        .await?;

        parse_search_response(&body, &self.config)
    }

    /// Looks up a human-readable name for `coordinate`.
    ///
    /// Falls back to the formatted coordinate when the provider fails or
    /// has no name for the spot.
    pub async fn reverse(&self, coordinate: Coordinate) -> String {
        match self.try_reverse(coordinate).await {
            Ok(Some(name)) => name,
            Ok(None) => coordinate.to_string(),
            Err(e) => {
                log::warn!("Reverse geocoding {coordinate} failed: {e}");
                coordinate.to_string()
            }
        }
    }

    /// Like [`Self::reverse`] but reports failures.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request fails after retries or the
    /// response is malformed.
    pub async fn try_reverse(&self, coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        let lat = coordinate.lat.to_string();
        let lon = coordinate.lng.to_string();
        let body = retry::send_json(&self.policy, || {
            self.client
                .get(&self.config.reverse_url)
                .header(reqwest::header::ACCEPT_LANGUAGE, "en")
                .query(&[
                    ("lat", lat.as_str()),
                    ("lon", lon.as_str()),
                    ("format", "json"),
                    ("zoom", "18"),
                    ("addressdetails", "1"),
                ])
        })
        .await?;

        Ok(parse_reverse_response(&body))
    }
}

#[async_trait]
impl RemoteGeocoder for NominatimClient {
    /// Fans `query` out into every configured variant concurrently.
    ///
    /// A failing variant only loses its own results; the search fails
    /// only if every variant fails.
    async fn search(&self, query: &str) -> Result<Vec<PlaceCandidate>, GeocodeError> {
        let variants = self.config.variants(query);
        log::debug!("Searching Nominatim for {query:?} ({} variants)", variants.len());

        let responses =
            futures::future::join_all(variants.iter().map(|v| self.search_variant(v))).await;

        let mut batches = Vec::with_capacity(responses.len());
        let mut first_error = None;
        for (variant, response) in variants.iter().zip(responses) {
            match response {
                Ok(batch) => batches.push(batch),
                Err(e) => {
                    log::warn!("Nominatim variant {variant:?} failed: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        if batches.is_empty() {
            if let Some(e) = first_error {
                return Err(e);
            }
        }

        let results = combine_variant_results(batches, self.config.max_results);
        log::info!("Found {} remote results for {query:?}", results.len());
        Ok(results)
    }
}

/// Returns `true` if a result belongs to the configured country: its
/// display name or address country names it, and its display name names no
/// excluded country.
#[must_use]
pub fn is_in_country(display_name: &str, country: Option<&str>, config: &NominatimConfig) -> bool {
    let display_name = display_name.to_lowercase();
    let country = country.map(str::to_lowercase).unwrap_or_default();

    let names_country =
        display_name.contains(&config.country_name) || country == config.country_name;
    let names_other = config
        .excluded_countries
        .iter()
        .any(|c| display_name.contains(c.as_str()));

    names_country && !names_other
}

/// Parses a Nominatim search response, keeping only in-country results.
///
/// Entries without a usable position are skipped.
///
/// # Errors
///
/// Returns [`GeocodeError::Parse`] if the body is not an array.
pub fn parse_search_response(
    body: &serde_json::Value,
    config: &NominatimConfig,
) -> Result<Vec<PlaceCandidate>, GeocodeError> {
    let results = body.as_array().ok_or_else(|| GeocodeError::Parse {
        message: "Nominatim response is not an array".to_string(),
    })?;

    Ok(results
        .iter()
        .filter_map(parse_place)
        .filter(|c| is_in_country(&c.display_name, c.country.as_deref(), config))
        .collect())
}

fn parse_place(item: &serde_json::Value) -> Option<PlaceCandidate> {
    let lat = coordinate_field(&item["lat"])?;
    let lng = coordinate_field(&item["lon"])?;
    let coordinate = Coordinate::new(lat, lng).ok()?;

    let place_id = item["place_id"].as_u64()?;
    let display_name = item["display_name"].as_str().unwrap_or_default().to_string();
    let name = item["name"]
        .as_str()
        .filter(|n| !n.is_empty())
        .map_or_else(
            || {
                display_name
                    .split(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_string()
            },
            String::from,
        );
    let kind = item["addresstype"]
        .as_str()
        .or_else(|| item["type"].as_str())
        .unwrap_or("place")
        .to_string();
    let address = &item["address"];

    Some(PlaceCandidate {
        place_id,
        name,
        display_name,
        lat: coordinate.lat,
        lng: coordinate.lng,
        kind,
        importance: item["importance"].as_f64().unwrap_or(0.0),
        state: address["state"].as_str().map(String::from),
        country: address["country"].as_str().map(String::from),
        source: CandidateSource::Remote,
    })
}

/// Nominatim sends coordinates as strings; accept numbers too.
fn coordinate_field(value: &serde_json::Value) -> Option<f64> {
    value
        .as_str()
        .and_then(|s| s.parse::<f64>().ok())
        .or_else(|| value.as_f64())
}

/// Combines per-variant batches: first occurrence of each `place_id` wins,
/// then results are sorted by descending importance and capped.
#[must_use]
pub fn combine_variant_results(
    batches: Vec<Vec<PlaceCandidate>>,
    max_results: usize,
) -> Vec<PlaceCandidate> {
    let mut seen = BTreeSet::new();
    let mut results: Vec<PlaceCandidate> = batches
        .into_iter()
        .flatten()
        .filter(|c| seen.insert(c.place_id))
        .collect();
    results.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    results.truncate(max_results);
    results
}

/// Extracts the display name from a reverse geocoding response.
#[must_use]
pub fn parse_reverse_response(body: &serde_json::Value) -> Option<String> {
    body["display_name"]
        .as_str()
        .filter(|n| !n.trim().is_empty())
        .map(String::from)
}
