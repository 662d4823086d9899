//! Layered place search.
//!
//! A search resolves in the first layer that can answer it:
//!
//! ```text
//! coordinate query ─► Coordinate
//! too short        ─► Empty
//! local ≥ K hits   ─► Local
//! cache hit        ─► Cached   (local + cached remote)
//! remote fetch     ─► Remote   (local + remote)
//!                  └► LocalFallback on error or timeout
//! ```
//!
//! Every path ends in a [`SearchOutcome`]; remote failures never reach the
//! caller. The cache lock is only taken for the lookup and for the final
//! insert, never across the remote fetch.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::cache::{ApiCache, CacheError, CacheSnapshot};
use crate::gazetteer::Gazetteer;
use crate::merge::merge_results;
use crate::{
    GeocodeError, MIN_QUERY_CHARS, PlaceCandidate, coordinate_candidate, normalize_query,
    parse_coordinate_query,
};

/// Local hit count at which the remote layers are skipped.
pub const DEFAULT_LOCAL_SUFFICIENT: usize = 5;

/// Upper bound on one remote search, including retries.
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

/// A remote free-text geocoder.
#[async_trait]
pub trait RemoteGeocoder: Send + Sync {
    /// Returns candidates for `query`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on any transport, status or payload failure.
    async fn search(&self, query: &str) -> Result<Vec<PlaceCandidate>, GeocodeError>;
}

/// Which layer answered a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// The query was a coordinate pair.
    Coordinate,
    /// The query was too short to search.
    Empty,
    /// The gazetteer alone had enough hits (or no remote is configured).
    Local,
    /// Gazetteer hits merged with cached remote results.
    Cached,
    /// Gazetteer hits merged with fresh remote results.
    Remote,
    /// The remote fetch failed or timed out; gazetteer hits only.
    LocalFallback,
}

/// Result of one search.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOutcome {
    /// The query as given.
    pub query: String,
    /// Layer that produced the candidates.
    pub resolution: Resolution,
    /// Ranked candidates.
    pub candidates: Vec<PlaceCandidate>,
}

/// Place search over the gazetteer, the result cache and an optional
/// remote geocoder.
pub struct GeoSearch {
    gazetteer: Gazetteer,
    cache: Mutex<ApiCache>,
    remote: Option<Arc<dyn RemoteGeocoder>>,
    local_sufficient: usize,
    remote_timeout: Duration,
}

impl GeoSearch {
    /// Creates a search. Pass `None` for `remote` to search offline.
    #[must_use]
    pub fn new(
        gazetteer: Gazetteer,
        cache: ApiCache,
        remote: Option<Arc<dyn RemoteGeocoder>>,
    ) -> Self {
        Self {
            gazetteer,
            cache: Mutex::new(cache),
            remote,
            local_sufficient: DEFAULT_LOCAL_SUFFICIENT,
            remote_timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    /// Sets the local hit count that skips the remote layers.
    #[must_use]
    pub fn with_local_sufficient(mut self, local_sufficient: usize) -> Self {
        self.local_sufficient = local_sufficient;
        self
    }

    /// Sets the remote fetch deadline.
    #[must_use]
    pub fn with_remote_timeout(mut self, remote_timeout: Duration) -> Self {
        self.remote_timeout = remote_timeout;
        self
    }

    /// The gazetteer searched locally.
    #[must_use]
    pub const fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    /// Returns `true` if a remote geocoder is configured.
    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    /// Copies the current cache contents.
    #[must_use]
    pub fn cache_snapshot(&self) -> CacheSnapshot {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .snapshot()
    }

    /// Persists the cache to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the file cannot be written.
    pub fn save_cache(&self, path: &Path) -> Result<(), CacheError> {
        let cache = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        cache.save(path)
    }

    /// Runs the layered search for `query`.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let outcome = |resolution, candidates| SearchOutcome {
            query: query.to_string(),
            resolution,
            candidates,
        };

        if let Some(coordinate) = parse_coordinate_query(query) {
            return outcome(
                Resolution::Coordinate,
                vec![coordinate_candidate(coordinate)],
            );
        }

        let key = normalize_query(query);
        if key.chars().count() < MIN_QUERY_CHARS {
            return outcome(Resolution::Empty, Vec::new());
        }

        let local = self.gazetteer.search_local(&key);
        let Some(remote) = self.remote.as_ref() else {
            return outcome(Resolution::Local, local);
        };
        if local.len() >= self.local_sufficient {
            return outcome(Resolution::Local, local);
        }

        let cached = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .lookup(&key);
        if let Some(cached) = cached {
            log::debug!("Search cache hit for {key:?}");
            return outcome(Resolution::Cached, merge_results(&local, &cached));
        }

        match tokio::time::timeout(self.remote_timeout, remote.search(&key)).await {
            Ok(Ok(results)) => {
                if !results.is_empty() {
                    self.cache
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .store(&key, results.clone());
                }
                outcome(Resolution::Remote, merge_results(&local, &results))
            }
            Ok(Err(e)) => {
                log::warn!("Remote search for {key:?} failed, using local results: {e}");
                outcome(Resolution::LocalFallback, local)
            }
            Err(_) => {
                log::warn!(
                    "Remote search for {key:?} timed out after {:?}, using local results",
                    self.remote_timeout
                );
                outcome(Resolution::LocalFallback, local)
            }
        }
    }
}

/// Last-query-wins wrapper for one input field.
///
/// Each call to [`Self::search`] supersedes the ones before it; a search
/// that finishes after a newer one has started yields `None`.
pub struct SearchSession {
    engine: Arc<GeoSearch>,
    latest: AtomicU64,
}

impl SearchSession {
    /// Creates a session over `engine`.
    #[must_use]
    pub const fn new(engine: Arc<GeoSearch>) -> Self {
        Self {
            engine,
            latest: AtomicU64::new(0),
        }
    }

    /// Searches for `query`, returning `None` if a newer search was issued
    /// on this session before this one finished.
    pub async fn search(&self, query: &str) -> Option<SearchOutcome> {
        let ticket = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        let outcome = self.engine.search(query).await;
        if self.latest.load(Ordering::SeqCst) == ticket {
            Some(outcome)
        } else {
            log::debug!("Discarding stale results for {query:?}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::CandidateSource;
    use crate::gazetteer::GazetteerEntry;

    struct FakeRemote {
        results: Vec<PlaceCandidate>,
        fail: bool,
        delay: Duration,
        slow_query: Option<&'static str>,
        calls: AtomicUsize,
    }

    impl FakeRemote {
        fn returning(results: Vec<PlaceCandidate>) -> Self {
            Self {
                results,
                fail: false,
                delay: Duration::ZERO,
                slow_query: None,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RemoteGeocoder for FakeRemote {
        async fn search(&self, query: &str) -> Result<Vec<PlaceCandidate>, GeocodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.slow_query.is_none_or(|q| q == query) && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                return Err(GeocodeError::RateLimited);
            }
            Ok(self.results.clone())
        }
    }

    fn entry(name: &str, lat: f64) -> GazetteerEntry {
        GazetteerEntry {
            name: name.to_string(),
            display_name: format!("{name}, Hyderabad, Telangana, India"),
            lat,
            lng: 78.4,
            kind: "suburb".to_string(),
            state: "Telangana".to_string(),
            country: "India".to_string(),
            aliases: Vec::new(),
        }
    }

    fn gazetteer() -> Gazetteer {
        Gazetteer::new(vec![
            entry("Ameerpet", 17.43),
            entry("Kondapur", 17.46),
            entry("Nagar One", 17.1),
            entry("Nagar Two", 17.2),
            entry("Nagar Three", 17.3),
            entry("Nagar Four", 17.4),
            entry("Nagar Five", 17.5),
        ])
    }

    fn remote_place(name: &str, lat: f64) -> PlaceCandidate {
        PlaceCandidate {
            place_id: 7,
            name: name.to_string(),
            display_name: format!("{name}, India"),
            lat,
            lng: 78.4,
            kind: "village".to_string(),
            importance: 0.3,
            state: None,
            country: Some("India".to_string()),
            source: CandidateSource::Remote,
        }
    }

    fn engine(remote: &Arc<FakeRemote>) -> GeoSearch {
        let remote: Arc<dyn RemoteGeocoder> = remote.clone();
        GeoSearch::new(gazetteer(), ApiCache::default(), Some(remote))
    }

    #[tokio::test]
    async fn coordinate_query_skips_lookup() {
        let remote = Arc::new(FakeRemote::returning(Vec::new()));
        let outcome = engine(&remote).search("17.385, 78.4867").await;
        assert_eq!(outcome.resolution, Resolution::Coordinate);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].source, CandidateSource::Coordinate);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn short_query_is_empty() {
        let remote = Arc::new(FakeRemote::returning(Vec::new()));
        let outcome = engine(&remote).search(" a ").await;
        assert_eq!(outcome.resolution, Resolution::Empty);
        assert!(outcome.candidates.is_empty());
    }

    #[tokio::test]
    async fn enough_local_hits_skip_remote() {
        let remote = Arc::new(FakeRemote::returning(vec![remote_place("Far", 20.0)]));
        let outcome = engine(&remote).search("nagar").await;
        assert_eq!(outcome.resolution, Resolution::Local);
        assert_eq!(outcome.candidates.len(), 5);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn remote_results_are_merged_then_cached() {
        let remote = Arc::new(FakeRemote::returning(vec![
            remote_place("Kondapur duplicate", 17.4601),
            remote_place("Kondapur Village", 18.2),
        ]));
        let search = engine(&remote);

        let first = search.search("Kondapur").await;
        assert_eq!(first.resolution, Resolution::Remote);
        let names: Vec<&str> = first.candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Kondapur", "Kondapur Village"]);

        let second = search.search("kondapur").await;
        assert_eq!(second.resolution, Resolution::Cached);
        assert_eq!(second.candidates, first.candidates);
        assert_eq!(remote.calls.load(Ordering::SeqCst), 1);
        assert_eq!(search.cache_snapshot().entries.len(), 1);
    }

    #[tokio::test]
    async fn remote_failure_falls_back_to_local() {
        let remote = Arc::new(FakeRemote {
            fail: true,
            ..FakeRemote::returning(Vec::new())
        });
        let search = engine(&remote);
        let outcome = search.search("ameerpet").await;
        assert_eq!(outcome.resolution, Resolution::LocalFallback);
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.candidates[0].name, "Ameerpet");
        assert!(search.cache_snapshot().entries.is_empty());
    }

    #[tokio::test]
    async fn remote_timeout_falls_back_to_local() {
        let remote = Arc::new(FakeRemote {
            delay: Duration::from_millis(500),
            ..FakeRemote::returning(vec![remote_place("Late", 19.0)])
        });
        let search = engine(&remote).with_remote_timeout(Duration::from_millis(20));
        let outcome = search.search("kondapur").await;
        assert_eq!(outcome.resolution, Resolution::LocalFallback);
        assert_eq!(outcome.candidates[0].name, "Kondapur");
    }

    #[tokio::test]
    async fn empty_remote_results_are_not_cached() {
        let remote = Arc::new(FakeRemote::returning(Vec::new()));
        let search = engine(&remote);
        let outcome = search.search("zzqx").await;
        assert_eq!(outcome.resolution, Resolution::Remote);
        assert!(outcome.candidates.is_empty());
        assert!(search.cache_snapshot().entries.is_empty());
    }

    #[tokio::test]
    async fn offline_search_is_local_only() {
        let search = GeoSearch::new(gazetteer(), ApiCache::default(), None);
        assert!(!search.has_remote());
        let outcome = search.search("kondapur").await;
        assert_eq!(outcome.resolution, Resolution::Local);
        assert_eq!(outcome.candidates.len(), 1);
    }

    #[tokio::test]
    async fn session_discards_superseded_results() {
        let remote = Arc::new(FakeRemote {
            delay: Duration::from_millis(200),
            slow_query: Some("kon"),
            ..FakeRemote::returning(vec![remote_place("Konaseema", 16.6)])
        });
        let session = SearchSession::new(Arc::new(engine(&remote)));

        let (stale, fresh) = tokio::join!(session.search("kon"), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            session.search("kondapur").await
        });

        assert!(stale.is_none());
        let fresh = fresh.unwrap();
        assert_eq!(fresh.query, "kondapur");
        assert_eq!(fresh.candidates[0].name, "Kondapur");
    }
}
