//! TTL- and size-bounded cache of remote geocoder results.
//!
//! Entries are keyed by the normalised query text and kept in insertion
//! order. Storing beyond capacity evicts the oldest insertion (FIFO).
//! Entries older than the TTL are ignored on read and dropped on the next
//! write. The cache is never the system of record: losing it (or failing
//! to load it) just means a cold start.

use std::collections::VecDeque;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{MIN_QUERY_CHARS, PlaceCandidate, normalize_query};

/// Default maximum number of entries.
pub const DEFAULT_CAPACITY: usize = 500;

/// Default time-to-live in days.
pub const DEFAULT_TTL_DAYS: i64 = 7;

/// Version written into persisted snapshots.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Errors persisting or restoring the cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Reading or writing the cache file failed.
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache file is not a valid snapshot.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The snapshot was written by an incompatible version.
    #[error("Unsupported cache snapshot version {version}")]
    UnsupportedVersion {
        /// Version found in the file.
        version: u32,
    },
}

/// One cached result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// Normalised query text.
    pub query_key: String,
    /// Results returned for the query.
    pub results: Vec<PlaceCandidate>,
    /// When the entry was stored.
    pub inserted_at: DateTime<Utc>,
}

/// Serialisable cache contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    /// Format version.
    pub version: u32,
    /// Entries, oldest first.
    pub entries: Vec<CacheEntry>,
}

/// Bounded cache of remote search results.
#[derive(Debug, Clone)]
pub struct ApiCache {
    entries: VecDeque<CacheEntry>,
    capacity: usize,
    ttl: Duration,
}

impl Default for ApiCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, Duration::days(DEFAULT_TTL_DAYS))
    }
}

impl ApiCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
            ttl,
        }
    }

    /// Maximum number of entries.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entry time-to-live.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of stored entries, including expired ones not yet dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that are still fresh at `now`.
    #[must_use]
    pub fn fresh_len_at(&self, now: DateTime<Utc>) -> usize {
        self.entries.iter().filter(|e| self.is_fresh(e, now)).count()
    }

    /// Looks up cached results for `query`.
    ///
    /// See [`Self::lookup_at`].
    #[must_use]
    pub fn lookup(&self, query: &str) -> Option<Vec<PlaceCandidate>> {
        self.lookup_at(query, Utc::now())
    }

    /// Looks up cached results for `query` as of `now`.
    ///
    /// An exact key match wins. Otherwise the most recently stored fresh
    /// entry whose key is a prefix of the query, or has the query as a
    /// prefix, is returned.
    #[must_use]
    pub fn lookup_at(&self, query: &str, now: DateTime<Utc>) -> Option<Vec<PlaceCandidate>> {
        let key = normalize_query(query);
        if key.chars().count() < MIN_QUERY_CHARS {
            return None;
        }

        let fresh = || self.entries.iter().rev().filter(|e| self.is_fresh(e, now));

        fresh()
            .find(|e| e.query_key == key)
            .or_else(|| {
                fresh().find(|e| key.starts_with(&e.query_key) || e.query_key.starts_with(&key))
            })
            .map(|e| e.results.clone())
    }

    /// Stores `results` for `query`, replacing any entry with the same key.
    ///
    /// See [`Self::store_at`].
    pub fn store(&mut self, query: &str, results: Vec<PlaceCandidate>) {
        self.store_at(query, results, Utc::now());
    }

    /// Stores `results` for `query` with insertion time `now`.
    ///
    /// Drops expired entries, then evicts the oldest insertions until the
    /// cache is within capacity.
    pub fn store_at(&mut self, query: &str, results: Vec<PlaceCandidate>, now: DateTime<Utc>) {
        let key = normalize_query(query);
        if key.is_empty() || self.capacity == 0 {
            return;
        }

        self.entries.retain(|e| e.query_key != key);
        self.entries.push_back(CacheEntry {
            query_key: key,
            results,
            inserted_at: now,
        });
        self.prune(now);
    }

    /// Drops expired entries and enforces capacity.
    pub fn prune(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        self.entries.retain(|e| now - e.inserted_at < ttl);
        while self.entries.len() > self.capacity {
            if let Some(evicted) = self.entries.pop_front() {
                log::trace!("Evicting cached query {:?}", evicted.query_key);
            }
        }
    }

    fn is_fresh(&self, entry: &CacheEntry, now: DateTime<Utc>) -> bool {
        now - entry.inserted_at < self.ttl
    }

    /// Copies the cache contents for persistence.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            version: SNAPSHOT_VERSION,
            entries: self.entries.iter().cloned().collect(),
        }
    }

    /// Rebuilds a cache from a snapshot, dropping entries that are expired
    /// at `now` and keeping only the newest `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::UnsupportedVersion`] for an unknown snapshot
    /// version.
    pub fn from_snapshot(
        snapshot: CacheSnapshot,
        capacity: usize,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self, CacheError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CacheError::UnsupportedVersion {
                version: snapshot.version,
            });
        }

        let mut cache = Self::new(capacity, ttl);
        cache.entries = snapshot.entries.into();
        cache.prune(now);
        Ok(cache)
    }

    /// Writes the cache to `path` as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if serialisation or the write fails.
    pub fn save(&self, path: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_vec(&self.snapshot())?;
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        log::debug!("Saved {} cache entries to {}", self.len(), path.display());
        Ok(())
    }

    /// Reads a cache previously written by [`Self::save`].
    ///
    /// # Errors
    ///
    /// Returns [`CacheError`] if the file cannot be read or parsed.
    pub fn try_load(path: &Path, capacity: usize, ttl: Duration) -> Result<Self, CacheError> {
        let bytes = std::fs::read(path)?;
        let snapshot: CacheSnapshot = serde_json::from_slice(&bytes)?;
        Self::from_snapshot(snapshot, capacity, ttl, Utc::now())
    }

    /// Like [`Self::try_load`], but any failure yields an empty cache.
    #[must_use]
    pub fn load(path: &Path, capacity: usize, ttl: Duration) -> Self {
        match Self::try_load(path, capacity, ttl) {
            Ok(cache) => {
                log::info!("Loaded {} cached searches from {}", cache.len(), path.display());
                cache
            }
            Err(CacheError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                Self::new(capacity, ttl)
            }
            Err(e) => {
                log::warn!("Ignoring search cache at {}: {e}", path.display());
                Self::new(capacity, ttl)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CandidateSource;

    fn place(name: &str, lat: f64, lng: f64) -> PlaceCandidate {
        PlaceCandidate {
            place_id: 42,
            name: name.to_string(),
            display_name: format!("{name}, India"),
            lat,
            lng,
            kind: "village".to_string(),
            importance: 0.4,
            state: None,
            country: Some("India".to_string()),
            source: CandidateSource::Remote,
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::default() + Duration::days(365)
    }

    #[test]
    fn store_then_lookup_returns_results() {
        let mut cache = ApiCache::default();
        let results = vec![place("Kondapur", 17.46, 78.36)];
        cache.store_at("  Kondapur ", results.clone(), t0());
        assert_eq!(cache.lookup_at("kondapur", t0()), Some(results));
    }

    #[test]
    fn prefix_related_queries_hit() {
        let mut cache = ApiCache::default();
        cache.store_at("konda", vec![place("Kondapur", 17.46, 78.36)], t0());

        assert!(cache.lookup_at("kondapur", t0()).is_some());
        assert!(cache.lookup_at("kon", t0()).is_some());
        assert!(cache.lookup_at("madhapur", t0()).is_none());
        assert!(cache.lookup_at("k", t0()).is_none());
    }

    #[test]
    fn exact_match_beats_newer_prefix_match() {
        let mut cache = ApiCache::default();
        cache.store_at("kondapur", vec![place("Kondapur", 17.46, 78.36)], t0());
        cache.store_at("konda", vec![place("Konda", 18.0, 79.0)], t0());
        let hit = cache.lookup_at("kondapur", t0()).unwrap();
        assert_eq!(hit[0].name, "Kondapur");
    }

    #[test]
    fn restoring_same_query_replaces_entry() {
        let mut cache = ApiCache::default();
        cache.store_at("gachibowli", vec![place("Old", 1.0, 1.0)], t0());
        cache.store_at("Gachibowli", vec![place("New", 2.0, 2.0)], t0());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup_at("gachibowli", t0()).unwrap()[0].name, "New");
    }

    #[test]
    fn entries_expire_after_ttl() {
        let mut cache = ApiCache::new(10, Duration::days(7));
        cache.store_at("warangal", vec![place("Warangal", 17.97, 79.59)], t0());

        let almost = t0() + Duration::days(7) - Duration::seconds(1);
        assert!(cache.lookup_at("warangal", almost).is_some());

        let expired = t0() + Duration::days(7);
        assert!(cache.lookup_at("warangal", expired).is_none());
        assert_eq!(cache.fresh_len_at(expired), 0);

        cache.store_at("nizamabad", Vec::new(), expired);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn capacity_is_never_exceeded() {
        let mut cache = ApiCache::new(3, Duration::days(7));
        for i in 0..10 {
            cache.store_at(&format!("query {i}"), vec![place("P", 1.0, 1.0)], t0());
            assert!(cache.fresh_len_at(t0()) <= 3);
        }
        assert_eq!(cache.len(), 3);
        assert!(cache.lookup_at("query 0", t0()).is_none());
        assert!(cache.lookup_at("query 9", t0()).is_some());
    }

    #[test]
    fn snapshot_round_trip_drops_expired() {
        let mut cache = ApiCache::new(10, Duration::days(7));
        cache.store_at("old", vec![place("Old", 1.0, 1.0)], t0());
        cache.store_at("new", vec![place("New", 2.0, 2.0)], t0() + Duration::days(5));

        let snapshot = cache.snapshot();
        let restored = ApiCache::from_snapshot(
            snapshot,
            10,
            Duration::days(7),
            t0() + Duration::days(8),
        )
        .unwrap();
        assert_eq!(restored.len(), 1);
        assert!(restored.lookup_at("new", t0() + Duration::days(8)).is_some());
    }

    #[test]
    fn unknown_snapshot_version_is_rejected() {
        let snapshot = CacheSnapshot {
            version: 99,
            entries: Vec::new(),
        };
        assert!(matches!(
            ApiCache::from_snapshot(snapshot, 10, Duration::days(7), t0()),
            Err(CacheError::UnsupportedVersion { version: 99 })
        ));
    }

    #[test]
    fn save_and_load_through_file() {
        let dir = std::env::temp_dir().join(format!("saferoute-cache-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("search-cache.json");

        let mut cache = ApiCache::default();
        cache.store("hitech city", vec![place("HITEC City", 17.44, 78.38)]);
        cache.save(&path).unwrap();

        let loaded = ApiCache::load(&path, DEFAULT_CAPACITY, Duration::days(DEFAULT_TTL_DAYS));
        assert_eq!(loaded.lookup("hitech city").unwrap()[0].name, "HITEC City");

        std::fs::write(&path, b"not json").unwrap();
        let cold = ApiCache::load(&path, DEFAULT_CAPACITY, Duration::days(DEFAULT_TTL_DAYS));
        assert!(cold.is_empty());

        let missing = ApiCache::load(&dir.join("missing.json"), 5, Duration::days(1));
        assert!(missing.is_empty());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
