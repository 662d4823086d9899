//! Embedded gazetteer and fuzzy local search.
//!
//! The gazetteer is `gazetteer/india.toml`, embedded at compile time. Each
//! search scores every entry against the query; with a few hundred entries
//! a full scan is faster than maintaining an index.

use serde::Deserialize;

use crate::{CandidateSource, MIN_QUERY_CHARS, PlaceCandidate, normalize_query};

/// Maximum number of candidates returned by [`Gazetteer::search_local`].
pub const MAX_LOCAL_RESULTS: usize = 10;

/// Offset added to an entry's position to form its `place_id`, keeping
/// gazetteer identifiers clear of small provider identifiers.
pub const LOCAL_PLACE_ID_BASE: u64 = 1_000_000;

const EXACT_SCORE: f64 = 100.0;
const PREFIX_BASE_SCORE: f64 = 90.0;
const PREFIX_SPAN: f64 = 10.0;
const ALIAS_EXACT_SCORE: f64 = 85.0;
const ALIAS_PREFIX_SCORE: f64 = 80.0;
const CONTAINS_MAX_SCORE: f64 = 70.0;
const CONTAINS_MIN_SCORE: f64 = 50.0;
const CONTAINS_POSITION_PENALTY: f64 = 0.5;
const DISPLAY_CONTAINS_SCORE: f64 = 60.0;
const STATE_PREFIX_SCORE: f64 = 50.0;
const WORD_OVERLAP_MAX_SCORE: f64 = 40.0;

const EMBEDDED_GAZETTEER: &str = include_str!("../gazetteer/india.toml");

/// A curated place.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GazetteerEntry {
    /// Canonical name.
    pub name: String,
    /// Full display name.
    pub display_name: String,
    /// Latitude.
    pub lat: f64,
    /// Longitude.
    pub lng: f64,
    /// Place type (`city`, `attraction`, `airport`, `station`).
    pub kind: String,
    /// State or union territory.
    pub state: String,
    /// Country.
    pub country: String,
    /// Alternative names and spellings.
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Deserialize)]
struct GazetteerFile {
    places: Vec<GazetteerEntry>,
}

/// Pre-lowercased fields of one entry.
struct SearchKey {
    name: String,
    display_name: String,
    state: String,
    aliases: Vec<String>,
}

impl From<&GazetteerEntry> for SearchKey {
    fn from(entry: &GazetteerEntry) -> Self {
        Self {
            name: entry.name.to_lowercase(),
            display_name: entry.display_name.to_lowercase(),
            state: entry.state.to_lowercase(),
            aliases: entry.aliases.iter().map(|a| a.to_lowercase()).collect(),
        }
    }
}

/// Immutable list of curated places.
pub struct Gazetteer {
    entries: Vec<GazetteerEntry>,
    keys: Vec<SearchKey>,
}

impl Gazetteer {
    /// Builds a gazetteer from entries, keeping their order.
    #[must_use]
    pub fn new(entries: Vec<GazetteerEntry>) -> Self {
        let keys = entries.iter().map(SearchKey::from).collect();
        Self { entries, keys }
    }

    /// Returns the compile-time embedded gazetteer.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (this is a compile-time
    /// guarantee since the file is embedded).
    #[must_use]
    pub fn embedded() -> Self {
        let file: GazetteerFile = toml::de::from_str(EMBEDDED_GAZETTEER)
            .unwrap_or_else(|e| panic!("Failed to parse embedded gazetteer: {e}"));
        log::debug!("Loaded {} gazetteer entries", file.places.len());
        Self::new(file.places)
    }

    /// All entries in gazetteer order.
    #[must_use]
    pub fn entries(&self) -> &[GazetteerEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the gazetteer has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scores every entry against `query` and returns the best matches,
    /// highest score first.
    ///
    /// Equal scores keep gazetteer order. Queries shorter than
    /// [`MIN_QUERY_CHARS`] return nothing.
    #[must_use]
    pub fn search_local(&self, query: &str) -> Vec<PlaceCandidate> {
        self.scored(query)
            .into_iter()
            .take(MAX_LOCAL_RESULTS)
            .map(|(index, _)| self.candidate(index))
            .collect()
    }

    /// Like [`Self::search_local`] but returns every non-zero `(index,
    /// score)` pair.
    #[must_use]
    pub fn scored(&self, query: &str) -> Vec<(usize, f64)> {
        let query = normalize_query(query);
        if query.chars().count() < MIN_QUERY_CHARS {
            return Vec::new();
        }

        let mut results: Vec<(usize, f64)> = self
            .keys
            .iter()
            .enumerate()
            .map(|(i, key)| (i, score(key, &query)))
            .filter(|(_, s)| *s > 0.0)
            .collect();

        results.sort_by(|a, b| b.1.total_cmp(&a.1));
        results
    }

    #[allow(clippy::cast_precision_loss)]
    fn candidate(&self, index: usize) -> PlaceCandidate {
        let entry = &self.entries[index];
        PlaceCandidate {
            place_id: LOCAL_PLACE_ID_BASE + index as u64,
            name: entry.name.clone(),
            display_name: entry.display_name.clone(),
            lat: entry.lat,
            lng: entry.lng,
            kind: entry.kind.clone(),
            importance: 0.01f64.mul_add(-(index as f64), 0.9).max(0.0),
            state: Some(entry.state.clone()),
            country: Some(entry.country.clone()),
            source: CandidateSource::Local,
        }
    }
}

/// Similarity of one entry to an already normalised query.
#[allow(clippy::cast_precision_loss)]
fn score(key: &SearchKey, query: &str) -> f64 {
    if key.name == query {
        return EXACT_SCORE;
    }
    if key.name.starts_with(query) {
        let ratio = query.chars().count() as f64 / key.name.chars().count() as f64;
        return PREFIX_SPAN.mul_add(ratio, PREFIX_BASE_SCORE);
    }
    if key.aliases.iter().any(|a| a == query) {
        return ALIAS_EXACT_SCORE;
    }
    if key.aliases.iter().any(|a| a.starts_with(query)) {
        return ALIAS_PREFIX_SCORE;
    }
    if let Some(pos) = key.name.find(query) {
        let chars_before = key.name[..pos].chars().count() as f64;
        return CONTAINS_POSITION_PENALTY
            .mul_add(-chars_before, CONTAINS_MAX_SCORE)
            .max(CONTAINS_MIN_SCORE);
    }
    if key.display_name.contains(query) {
        return DISPLAY_CONTAINS_SCORE;
    }
    if key.state.starts_with(query) {
        return STATE_PREFIX_SCORE;
    }

    let words: Vec<&str> = query.split_whitespace().collect();
    let matched = words
        .iter()
        .filter(|w| {
            key.name.contains(*w)
                || key.display_name.contains(*w)
                || key.aliases.iter().any(|a| a.contains(*w))
        })
        .count();
    if matched == 0 {
        return 0.0;
    }
    WORD_OVERLAP_MAX_SCORE * matched as f64 / words.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, state: &str, aliases: &[&str]) -> GazetteerEntry {
        GazetteerEntry {
            name: name.to_string(),
            display_name: format!("{name}, {state}"),
            lat: 0.0,
            lng: 0.0,
            kind: "city".to_string(),
            state: state.to_string(),
            country: "India".to_string(),
            aliases: aliases.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn embedded_gazetteer_loads() {
        let gazetteer = Gazetteer::embedded();
        assert!(gazetteer.len() > 100);
        assert!(gazetteer.entries().iter().all(|e| (-90.0..=90.0).contains(&e.lat)));
    }

    #[test]
    fn exact_name_ranks_first() {
        let gazetteer = Gazetteer::embedded();
        let results = gazetteer.search_local("Mumbai");
        assert_eq!(results[0].name, "Mumbai");
        assert!((gazetteer.scored("Mumbai")[0].1 - 100.0).abs() < f64::EPSILON);
        assert!(results.len() > 1);
        assert!(results.len() <= MAX_LOCAL_RESULTS);
    }

    #[test]
    fn prefix_matches_beat_mid_word_matches() {
        let gazetteer = Gazetteer::new(vec![
            entry("Urbana", "Somewhere", &[]),
            entry("Durban", "Elsewhere", &[]),
            entry("Bangalore", "Karnataka", &[]),
            entry("Bangkok", "Bangkok", &[]),
        ]);
        let names: Vec<String> = gazetteer
            .search_local("ban")
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names.len(), 4);
        let top: Vec<&str> = names[..2].iter().map(String::as_str).collect();
        assert!(top.contains(&"Bangalore"));
        assert!(top.contains(&"Bangkok"));
    }

    #[test]
    fn score_tiers() {
        let gazetteer = Gazetteer::new(vec![
            entry("Bengaluru", "Karnataka", &["bangalore", "blr"]),
            entry("Hyderabad", "Telangana", &["cyberabad"]),
            entry("Secunderabad", "Telangana", &[]),
        ]);
        let score_of = |q: &str, i: usize| {
            gazetteer
                .scored(q)
                .into_iter()
                .find(|(idx, _)| *idx == i)
                .map_or(0.0, |(_, s)| s)
        };

        assert!((score_of("bengaluru", 0) - 100.0).abs() < f64::EPSILON);
        assert!((score_of("beng", 0) - (90.0 + 10.0 * 4.0 / 9.0)).abs() < 1e-9);
        assert!((score_of("bangalore", 0) - 85.0).abs() < f64::EPSILON);
        assert!((score_of("bl", 0) - 80.0).abs() < f64::EPSILON);
        assert!((score_of("abad", 1) - (70.0 - 2.5)).abs() < f64::EPSILON);
        assert!((score_of("tel", 2) - 60.0).abs() < f64::EPSILON);
        assert!((score_of("hyderabad city", 1) - 20.0).abs() < f64::EPSILON);
        assert!(score_of("zzz", 0).abs() < f64::EPSILON);
    }

    #[test]
    fn short_queries_return_nothing() {
        let gazetteer = Gazetteer::embedded();
        assert!(gazetteer.search_local(" m ").is_empty());
        assert!(gazetteer.search_local("").is_empty());
    }

    #[test]
    fn equal_scores_keep_gazetteer_order() {
        let gazetteer = Gazetteer::new(vec![
            entry("Alpha Nagar", "Telangana", &[]),
            entry("Beta Nagar", "Telangana", &[]),
        ]);
        let results = gazetteer.search_local("telangana");
        assert_eq!(results[0].name, "Alpha Nagar");
        assert_eq!(results[0].place_id, LOCAL_PLACE_ID_BASE);
        assert_eq!(results[1].place_id, LOCAL_PLACE_ID_BASE + 1);
        assert!(results[0].importance > results[1].importance);
    }
}
