//! Combining local and remote candidates.

use std::collections::BTreeSet;

use crate::PlaceCandidate;

/// Maximum number of merged candidates.
pub const MAX_MERGED_RESULTS: usize = 10;

/// Merges gazetteer and remote candidates.
///
/// Local candidates come first in their given order, then remote ones.
/// A candidate whose [`PlaceCandidate::dedupe_key`] was already seen is
/// dropped, so a local entry shadows a remote one for the same place. At
/// most [`MAX_MERGED_RESULTS`] candidates are returned.
#[must_use]
pub fn merge_results(local: &[PlaceCandidate], remote: &[PlaceCandidate]) -> Vec<PlaceCandidate> {
    let mut seen = BTreeSet::new();
    local
        .iter()
        .chain(remote)
        .filter(|c| seen.insert(c.dedupe_key()))
        .take(MAX_MERGED_RESULTS)
        .cloned()
        .collect()
}
