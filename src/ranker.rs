//! Song-level re-ranking within the candidate playlists.
//!
//! Ranking runs in raw feature space on purpose: the candidates were
//! already narrowed down in scaled space, and at this point the absolute
//! magnitudes (tempo, loudness, duration) carry meaning for the listener.

use crate::db::Library;
use crate::features::{FeatureStore, FeatureVec};
use anyhow::Result;
use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Squared Euclidean deviation between two raw vectors.
#[must_use]
pub fn squared_deviation(a: &FeatureVec, b: &FeatureVec) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Rank `tracks` ascending by squared deviation from `raw_user`, dedup by
/// id keeping the lowest-deviation occurrence, truncate to `n`.
///
/// Sorting is stable, so equal deviations keep input order and the result
/// is deterministic. Returns fewer than `n` when the pool is smaller;
/// never pads.
#[must_use]
pub fn rank_by_deviation(
    tracks: &[(String, FeatureVec)],
    raw_user: &FeatureVec,
    n: usize,
) -> Vec<String> {
    let mut scored: Vec<(usize, f64)> = tracks
        .iter()
        .enumerate()
        .map(|(i, (_, features))| (i, squared_deviation(raw_user, features)))
        .collect();
    scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut seen = HashSet::new();
    let mut ranked = Vec::new();
    for (i, _) in scored {
        let id = &tracks[i].0;
        if seen.insert(id.clone()) {
            ranked.push(id.clone());
            if ranked.len() == n {
                break;
            }
        }
    }
    ranked
}

/// Ranks the member tracks of candidate playlists against the raw user
/// vector.
pub struct SongRanker<'a> {
    store: &'a FeatureStore<'a>,
    library: &'a Library,
}

impl<'a> SongRanker<'a> {
    #[must_use]
    pub fn new(store: &'a FeatureStore<'a>, library: &'a Library) -> Self {
        Self { store, library }
    }

    /// Resolve candidate playlists to tracks, then rank the tracks.
    ///
    /// Tracks whose features could not be resolved are silently skipped;
    /// the partial-failure policy lives in the feature store.
    ///
    /// # Errors
    ///
    /// Propagates library lookup failures.
    pub fn rank_songs(
        &self,
        candidate_pids: &[u32],
        raw_user: &FeatureVec,
        n: usize,
    ) -> Result<Vec<String>> {
        let track_ids = self.library.tracks_for_playlists(candidate_pids)?;
        let features = self.store.features_for(&track_ids);

        let tracks: Vec<(String, FeatureVec)> = track_ids
            .iter()
            .filter_map(|id| features.get(id).map(|f| (id.clone(), *f)))
            .collect();
        debug!(
            "ranking {} of {} candidate tracks with features",
            tracks.len(),
            track_ids.len()
        );

        Ok(rank_by_deviation(&tracks, raw_user, n))
    }
}
