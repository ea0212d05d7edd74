//! Listening history and user taste vector construction.
//!
//! A history is an ordered sequence of (track id, added-at) pairs pulled
//! either from a named playlist or from the current user's saved tracks.
//! After deduplication and an optional recency window the surviving tracks
//! are reduced to a single mean feature vector, which is then pushed through
//! the pre-fitted scaler so that clustering and playlist retrieval operate
//! in the same normalized space the model was trained in.

use crate::catalog::Catalog;
use crate::error::RecommendError;
use crate::features::{mean_vector, FeatureStore, FeatureVec};
use crate::model::Scaler;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};
use std::collections::HashSet;

/// Where a listening history comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Seed the recommendation from an existing playlist.
    Playlist(String),
    /// Seed from the current user's saved tracks.
    UserFavorites,
}

/// Trailing time filter applied to a history before aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecencyWindow {
    #[default]
    AllTime,
    LastMonth,
    LastSixMonths,
}

impl RecencyWindow {
    /// Oldest timestamp still inside the window, or `None` for all-time.
    #[must_use]
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::AllTime => None,
            Self::LastMonth => Some(now - Duration::days(30)),
            Self::LastSixMonths => Some(now - Duration::days(182)),
        }
    }
}

/// One history entry: a track and when the listener added it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedTrack {
    pub track_id: String,
    pub added_at: DateTime<Utc>,
}

/// The listener's taste vector in both normalization spaces.
///
/// `raw` is used for song-level re-ranking, `scaled` for cluster
/// assignment and playlist retrieval. The two must never be mixed inside
/// one distance computation.
#[derive(Debug, Clone, PartialEq)]
pub struct UserVector {
    pub raw: FeatureVec,
    pub scaled: FeatureVec,
}

/// Unified history fetch for both source kinds.
///
/// # Errors
///
/// Propagates catalog transport failures.
pub fn fetch_history(catalog: &dyn Catalog, source: &Source) -> Result<Vec<SavedTrack>> {
    match source {
        Source::Playlist(id) => catalog
            .playlist_tracks(id)
            .with_context(|| format!("fetching tracks of playlist {id}")),
        Source::UserFavorites => catalog
            .user_saved_tracks()
            .context("fetching the user's saved tracks"),
    }
}

/// Builds the mean taste vector from a listening history.
pub struct UserVectorBuilder<'a> {
    store: &'a FeatureStore<'a>,
    scaler: &'a Scaler,
}

impl<'a> UserVectorBuilder<'a> {
    #[must_use]
    pub fn new(store: &'a FeatureStore<'a>, scaler: &'a Scaler) -> Self {
        Self { store, scaler }
    }

    /// Reduce `history` to a raw + scaled user vector.
    ///
    /// Duplicate track ids keep their first occurrence; `window` is
    /// measured against `now` (injected so tests are deterministic).
    /// Partial feature coverage is tolerated as long as at least one
    /// aligned row survives; the gap is logged at warn level.
    ///
    /// # Errors
    ///
    /// [`RecommendError::EmptyHistory`] if the filter leaves no tracks,
    /// [`RecommendError::IncompleteFeatureData`] if no surviving track has
    /// a usable feature vector.
    pub fn build(
        &self,
        history: &[SavedTrack],
        window: RecencyWindow,
        now: DateTime<Utc>,
    ) -> Result<UserVector, RecommendError> {
        let cutoff = window.cutoff(now);
        let mut seen = HashSet::new();
        let survivors: Vec<&SavedTrack> = history
            .iter()
            .filter(|entry| seen.insert(entry.track_id.as_str()))
            .filter(|entry| cutoff.map_or(true, |cutoff| entry.added_at >= cutoff))
            .collect();

        if survivors.is_empty() {
            return Err(RecommendError::EmptyHistory);
        }
        debug!(
            "{} of {} history entries survive the {window:?} window",
            survivors.len(),
            history.len()
        );

        let ids: Vec<String> = survivors
            .iter()
            .map(|entry| entry.track_id.clone())
            .collect();
        let features = self.store.features_for(&ids);

        // Alignment keeps history order; tracks without features drop out.
        let rows: Vec<FeatureVec> = ids
            .iter()
            .filter_map(|id| features.get(id).copied())
            .collect();

        let raw = mean_vector(&rows).ok_or(RecommendError::IncompleteFeatureData)?;
        if rows.len() < ids.len() {
            warn!(
                "proceeding with partial feature coverage: {} of {} tracks",
                rows.len(),
                ids.len()
            );
        }

        let scaled = self.scaler.transform(&raw);
        Ok(UserVector { raw, scaled })
    }
}
