//! Audio feature vectors and the cache-first feature store.
//!
//! Every track is described by a fixed 13-dimensional feature vector whose
//! column order is significant: distance computations compare position by
//! position, so a vector that was built in a different order is garbage.
//! The [`FeatureStore`] answers feature lookups from a local cache first and
//! only goes to the external collaborator for the ids it has never seen.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::collections::{HashMap, HashSet};

/// Number of audio feature dimensions per track.
pub const FEATURE_DIM: usize = 13;

/// Feature column names, in the order used throughout the pipeline.
pub const FEATURE_COLUMNS: [&str; FEATURE_DIM] = [
    "danceability",
    "energy",
    "key",
    "loudness",
    "mode",
    "speechiness",
    "acousticness",
    "instrumentalness",
    "liveness",
    "valence",
    "tempo",
    "duration_ms",
    "time_signature",
];

/// A fixed-order audio feature vector.
pub type FeatureVec = [f64; FEATURE_DIM];

/// Immutable pairing of a track id with its feature vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFeatures {
    pub track_id: String,
    pub features: FeatureVec,
}

/// External collaborator that can fetch audio features for a batch of
/// track ids. Entries may come back as `None` when the catalog has no
/// analysis for a track.
pub trait AudioFeatureSource {
    /// Fetch features for at most [`FeatureStore::CHUNK_SIZE`] ids.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure; the caller decides whether
    /// to retry.
    fn audio_features(&self, track_ids: &[String]) -> anyhow::Result<Vec<Option<TrackFeatures>>>;
}

/// Cache-first feature lookup over a local cache plus an external source.
///
/// Missing ids are requested in fixed-size chunks, each retried up to
/// [`Self::MAX_ATTEMPTS`] times. A chunk that exhausts its retries is
/// dropped with a warning; its tracks are simply absent from the result.
/// Partial data is preferred over total failure.
pub struct FeatureStore<'a> {
    cache: HashMap<String, FeatureVec>,
    source: &'a dyn AudioFeatureSource,
    fetch_calls: Cell<usize>,
}

impl<'a> FeatureStore<'a> {
    /// Batch size accepted by the feature-fetch collaborator.
    pub const CHUNK_SIZE: usize = 100;
    /// Attempts per chunk before giving up on it.
    pub const MAX_ATTEMPTS: usize = 5;

    #[must_use]
    pub fn new(cache: HashMap<String, FeatureVec>, source: &'a dyn AudioFeatureSource) -> Self {
        Self {
            cache,
            source,
            fetch_calls: Cell::new(0),
        }
    }

    /// Number of calls made to the external source so far. A fully cached
    /// request must leave this at zero.
    #[must_use]
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.get()
    }

    /// Resolve feature vectors for `track_ids`, keyed by track id.
    ///
    /// Requested ids are deduplicated; cached entries win over freshly
    /// fetched ones. Ids whose chunk permanently failed, or that the
    /// catalog reports no analysis for, are absent from the result.
    pub fn features_for(&self, track_ids: &[String]) -> HashMap<String, FeatureVec> {
        let mut seen = HashSet::new();
        let mut missing: Vec<String> = Vec::new();
        let mut result: HashMap<String, FeatureVec> = HashMap::new();

        for id in track_ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            match self.cache.get(id) {
                Some(features) => {
                    result.insert(id.clone(), *features);
                }
                None => missing.push(id.clone()),
            }
        }

        debug!(
            "feature lookup: {} cached, {} to fetch",
            result.len(),
            missing.len()
        );

        for chunk in missing.chunks(Self::CHUNK_SIZE) {
            if let Some(records) = self.fetch_chunk(chunk) {
                for features in records.into_iter().flatten() {
                    result
                        .entry(features.track_id)
                        .or_insert(features.features);
                }
            }
        }

        result
    }

    /// Fetch one chunk with bounded retry. `None` means the chunk failed
    /// permanently and its tracks are dropped from the result.
    fn fetch_chunk(&self, chunk: &[String]) -> Option<Vec<Option<TrackFeatures>>> {
        for attempt in 1..=Self::MAX_ATTEMPTS {
            self.fetch_calls.set(self.fetch_calls.get() + 1);
            match self.source.audio_features(chunk) {
                Ok(records) => return Some(records),
                Err(err) => {
                    debug!(
                        "feature fetch attempt {attempt}/{} failed for chunk of {}: {err:#}",
                        Self::MAX_ATTEMPTS,
                        chunk.len()
                    );
                }
            }
        }
        warn!(
            "giving up on audio features for {} tracks after {} attempts",
            chunk.len(),
            Self::MAX_ATTEMPTS
        );
        None
    }
}

/// Elementwise mean over a set of feature vectors. `None` when `rows` is
/// empty, since a mean over nothing is undefined.
#[must_use]
pub fn mean_vector(rows: &[FeatureVec]) -> Option<FeatureVec> {
    if rows.is_empty() {
        return None;
    }
    let mut sum = [0.0f64; FEATURE_DIM];
    for row in rows {
        for (acc, value) in sum.iter_mut().zip(row.iter()) {
            *acc += value;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let count = rows.len() as f64;
    for acc in &mut sum {
        *acc /= count;
    }
    Some(sum)
}
