//! Cluster-based nearest-playlist retrieval.
//!
//! The listener's scaled vector is assigned to a cluster by the pre-trained
//! model, the training corpus is sliced to that cluster's members, and every
//! member is ranked by its distance to the listener under a configurable
//! metric. Only scaled vectors ever enter these distance computations.

use crate::error::RecommendError;
use crate::features::FeatureVec;
use crate::model::{ClusterModel, TrainingCorpus};
use log::debug;
use std::cmp::Ordering;
use std::str::FromStr;

/// Distance metric for playlist retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metric {
    /// Manhattan / L1 distance.
    #[default]
    Cityblock,
    /// Euclidean / L2 distance.
    Euclidean,
    /// Cosine distance, `1 - cosine similarity`.
    Cosine,
}

impl Metric {
    /// Distance between two vectors in the same normalization space.
    #[must_use]
    pub fn distance(self, a: &FeatureVec, b: &FeatureVec) -> f64 {
        match self {
            Self::Cityblock => a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum(),
            Self::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt(),
            Self::Cosine => {
                let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
                let norm_b: f64 = b.iter().map(|y| y * y).sum::<f64>().sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    // A zero vector has no direction; call it maximally far.
                    return 1.0;
                }
                1.0 - dot / (norm_a * norm_b)
            }
        }
    }
}

impl FromStr for Metric {
    type Err = RecommendError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_ascii_lowercase().as_str() {
            "cityblock" | "manhattan" => Ok(Self::Cityblock),
            "euclidean" => Ok(Self::Euclidean),
            "cosine" => Ok(Self::Cosine),
            _ => Err(RecommendError::UnsupportedMetric {
                name: name.to_string(),
            }),
        }
    }
}

/// Retrieves the top-N candidate playlists for a scaled user vector.
pub struct ClusterRetriever<'a> {
    model: &'a ClusterModel,
    corpus: &'a TrainingCorpus,
}

impl<'a> ClusterRetriever<'a> {
    #[must_use]
    pub fn new(model: &'a ClusterModel, corpus: &'a TrainingCorpus) -> Self {
        Self { model, corpus }
    }

    /// Playlist ids of the `n` closest (or, with `want_similar = false`,
    /// farthest-within-the-same-cluster) corpus rows.
    ///
    /// Distances are sorted ascending with a stable tie-break on corpus
    /// row order, so output is deterministic. Similar results come back
    /// in non-decreasing distance order, dissimilar ones non-increasing.
    ///
    /// # Errors
    ///
    /// [`RecommendError::EmptyCluster`] when the predicted cluster has no
    /// corpus rows — a training-data defect, never retried.
    pub fn top_n(
        &self,
        scaled: &FeatureVec,
        n: usize,
        metric: Metric,
        want_similar: bool,
    ) -> Result<Vec<u32>, RecommendError> {
        let label = self.model.predict(scaled);
        let slice = self.corpus.rows_in_cluster(label);
        if slice.is_empty() {
            return Err(RecommendError::EmptyCluster { label });
        }
        debug!(
            "user vector assigned to cluster {label} ({} of {} corpus rows)",
            slice.len(),
            self.corpus.len()
        );

        let mut scored: Vec<(usize, f64)> = slice
            .iter()
            .enumerate()
            .map(|(i, row)| (i, metric.distance(&row.features, scaled)))
            .collect();
        // Stable sort: equal distances keep corpus row order.
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

        let picked: Vec<usize> = if want_similar {
            scored.iter().take(n).map(|(i, _)| *i).collect()
        } else {
            scored.iter().rev().take(n).map(|(i, _)| *i).collect()
        };

        // Map positions in the slice back to real playlist ids.
        Ok(picked.into_iter().map(|i| slice[i].playlist_id).collect())
    }
}
