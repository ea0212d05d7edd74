//! Domain error taxonomy for the recommendation pipeline.
//!
//! Transient transport failures never show up here: they are retried inside
//! [`crate::features::FeatureStore`] with a fixed cap and then degrade to
//! partial data with a warning. Everything in this enum is either a data
//! defect or a caller error and propagates immediately.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecommendError {
    /// The listening history has no usable tracks after deduplication and
    /// the recency window. Reported to the caller, never retried.
    #[error("listening history is empty after applying the recency window")]
    EmptyHistory,

    /// The feature fetch yielded zero usable rows for the surviving
    /// history, so no mean vector can be formed.
    #[error("no usable audio features for any track in the history")]
    IncompleteFeatureData,

    /// The training corpus has no rows for the predicted cluster. This is
    /// a defect in the training data, surfaced as fatal.
    #[error("training corpus has no rows for cluster {label}")]
    EmptyCluster { label: usize },

    /// The caller asked for a distance metric this crate does not know.
    #[error("unsupported distance metric `{name}` (supported: cityblock, euclidean, cosine)")]
    UnsupportedMetric { name: String },

    /// A pipeline stage was queried before the stage that feeds it ran.
    #[error("stage `{stage}` has not been run yet")]
    StageNotRun { stage: &'static str },
}
