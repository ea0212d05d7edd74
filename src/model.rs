//! Pre-fitted model artifacts: scaler, clustering model, training corpus.
//!
//! All three are trained offline and loaded read-only at startup; nothing
//! in this crate ever mutates them, which is what makes them safe to share
//! across recommendation sessions. Artifacts are stored as JSON.

use crate::features::FeatureVec;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Fixed affine scaler, shape 1x13. `transform` is a pure function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: FeatureVec,
    pub scale: FeatureVec,
}

impl Scaler {
    /// Map a raw vector into scaled space: `(x - mean) / scale`.
    #[must_use]
    pub fn transform(&self, vector: &FeatureVec) -> FeatureVec {
        let mut out = [0.0f64; crate::features::FEATURE_DIM];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (vector[i] - self.mean[i]) / self.scale[i];
        }
        out
    }
}

/// Pre-trained centroid clustering model.
///
/// `predict` assigns a scaled vector to the nearest centroid by squared
/// Euclidean distance, which reproduces the label the training run would
/// have produced for that point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterModel {
    pub centroids: Vec<FeatureVec>,
}

impl ClusterModel {
    /// Cluster label for a scaled vector.
    #[must_use]
    pub fn predict(&self, scaled: &FeatureVec) -> usize {
        let mut best = 0;
        let mut best_dist = f64::INFINITY;
        for (label, centroid) in self.centroids.iter().enumerate() {
            let dist: f64 = centroid
                .iter()
                .zip(scaled.iter())
                .map(|(c, v)| (c - v) * (c - v))
                .sum();
            if dist < best_dist {
                best = label;
                best_dist = dist;
            }
        }
        best
    }
}

/// One pre-scaled training playlist: its feature vector, the cluster the
/// training run assigned it to, and the playlist id it maps back to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorpusRow {
    pub playlist_id: u32,
    pub cluster: usize,
    pub features: FeatureVec,
}

/// Read-only table of training playlists in scaled space.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingCorpus {
    pub rows: Vec<CorpusRow>,
}

impl TrainingCorpus {
    /// Rows assigned to `label`, preserving corpus row order.
    #[must_use]
    pub fn rows_in_cluster(&self, label: usize) -> Vec<&CorpusRow> {
        self.rows.iter().filter(|row| row.cluster == label).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The three artifacts a recommendation session needs, loaded together.
#[derive(Debug, Clone)]
pub struct ModelBundle {
    pub model: ClusterModel,
    pub scaler: Scaler,
    pub corpus: TrainingCorpus,
}

impl ModelBundle {
    /// Load all artifacts from their JSON files.
    ///
    /// # Errors
    ///
    /// Fails on missing or malformed files, and on an empty model or
    /// corpus: those can never produce a recommendation, so they are
    /// rejected at startup rather than mid-request.
    pub fn load(model_path: &Path, scaler_path: &Path, corpus_path: &Path) -> Result<Self> {
        let model: ClusterModel = read_json(model_path)?;
        if model.centroids.is_empty() {
            bail!(
                "clustering model at {} has no centroids",
                model_path.display()
            );
        }
        let scaler: Scaler = read_json(scaler_path)?;
        if scaler.scale.iter().any(|s| *s == 0.0) {
            bail!(
                "scaler at {} has a zero scale component",
                scaler_path.display()
            );
        }
        let corpus: TrainingCorpus = read_json(corpus_path)?;
        if corpus.is_empty() {
            bail!("training corpus at {} is empty", corpus_path.display());
        }
        Ok(Self {
            model,
            scaler,
            corpus,
        })
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)
        .with_context(|| format!("failed to open model artifact {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("failed to parse model artifact {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FEATURE_DIM;

    fn vec_of(fill: f64) -> FeatureVec {
        [fill; FEATURE_DIM]
    }

    #[test]
    fn scaler_transform_is_affine() {
        let scaler = Scaler {
            mean: vec_of(1.0),
            scale: vec_of(2.0),
        };
        let out = scaler.transform(&vec_of(5.0));
        for value in out {
            assert!((value - 2.0).abs() < 1e-12);
        }
    }

    #[test]
    fn predict_picks_the_nearest_centroid() {
        let model = ClusterModel {
            centroids: vec![vec_of(0.0), vec_of(10.0)],
        };
        assert_eq!(model.predict(&vec_of(1.0)), 0);
        assert_eq!(model.predict(&vec_of(9.0)), 1);
    }

    #[test]
    fn predict_breaks_ties_toward_the_lower_label() {
        let model = ClusterModel {
            centroids: vec![vec_of(0.0), vec_of(0.0)],
        };
        assert_eq!(model.predict(&vec_of(3.0)), 0);
    }

    #[test]
    fn rows_in_cluster_preserves_row_order() {
        let corpus = TrainingCorpus {
            rows: vec![
                CorpusRow {
                    playlist_id: 7,
                    cluster: 1,
                    features: vec_of(0.0),
                },
                CorpusRow {
                    playlist_id: 3,
                    cluster: 0,
                    features: vec_of(1.0),
                },
                CorpusRow {
                    playlist_id: 9,
                    cluster: 1,
                    features: vec_of(2.0),
                },
            ],
        };

        let slice = corpus.rows_in_cluster(1);
        let pids: Vec<u32> = slice.iter().map(|row| row.playlist_id).collect();
        assert_eq!(pids, vec![7, 9]);
    }

    #[test]
    fn artifacts_round_trip_through_json() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");
        let corpus_path = dir.path().join("corpus.json");

        let model = ClusterModel {
            centroids: vec![vec_of(0.0), vec_of(1.0)],
        };
        let scaler = Scaler {
            mean: vec_of(0.5),
            scale: vec_of(1.5),
        };
        let corpus = TrainingCorpus {
            rows: vec![CorpusRow {
                playlist_id: 42,
                cluster: 1,
                features: vec_of(0.9),
            }],
        };
        std::fs::write(&model_path, serde_json::to_string(&model).unwrap()).unwrap();
        std::fs::write(&scaler_path, serde_json::to_string(&scaler).unwrap()).unwrap();
        std::fs::write(&corpus_path, serde_json::to_string(&corpus).unwrap()).unwrap();

        let bundle = ModelBundle::load(&model_path, &scaler_path, &corpus_path).unwrap();
        assert_eq!(bundle.model.centroids.len(), 2);
        assert_eq!(bundle.corpus.len(), 1);
        assert_eq!(bundle.corpus.rows[0].playlist_id, 42);
    }

    #[test]
    fn empty_corpus_is_rejected_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");
        let corpus_path = dir.path().join("corpus.json");

        let model = ClusterModel {
            centroids: vec![vec_of(0.0)],
        };
        let scaler = Scaler {
            mean: vec_of(0.0),
            scale: vec_of(1.0),
        };
        std::fs::write(&model_path, serde_json::to_string(&model).unwrap()).unwrap();
        std::fs::write(&scaler_path, serde_json::to_string(&scaler).unwrap()).unwrap();
        std::fs::write(&corpus_path, r#"{"rows":[]}"#).unwrap();

        assert!(ModelBundle::load(&model_path, &scaler_path, &corpus_path).is_err());
    }
}
