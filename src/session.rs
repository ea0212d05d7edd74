//! Request-scoped recommendation session.
//!
//! One session runs the pipeline stages in order: user vector → candidate
//! playlists → ranked tracks → assembled draft. Each stage's output is an
//! explicit optional field populated by an explicit call; asking for a
//! stage before its input exists yields [`RecommendError::StageNotRun`]
//! instead of silent recomputation. A session is cheap to discard at any
//! point; the model bundle, library and feature store it borrows are
//! read-only and shared.

use crate::catalog::Catalog;
use crate::cluster::{ClusterRetriever, Metric};
use crate::db::Library;
use crate::error::RecommendError;
use crate::features::FeatureStore;
use crate::model::ModelBundle;
use crate::playlist::PlaylistDraft;
use crate::profile::{fetch_history, RecencyWindow, Source, UserVector, UserVectorBuilder};
use crate::ranker::SongRanker;
use anyhow::Result;
use chrono::Utc;
use log::info;

pub struct RecommendationSession<'a> {
    catalog: &'a dyn Catalog,
    store: &'a FeatureStore<'a>,
    bundle: &'a ModelBundle,
    library: &'a Library,
    source: Source,
    window: RecencyWindow,

    user_vector: Option<UserVector>,
    top_playlists: Option<Vec<u32>>,
    ranked_tracks: Option<Vec<String>>,
}

impl<'a> RecommendationSession<'a> {
    #[must_use]
    pub fn new(
        catalog: &'a dyn Catalog,
        store: &'a FeatureStore<'a>,
        bundle: &'a ModelBundle,
        library: &'a Library,
        source: Source,
        window: RecencyWindow,
    ) -> Self {
        Self {
            catalog,
            store,
            bundle,
            library,
            source,
            window,
            user_vector: None,
            top_playlists: None,
            ranked_tracks: None,
        }
    }

    /// Stage 1: fetch the history and reduce it to the taste vector.
    ///
    /// # Errors
    ///
    /// Catalog transport failures, plus the history/feature-coverage
    /// errors of [`UserVectorBuilder::build`].
    pub fn build_user_vector(&mut self) -> Result<&UserVector> {
        let history = fetch_history(self.catalog, &self.source)?;
        let builder = UserVectorBuilder::new(self.store, &self.bundle.scaler);
        let vector = builder.build(&history, self.window, Utc::now())?;
        info!("built user vector from {} history entries", history.len());
        Ok(self.user_vector.insert(vector))
    }

    /// Stage 2: retrieve the top-N candidate playlists.
    ///
    /// # Errors
    ///
    /// [`RecommendError::StageNotRun`] if stage 1 has not run, plus the
    /// retrieval errors of [`ClusterRetriever::top_n`].
    pub fn retrieve_playlists(
        &mut self,
        n: usize,
        metric: Metric,
        want_similar: bool,
    ) -> Result<&[u32]> {
        let vector = self.user_vector.as_ref().ok_or(RecommendError::StageNotRun {
            stage: "build_user_vector",
        })?;
        let retriever = ClusterRetriever::new(&self.bundle.model, &self.bundle.corpus);
        let pids = retriever.top_n(&vector.scaled, n, metric, want_similar)?;
        info!("retrieved {} candidate playlists", pids.len());
        Ok(self.top_playlists.insert(pids))
    }

    /// Stage 3: rank the candidate playlists' tracks against the raw
    /// vector.
    ///
    /// # Errors
    ///
    /// [`RecommendError::StageNotRun`] if stage 2 has not run, plus
    /// library lookup failures.
    pub fn rank_songs(&mut self, n: usize) -> Result<&[String]> {
        let vector = self.user_vector.as_ref().ok_or(RecommendError::StageNotRun {
            stage: "build_user_vector",
        })?;
        let pids = self.top_playlists.as_ref().ok_or(RecommendError::StageNotRun {
            stage: "retrieve_playlists",
        })?;
        let ranker = SongRanker::new(self.store, self.library);
        let ranked = ranker.rank_songs(pids, &vector.raw, n)?;
        info!("ranked {} candidate tracks", ranked.len());
        Ok(self.ranked_tracks.insert(ranked))
    }

    /// Stage 4: wrap the ranked tracks into a draft. Pure; publishing is
    /// the caller's decision.
    ///
    /// # Errors
    ///
    /// [`RecommendError::StageNotRun`] if stage 3 has not run.
    pub fn assemble(&self, name: &str, description: &str) -> Result<PlaylistDraft, RecommendError> {
        let ranked = self.ranked_tracks.as_ref().ok_or(RecommendError::StageNotRun {
            stage: "rank_songs",
        })?;
        Ok(PlaylistDraft::assemble(
            ranked.clone(),
            name,
            description,
            Utc::now(),
        ))
    }

    /// Candidate playlists from stage 2, if it ran.
    #[must_use]
    pub fn top_playlists(&self) -> Option<&[u32]> {
        self.top_playlists.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_fixture;
    use crate::features::{TrackFeatures, FEATURE_DIM};
    use crate::model::{ClusterModel, CorpusRow, Scaler, TrainingCorpus};
    use crate::profile::SavedTrack;
    use chrono::{Duration, Utc};

    /// Catalog whose saved tracks are the fixture library's u1 and u2.
    struct FixtureCatalog;

    impl Catalog for FixtureCatalog {
        fn audio_features(
            &self,
            _track_ids: &[String],
        ) -> Result<Vec<Option<TrackFeatures>>> {
            anyhow::bail!("sessions under test must stay fully cached")
        }

        fn playlist_tracks(&self, _playlist_id: &str) -> Result<Vec<SavedTrack>> {
            anyhow::bail!("not used")
        }

        fn user_saved_tracks(&self) -> Result<Vec<SavedTrack>> {
            let now = Utc::now();
            Ok(vec![
                SavedTrack {
                    track_id: "u1".to_string(),
                    added_at: now - Duration::days(1),
                },
                SavedTrack {
                    track_id: "u2".to_string(),
                    added_at: now - Duration::days(2),
                },
            ])
        }

        fn create_playlist(&self, _name: &str, _description: &str) -> Result<String> {
            Ok("published".to_string())
        }

        fn add_items(&self, _playlist_id: &str, _track_ids: &[String]) -> Result<()> {
            Ok(())
        }
    }

    fn vec_of(fill: f64) -> [f64; FEATURE_DIM] {
        [fill; FEATURE_DIM]
    }

    fn bundle() -> ModelBundle {
        // Identity scaler; one cluster around the fixture's feature range.
        ModelBundle {
            model: ClusterModel {
                centroids: vec![vec_of(0.0)],
            },
            scaler: Scaler {
                mean: vec_of(0.0),
                scale: vec_of(1.0),
            },
            corpus: TrainingCorpus {
                rows: vec![
                    CorpusRow {
                        playlist_id: 1,
                        cluster: 0,
                        features: vec_of(1.5),
                    },
                    CorpusRow {
                        playlist_id: 3,
                        cluster: 0,
                        features: vec_of(9.0),
                    },
                ],
            },
        }
    }

    fn fixture_library(dir: &tempfile::TempDir) -> Library {
        let path = dir.path().join("library.db3");
        let conn = rusqlite::Connection::open(&path).unwrap();
        test_fixture::sample_library(&conn);
        drop(conn);
        Library::open(&path).unwrap()
    }

    #[test]
    fn stages_run_in_order_to_a_draft() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = fixture_library(&dir);
        let catalog = FixtureCatalog;
        let store = FeatureStore::new(library.feature_cache().unwrap(), &catalog);
        let bundle = bundle();
        let mut session = RecommendationSession::new(
            &catalog,
            &store,
            &bundle,
            &library,
            Source::UserFavorites,
            RecencyWindow::AllTime,
        );

        // Saved tracks u1/u2 mean to 1.5 per component, landing in the
        // only cluster; playlist 1 sits closest.
        session.build_user_vector().unwrap();
        let pids = session.retrieve_playlists(1, Metric::Cityblock, true).unwrap();
        assert_eq!(pids, [1]);

        let ranked = session.rank_songs(10).unwrap().to_vec();
        // Playlist 1 holds u1 and u2, both 0.5 per component away from
        // the 1.5 mean; the stable sort keeps ratings order.
        assert_eq!(ranked, vec!["u1", "u2"]);

        let draft = session.assemble("Mix", "desc").unwrap();
        assert_eq!(draft.track_ids, vec!["u1", "u2"]);
        assert_eq!(store.fetch_calls(), 0);
    }

    #[test]
    fn retrieval_before_user_vector_is_stage_not_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = fixture_library(&dir);
        let catalog = FixtureCatalog;
        let store = FeatureStore::new(library.feature_cache().unwrap(), &catalog);
        let bundle = bundle();
        let mut session = RecommendationSession::new(
            &catalog,
            &store,
            &bundle,
            &library,
            Source::UserFavorites,
            RecencyWindow::AllTime,
        );

        let err = session
            .retrieve_playlists(5, Metric::Cityblock, true)
            .unwrap_err();
        let domain = err.downcast_ref::<RecommendError>().unwrap();
        assert_eq!(
            *domain,
            RecommendError::StageNotRun {
                stage: "build_user_vector"
            }
        );
    }

    #[test]
    fn ranking_before_retrieval_is_stage_not_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = fixture_library(&dir);
        let catalog = FixtureCatalog;
        let store = FeatureStore::new(library.feature_cache().unwrap(), &catalog);
        let bundle = bundle();
        let mut session = RecommendationSession::new(
            &catalog,
            &store,
            &bundle,
            &library,
            Source::UserFavorites,
            RecencyWindow::AllTime,
        );

        session.build_user_vector().unwrap();
        let err = session.rank_songs(5).unwrap_err();
        let domain = err.downcast_ref::<RecommendError>().unwrap();
        assert_eq!(
            *domain,
            RecommendError::StageNotRun {
                stage: "retrieve_playlists"
            }
        );
    }

    #[test]
    fn assemble_before_ranking_is_stage_not_run() {
        let dir = tempfile::TempDir::new().unwrap();
        let library = fixture_library(&dir);
        let catalog = FixtureCatalog;
        let store = FeatureStore::new(library.feature_cache().unwrap(), &catalog);
        let bundle = bundle();
        let session = RecommendationSession::new(
            &catalog,
            &store,
            &bundle,
            &library,
            Source::UserFavorites,
            RecencyWindow::AllTime,
        );

        let err = session.assemble("Mix", "desc").unwrap_err();
        assert_eq!(err, RecommendError::StageNotRun { stage: "rank_songs" });
    }
}
