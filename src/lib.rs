//! Mixtape: playlist recommendations from your own listening history.
//!
//! The pipeline runs in four explicit stages over a local library
//! database and a set of trained model artifacts:
//!
//! 1. [`profile`] reduces the listening history to a taste vector.
//! 2. [`cluster`] retrieves the candidate playlists nearest that vector.
//! 3. [`ranker`] re-ranks the candidates' tracks in raw feature space.
//! 4. [`playlist`] assembles (and optionally publishes) the result.
//!
//! [`session::RecommendationSession`] ties the stages together.

pub mod catalog;
pub mod cli;
pub mod cluster;
pub mod config;
pub mod db;
pub mod error;
pub mod features;
pub mod model;
pub mod playlist;
pub mod profile;
pub mod ranker;
pub mod session;
