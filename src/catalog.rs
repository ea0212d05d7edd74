//! Music catalog API client.
//!
//! The recommendation core only depends on the [`Catalog`] trait; the
//! bundled [`HttpCatalog`] speaks a Spotify-style REST API over a blocking
//! `reqwest` client. Token state lives in an explicit [`TokenCache`] owned
//! by the client and refreshed on expiry — never in shared globals.

use crate::features::{FeatureVec, TrackFeatures, FEATURE_DIM};
use crate::profile::SavedTrack;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::debug;
use serde::Deserialize;
use std::sync::Mutex;

const DEFAULT_BASE_URL: &str = "https://api.spotify.com/v1";
const DEFAULT_TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const HTTP_TIMEOUT_SECS: u64 = 30;
/// Refresh the token this long before it actually expires.
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 30;

/// External catalog collaborator.
///
/// Paginated endpoints are exposed already drained: implementations follow
/// the `next` cursor until exhausted before returning.
pub trait Catalog {
    /// Audio features for at most 100 track ids. Entries may be `None`
    /// for tracks the catalog has no analysis for.
    fn audio_features(&self, track_ids: &[String]) -> Result<Vec<Option<TrackFeatures>>>;

    /// All tracks of a playlist, in playlist order.
    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<SavedTrack>>;

    /// All saved tracks of the current user, in library order.
    fn user_saved_tracks(&self) -> Result<Vec<SavedTrack>>;

    /// Create an empty playlist, returning its id.
    fn create_playlist(&self, name: &str, description: &str) -> Result<String>;

    /// Append tracks to an existing playlist.
    fn add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<()>;
}

/// Access token plus its expiry instant.
#[derive(Debug, Default)]
struct TokenCache {
    access_token: Option<String>,
    expires_at: Option<DateTime<Utc>>,
}

impl TokenCache {
    /// Token usable for at least the safety margin, if any.
    fn valid_token(&self, now: DateTime<Utc>) -> Option<&str> {
        let token = self.access_token.as_deref()?;
        let expires_at = self.expires_at?;
        if expires_at - Duration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > now {
            Some(token)
        } else {
            None
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Wire shape of one audio-features record.
#[derive(Debug, Deserialize)]
struct AudioFeaturesPayload {
    id: String,
    danceability: f64,
    energy: f64,
    key: f64,
    loudness: f64,
    mode: f64,
    speechiness: f64,
    acousticness: f64,
    instrumentalness: f64,
    liveness: f64,
    valence: f64,
    tempo: f64,
    duration_ms: f64,
    time_signature: f64,
}

impl AudioFeaturesPayload {
    fn into_track_features(self) -> TrackFeatures {
        let features: FeatureVec = [
            self.danceability,
            self.energy,
            self.key,
            self.loudness,
            self.mode,
            self.speechiness,
            self.acousticness,
            self.instrumentalness,
            self.liveness,
            self.valence,
            self.tempo,
            self.duration_ms,
            self.time_signature,
        ];
        debug_assert_eq!(features.len(), FEATURE_DIM);
        TrackFeatures {
            track_id: self.id,
            features,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AudioFeaturesResponse {
    audio_features: Vec<Option<AudioFeaturesPayload>>,
}

#[derive(Debug, Deserialize)]
struct TrackRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PageItem {
    added_at: Option<DateTime<Utc>>,
    track: Option<TrackRef>,
}

#[derive(Debug, Deserialize)]
struct Page {
    items: Vec<PageItem>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreatedPlaylist {
    id: String,
}

/// Blocking HTTP implementation of [`Catalog`].
pub struct HttpCatalog {
    http: reqwest::blocking::Client,
    base_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    token: Mutex<TokenCache>,
}

impl HttpCatalog {
    /// Build a client with the default API endpoints and a fixed per-call
    /// timeout.
    pub fn new(client_id: String, client_secret: String) -> Result<Self> {
        Self::with_urls(
            client_id,
            client_secret,
            DEFAULT_BASE_URL.to_string(),
            DEFAULT_TOKEN_URL.to_string(),
        )
    }

    /// Build a client against explicit endpoints (used by tests).
    pub fn with_urls(
        client_id: String,
        client_secret: String,
        base_url: String,
        token_url: String,
    ) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url,
            token_url,
            client_id,
            client_secret,
            token: Mutex::new(TokenCache::default()),
        })
    }

    /// Current bearer token, refreshing through the token endpoint when
    /// the cached one is missing or about to expire.
    fn bearer(&self) -> Result<String> {
        let now = Utc::now();
        let mut cache = self
            .token
            .lock()
            .map_err(|_| anyhow::anyhow!("token cache lock poisoned"))?;
        if let Some(token) = cache.valid_token(now) {
            return Ok(token.to_string());
        }

        debug!("refreshing catalog access token");
        let response: TokenResponse = self
            .http
            .post(&self.token_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .context("token request failed")?
            .error_for_status()
            .context("token endpoint rejected the request")?
            .json()
            .context("malformed token response")?;

        cache.expires_at = Some(now + Duration::seconds(response.expires_in));
        cache.access_token = Some(response.access_token.clone());
        Ok(response.access_token)
    }

    /// Drain a paginated track listing starting at `url`.
    fn drain_pages(&self, mut url: String) -> Result<Vec<SavedTrack>> {
        let mut tracks = Vec::new();
        loop {
            let page: Page = self
                .http
                .get(&url)
                .bearer_auth(self.bearer()?)
                .send()
                .with_context(|| format!("page request failed: {url}"))?
                .error_for_status()
                .with_context(|| format!("page request rejected: {url}"))?
                .json()
                .context("malformed page response")?;

            for item in page.items {
                let Some(id) = item.track.and_then(|track| track.id) else {
                    continue;
                };
                tracks.push(SavedTrack {
                    track_id: id,
                    // Entries without a timestamp only survive all-time
                    // windows.
                    added_at: item.added_at.unwrap_or(DateTime::UNIX_EPOCH),
                });
            }

            match page.next {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(tracks)
    }
}

impl Catalog for HttpCatalog {
    fn audio_features(&self, track_ids: &[String]) -> Result<Vec<Option<TrackFeatures>>> {
        let url = format!("{}/audio-features", self.base_url);
        let response: AudioFeaturesResponse = self
            .http
            .get(&url)
            .bearer_auth(self.bearer()?)
            .query(&[("ids", track_ids.join(","))])
            .send()
            .context("audio features request failed")?
            .error_for_status()
            .context("audio features request rejected")?
            .json()
            .context("malformed audio features response")?;

        Ok(response
            .audio_features
            .into_iter()
            .map(|payload| payload.map(AudioFeaturesPayload::into_track_features))
            .collect())
    }

    fn playlist_tracks(&self, playlist_id: &str) -> Result<Vec<SavedTrack>> {
        self.drain_pages(format!("{}/playlists/{playlist_id}/tracks", self.base_url))
    }

    fn user_saved_tracks(&self) -> Result<Vec<SavedTrack>> {
        self.drain_pages(format!("{}/me/tracks", self.base_url))
    }

    fn create_playlist(&self, name: &str, description: &str) -> Result<String> {
        let url = format!("{}/me/playlists", self.base_url);
        let created: CreatedPlaylist = self
            .http
            .post(&url)
            .bearer_auth(self.bearer()?)
            .json(&serde_json::json!({
                "name": name,
                "description": description,
                "public": false,
            }))
            .send()
            .context("create playlist request failed")?
            .error_for_status()
            .context("create playlist request rejected")?
            .json()
            .context("malformed create playlist response")?;
        Ok(created.id)
    }

    fn add_items(&self, playlist_id: &str, track_ids: &[String]) -> Result<()> {
        let url = format!("{}/playlists/{playlist_id}/tracks", self.base_url);
        self.http
            .post(&url)
            .bearer_auth(self.bearer()?)
            .json(&serde_json::json!({ "uris": track_ids }))
            .send()
            .context("add items request failed")?
            .error_for_status()
            .context("add items request rejected")?;
        Ok(())
    }
}

// Every catalog doubles as the feature-fetch collaborator.
impl<T: Catalog> crate::features::AudioFeatureSource for T {
    fn audio_features(&self, track_ids: &[String]) -> Result<Vec<Option<TrackFeatures>>> {
        Catalog::audio_features(self, track_ids)
    }
}
