//! Final playlist assembly and publishing.

use crate::catalog::Catalog;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::info;

/// How many tracks a single add-items call may carry.
const PUBLISH_BATCH: usize = 100;

/// An assembled playlist that has not (necessarily) been published yet.
///
/// Assembly is pure: the draft just wraps the ranked track sequence with
/// its metadata and a creation timestamp. Track order encodes rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistDraft {
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub track_ids: Vec<String>,
}

impl PlaylistDraft {
    /// Wrap a ranked, deduplicated track sequence with metadata.
    #[must_use]
    pub fn assemble(
        track_ids: Vec<String>,
        name: &str,
        description: &str,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            created_at: now,
            track_ids,
        }
    }

    /// Publish through the catalog collaborator, returning the external
    /// playlist id.
    ///
    /// Safe for the caller to retry; no dedup of identical publishes is
    /// attempted here.
    ///
    /// # Errors
    ///
    /// Propagates catalog transport failures.
    pub fn publish(&self, catalog: &dyn Catalog) -> Result<String> {
        let playlist_id = catalog
            .create_playlist(&self.name, &self.description)
            .with_context(|| format!("creating playlist `{}`", self.name))?;

        for batch in self.track_ids.chunks(PUBLISH_BATCH) {
            catalog
                .add_items(&playlist_id, batch)
                .with_context(|| format!("adding tracks to playlist {playlist_id}"))?;
        }

        info!(
            "published playlist `{}` ({} tracks) as {playlist_id}",
            self.name,
            self.track_ids.len()
        );
        Ok(playlist_id)
    }
}
