//! Read-only track library backed by `SQLite`.
//!
//! Four tables, populated offline by the training pipeline and never
//! written at request time: `tracks(track_id, track_uri)`,
//! `features(track_id, <13 feature columns>)`, `playlists(pid, name)` and
//! `ratings(pid, track_id)`. The library resolves playlist membership and
//! seeds the feature cache so that fully known tracks never hit the
//! network.

use crate::features::{FeatureVec, FEATURE_COLUMNS, FEATURE_DIM};
use anyhow::{Context, Result};
use log::debug;
use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

pub struct Library {
    conn: Connection,
}

impl Library {
    /// Open the library database. Fails if the file cannot be opened;
    /// table presence is checked lazily by the individual queries.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open library database {}", path.display()))?;
        Ok(Self { conn })
    }

    /// All known feature vectors keyed by track uri, for seeding the
    /// feature store cache.
    pub fn feature_cache(&self) -> Result<HashMap<String, FeatureVec>> {
        let sql = format!(
            "SELECT t.track_uri, {} FROM features f JOIN tracks t ON t.track_id = f.track_id",
            FEATURE_COLUMNS
                .iter()
                .map(|col| format!("f.{col}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("invalid SQL selecting cached features")?;

        let rows = stmt
            .query_map([], |row| {
                let uri: String = row.get(0)?;
                let mut features = [0.0f64; FEATURE_DIM];
                for (i, slot) in features.iter_mut().enumerate() {
                    *slot = row.get(i + 1)?;
                }
                Ok((uri, features))
            })
            .context("cannot query cached features")?;

        let mut cache = HashMap::new();
        for entry in rows {
            let (uri, features) = entry.context("bad feature row")?;
            cache.insert(uri, features);
        }
        debug!("loaded {} cached feature vectors", cache.len());
        Ok(cache)
    }

    /// Track uris belonging to the given playlists, in ratings order.
    /// Duplicates across playlists are kept; the ranker dedups later.
    pub fn tracks_for_playlists(&self, pids: &[u32]) -> Result<Vec<String>> {
        if pids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; pids.len()].join(",");
        let sql = format!(
            "SELECT t.track_uri FROM ratings r \
             JOIN tracks t ON t.track_id = r.track_id \
             WHERE r.pid IN ({placeholders}) ORDER BY r.rowid"
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("invalid SQL resolving playlist membership")?;

        let rows = stmt
            .query_map(rusqlite::params_from_iter(pids.iter()), |row| {
                row.get::<_, String>(0)
            })
            .context("cannot query playlist membership")?;

        let mut uris = Vec::new();
        for uri in rows {
            uris.push(uri.context("bad membership row")?);
        }
        debug!(
            "{} member tracks across {} playlists",
            uris.len(),
            pids.len()
        );
        Ok(uris)
    }

    /// Display name of a playlist, if the library knows it.
    pub fn playlist_name(&self, pid: u32) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM playlists WHERE pid = (?1)")
            .context("invalid SQL selecting playlist name")?;
        stmt.query_row([pid], |row| row.get(0))
            .map(Some)
            .or_else(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other).context("cannot query playlist name"),
            })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_sample() -> (TempDir, Library) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.db3");
        let conn = Connection::open(&path).unwrap();
        test_fixture::sample_library(&conn);
        drop(conn);
        (dir, Library::open(&path).unwrap())
    }

    #[test]
    fn feature_cache_is_keyed_by_uri() {
        let (_dir, library) = open_sample();
        let cache = library.feature_cache().unwrap();

        assert_eq!(cache.len(), 4);
        assert!((cache["u3"][0] - 3.0).abs() < 1e-12);
        assert!((cache["u3"][FEATURE_DIM - 1] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn playlist_membership_resolves_through_ratings() {
        let (_dir, library) = open_sample();
        let uris = library.tracks_for_playlists(&[1, 2]).unwrap();

        // u2 appears in both playlists and is kept twice.
        assert_eq!(uris, vec!["u1", "u2", "u2", "u3"]);
    }

    #[test]
    fn empty_pid_list_yields_no_tracks() {
        let (_dir, library) = open_sample();
        assert!(library.tracks_for_playlists(&[]).unwrap().is_empty());
    }

    #[test]
    fn playlist_names_resolve_when_known() {
        let (_dir, library) = open_sample();
        assert_eq!(library.playlist_name(2).unwrap(), Some("focus".to_string()));
        assert_eq!(library.playlist_name(99).unwrap(), None);
    }
}
