//! Configuration and data directory management.
//!
//! Mixtape keeps its library database and model artifacts in the
//! platform-standard data directory:
//! - Linux: `~/.local/share/mixtape/`
//! - macOS: `~/Library/Application Support/mixtape/`
//! - Windows: `%APPDATA%\mixtape\`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the mixtape data directory, creating it if needed.
///
/// # Errors
///
/// Fails when the platform data directory cannot be determined or the
/// subdirectory cannot be created.
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
        .ok_or_else(|| anyhow::anyhow!("could not determine the system data directory"))?;
    let mixtape_dir = data_dir.join("mixtape");
    fs::create_dir_all(&mixtape_dir).with_context(|| {
        format!(
            "failed to create data directory at {}",
            mixtape_dir.display()
        )
    })?;
    Ok(mixtape_dir)
}

/// Locations of everything a recommendation run needs on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paths {
    pub library_db: PathBuf,
    pub model: PathBuf,
    pub scaler: PathBuf,
    pub corpus: PathBuf,
}

impl Paths {
    /// Standard layout inside the platform data directory.
    ///
    /// # Errors
    ///
    /// Propagates [`get_data_dir`] failures.
    pub fn new() -> Result<Self> {
        Ok(Self::in_dir(&get_data_dir()?))
    }

    /// Standard layout inside an explicit directory.
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            library_db: dir.join("library.db3"),
            model: dir.join("model.json"),
            scaler: dir.join("scaler.json"),
            corpus: dir.join("corpus.json"),
        }
    }
}
