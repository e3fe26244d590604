//! User-owned game data
//!
//! Favorites, tags, notes, playtime and collections live in `library.json`,
//! apart from the scan cache, so throwing the cache away never loses them.

use crate::LibraryError;
use chrono::{DateTime, Utc};
use emuhub_config::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const METADATA_VERSION: u32 = 1;

/// Per-game user data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameMetadata {
    pub favorite: bool,
    pub tags: BTreeSet<String>,
    pub notes: String,

    /// Custom cover image, stored as a path reference only
    pub cover: Option<PathBuf>,

    /// Profile id that takes precedence over the platform default
    pub emulator_override: Option<String>,

    pub playtime_secs: u64,
    pub play_count: u32,
    pub added_at: DateTime<Utc>,
    pub last_played: Option<DateTime<Utc>>,
}

impl Default for GameMetadata {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl GameMetadata {
    /// Fresh metadata for a game first seen at `added_at`
    pub fn new(added_at: DateTime<Utc>) -> Self {
        Self {
            favorite: false,
            tags: BTreeSet::new(),
            notes: String::new(),
            cover: None,
            emulator_override: None,
            playtime_secs: 0,
            play_count: 0,
            added_at,
            last_played: None,
        }
    }
}

/// A named, user-curated group of games
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCollection {
    pub name: String,
    #[serde(default)]
    pub games: Vec<PathBuf>,
}

/// On-disk layout of `library.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataFile {
    pub version: u32,
    #[serde(default)]
    pub games: BTreeMap<PathBuf, GameMetadata>,
    #[serde(default)]
    pub collections: Vec<StoredCollection>,
}

impl Default for MetadataFile {
    fn default() -> Self {
        Self {
            version: METADATA_VERSION,
            games: BTreeMap::new(),
            collections: Vec::new(),
        }
    }
}

/// Reads and writes `library.json`
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load user data.
    ///
    /// A missing file is an empty library. An unreadable one is moved aside
    /// to `library.json.bak` before starting empty, so the next save cannot
    /// overwrite what the user may still recover by hand.
    pub fn load(&self) -> MetadataFile {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return MetadataFile::default(),
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", self.path.display(), e);
                return MetadataFile::default();
            }
        };

        match serde_json::from_str::<MetadataFile>(&text) {
            Ok(file) if file.version == METADATA_VERSION => file,
            Ok(file) => {
                tracing::warn!(
                    "Unsupported library metadata version {} in {}",
                    file.version,
                    self.path.display()
                );
                self.set_aside();
                MetadataFile::default()
            }
            Err(e) => {
                tracing::warn!("Corrupt library metadata {}: {}", self.path.display(), e);
                self.set_aside();
                MetadataFile::default()
            }
        }
    }

    fn set_aside(&self) {
        let backup = self.path.with_extension("json.bak");
        if let Err(e) = fs::rename(&self.path, &backup) {
            tracing::warn!("Cannot move {} aside: {}", self.path.display(), e);
        } else {
            tracing::info!("Previous library metadata kept at {}", backup.display());
        }
    }

    /// Write user data atomically
    pub fn save(&self, file: &MetadataFile) -> Result<(), LibraryError> {
        let json = serde_json::to_vec_pretty(file)?;
        atomic_write(&self.path, &json).map_err(|e| {
            LibraryError::Storage(format!("cannot write {}: {}", self.path.display(), e))
        })?;
        tracing::debug!("Saved metadata for {} games", file.games.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().join("library.json"));
        assert_eq!(store.load(), MetadataFile::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = MetadataStore::new(dir.path().join("library.json"));

        let mut meta = GameMetadata::default();
        meta.favorite = true;
        meta.tags.insert("co-op".to_string());
        meta.playtime_secs = 120;

        let mut file = MetadataFile::default();
        file.games.insert(PathBuf::from("/games/mario64.z64"), meta.clone());
        file.collections.push(StoredCollection {
            name: "Favorites of 1996".to_string(),
            games: vec![PathBuf::from("/games/mario64.z64")],
        });

        store.save(&file).unwrap();
        let loaded = store.load();
        assert_eq!(loaded, file);
        assert_eq!(loaded.games[Path::new("/games/mario64.z64")], meta);
    }

    #[test]
    fn test_corrupt_file_is_set_aside() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");
        fs::write(&path, b"{ not json").unwrap();

        let store = MetadataStore::new(&path);
        assert_eq!(store.load(), MetadataFile::default());
        assert!(!path.exists());
        assert!(dir.path().join("library.json.bak").exists());
    }

    #[test]
    fn test_partial_entries_use_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("library.json");
        fs::write(
            &path,
            br#"{"version":1,"games":{"/games/zelda.gba":{"favorite":true,"added_at":"2024-01-01T00:00:00Z"}}}"#,
        )
        .unwrap();

        let file = MetadataStore::new(&path).load();
        let meta = &file.games[Path::new("/games/zelda.gba")];
        assert!(meta.favorite);
        assert_eq!(meta.play_count, 0);
        assert!(file.collections.is_empty());
    }
}
