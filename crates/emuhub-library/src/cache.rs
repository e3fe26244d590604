//! Persistent scan cache

use crate::{LibraryError, ScanCacheEntry};
use emuhub_config::atomic_write;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Bumped whenever the entry layout changes; older files load as empty
pub const CACHE_VERSION: u32 = 1;

/// Cached scan results keyed by game path
pub type ScanCache = BTreeMap<PathBuf, ScanCacheEntry>;

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    entries: Vec<ScanCacheEntry>,
}

/// Reads and writes `game_cache.json`.
///
/// The cache is advisory: anything wrong with the file means a full rescan,
/// never a failure.
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl CacheStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cache; missing, corrupt or outdated files yield an empty map
    pub fn load(&self) -> ScanCache {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("No scan cache at {}", self.path.display());
                return ScanCache::new();
            }
            Err(e) => {
                tracing::warn!("Cannot read scan cache {}: {}", self.path.display(), e);
                return ScanCache::new();
            }
        };

        match serde_json::from_str::<CacheFile>(&text) {
            Ok(file) if file.version == CACHE_VERSION => file
                .entries
                .into_iter()
                .map(|entry| (entry.path.clone(), entry))
                .collect(),
            Ok(file) => {
                tracing::warn!(
                    "Ignoring scan cache with version {} (expected {})",
                    file.version,
                    CACHE_VERSION
                );
                ScanCache::new()
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt scan cache {}: {}", self.path.display(), e);
                ScanCache::new()
            }
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, LibraryError> {
        self.write_lock
            .lock()
            .map_err(|_| LibraryError::Storage("cache writer poisoned".to_string()))
    }

    fn write(&self, cache: &ScanCache) -> Result<(), LibraryError> {
        let file = CacheFile {
            version: CACHE_VERSION,
            entries: cache.values().cloned().collect(),
        };
        let json = serde_json::to_vec(&file)?;

        atomic_write(&self.path, &json).map_err(|e| {
            LibraryError::Storage(format!("cannot write {}: {}", self.path.display(), e))
        })?;

        tracing::debug!("Saved {} cache entries to {}", cache.len(), self.path.display());
        Ok(())
    }

    /// Replace the cache file atomically
    pub fn save(&self, cache: &ScanCache) -> Result<(), LibraryError> {
        let _guard = self.lock()?;
        self.write(cache)
    }

    /// Drop one entry. Returns false if the cache had none for `path`.
    pub fn remove(&self, path: &Path) -> Result<bool, LibraryError> {
        let _guard = self.lock()?;
        let mut cache = self.load();
        if cache.remove(path).is_none() {
            return Ok(false);
        }
        self.write(&cache)?;
        Ok(true)
    }

    /// Delete the cache file; the next scan starts cold
    pub fn clear(&self) -> io::Result<()> {
        match fs::remove_file(&self.path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fingerprint, GameKind};
    use emuhub_emulator::Platform;
    use tempfile::TempDir;

    fn sample() -> ScanCache {
        let entry = ScanCacheEntry {
            path: PathBuf::from("/games/mario64.z64"),
            title: "mario64".to_string(),
            platform: Platform::N64,
            kind: GameKind::File,
            size: 8_388_608,
            fingerprint: Fingerprint::SizeMtime {
                size: 8_388_608,
                modified: None,
            },
        };
        ScanCache::from([(entry.path.clone(), entry)])
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("game_cache.json"));

        store.save(&sample()).unwrap();
        assert_eq!(store.load(), sample());
    }

    #[test]
    fn test_missing_and_corrupt_load_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game_cache.json");
        let store = CacheStore::new(&path);
        assert!(store.load().is_empty());

        fs::write(&path, b"\x00\x01garbage").unwrap();
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_version_mismatch_loads_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("game_cache.json");
        fs::write(&path, br#"{"version":999,"entries":[]}"#).unwrap();

        assert!(CacheStore::new(&path).load().is_empty());
    }

    #[test]
    fn test_remove_entry() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("game_cache.json"));
        store.save(&sample()).unwrap();

        assert!(store.remove(Path::new("/games/mario64.z64")).unwrap());
        assert!(!store.remove(Path::new("/games/mario64.z64")).unwrap());
        assert!(store.load().is_empty());
    }

    #[test]
    fn test_clear() {
        let dir = TempDir::new().unwrap();
        let store = CacheStore::new(dir.path().join("game_cache.json"));
        store.clear().unwrap();

        store.save(&sample()).unwrap();
        store.clear().unwrap();
        assert!(store.load().is_empty());
    }
}
