//! Game records and file fingerprints

use crate::metadata::GameMetadata;
use chrono::{DateTime, Utc};
use emuhub_config::FingerprintPolicy;
use emuhub_emulator::Platform;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

/// What a game path points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// A single image or ROM file
    #[default]
    File,
    /// An extracted game folder (PS3 `PS3_GAME` layout)
    Folder,
}

/// Cheap change detector for a game path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum Fingerprint {
    SizeMtime {
        size: u64,
        modified: Option<DateTime<Utc>>,
    },
    ContentHash {
        size: u64,
        sha256: String,
    },
}

impl Fingerprint {
    /// Fingerprint a game path. Folders always use the size total and
    /// newest mtime of their contents, whatever the policy.
    pub fn compute(path: &Path, kind: GameKind, policy: FingerprintPolicy) -> io::Result<Self> {
        match kind {
            GameKind::Folder => folder_fingerprint(path),
            GameKind::File => {
                let meta = fs::metadata(path)?;
                match policy {
                    FingerprintPolicy::SizeAndMtime => Ok(Self::SizeMtime {
                        size: meta.len(),
                        modified: meta.modified().ok().map(DateTime::<Utc>::from),
                    }),
                    FingerprintPolicy::ContentHash => Ok(Self::ContentHash {
                        size: meta.len(),
                        sha256: hash_file(path)?,
                    }),
                }
            }
        }
    }

    /// Size component
    pub fn size(&self) -> u64 {
        match self {
            Self::SizeMtime { size, .. } | Self::ContentHash { size, .. } => *size,
        }
    }
}

fn hash_file(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

fn folder_fingerprint(path: &Path) -> io::Result<Fingerprint> {
    let mut size = 0u64;
    let mut modified = fs::metadata(path)?.modified().ok();

    for entry in WalkDir::new(path).min_depth(1) {
        let entry = entry.map_err(io::Error::other)?;
        let meta = entry.metadata().map_err(io::Error::other)?;
        if meta.is_file() {
            size += meta.len();
        }
        if let Ok(m) = meta.modified() {
            modified = Some(modified.map_or(m, |cur| cur.max(m)));
        }
    }

    Ok(Fingerprint::SizeMtime {
        size,
        modified: modified.map(DateTime::<Utc>::from),
    })
}

/// Derived facts about one game path, as produced by a scan and persisted
/// in the scan cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCacheEntry {
    pub path: PathBuf,
    pub title: String,
    pub platform: Platform,
    #[serde(default)]
    pub kind: GameKind,
    pub size: u64,
    pub fingerprint: Fingerprint,
}

/// A game in the catalog: scan-derived fields plus user data
#[derive(Debug, Clone, PartialEq)]
pub struct GameRecord {
    /// Canonical identity of the game
    pub path: PathBuf,
    pub title: String,
    pub platform: Platform,
    pub kind: GameKind,

    /// Size in bytes
    pub size: u64,
    pub fingerprint: Fingerprint,

    /// User-owned data, persisted separately from the scan cache
    pub meta: GameMetadata,
}

impl GameRecord {
    /// Build a record from a scan result and the user data already held for
    /// its path
    pub fn from_scan(entry: ScanCacheEntry, meta: GameMetadata) -> Self {
        Self {
            path: entry.path,
            title: entry.title,
            platform: entry.platform,
            kind: entry.kind,
            size: entry.size,
            fingerprint: entry.fingerprint,
            meta,
        }
    }

    /// Replace derived fields, keeping user data
    pub fn refresh(&mut self, entry: ScanCacheEntry) {
        self.title = entry.title;
        self.platform = entry.platform;
        self.kind = entry.kind;
        self.size = entry.size;
        self.fingerprint = entry.fingerprint;
    }

    /// Derived fields as a cache entry
    pub fn to_cache_entry(&self) -> ScanCacheEntry {
        ScanCacheEntry {
            path: self.path.clone(),
            title: self.title.clone(),
            platform: self.platform,
            kind: self.kind,
            size: self.size,
            fingerprint: self.fingerprint.clone(),
        }
    }

    pub fn is_favorite(&self) -> bool {
        self.meta.favorite
    }

    /// Accumulated playtime
    pub fn playtime(&self) -> Duration {
        Duration::from_secs(self.meta.playtime_secs)
    }

    /// Path handed to the emulator.
    ///
    /// Extracted PS3 folders boot from `PS3_GAME/USRDIR/EBOOT.BIN` when it
    /// exists; everything else launches the path itself.
    pub fn launch_target(&self) -> PathBuf {
        if self.kind == GameKind::Folder {
            let eboot = self.path.join("PS3_GAME").join("USRDIR").join("EBOOT.BIN");
            if eboot.is_file() {
                return eboot;
            }
        }
        self.path.clone()
    }

    /// PS3 package files must be installed through the emulator first
    pub fn needs_install(&self) -> bool {
        self.platform == Platform::Ps3
            && self
                .path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("pkg"))
    }
}
