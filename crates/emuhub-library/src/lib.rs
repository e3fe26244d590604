//! Game library management for EmulatorHub
//!
//! Handles folder scanning, the scan cache, the in-memory game catalog and
//! launching games through configured emulators. `Hub` ties these together
//! for a front end: it owns the catalog on the caller's thread and applies
//! results that background workers send back over a channel.

mod cache;
mod catalog;
mod hub;
mod launch;
mod metadata;
mod record;
mod scanner;

pub use cache::{CACHE_VERSION, CacheStore, ScanCache};
pub use catalog::{Catalog, Collection, GameQuery, SortKey};
pub use hub::{Hub, HubEvent, HubPaths, HubUpdate};
pub use launch::LaunchCoordinator;
pub use metadata::{GameMetadata, MetadataFile, MetadataStore, StoredCollection};
pub use record::{Fingerprint, GameKind, GameRecord, ScanCacheEntry};
pub use scanner::{LibraryScanner, ScanConfig, ScanEvent, ScanHandle, ScanReport, ScanRequest, ScanState};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Game not found: {0}")]
    GameNotFound(PathBuf),

    #[error("Game already in library: {0}")]
    DuplicateGame(PathBuf),

    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Collection already exists: {0}")]
    DuplicateCollection(String),

    #[error("Collection name cannot be empty")]
    InvalidCollectionName,

    #[error("Cannot read {path}: {source}")]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Emulator error: {0}")]
    Emulator(#[from] emuhub_emulator::EmulatorError),

    #[error("Configuration error: {0}")]
    Config(#[from] emuhub_config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
