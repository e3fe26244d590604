//! Front-end session
//!
//! `Hub` owns the catalog, the profile registry and the configuration on the
//! interactive thread. Background work (scans, exit monitors) reports back
//! through a channel; the owner drains it with `pump()` or `next_event()`
//! and `apply()`, so catalog mutations never leave the owning thread.

use crate::{
    CacheStore, Catalog, GameKind, GameRecord, LaunchCoordinator, LibraryError, LibraryScanner, MetadataStore,
    ScanConfig, ScanEvent, ScanHandle, ScanReport, ScanRequest, ScanState,
};
use emuhub_config::HubConfig;
use emuhub_emulator::{
    EmulatorError, EmulatorLauncher, EmulatorProfile, LaunchHandle, Platform, ProcessExit,
    ProfileRegistry,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Messages from background workers
#[derive(Debug, Clone)]
pub enum HubEvent {
    Scan(ScanEvent),
    ProcessExited(ProcessExit),
    /// A file could not be written; the session carries on in memory
    StorageWarning(String),
}

/// What applying an event changed, for the front end to render
#[derive(Debug, Clone, PartialEq)]
pub enum HubUpdate {
    ScanStarted { roots: usize },
    ScanProgress { processed: usize, total: usize },
    GamesChanged { added: usize, updated: usize },
    ScanFinished(ScanReport),
    SessionRecorded { game: PathBuf, seconds: u64 },
    StorageWarning(String),
    /// The event referred to something no longer in the library
    Ignored,
}

/// Where a session keeps its files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubPaths {
    pub config: PathBuf,
    pub cache: PathBuf,
    pub metadata: PathBuf,
}

impl HubPaths {
    /// All files in one directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            config: dir.join(emuhub_config::CONFIG_FILE),
            cache: dir.join(emuhub_config::CACHE_FILE),
            metadata: dir.join(emuhub_config::METADATA_FILE),
        }
    }
}

impl Default for HubPaths {
    fn default() -> Self {
        Self {
            config: emuhub_config::config_path(),
            cache: emuhub_config::cache_path(),
            metadata: emuhub_config::metadata_path(),
        }
    }
}

/// Forwards scan events to the session, flagging a cache that failed to save
fn scan_sink(tx: UnboundedSender<HubEvent>) -> impl FnMut(ScanEvent) + Send + 'static {
    move |event| {
        if let ScanEvent::Finished(report) = &event
            && let Some(error) = &report.cache_error
        {
            let _ = tx.send(HubEvent::StorageWarning(format!("Scan cache not saved: {}", error)));
        }
        let _ = tx.send(HubEvent::Scan(event));
    }
}

/// An EmulatorHub session
pub struct Hub {
    paths: HubPaths,
    config: HubConfig,
    catalog: Catalog,
    registry: ProfileRegistry,
    scanner: LibraryScanner,
    active_scan: Option<ScanHandle>,
    metadata: MetadataStore,
    coordinator: LaunchCoordinator,
    tx: UnboundedSender<HubEvent>,
    rx: UnboundedReceiver<HubEvent>,
}

impl Hub {
    /// Open a session, showing the last known library from the scan cache
    /// until the next scan reconciles it.
    ///
    /// Reads config, user data and the cache on the calling thread; do this
    /// before the interactive loop starts.
    pub fn open(paths: HubPaths) -> Result<Self, LibraryError> {
        let config = HubConfig::load_or_default(&paths.config)?;
        let metadata = MetadataStore::new(&paths.metadata);
        let cache = CacheStore::new(&paths.cache);

        let mut catalog = Catalog::with_metadata(metadata.load());
        let known: Vec<_> = cache
            .load()
            .into_values()
            .filter(|entry| {
                config
                    .library
                    .paths
                    .iter()
                    .any(|root| entry.path.starts_with(root))
            })
            .collect();
        catalog.apply_batch(known);

        let registry = ProfileRegistry::from_settings(&config.emulators);
        let coordinator = LaunchCoordinator::new(EmulatorLauncher::with_tracking(
            config.emulators.track_playtime,
        ));
        let (tx, rx) = mpsc::unbounded_channel();

        tracing::info!(
            "Opened library: {} games, {} emulator profiles",
            catalog.len(),
            registry.snapshot().list().len()
        );

        Ok(Self {
            paths,
            config,
            catalog,
            registry,
            scanner: LibraryScanner::new(cache),
            active_scan: None,
            metadata,
            coordinator,
            tx,
            rx,
        })
    }

    pub fn paths(&self) -> &HubPaths {
        &self.paths
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Direct catalog edits; call `save_metadata` afterwards to persist them
    pub fn catalog_mut(&mut self) -> &mut Catalog {
        &mut self.catalog
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn scan_state(&self) -> ScanState {
        self.scanner.state()
    }

    // ---- scanning ----

    /// Start a background scan of all library folders.
    ///
    /// Returns false if a scan is already running.
    pub fn start_scan(&mut self) -> Result<bool, LibraryError> {
        let config = self.scan_config();
        match self.scanner.start(config, scan_sink(self.tx.clone()))? {
            ScanRequest::Started(handle) => {
                self.active_scan = Some(handle);
                Ok(true)
            }
            ScanRequest::AlreadyRunning => Ok(false),
        }
    }

    /// Scan on the calling thread and apply the results.
    ///
    /// For headless callers (batch tools, tests) only. An interactive front
    /// end uses `start_scan` so the walk stays off its thread.
    pub fn scan_blocking(&mut self) -> Option<ScanReport> {
        let config = self.scan_config();
        let report = self.scanner.scan_blocking(&config, scan_sink(self.tx.clone()))?;
        self.pump();
        Some(report)
    }

    /// Library folders plus the games currently listed, so a vanished game
    /// is swept even if the cache lost track of it
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            known: self.catalog.iter().map(|g| g.path.clone()).collect(),
            ..ScanConfig::from(&self.config.library)
        }
    }

    /// Ask a running scan to stop; what it already found is kept
    pub fn cancel_scan(&self) {
        if let Some(scan) = &self.active_scan {
            tracing::info!("Cancelling library scan");
            scan.cancel();
        }
    }

    // ---- event loop ----

    /// Apply every pending event without blocking
    pub fn pump(&mut self) -> Vec<HubUpdate> {
        let mut updates = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            updates.push(self.apply(event));
        }
        updates
    }

    /// Wait for the next background event
    pub async fn next_event(&mut self) -> Option<HubEvent> {
        self.rx.recv().await
    }

    /// Drive events until the running scan finishes
    pub async fn wait_for_scan(&mut self) -> Option<ScanReport> {
        self.active_scan.as_ref()?;
        while let Some(event) = self.next_event().await {
            if let HubUpdate::ScanFinished(report) = self.apply(event) {
                return Some(report);
            }
        }
        None
    }

    /// Fold one event into the session
    pub fn apply(&mut self, event: HubEvent) -> HubUpdate {
        match event {
            HubEvent::Scan(ScanEvent::Started { roots }) => HubUpdate::ScanStarted { roots },
            HubEvent::Scan(ScanEvent::Progress { processed, total }) => {
                HubUpdate::ScanProgress { processed, total }
            }
            HubEvent::Scan(ScanEvent::Batch(batch)) => {
                let (added, updated) = self.catalog.apply_batch(batch);
                HubUpdate::GamesChanged { added, updated }
            }
            HubEvent::Scan(ScanEvent::Finished(report)) => {
                self.catalog.apply_tombstones(&report.tombstones);
                if let Some(scan) = self.active_scan.take() {
                    scan.join();
                }
                self.save_metadata_or_warn();
                HubUpdate::ScanFinished(report)
            }
            HubEvent::ProcessExited(exit) => {
                match self
                    .catalog
                    .record_session(&exit.game, exit.started_at, exit.ended_at)
                {
                    Ok(seconds) => {
                        tracing::info!(
                            "Played {} for {}s (exit code {:?})",
                            exit.game.display(),
                            seconds,
                            exit.exit_code
                        );
                        self.save_metadata_or_warn();
                        HubUpdate::SessionRecorded {
                            game: exit.game,
                            seconds,
                        }
                    }
                    Err(_) => {
                        tracing::debug!(
                            "Session for {} ended after it left the library",
                            exit.game.display()
                        );
                        HubUpdate::Ignored
                    }
                }
            }
            HubEvent::StorageWarning(message) => HubUpdate::StorageWarning(message),
        }
    }

    // ---- launching ----

    /// Profile that would launch a game
    pub fn resolve_emulator(&self, game: &Path) -> Result<EmulatorProfile, LibraryError> {
        let record = self
            .catalog
            .get(game)
            .ok_or_else(|| LibraryError::GameNotFound(game.to_path_buf()))?;
        let table = self.registry.snapshot();
        Ok(self.coordinator.resolve(record, &table)?.clone())
    }

    /// Launch a game. Last played and play count update immediately;
    /// playtime is credited when the exit event is applied.
    pub fn launch(&mut self, game: &Path) -> Result<LaunchHandle, LibraryError> {
        let record = self
            .catalog
            .get(game)
            .ok_or_else(|| LibraryError::GameNotFound(game.to_path_buf()))?;
        let table = self.registry.snapshot();
        let tx = self.tx.clone();

        let handle = self.coordinator.launch(record, &table, move |exit| {
            let _ = tx.send(HubEvent::ProcessExited(exit));
        })?;

        self.catalog.mark_launched(game, handle.started_at)?;
        self.save_metadata_or_warn();
        Ok(handle)
    }

    /// Delete a game's file (or PS3 folder) from disk and drop it from the
    /// library, its collections and the scan cache
    pub fn delete_game(&mut self, game: &Path) -> Result<GameRecord, LibraryError> {
        let kind = self
            .catalog
            .get(game)
            .ok_or_else(|| LibraryError::GameNotFound(game.to_path_buf()))?
            .kind;

        let deleted = match kind {
            GameKind::Folder => fs::remove_dir_all(game),
            GameKind::File => fs::remove_file(game),
        };
        match deleted {
            Ok(()) => tracing::info!("Deleted {}", game.display()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!("{} was already gone", game.display());
            }
            Err(source) => {
                return Err(LibraryError::FileSystem {
                    path: game.to_path_buf(),
                    source,
                });
            }
        }

        let record = self
            .catalog
            .remove(game)
            .ok_or_else(|| LibraryError::GameNotFound(game.to_path_buf()))?;

        if let Err(e) = self.scanner.cache().remove(game) {
            tracing::warn!("{}", e);
            let _ = self.tx.send(HubEvent::StorageWarning(e.to_string()));
        }
        self.save_metadata()?;
        Ok(record)
    }

    // ---- user data ----

    /// Assign or clear a game's emulator override
    pub fn set_override(&mut self, game: &Path, profile: Option<&str>) -> Result<(), LibraryError> {
        if let Some(id) = profile
            && self.registry.get(id).is_none()
        {
            return Err(EmulatorError::ProfileNotFound(id.to_string()).into());
        }
        self.catalog.set_override(game, profile.map(str::to_string))?;
        self.save_metadata()
    }

    pub fn save_metadata(&self) -> Result<(), LibraryError> {
        self.metadata.save(&self.catalog.export_metadata())
    }

    fn save_metadata_or_warn(&self) {
        if let Err(e) = self.save_metadata() {
            tracing::warn!("{}", e);
            let _ = self.tx.send(HubEvent::StorageWarning(e.to_string()));
        }
    }

    // ---- library folders ----

    /// Add a library folder. Returns false if it was already configured.
    pub fn add_library_path(&mut self, path: impl Into<PathBuf>) -> Result<bool, LibraryError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(LibraryError::FileSystem {
                path,
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }
        let added = self.config.library.add_path(path);
        if added {
            self.save_config()?;
        }
        Ok(added)
    }

    /// Remove a library folder. Its games leave the catalog on the next
    /// completed scan.
    pub fn remove_library_path(&mut self, path: &Path) -> Result<bool, LibraryError> {
        let removed = self.config.library.remove_path(path);
        if removed {
            self.save_config()?;
        }
        Ok(removed)
    }

    // ---- emulator profiles ----

    /// Detect emulators in a folder and register the new ones
    pub fn detect_emulators(&mut self, folder: &Path) -> Result<usize, LibraryError> {
        let report = ProfileRegistry::detect(folder)?;
        let added = self.registry.add_detected(report);
        if added > 0 {
            self.save_config()?;
        }
        Ok(added)
    }

    pub fn add_profile(&mut self, profile: EmulatorProfile) -> Result<(), LibraryError> {
        self.registry.add_manual(profile)?;
        self.save_config()
    }

    /// Replace a profile; overrides follow a rename
    pub fn update_profile(&mut self, id: &str, profile: EmulatorProfile) -> Result<(), LibraryError> {
        let new_id = profile.id.clone();
        self.registry.update(id, profile)?;
        if new_id != id && self.catalog.retarget_overrides(id, &new_id) > 0 {
            self.save_metadata_or_warn();
        }
        self.save_config()
    }

    /// Delete a profile and every override that named it
    pub fn remove_profile(&mut self, id: &str) -> Result<EmulatorProfile, LibraryError> {
        let removed = self.registry.remove(id)?;
        let cleared = self.catalog.clear_overrides_for(id);
        if cleared > 0 {
            tracing::info!("Cleared {} game overrides for {}", cleared, id);
            self.save_metadata_or_warn();
        }
        self.save_config()?;
        Ok(removed)
    }

    pub fn set_profile_enabled(&mut self, id: &str, enabled: bool) -> Result<(), LibraryError> {
        self.registry.set_enabled(id, enabled)?;
        self.save_config()
    }

    pub fn set_platform_default(&mut self, platform: Platform, id: &str) -> Result<(), LibraryError> {
        self.registry.set_platform_default(platform, id)?;
        self.save_config()
    }

    pub fn clear_platform_default(&mut self, platform: Platform) -> Result<bool, LibraryError> {
        let cleared = self.registry.clear_platform_default(platform);
        if cleared {
            self.save_config()?;
        }
        Ok(cleared)
    }

    /// Write folders, profiles and settings to `config.toml`
    pub fn save_config(&mut self) -> Result<(), LibraryError> {
        self.registry.write_settings(&mut self.config.emulators);
        self.config.save(&self.paths.config)?;
        Ok(())
    }

    /// Stop background work and persist user data
    pub fn shutdown(mut self) -> Result<(), LibraryError> {
        if let Some(scan) = self.active_scan.take() {
            scan.cancel();
            scan.join();
        }
        self.pump();
        self.save_metadata()
    }
}
