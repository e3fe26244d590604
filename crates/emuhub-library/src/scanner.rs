//! Background library scanning
//!
//! A scan walks every library root, fingerprints what it finds and reuses
//! cached results for unchanged files. Results leave the worker in batches
//! through a caller-supplied sink; the final `Finished` event carries the
//! paths that disappeared since the last scan.

use crate::cache::{CacheStore, ScanCache};
use crate::record::{Fingerprint, GameKind, ScanCacheEntry};
use emuhub_config::{FingerprintPolicy, LibraryConfig};
use emuhub_emulator::{Platform, classify, clean_title, known_extensions};
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use walkdir::WalkDir;

/// Summary of a finished (or cancelled) scan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    /// Games emitted to the catalog
    pub games_found: usize,

    /// Entries reused from the cache without reclassifying
    pub reused: usize,

    /// Files passed through the classifier
    pub classified: usize,

    /// Files with no recognised platform
    pub skipped: usize,

    /// Cached paths that no longer exist
    pub tombstones: Vec<PathBuf>,

    /// Per-file and per-root failures
    pub errors: Vec<String>,

    /// Library folders that could not be read at all
    pub unreadable_roots: usize,

    pub cancelled: bool,

    /// Set when the cache could not be written
    pub cache_error: Option<String>,

    pub duration_ms: u64,
}

/// Messages sent from the scan worker, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Started { roots: usize },
    Progress { processed: usize, total: usize },
    Batch(Vec<ScanCacheEntry>),
    Finished(ScanReport),
}

/// Scanner configuration
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub roots: Vec<PathBuf>,

    /// File extensions to consider, lower-case
    pub extensions: HashSet<String>,

    /// Directory names to skip, lower-case
    pub skip_dirs: HashSet<String>,

    /// Skip hidden files/directories
    pub skip_hidden: bool,

    /// Keep files with unknown extensions as `Uncategorized`
    pub include_uncategorized: bool,

    pub batch_size: usize,
    pub fingerprint: FingerprintPolicy,

    /// Games the caller already lists. Ones that vanished are swept even
    /// when the cache has no entry for them.
    pub known: Vec<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::from(&LibraryConfig::default())
    }
}

impl From<&LibraryConfig> for ScanConfig {
    fn from(config: &LibraryConfig) -> Self {
        Self {
            roots: config.paths.clone(),
            extensions: known_extensions().map(str::to_string).collect(),
            skip_dirs: config.skip_dirs.iter().map(|d| d.to_lowercase()).collect(),
            skip_hidden: config.skip_hidden,
            include_uncategorized: config.include_uncategorized,
            batch_size: config.batch_size.max(1),
            fingerprint: config.fingerprint,
            known: Vec::new(),
        }
    }
}

impl ScanConfig {
    fn wants_file(&self, path: &Path) -> bool {
        if self.include_uncategorized {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.contains(&e.to_ascii_lowercase()))
    }

    fn skips(&self, name: &str, is_dir: bool) -> bool {
        (self.skip_hidden && name.starts_with('.'))
            || (is_dir && self.skip_dirs.contains(&name.to_lowercase()))
    }
}

/// Scanner lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    Idle,
    Scanning,
    /// The last scan could not persist its results or read any root
    Failed,
}

const IDLE: u8 = 0;
const SCANNING: u8 = 1;
const FAILED: u8 = 2;

/// Outcome of asking for a scan
#[derive(Debug)]
pub enum ScanRequest {
    Started(ScanHandle),
    /// A scan is already in progress; nothing was started
    AlreadyRunning,
}

/// Handle to a running scan
#[derive(Debug)]
pub struct ScanHandle {
    cancel: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ScanHandle {
    /// Ask the worker to stop after the current file
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    /// Wait for the worker to exit
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("Scan worker panicked");
        }
    }
}

/// Game library scanner
///
/// Clones share the same state, so at most one scan runs across all of
/// them.
#[derive(Debug, Clone)]
pub struct LibraryScanner {
    cache: CacheStore,
    state: Arc<AtomicU8>,
}

/// A path found under a root
#[derive(Debug)]
struct Candidate {
    path: PathBuf,
    kind: GameKind,
}

/// Enumeration result for one root
#[derive(Debug)]
struct RootListing {
    root: PathBuf,
    readable: bool,
    candidates: Vec<Candidate>,
    /// Subdirectories that could not be read
    unreadable: Vec<PathBuf>,
}

impl LibraryScanner {
    pub fn new(cache: CacheStore) -> Self {
        Self {
            cache,
            state: Arc::new(AtomicU8::new(IDLE)),
        }
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    pub fn state(&self) -> ScanState {
        match self.state.load(Ordering::SeqCst) {
            SCANNING => ScanState::Scanning,
            FAILED => ScanState::Failed,
            _ => ScanState::Idle,
        }
    }

    /// Start a scan on a worker thread.
    ///
    /// Returns `AlreadyRunning` without side effects if a scan is active.
    pub fn start<F>(&self, config: ScanConfig, mut sink: F) -> std::io::Result<ScanRequest>
    where
        F: FnMut(ScanEvent) + Send + 'static,
    {
        if self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                (s != SCANNING).then_some(SCANNING)
            })
            .is_err()
        {
            tracing::debug!("Scan requested while another is running");
            return Ok(ScanRequest::AlreadyRunning);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let worker = self.clone();
        let flag = cancel.clone();

        let spawned = thread::Builder::new()
            .name("emuhub-scan".to_string())
            .spawn(move || {
                let report = worker.run(&config, &flag, &mut sink);
                worker.settle(&config, &report);
                sink(ScanEvent::Finished(report));
            });

        match spawned {
            Ok(thread) => Ok(ScanRequest::Started(ScanHandle {
                cancel,
                thread: Some(thread),
            })),
            Err(e) => {
                self.state.store(FAILED, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    /// Run a scan on the calling thread, marking the scanner busy meanwhile
    pub fn scan_blocking<F>(&self, config: &ScanConfig, mut sink: F) -> Option<ScanReport>
    where
        F: FnMut(ScanEvent),
    {
        if self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                (s != SCANNING).then_some(SCANNING)
            })
            .is_err()
        {
            return None;
        }

        let report = self.run(config, &AtomicBool::new(false), &mut sink);
        self.settle(config, &report);
        sink(ScanEvent::Finished(report.clone()));
        Some(report)
    }

    fn settle(&self, config: &ScanConfig, report: &ScanReport) {
        let failed = report.cache_error.is_some()
            || (!config.roots.is_empty() && report.unreadable_roots == config.roots.len());
        self.state
            .store(if failed { FAILED } else { IDLE }, Ordering::SeqCst);
    }

    /// The scan itself. Everything except `Finished` goes through `sink`.
    fn run(&self, config: &ScanConfig, cancel: &AtomicBool, sink: &mut dyn FnMut(ScanEvent)) -> ScanReport {
        let started = Instant::now();
        let mut report = ScanReport::default();

        tracing::info!("Scanning {} library folders", config.roots.len());
        sink(ScanEvent::Started {
            roots: config.roots.len(),
        });

        let cached = self.cache.load();

        let listings: Vec<RootListing> = config
            .roots
            .iter()
            .map(|root| enumerate(root, config, &mut report.errors))
            .collect();
        let total: usize = listings.iter().map(|l| l.candidates.len()).sum();
        report.unreadable_roots = listings.iter().filter(|l| !l.readable).count();

        let mut next = ScanCache::new();
        let mut batch = Vec::with_capacity(config.batch_size);
        let mut processed = 0usize;
        let mut seen = HashSet::new();
        let mut failed = HashSet::new();

        // Where processing stopped: (root index, last processed path)
        let mut stopped_at: Option<(usize, Option<PathBuf>)> = None;

        'roots: for (index, listing) in listings.iter().enumerate() {
            let mut last: Option<PathBuf> = None;
            for candidate in &listing.candidates {
                if cancel.load(Ordering::SeqCst) {
                    report.cancelled = true;
                    stopped_at = Some((index, last));
                    break 'roots;
                }

                processed += 1;
                last = Some(candidate.path.clone());

                // Nested library folders list the same file twice.
                if !seen.insert(candidate.path.as_path()) {
                    continue;
                }

                match self.process(candidate, config, &cached, &mut report) {
                    Ok(Some(entry)) => {
                        next.insert(entry.path.clone(), entry.clone());
                        batch.push(entry);
                        if batch.len() >= config.batch_size {
                            report.games_found += batch.len();
                            sink(ScanEvent::Batch(std::mem::take(&mut batch)));
                            sink(ScanEvent::Progress { processed, total });
                        }
                    }
                    Ok(None) => report.skipped += 1,
                    Err(e) => {
                        tracing::warn!("Skipping {}: {}", candidate.path.display(), e);
                        report
                            .errors
                            .push(format!("{}: {}", candidate.path.display(), e));
                        // Keep what we knew; the file is still there.
                        failed.insert(candidate.path.as_path());
                        if let Some(entry) = cached.get(&candidate.path) {
                            next.insert(entry.path.clone(), entry.clone());
                        }
                    }
                }
            }
        }

        if !batch.is_empty() {
            report.games_found += batch.len();
            sink(ScanEvent::Batch(batch));
        }
        sink(ScanEvent::Progress { processed, total });

        let mut previous: BTreeSet<&Path> = cached.keys().map(PathBuf::as_path).collect();
        previous.extend(config.known.iter().map(PathBuf::as_path));

        for path in previous {
            if next.contains_key(path) || failed.contains(path) {
                continue;
            }
            if was_visited(path, &config.roots, &listings, stopped_at.as_ref()) {
                tracing::debug!("Removing vanished game {}", path.display());
                report.tombstones.push(path.to_path_buf());
            } else if let Some(entry) = cached.get(path) {
                next.insert(path.to_path_buf(), entry.clone());
            }
        }

        if let Err(e) = self.cache.save(&next) {
            tracing::warn!("Scan cache not saved: {}", e);
            report.cache_error = Some(e.to_string());
        }

        report.duration_ms = started.elapsed().as_millis() as u64;

        tracing::info!(
            "Scan {} in {}ms: {} games ({} from cache, {} classified), {} removed, {} errors",
            if report.cancelled { "cancelled" } else { "finished" },
            report.duration_ms,
            report.games_found,
            report.reused,
            report.classified,
            report.tombstones.len(),
            report.errors.len()
        );

        report
    }

    fn process(
        &self,
        candidate: &Candidate,
        config: &ScanConfig,
        cached: &ScanCache,
        report: &mut ScanReport,
    ) -> std::io::Result<Option<ScanCacheEntry>> {
        let fingerprint = Fingerprint::compute(&candidate.path, candidate.kind, config.fingerprint)?;

        if let Some(entry) = cached.get(&candidate.path)
            && entry.fingerprint == fingerprint
            && entry.kind == candidate.kind
        {
            report.reused += 1;
            return Ok(Some(entry.clone()));
        }

        let (platform, stem) = match candidate.kind {
            GameKind::Folder => (Some(Platform::Ps3), candidate.path.file_name()),
            GameKind::File => {
                report.classified += 1;
                (classify(&candidate.path), candidate.path.file_stem())
            }
        };

        let platform = match platform {
            Some(platform) => platform,
            None if config.include_uncategorized => Platform::Uncategorized,
            None => return Ok(None),
        };

        let stem = stem.map(|s| s.to_string_lossy()).unwrap_or_default();
        tracing::debug!("Classified {} as {}", candidate.path.display(), platform);

        Ok(Some(ScanCacheEntry {
            path: candidate.path.clone(),
            title: clean_title(&stem),
            platform,
            kind: candidate.kind,
            size: fingerprint.size(),
            fingerprint,
        }))
    }
}

/// Whether the scan had the chance to see `path`, so its absence means the
/// file is gone
fn was_visited(
    path: &Path,
    roots: &[PathBuf],
    listings: &[RootListing],
    stopped_at: Option<&(usize, Option<PathBuf>)>,
) -> bool {
    let Some(index) = roots.iter().position(|root| path.starts_with(root)) else {
        // Outside every library folder: drop it once a scan completes.
        return stopped_at.is_none();
    };

    let listing = &listings[index];
    if !listing.readable || listing.unreadable.iter().any(|dir| path.starts_with(dir)) {
        return false;
    }

    match stopped_at {
        None => true,
        Some((stop, _)) if index < *stop => true,
        Some((stop, last)) if index == *stop => last.as_deref().is_some_and(|last| path <= last),
        Some(_) => false,
    }
}

/// PS3 games extracted to a folder carry a `PS3_GAME` directory
fn is_ps3_folder(dir: &Path) -> bool {
    dir.join("PS3_GAME").is_dir()
}

fn enumerate(root: &Path, config: &ScanConfig, errors: &mut Vec<String>) -> RootListing {
    let mut listing = RootListing {
        root: root.to_path_buf(),
        readable: true,
        candidates: Vec::new(),
        unreadable: Vec::new(),
    };

    if !root.is_dir() {
        tracing::warn!("Library folder unavailable: {}", root.display());
        errors.push(format!("{}: not a readable directory", root.display()));
        listing.readable = false;
        return listing;
    }

    let mut walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !config.skips(&e.file_name().to_string_lossy(), e.file_type().is_dir())
        });

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let at = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                if e.depth() == 0 {
                    tracing::warn!("Cannot read library folder {}: {}", root.display(), e);
                    errors.push(format!("{}: {}", root.display(), e));
                    listing.readable = false;
                    return listing;
                }
                tracing::warn!("Cannot read {}: {}", at.display(), e);
                errors.push(format!("{}: {}", at.display(), e));
                listing.unreadable.push(at);
                continue;
            }
        };

        let path = entry.path();
        if entry.file_type().is_dir() {
            if entry.depth() > 0 && is_ps3_folder(path) {
                listing.candidates.push(Candidate {
                    path: path.to_path_buf(),
                    kind: GameKind::Folder,
                });
                walker.skip_current_dir();
            }
        } else if entry.file_type().is_file() && config.wants_file(path) {
            listing.candidates.push(Candidate {
                path: path.to_path_buf(),
                kind: GameKind::File,
            });
        }
    }

    listing.candidates.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(
        "Found {} candidates under {}",
        listing.candidates.len(),
        listing.root.display()
    );
    listing
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (TempDir, PathBuf, LibraryScanner) {
        let dir = TempDir::new().unwrap();
        let roms = dir.path().join("roms");
        fs::create_dir_all(&roms).unwrap();
        let scanner = LibraryScanner::new(CacheStore::new(dir.path().join("game_cache.json")));
        (dir, roms, scanner)
    }

    fn config(roots: &[&Path]) -> ScanConfig {
        ScanConfig {
            roots: roots.iter().map(|r| r.to_path_buf()).collect(),
            ..ScanConfig::default()
        }
    }

    fn scan(scanner: &LibraryScanner, config: &ScanConfig) -> (ScanReport, Vec<ScanCacheEntry>) {
        let mut games = Vec::new();
        let report = scanner
            .scan_blocking(config, |event| {
                if let ScanEvent::Batch(batch) = event {
                    games.extend(batch);
                }
            })
            .unwrap();
        (report, games)
    }

    #[test]
    fn test_scan_config_default() {
        let config = ScanConfig::default();
        assert!(config.extensions.contains("gba"));
        assert!(config.extensions.contains("z64"));
        assert!(config.skip_dirs.contains("bios"));
        assert_eq!(config.batch_size, 64);
    }

    #[test]
    fn test_scan_classifies_and_titles() {
        let (_dir, roms, scanner) = setup();
        fs::write(roms.join("Super Mario 64 (USA).z64"), b"N64").unwrap();
        fs::write(roms.join("notes.txt"), b"text").unwrap();

        let (report, games) = scan(&scanner, &config(&[&roms]));
        assert_eq!(report.games_found, 1);
        assert_eq!(games[0].title, "Super Mario 64");
        assert_eq!(games[0].platform, Platform::N64);
        assert_eq!(games[0].size, 3);
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[test]
    fn test_skips_hidden_and_configured_dirs() {
        let (_dir, roms, scanner) = setup();
        fs::create_dir_all(roms.join("BIOS")).unwrap();
        fs::create_dir_all(roms.join(".trash")).unwrap();
        fs::write(roms.join("BIOS").join("scph1001.bin"), b"bios").unwrap();
        fs::write(roms.join(".trash").join("old.gba"), b"old").unwrap();
        fs::write(roms.join(".hidden.gba"), b"hidden").unwrap();
        fs::write(roms.join("zelda.gba"), b"zelda").unwrap();

        let (_, games) = scan(&scanner, &config(&[&roms]));
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].path, roms.join("zelda.gba"));
    }

    #[test]
    fn test_include_uncategorized() {
        let (_dir, roms, scanner) = setup();
        fs::write(roms.join("unknown.xyz"), b"???").unwrap();

        let mut cfg = config(&[&roms]);
        let (report, games) = scan(&scanner, &cfg);
        assert!(games.is_empty());
        assert_eq!(report.skipped, 0);

        cfg.include_uncategorized = true;
        let (report, games) = scan(&scanner, &cfg);
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].platform, Platform::Uncategorized);
        assert_eq!(report.classified, 1);
    }

    #[test]
    fn test_ps3_folder_is_one_game() {
        let (_dir, roms, scanner) = setup();
        let game = roms.join("Demon's Souls [BLUS30443]");
        fs::create_dir_all(game.join("PS3_GAME").join("USRDIR")).unwrap();
        fs::write(game.join("PS3_GAME").join("USRDIR").join("EBOOT.BIN"), b"ELF").unwrap();
        fs::write(game.join("PS3_GAME").join("PARAM.SFO"), b"SFO").unwrap();

        let (_, games) = scan(&scanner, &config(&[&roms]));
        assert_eq!(games.len(), 1);
        assert_eq!(games[0].kind, GameKind::Folder);
        assert_eq!(games[0].platform, Platform::Ps3);
        assert_eq!(games[0].title, "Demon's Souls");
        assert_eq!(games[0].size, 6);
    }

    #[test]
    fn test_batches_respect_size() {
        let (_dir, roms, scanner) = setup();
        for i in 0..5 {
            fs::write(roms.join(format!("game{}.gba", i)), b"rom").unwrap();
        }

        let mut cfg = config(&[&roms]);
        cfg.batch_size = 2;

        let mut sizes = Vec::new();
        let mut last = None;
        scanner
            .scan_blocking(&cfg, |event| {
                if let ScanEvent::Batch(batch) = &event {
                    sizes.push(batch.len());
                }
                last = Some(event);
            })
            .unwrap();

        assert_eq!(sizes, vec![2, 2, 1]);
        assert!(matches!(last, Some(ScanEvent::Finished(_))));
    }

    #[test]
    fn test_missing_root_is_reported_not_fatal() {
        let (dir, roms, scanner) = setup();
        fs::write(roms.join("zelda.gba"), b"zelda").unwrap();
        let missing = dir.path().join("unplugged");

        let (report, games) = scan(&scanner, &config(&[&missing, &roms]));
        assert_eq!(games.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[test]
    fn test_unreadable_roots_mark_failed() {
        let (dir, _roms, scanner) = setup();
        let missing = dir.path().join("unplugged");

        let (report, _) = scan(&scanner, &config(&[&missing]));
        assert_eq!(report.errors.len(), 1);
        assert_eq!(scanner.state(), ScanState::Failed);

        // A later scan may still run.
        assert!(scanner.scan_blocking(&config(&[]), |_| {}).is_some());
        assert_eq!(scanner.state(), ScanState::Idle);
    }

    #[test]
    fn test_unavailable_root_keeps_cached_entries() {
        let (dir, roms, scanner) = setup();
        let usb = dir.path().join("usb");
        fs::create_dir_all(&usb).unwrap();
        fs::write(usb.join("sonic.md"), b"sega").unwrap();

        let cfg = config(&[&roms, &usb]);
        scan(&scanner, &cfg);

        fs::rename(&usb, dir.path().join("usb-unplugged")).unwrap();
        let (report, _) = scan(&scanner, &cfg);
        assert!(report.tombstones.is_empty());
        assert!(scanner.cache().load().contains_key(&usb.join("sonic.md")));
    }

    #[test]
    fn test_was_visited_after_cancel() {
        let roots = vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")];
        let listing = |root: &str| RootListing {
            root: PathBuf::from(root),
            readable: true,
            candidates: Vec::new(),
            unreadable: Vec::new(),
        };
        let listings = vec![listing("/a"), listing("/b"), listing("/c")];
        let stopped = (1, Some(PathBuf::from("/b/m.gba")));

        assert!(was_visited(Path::new("/a/z.gba"), &roots, &listings, Some(&stopped)));
        assert!(was_visited(Path::new("/b/a.gba"), &roots, &listings, Some(&stopped)));
        assert!(!was_visited(Path::new("/b/z.gba"), &roots, &listings, Some(&stopped)));
        assert!(!was_visited(Path::new("/c/a.gba"), &roots, &listings, Some(&stopped)));
        assert!(!was_visited(Path::new("/elsewhere/a.gba"), &roots, &listings, Some(&stopped)));
        assert!(was_visited(Path::new("/elsewhere/a.gba"), &roots, &listings, None));
    }

    #[test]
    fn test_was_visited_skips_unreadable_subdir() {
        let roots = vec![PathBuf::from("/a")];
        let listings = vec![RootListing {
            root: PathBuf::from("/a"),
            readable: true,
            candidates: Vec::new(),
            unreadable: vec![PathBuf::from("/a/sub")],
        }];

        assert!(!was_visited(Path::new("/a/sub/x.gba"), &roots, &listings, None));
        assert!(!was_visited(Path::new("/a/sub/deeper/y.gba"), &roots, &listings, None));
        assert!(was_visited(Path::new("/a/subway.gba"), &roots, &listings, None));
        assert!(was_visited(Path::new("/a/y.gba"), &roots, &listings, None));
    }

    #[test]
    fn test_unreadable_file_keeps_cached_entry() {
        let (_dir, roms, scanner) = setup();
        for i in 0..3 {
            fs::write(roms.join(format!("game{}.gba", i)), b"rom").unwrap();
        }
        let mut cfg = config(&[&roms]);
        cfg.batch_size = 1;
        scan(&scanner, &cfg);

        // game1 disappears after enumeration, before it is fingerprinted.
        let doomed = roms.join("game1.gba");
        let mut removed = false;
        let report = scanner
            .scan_blocking(&cfg, |event| {
                if let ScanEvent::Batch(_) = event
                    && !removed
                {
                    fs::remove_file(&doomed).unwrap();
                    removed = true;
                }
            })
            .unwrap();

        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("game1.gba"));
        assert_eq!(report.games_found, 2);
        assert!(report.tombstones.is_empty());
        assert!(scanner.cache().load().contains_key(&doomed));
    }

    #[test]
    fn test_known_games_swept_without_cache() {
        let (_dir, roms, scanner) = setup();
        fs::write(roms.join("zelda.gba"), b"zelda").unwrap();

        let mut cfg = config(&[&roms]);
        cfg.known = vec![roms.join("zelda.gba"), roms.join("metroid.gba")];
        let (report, games) = scan(&scanner, &cfg);

        assert_eq!(games.len(), 1);
        assert_eq!(report.tombstones, vec![roms.join("metroid.gba")]);
    }

    #[test]
    fn test_background_scan_and_guard() {
        let (_dir, roms, scanner) = setup();
        fs::write(roms.join("zelda.gba"), b"zelda").unwrap();

        let (tx, rx) = std::sync::mpsc::channel();
        let request = scanner
            .start(config(&[&roms]), move |event| {
                let _ = tx.send(event);
            })
            .unwrap();
        let ScanRequest::Started(handle) = request else {
            panic!("scan did not start");
        };

        handle.join();
        let events: Vec<_> = rx.try_iter().collect();
        assert!(matches!(events.first(), Some(ScanEvent::Started { roots: 1 })));
        assert!(matches!(events.last(), Some(ScanEvent::Finished(r)) if r.games_found == 1));
        assert_eq!(scanner.state(), ScanState::Idle);
    }
}
