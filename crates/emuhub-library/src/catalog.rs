//! In-memory game catalog
//!
//! The catalog is owned by the interactive thread. Scan results arrive as
//! batches and tombstones; user edits go through the methods below. Nothing
//! here touches the filesystem.

use crate::metadata::{GameMetadata, MetadataFile, StoredCollection};
use crate::{GameRecord, LibraryError, ScanCacheEntry};
use chrono::{DateTime, Utc};
use emuhub_emulator::Platform;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

/// A named, user-curated group of games.
///
/// Members are game paths; removing a game from the catalog removes it here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collection {
    pub name: String,
    pub games: Vec<PathBuf>,
}

impl Collection {
    pub fn contains(&self, path: &Path) -> bool {
        self.games.iter().any(|g| g == path)
    }
}

/// Sort keys for catalog queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Playtime,
    Added,
    LastPlayed,
}

impl SortKey {
    /// Parse a sort key as written in the UI config
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "name" | "title" => Some(Self::Name),
            "size" => Some(Self::Size),
            "playtime" | "play_time" => Some(Self::Playtime),
            "added" | "date_added" => Some(Self::Added),
            "last_played" | "recent" => Some(Self::LastPlayed),
            _ => None,
        }
    }
}

/// Filters and ordering for `Catalog::query`
#[derive(Debug, Clone, Default)]
pub struct GameQuery {
    /// Case-insensitive title substring
    pub text: Option<String>,
    pub platform: Option<Platform>,
    pub collection: Option<String>,
    pub tag: Option<String>,
    pub favorites_only: bool,
    pub sort: SortKey,
    pub descending: bool,
}

impl GameQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collection = Some(name.into());
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn favorites(mut self) -> Self {
        self.favorites_only = true;
        self
    }

    pub fn sort_by(mut self, sort: SortKey, descending: bool) -> Self {
        self.sort = sort;
        self.descending = descending;
        self
    }
}

/// All known games plus user collections
#[derive(Debug, Default)]
pub struct Catalog {
    games: BTreeMap<PathBuf, GameRecord>,
    collections: Vec<Collection>,

    /// User data for paths not (yet) seen by a scan, e.g. on a drive that is
    /// currently unplugged
    pending: HashMap<PathBuf, GameMetadata>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an empty catalog that will attach stored user data to games as
    /// scans report them
    pub fn with_metadata(file: MetadataFile) -> Self {
        Self {
            games: BTreeMap::new(),
            collections: file
                .collections
                .into_iter()
                .map(|c| Collection {
                    name: c.name,
                    games: c.games,
                })
                .collect(),
            pending: file.games.into_iter().collect(),
        }
    }

    /// Snapshot user data for persisting
    pub fn export_metadata(&self) -> MetadataFile {
        let mut games: BTreeMap<PathBuf, GameMetadata> = self
            .pending
            .iter()
            .map(|(path, meta)| (path.clone(), meta.clone()))
            .collect();
        games.extend(
            self.games
                .iter()
                .map(|(path, record)| (path.clone(), record.meta.clone())),
        );

        MetadataFile {
            games,
            collections: self
                .collections
                .iter()
                .map(|c| StoredCollection {
                    name: c.name.clone(),
                    games: c.games.clone(),
                })
                .collect(),
            ..MetadataFile::default()
        }
    }

    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    pub fn get(&self, path: &Path) -> Option<&GameRecord> {
        self.games.get(path)
    }

    /// All games ordered by path
    pub fn iter(&self) -> impl Iterator<Item = &GameRecord> {
        self.games.values()
    }

    fn game_mut(&mut self, path: &Path) -> Result<&mut GameRecord, LibraryError> {
        self.games
            .get_mut(path)
            .ok_or_else(|| LibraryError::GameNotFound(path.to_path_buf()))
    }

    // ---- scan results ----

    /// Insert a new game or refresh the derived fields of a known one.
    /// Returns true if the game was new.
    pub fn upsert(&mut self, entry: ScanCacheEntry) -> bool {
        if let Some(record) = self.games.get_mut(&entry.path) {
            record.refresh(entry);
            return false;
        }

        let meta = self
            .pending
            .remove(&entry.path)
            .unwrap_or_else(|| GameMetadata::new(Utc::now()));
        self.games
            .insert(entry.path.clone(), GameRecord::from_scan(entry, meta));
        true
    }

    /// Apply one scan batch; returns (added, updated)
    pub fn apply_batch(&mut self, batch: Vec<ScanCacheEntry>) -> (usize, usize) {
        let mut added = 0;
        let mut updated = 0;
        for entry in batch {
            if self.upsert(entry) {
                added += 1;
            } else {
                updated += 1;
            }
        }
        (added, updated)
    }

    /// Remove games whose files vanished, with their user data
    pub fn apply_tombstones(&mut self, paths: &[PathBuf]) -> usize {
        let mut removed = 0;
        for path in paths {
            self.pending.remove(path);
            if self.remove(path).is_some() {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::info!("Removed {} vanished games", removed);
        }
        removed
    }

    /// Add a game reported outside of a scan
    pub fn add(&mut self, entry: ScanCacheEntry) -> Result<(), LibraryError> {
        if self.games.contains_key(&entry.path) {
            return Err(LibraryError::DuplicateGame(entry.path));
        }
        self.upsert(entry);
        Ok(())
    }

    /// Replace the derived fields of a known game
    pub fn update(&mut self, entry: ScanCacheEntry) -> Result<(), LibraryError> {
        self.game_mut(&entry.path)?.refresh(entry);
        Ok(())
    }

    /// Remove a game and its collection memberships
    pub fn remove(&mut self, path: &Path) -> Option<GameRecord> {
        let record = self.games.remove(path)?;
        for collection in &mut self.collections {
            collection.games.retain(|g| g != path);
        }
        tracing::debug!("Removed {} from catalog", path.display());
        Some(record)
    }

    // ---- user data ----

    /// Flip the favorite flag; returns the new value
    pub fn toggle_favorite(&mut self, path: &Path) -> Result<bool, LibraryError> {
        let meta = &mut self.game_mut(path)?.meta;
        meta.favorite = !meta.favorite;
        Ok(meta.favorite)
    }

    pub fn set_favorite(&mut self, path: &Path, favorite: bool) -> Result<(), LibraryError> {
        self.game_mut(path)?.meta.favorite = favorite;
        Ok(())
    }

    /// A launch happened at `at`
    pub fn mark_launched(&mut self, path: &Path, at: DateTime<Utc>) -> Result<(), LibraryError> {
        let meta = &mut self.game_mut(path)?.meta;
        meta.last_played = Some(at);
        meta.play_count = meta.play_count.saturating_add(1);
        Ok(())
    }

    /// Credit a finished play session
    pub fn record_session(
        &mut self,
        path: &Path,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<u64, LibraryError> {
        let secs = (ended_at - started_at).num_seconds().max(0) as u64;
        let meta = &mut self.game_mut(path)?.meta;
        meta.playtime_secs = meta.playtime_secs.saturating_add(secs);
        meta.last_played = Some(ended_at);
        Ok(secs)
    }

    /// Set or clear the per-game emulator override.
    ///
    /// The caller checks that the profile exists.
    pub fn set_override(&mut self, path: &Path, profile: Option<String>) -> Result<(), LibraryError> {
        self.game_mut(path)?.meta.emulator_override = profile;
        Ok(())
    }

    /// Drop every override naming `profile`; returns how many were cleared
    pub fn clear_overrides_for(&mut self, profile: &str) -> usize {
        self.rewrite_overrides(profile, None)
    }

    /// Point overrides at a renamed profile
    pub fn retarget_overrides(&mut self, from: &str, to: &str) -> usize {
        self.rewrite_overrides(from, Some(to))
    }

    fn rewrite_overrides(&mut self, from: &str, to: Option<&str>) -> usize {
        let mut changed = 0;
        let metas = self
            .games
            .values_mut()
            .map(|r| &mut r.meta)
            .chain(self.pending.values_mut());
        for meta in metas {
            if meta.emulator_override.as_deref() == Some(from) {
                meta.emulator_override = to.map(str::to_string);
                changed += 1;
            }
        }
        changed
    }

    /// Returns false if the tag was already present
    pub fn add_tag(&mut self, path: &Path, tag: &str) -> Result<bool, LibraryError> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Ok(false);
        }
        Ok(self.game_mut(path)?.meta.tags.insert(tag.to_string()))
    }

    pub fn remove_tag(&mut self, path: &Path, tag: &str) -> Result<bool, LibraryError> {
        Ok(self.game_mut(path)?.meta.tags.remove(tag.trim()))
    }

    pub fn set_notes(&mut self, path: &Path, notes: impl Into<String>) -> Result<(), LibraryError> {
        self.game_mut(path)?.meta.notes = notes.into();
        Ok(())
    }

    pub fn set_cover(&mut self, path: &Path, cover: Option<PathBuf>) -> Result<(), LibraryError> {
        self.game_mut(path)?.meta.cover = cover;
        Ok(())
    }

    // ---- collections ----

    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    fn collection_mut(&mut self, name: &str) -> Result<&mut Collection, LibraryError> {
        self.collections
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| LibraryError::CollectionNotFound(name.to_string()))
    }

    pub fn create_collection(&mut self, name: &str) -> Result<(), LibraryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LibraryError::InvalidCollectionName);
        }
        if self.collection(name).is_some() {
            return Err(LibraryError::DuplicateCollection(name.to_string()));
        }
        self.collections.push(Collection {
            name: name.to_string(),
            games: Vec::new(),
        });
        Ok(())
    }

    pub fn delete_collection(&mut self, name: &str) -> Result<Collection, LibraryError> {
        let index = self
            .collections
            .iter()
            .position(|c| c.name == name)
            .ok_or_else(|| LibraryError::CollectionNotFound(name.to_string()))?;
        Ok(self.collections.remove(index))
    }

    pub fn rename_collection(&mut self, from: &str, to: &str) -> Result<(), LibraryError> {
        let to = to.trim();
        if to.is_empty() {
            return Err(LibraryError::InvalidCollectionName);
        }
        if from != to && self.collection(to).is_some() {
            return Err(LibraryError::DuplicateCollection(to.to_string()));
        }
        self.collection_mut(from)?.name = to.to_string();
        Ok(())
    }

    /// Returns false if the game was already a member
    pub fn add_to_collection(&mut self, name: &str, path: &Path) -> Result<bool, LibraryError> {
        if !self.games.contains_key(path) {
            return Err(LibraryError::GameNotFound(path.to_path_buf()));
        }
        let collection = self.collection_mut(name)?;
        if collection.contains(path) {
            return Ok(false);
        }
        collection.games.push(path.to_path_buf());
        Ok(true)
    }

    pub fn remove_from_collection(&mut self, name: &str, path: &Path) -> Result<bool, LibraryError> {
        let collection = self.collection_mut(name)?;
        let before = collection.games.len();
        collection.games.retain(|g| g != path);
        Ok(collection.games.len() != before)
    }

    /// Names of the collections containing a game
    pub fn memberships(&self, path: &Path) -> Vec<&str> {
        self.collections
            .iter()
            .filter(|c| c.contains(path))
            .map(|c| c.name.as_str())
            .collect()
    }

    // ---- queries ----

    /// Filter and sort games
    pub fn query(&self, query: &GameQuery) -> Vec<&GameRecord> {
        let needle = query.text.as_deref().map(str::to_lowercase);
        let members = match &query.collection {
            Some(name) => match self.collection(name) {
                Some(c) => Some(c),
                None => return Vec::new(),
            },
            None => None,
        };

        let mut games: Vec<&GameRecord> = self
            .games
            .values()
            .filter(|g| {
                needle
                    .as_deref()
                    .is_none_or(|n| g.title.to_lowercase().contains(n))
            })
            .filter(|g| query.platform.is_none_or(|p| g.platform == p))
            .filter(|g| members.is_none_or(|c| c.contains(&g.path)))
            .filter(|g| query.tag.as_deref().is_none_or(|t| g.meta.tags.contains(t)))
            .filter(|g| !query.favorites_only || g.meta.favorite)
            .collect();

        games.sort_by(|a, b| {
            let order = compare(a, b, query.sort);
            let order = if query.descending { order.reverse() } else { order };
            order.then_with(|| a.path.cmp(&b.path))
        });
        games
    }

    /// Platforms present in the library with their game counts
    pub fn platforms(&self) -> Vec<(Platform, usize)> {
        let mut counts: BTreeMap<Platform, usize> = BTreeMap::new();
        for game in self.games.values() {
            *counts.entry(game.platform).or_default() += 1;
        }
        counts.into_iter().collect()
    }

    pub fn favorites(&self) -> Vec<&GameRecord> {
        self.query(&GameQuery::new().favorites())
    }

    /// Most recently played first
    pub fn recently_played(&self, limit: usize) -> Vec<&GameRecord> {
        let mut games: Vec<&GameRecord> = self
            .games
            .values()
            .filter(|g| g.meta.last_played.is_some())
            .collect();
        games.sort_by(|a, b| b.meta.last_played.cmp(&a.meta.last_played));
        games.truncate(limit);
        games
    }

    /// Total accumulated playtime across all games, in seconds
    pub fn total_playtime_secs(&self) -> u64 {
        self.games.values().map(|g| g.meta.playtime_secs).sum()
    }
}

fn compare(a: &GameRecord, b: &GameRecord, key: SortKey) -> Ordering {
    match key {
        SortKey::Name => a.title.to_lowercase().cmp(&b.title.to_lowercase()),
        SortKey::Size => a.size.cmp(&b.size),
        SortKey::Playtime => a.meta.playtime_secs.cmp(&b.meta.playtime_secs),
        SortKey::Added => a.meta.added_at.cmp(&b.meta.added_at),
        SortKey::LastPlayed => a.meta.last_played.cmp(&b.meta.last_played),
    }
}
