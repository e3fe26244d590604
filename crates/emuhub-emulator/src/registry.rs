//! Emulator profile registry
//!
//! The table is replaced as a whole on every edit. Readers hold an
//! `Arc<ProfileTable>` snapshot and never observe a half-applied change.

use crate::{EmulatorError, Platform, signatures};
use chrono::{DateTime, Utc};
use emuhub_config::{EmulatorSettings, ProfileConfig};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix for ids of auto-detected profiles
const AUTO_PREFIX: &str = "[Auto] ";

/// A configured emulator
#[derive(Debug, Clone, PartialEq)]
pub struct EmulatorProfile {
    /// User-assigned id
    pub id: String,

    /// Path to executable (or a bare command name looked up on PATH)
    pub executable: PathBuf,

    /// Supported platform names
    pub platforms: Vec<String>,

    /// Launch argument template
    pub args: String,

    /// Created by auto-detection
    pub auto_detected: bool,

    /// Eligible as a platform default
    pub enabled: bool,

    /// When the profile was added
    pub added_at: DateTime<Utc>,
}

impl EmulatorProfile {
    /// Create a manually configured profile
    pub fn new(id: impl Into<String>, executable: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            executable: executable.into(),
            platforms: Vec::new(),
            args: String::new(),
            auto_detected: false,
            enabled: true,
            added_at: Utc::now(),
        }
    }

    /// Add supported platform
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platforms.push(platform.into());
        self
    }

    /// Set the argument template
    pub fn with_args(mut self, args: impl Into<String>) -> Self {
        self.args = args.into();
        self
    }

    /// Set when the profile was added
    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = added_at;
        self
    }

    /// Check if this profile runs games of the given platform
    pub fn supports(&self, platform: Platform) -> bool {
        self.platforms.iter().any(|label| platform.matches_label(label))
    }

    /// Resolve the executable on disk, searching PATH for bare command names
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        if self.executable.is_file() {
            return Some(self.executable.clone());
        }

        let bare = self.executable.components().count() == 1 && !self.executable.is_absolute();
        if bare {
            return which::which(&self.executable).ok();
        }

        None
    }

    fn from_config(id: &str, config: &ProfileConfig) -> Self {
        Self {
            id: id.to_string(),
            executable: config.path.clone(),
            platforms: config.systems.clone(),
            args: config.args.clone(),
            auto_detected: config.auto_detected,
            enabled: config.enabled,
            added_at: config.added_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
        }
    }

    fn to_config(&self) -> ProfileConfig {
        ProfileConfig {
            path: self.executable.clone(),
            systems: self.platforms.clone(),
            args: self.args.clone(),
            auto_detected: self.auto_detected,
            enabled: self.enabled,
            added_at: Some(self.added_at),
        }
    }
}

/// Result of scanning a folder for emulator executables
#[derive(Debug, Default)]
pub struct DetectionReport {
    /// Recognised executables, as ready-to-add profiles
    pub detected: Vec<EmulatorProfile>,

    /// Files that matched no signature
    pub unmatched: usize,
}

/// Immutable snapshot of all profiles and platform defaults
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    /// Profiles in the order they were added
    profiles: Vec<EmulatorProfile>,

    /// Explicit default profile id per platform name
    platform_defaults: BTreeMap<String, String>,
}

impl ProfileTable {
    /// Get profile by id
    pub fn get(&self, id: &str) -> Option<&EmulatorProfile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    /// List all profiles
    pub fn list(&self) -> &[EmulatorProfile] {
        &self.profiles
    }

    /// Profiles supporting a platform
    pub fn for_platform(&self, platform: Platform) -> Vec<&EmulatorProfile> {
        self.profiles.iter().filter(|p| p.supports(platform)).collect()
    }

    /// First enabled profile supporting the platform; the most recently
    /// added one wins when several qualify.
    pub fn match_platform(&self, platform: Platform) -> Option<&EmulatorProfile> {
        self.profiles
            .iter()
            .enumerate()
            .filter(|(_, p)| p.enabled && p.supports(platform))
            .max_by_key(|(index, p)| (p.added_at, *index))
            .map(|(_, p)| p)
    }

    /// Explicitly configured default for a platform, if it is still usable
    pub fn platform_default(&self, platform: Platform) -> Option<&EmulatorProfile> {
        let id = self.platform_defaults.get(platform.name())?;
        self.get(id).filter(|p| p.enabled)
    }

    /// Effective default: the explicit choice, else the best match
    pub fn default_for(&self, platform: Platform) -> Option<&EmulatorProfile> {
        self.platform_default(platform)
            .or_else(|| self.match_platform(platform))
    }

    /// Explicit platform defaults
    pub fn platform_defaults(&self) -> &BTreeMap<String, String> {
        &self.platform_defaults
    }
}

/// Registry of configured emulators
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    table: Arc<ProfileTable>,
}

impl ProfileRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from persisted settings
    pub fn from_settings(settings: &EmulatorSettings) -> Self {
        let mut profiles: Vec<EmulatorProfile> = settings
            .profiles
            .iter()
            .map(|(id, config)| EmulatorProfile::from_config(id, config))
            .collect();
        // Settings are keyed by id; restore insertion order from timestamps.
        profiles.sort_by_key(|p| p.added_at);

        let platform_defaults = settings
            .platform_defaults
            .iter()
            .filter(|(_, id)| settings.profiles.contains_key(*id))
            .map(|(platform, id)| (platform.clone(), id.clone()))
            .collect();

        Self {
            table: Arc::new(ProfileTable {
                profiles,
                platform_defaults,
            }),
        }
    }

    /// Write the current table back into settings
    pub fn write_settings(&self, settings: &mut EmulatorSettings) {
        settings.profiles = self
            .table
            .profiles
            .iter()
            .map(|p| (p.id.clone(), p.to_config()))
            .collect();
        settings.platform_defaults = self.table.platform_defaults.clone();
    }

    /// Cheap snapshot for readers
    pub fn snapshot(&self) -> Arc<ProfileTable> {
        Arc::clone(&self.table)
    }

    /// Get profile by id
    pub fn get(&self, id: &str) -> Option<EmulatorProfile> {
        self.table.get(id).cloned()
    }

    /// First enabled profile for a platform, most recently added first
    pub fn match_platform(&self, platform: Platform) -> Option<EmulatorProfile> {
        self.table.match_platform(platform).cloned()
    }

    /// Effective default profile for a platform
    pub fn default_for(&self, platform: Platform) -> Option<EmulatorProfile> {
        self.table.default_for(platform).cloned()
    }

    fn edit<T>(&mut self, f: impl FnOnce(&mut ProfileTable) -> Result<T, EmulatorError>) -> Result<T, EmulatorError> {
        let mut next = (*self.table).clone();
        let out = f(&mut next)?;
        self.table = Arc::new(next);
        Ok(out)
    }

    /// Identify a single executable against the known signatures
    pub fn detect_executable(path: &Path) -> Option<EmulatorProfile> {
        let sig = signatures::identify(path)?;

        Some(EmulatorProfile {
            id: format!("{}{}", AUTO_PREFIX, sig.name),
            executable: path.to_path_buf(),
            platforms: sig.platform_names(),
            args: sig.args.to_string(),
            auto_detected: true,
            enabled: true,
            added_at: Utc::now(),
        })
    }

    /// Scan a folder (non-recursively) for known emulator executables
    pub fn detect(folder: &Path) -> Result<DetectionReport, EmulatorError> {
        let mut report = DetectionReport::default();

        let mut entries: Vec<PathBuf> = fs::read_dir(folder)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        for path in entries {
            match Self::detect_executable(&path) {
                Some(profile) if report.detected.iter().any(|p| p.id == profile.id) => {
                    tracing::debug!("Duplicate {} at {}", profile.id, path.display());
                }
                Some(profile) => {
                    tracing::debug!("Detected {} at {}", profile.id, path.display());
                    report.detected.push(profile);
                }
                None => report.unmatched += 1,
            }
        }

        tracing::info!(
            "Emulator detection in {}: {} found, {} unmatched",
            folder.display(),
            report.detected.len(),
            report.unmatched
        );

        Ok(report)
    }

    /// Add detected profiles, skipping ids that already exist.
    ///
    /// Returns the number of profiles added.
    pub fn add_detected(&mut self, report: DetectionReport) -> usize {
        let result = self.edit(|table| {
            let mut added = 0;
            for profile in report.detected {
                if table.get(&profile.id).is_some() {
                    continue;
                }
                table.profiles.push(profile);
                added += 1;
            }
            Ok(added)
        });
        result.unwrap_or(0)
    }

    /// Add a manually configured profile.
    ///
    /// Only the executable's existence is validated.
    pub fn add_manual(&mut self, profile: EmulatorProfile) -> Result<(), EmulatorError> {
        if profile.resolve_executable().is_none() {
            return Err(EmulatorError::ExecutableNotFound(profile.executable));
        }

        self.edit(|table| {
            if table.get(&profile.id).is_some() {
                return Err(EmulatorError::DuplicateProfile(profile.id));
            }
            tracing::info!("Registered emulator profile: {}", profile.id);
            table.profiles.push(profile);
            Ok(())
        })
    }

    /// Replace a profile, possibly under a new id.
    ///
    /// Platform defaults follow a rename.
    pub fn update(&mut self, id: &str, profile: EmulatorProfile) -> Result<(), EmulatorError> {
        self.edit(|table| {
            let index = table
                .profiles
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| EmulatorError::ProfileNotFound(id.to_string()))?;

            if profile.id != id && table.get(&profile.id).is_some() {
                return Err(EmulatorError::DuplicateProfile(profile.id));
            }

            for default in table.platform_defaults.values_mut() {
                if default == id {
                    *default = profile.id.clone();
                }
            }
            table.profiles[index] = profile;
            Ok(())
        })
    }

    /// Remove a profile and any platform defaults pointing at it
    pub fn remove(&mut self, id: &str) -> Result<EmulatorProfile, EmulatorError> {
        self.edit(|table| {
            let index = table
                .profiles
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| EmulatorError::ProfileNotFound(id.to_string()))?;

            table.platform_defaults.retain(|_, default| default != id);
            tracing::info!("Removed emulator profile: {}", id);
            Ok(table.profiles.remove(index))
        })
    }

    /// Enable or disable a profile
    pub fn set_enabled(&mut self, id: &str, enabled: bool) -> Result<(), EmulatorError> {
        self.edit(|table| {
            let profile = table
                .profiles
                .iter_mut()
                .find(|p| p.id == id)
                .ok_or_else(|| EmulatorError::ProfileNotFound(id.to_string()))?;
            profile.enabled = enabled;
            Ok(())
        })
    }

    /// Pin a profile as the default for a platform
    pub fn set_platform_default(&mut self, platform: Platform, id: &str) -> Result<(), EmulatorError> {
        self.edit(|table| {
            if table.get(id).is_none() {
                return Err(EmulatorError::ProfileNotFound(id.to_string()));
            }
            table
                .platform_defaults
                .insert(platform.name().to_string(), id.to_string());
            Ok(())
        })
    }

    /// Forget the pinned default for a platform. Returns true if one was set.
    pub fn clear_platform_default(&mut self, platform: Platform) -> bool {
        self.edit(|table| Ok(table.platform_defaults.remove(platform.name()).is_some()))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::TempDir;

    fn profile(id: &str, platform: Platform) -> EmulatorProfile {
        EmulatorProfile::new(id, format!("/emu/{}", id)).with_platform(platform.name())
    }

    fn registry_with(profiles: Vec<EmulatorProfile>) -> ProfileRegistry {
        let mut registry = ProfileRegistry::new();
        registry
            .edit(|table| {
                table.profiles.extend(profiles);
                Ok(())
            })
            .unwrap();
        registry
    }

    #[test]
    fn test_profile_builder() {
        let profile = EmulatorProfile::new("Project64", "/emu/project64.exe")
            .with_platform("Nintendo 64")
            .with_args("%ROM%");

        assert_eq!(profile.id, "Project64");
        assert!(profile.supports(Platform::N64));
        assert!(!profile.supports(Platform::Snes));
        assert!(profile.enabled);
        assert!(!profile.auto_detected);
    }

    #[test]
    fn test_match_platform() {
        let registry = registry_with(vec![profile("Project64", Platform::N64)]);

        let matched = registry.match_platform(Platform::N64).unwrap();
        assert_eq!(matched.id, "Project64");
        assert!(registry.match_platform(Platform::Snes).is_none());
    }

    #[test]
    fn test_match_prefers_most_recently_added() {
        let now = Utc::now();
        let registry = registry_with(vec![
            profile("newer", Platform::N64).with_added_at(now),
            profile("older", Platform::N64).with_added_at(now - Duration::hours(1)),
        ]);
        assert_eq!(registry.match_platform(Platform::N64).unwrap().id, "newer");

        // Equal timestamps fall back to insertion order
        let registry = registry_with(vec![
            profile("first", Platform::N64).with_added_at(now),
            profile("second", Platform::N64).with_added_at(now),
        ]);
        assert_eq!(registry.match_platform(Platform::N64).unwrap().id, "second");
    }

    #[test]
    fn test_match_skips_disabled() {
        let now = Utc::now();
        let mut registry = registry_with(vec![
            profile("a", Platform::N64).with_added_at(now - Duration::hours(1)),
            profile("b", Platform::N64).with_added_at(now),
        ]);
        registry.set_enabled("b", false).unwrap();

        assert_eq!(registry.match_platform(Platform::N64).unwrap().id, "a");
    }

    #[test]
    fn test_platform_default_overrides_match() {
        let now = Utc::now();
        let mut registry = registry_with(vec![
            profile("pinned", Platform::N64).with_added_at(now - Duration::hours(1)),
            profile("latest", Platform::N64).with_added_at(now),
        ]);
        assert_eq!(registry.default_for(Platform::N64).unwrap().id, "latest");

        registry.set_platform_default(Platform::N64, "pinned").unwrap();
        assert_eq!(registry.default_for(Platform::N64).unwrap().id, "pinned");

        assert!(registry.clear_platform_default(Platform::N64));
        assert!(!registry.clear_platform_default(Platform::N64));
        assert_eq!(registry.default_for(Platform::N64).unwrap().id, "latest");
    }

    #[test]
    fn test_remove_clears_platform_default() {
        let mut registry = registry_with(vec![profile("Project64", Platform::N64)]);
        registry.set_platform_default(Platform::N64, "Project64").unwrap();

        let removed = registry.remove("Project64").unwrap();
        assert_eq!(removed.id, "Project64");
        assert!(registry.snapshot().platform_defaults().is_empty());
        assert!(matches!(
            registry.remove("Project64"),
            Err(EmulatorError::ProfileNotFound(_))
        ));
    }

    #[test]
    fn test_update_renames_defaults() {
        let mut registry = registry_with(vec![profile("old", Platform::N64)]);
        registry.set_platform_default(Platform::N64, "old").unwrap();

        let renamed = profile("new", Platform::N64);
        registry.update("old", renamed).unwrap();

        assert!(registry.get("old").is_none());
        assert_eq!(registry.default_for(Platform::N64).unwrap().id, "new");
        assert_eq!(registry.snapshot().platform_defaults()["Nintendo 64"], "new");
    }

    #[test]
    fn test_snapshot_is_isolated_from_edits() {
        let mut registry = registry_with(vec![profile("a", Platform::N64)]);
        let before = registry.snapshot();

        registry.remove("a").unwrap();

        assert_eq!(before.list().len(), 1);
        assert!(registry.snapshot().list().is_empty());
    }

    #[test]
    fn test_add_manual_validates_executable() {
        let dir = TempDir::new().unwrap();
        let exe = dir.path().join("project64.exe");
        fs::write(&exe, b"MZ").unwrap();

        let mut registry = ProfileRegistry::new();
        registry
            .add_manual(EmulatorProfile::new("Project64", &exe).with_platform("Nintendo 64"))
            .unwrap();

        let missing = EmulatorProfile::new("Ghost", dir.path().join("ghost.exe"));
        assert!(matches!(
            registry.add_manual(missing),
            Err(EmulatorError::ExecutableNotFound(_))
        ));

        let duplicate = EmulatorProfile::new("Project64", &exe);
        assert!(matches!(
            registry.add_manual(duplicate),
            Err(EmulatorError::DuplicateProfile(_))
        ));
    }

    #[test]
    fn test_detect_folder() {
        let dir = TempDir::new().unwrap();
        for name in ["Dolphin.exe", "mgba-qt", "readme.txt", "dolphin.ini", "Project64.exe"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::create_dir(dir.path().join("snes9x")).unwrap();

        let report = ProfileRegistry::detect(dir.path()).unwrap();
        let ids: Vec<_> = report.detected.iter().map(|p| p.id.as_str()).collect();

        assert_eq!(ids, vec!["[Auto] Dolphin", "[Auto] Project64", "[Auto] mGBA"]);
        assert_eq!(report.unmatched, 2);
        assert!(report.detected.iter().all(|p| p.auto_detected));

        let mut registry = ProfileRegistry::new();
        assert_eq!(registry.add_detected(report), 3);

        // Running detection again adds nothing new
        let report = ProfileRegistry::detect(dir.path()).unwrap();
        assert_eq!(registry.add_detected(report), 0);
    }

    #[test]
    fn test_settings_roundtrip() {
        let mut registry = registry_with(vec![profile("Project64", Platform::N64).with_args("%ROM%")]);
        registry.set_platform_default(Platform::N64, "Project64").unwrap();

        let mut settings = EmulatorSettings::default();
        registry.write_settings(&mut settings);
        assert_eq!(settings.platform_defaults["Nintendo 64"], "Project64");

        let restored = ProfileRegistry::from_settings(&settings);
        let p = restored.get("Project64").unwrap();
        assert_eq!(p.args, "%ROM%");
        assert_eq!(p.platforms, vec!["Nintendo 64"]);
        assert_eq!(restored.default_for(Platform::N64).unwrap().id, "Project64");
    }
}
