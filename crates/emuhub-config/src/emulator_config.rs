//! Emulator profile settings
//!
//! Persisted form of the emulator registry: one table per profile id plus the
//! per-platform default choices.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Persisted emulator profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    /// Executable path
    pub path: PathBuf,

    /// Supported platform names (e.g., "Nintendo 64")
    #[serde(default)]
    pub systems: Vec<String>,

    /// Launch argument template, `%ROM%` marks the game path
    #[serde(default)]
    pub args: String,

    /// Created by auto-detection rather than manual entry
    #[serde(default)]
    pub auto_detected: bool,

    /// Disabled profiles are never picked as a platform default
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// When the profile was added
    #[serde(default)]
    pub added_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

/// Global emulator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmulatorSettings {
    /// Profiles keyed by user-assigned id
    #[serde(default)]
    pub profiles: BTreeMap<String, ProfileConfig>,

    /// Explicit default profile id per platform
    #[serde(default)]
    pub platform_defaults: BTreeMap<String, String>,

    /// Watch launched emulators and credit playtime on exit
    #[serde(default = "default_true")]
    pub track_playtime: bool,
}

impl Default for EmulatorSettings {
    fn default() -> Self {
        Self {
            profiles: BTreeMap::new(),
            platform_defaults: BTreeMap::new(),
            track_playtime: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_defaults() {
        let profile: ProfileConfig = toml::from_str("path = \"/usr/bin/mgba\"").unwrap();
        assert!(profile.enabled);
        assert!(!profile.auto_detected);
        assert!(profile.systems.is_empty());
        assert!(profile.added_at.is_none());
    }

    #[test]
    fn test_settings_roundtrip_keeps_timestamps() {
        let mut settings = EmulatorSettings::default();
        let added_at = "2024-05-01T12:00:00Z".parse::<DateTime<Utc>>().unwrap();
        settings.profiles.insert(
            "mGBA".to_string(),
            ProfileConfig {
                path: PathBuf::from("/usr/bin/mgba"),
                systems: vec!["Game Boy Advance".to_string()],
                args: "-f %ROM%".to_string(),
                auto_detected: true,
                enabled: true,
                added_at: Some(added_at),
            },
        );

        let text = toml::to_string(&settings).unwrap();
        let parsed: EmulatorSettings = toml::from_str(&text).unwrap();
        assert_eq!(parsed.profiles["mGBA"].added_at, Some(added_at));
        assert_eq!(parsed.profiles["mGBA"].args, "-f %ROM%");
        assert!(parsed.track_playtime);
    }
}
