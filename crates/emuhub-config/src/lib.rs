//! Configuration management for EmulatorHub
//!
//! Handles library folders, scan policy, emulator profiles and user preferences.
//! Everything lives in a single TOML file under the platform data directory.

mod emulator_config;
mod fs;
mod library_config;
mod ui_config;

pub use emulator_config::{EmulatorSettings, ProfileConfig};
pub use fs::atomic_write;
pub use library_config::{FingerprintPolicy, LibraryConfig};
pub use ui_config::{PerformanceMode, UiConfig};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Directory name used under the platform data directory
pub const APP_DIR_NAME: &str = "EmulatorHub";

/// Configuration file name
pub const CONFIG_FILE: &str = "config.toml";

/// Scan cache file name
pub const CACHE_FILE: &str = "game_cache.json";

/// User metadata file name (favorites, playtime, collections)
pub const METADATA_FILE: &str = "library.json";

/// Root directory for all EmulatorHub state.
///
/// `EMUHUB_HOME` overrides the platform default, which is handy for tests and
/// portable installs.
pub fn data_dir() -> PathBuf {
    if let Some(home) = std::env::var_os("EMUHUB_HOME") {
        return PathBuf::from(home);
    }

    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

/// Default configuration file location
pub fn config_path() -> PathBuf {
    data_dir().join(CONFIG_FILE)
}

/// Default scan cache location
pub fn cache_path() -> PathBuf {
    data_dir().join(CACHE_FILE)
}

/// Default user metadata location
pub fn metadata_path() -> PathBuf {
    data_dir().join(METADATA_FILE)
}

/// Main EmulatorHub configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default)]
    pub library: LibraryConfig,

    #[serde(default)]
    pub emulators: EmulatorSettings,

    #[serde(default)]
    pub ui: UiConfig,
}

impl HubConfig {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file is missing
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => {
                tracing::warn!("No configuration file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        atomic_write(path, contents.as_bytes())?;
        tracing::info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.library.batch_size == 0 {
            return Err(ConfigError::Invalid("library.batch_size must be at least 1".into()));
        }

        for (platform, id) in &self.emulators.platform_defaults {
            if !self.emulators.profiles.contains_key(id) {
                return Err(ConfigError::Invalid(format!(
                    "default emulator '{}' for {} is not configured",
                    id, platform
                )));
            }
        }

        Ok(())
    }
}
