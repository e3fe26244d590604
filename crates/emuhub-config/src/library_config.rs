//! Library folders and scan policy

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How the scanner decides whether a file changed since the last scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintPolicy {
    /// File size plus modification time. Cheap, misses in-place rewrites
    /// that keep both.
    #[default]
    #[serde(rename = "size_mtime")]
    SizeAndMtime,
    /// SHA-256 of the file contents. Exact, reads every byte.
    ContentHash,
}

/// Game library configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Root folders to scan, in the order they were added
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Keep files with no known platform as "Uncategorized"
    #[serde(default)]
    pub include_uncategorized: bool,

    /// Skip hidden files/directories
    #[serde(default = "default_true")]
    pub skip_hidden: bool,

    /// Directory names never descended into
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// Number of records per batch handed to the catalog
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Change detection policy
    #[serde(default)]
    pub fingerprint: FingerprintPolicy,
}

fn default_true() -> bool {
    true
}

fn default_skip_dirs() -> Vec<String> {
    ["bios", "saves", "states", "screenshots"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_batch_size() -> usize {
    64
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            include_uncategorized: false,
            skip_hidden: default_true(),
            skip_dirs: default_skip_dirs(),
            batch_size: default_batch_size(),
            fingerprint: FingerprintPolicy::default(),
        }
    }
}

impl LibraryConfig {
    /// Add a library folder. Returns false if it was already configured.
    pub fn add_path(&mut self, path: impl Into<PathBuf>) -> bool {
        let path = path.into();
        if self.paths.contains(&path) {
            return false;
        }
        self.paths.push(path);
        true
    }

    /// Remove a library folder. Returns false if it was not configured.
    pub fn remove_path(&mut self, path: &Path) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p != path);
        self.paths.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_paths_are_ordered_and_unique() {
        let mut config = LibraryConfig::default();
        assert!(config.add_path("/b"));
        assert!(config.add_path("/a"));
        assert!(!config.add_path("/b"));
        assert_eq!(config.paths, vec![PathBuf::from("/b"), PathBuf::from("/a")]);

        assert!(config.remove_path(Path::new("/b")));
        assert!(!config.remove_path(Path::new("/b")));
        assert_eq!(config.paths, vec![PathBuf::from("/a")]);
    }

    #[test]
    fn test_fingerprint_policy_names() {
        let parsed: LibraryConfig = toml::from_str("fingerprint = \"size_mtime\"").unwrap();
        assert_eq!(parsed.fingerprint, FingerprintPolicy::SizeAndMtime);

        let parsed: LibraryConfig = toml::from_str("fingerprint = \"content_hash\"").unwrap();
        assert_eq!(parsed.fingerprint, FingerprintPolicy::ContentHash);
    }
}
