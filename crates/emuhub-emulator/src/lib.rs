//! Emulator management for EmulatorHub
//!
//! Classifies game files by platform, keeps the table of configured emulator
//! profiles (with auto-detection from known executable signatures), and
//! spawns emulator processes with exit monitoring.

mod launcher;
mod platform;
mod registry;
mod signatures;

pub use launcher::{
    EmulatorLauncher, LaunchCommand, LaunchHandle, ProcessExit, ROM_PLACEHOLDER, Tracking,
};
pub use platform::{Platform, clean_title, classify, known_extensions};
pub use registry::{DetectionReport, EmulatorProfile, ProfileRegistry, ProfileTable};
pub use signatures::{EmulatorSignature, SIGNATURES, identify};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmulatorError {
    #[error("No emulator configured for {0}")]
    NoEmulatorAvailable(String),

    #[error("Emulator executable not found: {0}")]
    ExecutableNotFound(PathBuf),

    #[error("Game file not found: {0}")]
    GameNotFound(PathBuf),

    #[error("{0} must be installed through the emulator before it can be launched")]
    InstallRequired(PathBuf),

    #[error("Emulator profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Emulator profile already exists: {0}")]
    DuplicateProfile(String),

    #[error("Failed to start {program}: {source}")]
    SpawnFailed {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EmulatorError::NoEmulatorAvailable("Nintendo 64".into());
        assert_eq!(err.to_string(), "No emulator configured for Nintendo 64");

        let err = EmulatorError::SpawnFailed {
            program: PathBuf::from("/emu/project64"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/emu/project64"));
        assert!(err.to_string().contains("denied"));
    }
}
