//! Integration tests for emulator detection and launching

use emuhub_emulator::{
    EmulatorLauncher, EmulatorProfile, Platform, ProfileRegistry, Tracking, classify,
};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;
use std::time::Duration;
use tempfile::TempDir;

/// Test environment for emulator integration tests
struct EmulatorTestEnv {
    #[allow(dead_code)]
    temp_dir: TempDir,
    games_dir: PathBuf,
    emulators_dir: PathBuf,
}

impl EmulatorTestEnv {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let games_dir = temp_dir.path().join("games");
        let emulators_dir = temp_dir.path().join("emulators");

        fs::create_dir_all(&games_dir).unwrap();
        fs::create_dir_all(&emulators_dir).unwrap();

        Self {
            temp_dir,
            games_dir,
            emulators_dir,
        }
    }

    fn create_game(&self, name: &str) -> PathBuf {
        let path = self.games_dir.join(name);
        fs::write(&path, b"FAKE_ROM_DATA").unwrap();
        path
    }

    fn create_executable(&self, name: &str) -> PathBuf {
        let path = self.emulators_dir.join(name);
        fs::write(&path, b"FAKE_EXE").unwrap();
        path
    }
}

#[test]
fn test_classification_comprehensive() {
    let test_cases = [
        ("game.gba", Some(Platform::GameBoyAdvance)),
        ("game.gb", Some(Platform::GameBoy)),
        ("game.gbc", Some(Platform::GameBoyColor)),
        ("game.sfc", Some(Platform::Snes)),
        ("game.smc", Some(Platform::Snes)),
        ("game.md", Some(Platform::Genesis)),
        ("game.z64", Some(Platform::N64)),
        ("game.nds", Some(Platform::Nds)),
        ("game.3ds", Some(Platform::N3ds)),
        ("game.rvz", Some(Platform::GameCube)),
        ("game.wbfs", Some(Platform::Wii)),
        ("game.nsp", Some(Platform::Switch)),
        ("game.cso", Some(Platform::Psp)),
        ("game.gdi", Some(Platform::Dreamcast)),
        ("game.pce", Some(Platform::TurboGrafx16)),
        ("game.lnx", Some(Platform::Lynx)),
        ("game.xyz", None),
    ];

    for (filename, expected) in test_cases {
        let path = PathBuf::from("/games").join(filename);
        assert_eq!(classify(&path), expected, "Classification failed for {}", filename);
    }
}

#[test]
fn test_detect_and_match_scenario() {
    let env = EmulatorTestEnv::new();
    env.create_executable("Project64.exe");
    env.create_executable("Dolphin.exe");
    env.create_executable("uninstall.exe");

    let report = ProfileRegistry::detect(&env.emulators_dir).unwrap();
    assert_eq!(report.detected.len(), 2);
    assert_eq!(report.unmatched, 1);

    let mut registry = ProfileRegistry::new();
    registry.add_detected(report);

    let n64 = registry.match_platform(Platform::N64).unwrap();
    assert_eq!(n64.id, "[Auto] Project64");
    assert!(n64.auto_detected);

    let wii = registry.match_platform(Platform::Wii).unwrap();
    assert_eq!(wii.id, "[Auto] Dolphin");
    assert_eq!(wii.args, "-b -e %ROM%");

    assert!(registry.match_platform(Platform::Ps3).is_none());
}

#[test]
fn test_manual_profile_registration() {
    let env = EmulatorTestEnv::new();
    let exe = env.create_executable("my-n64-emu");

    let mut registry = ProfileRegistry::new();
    registry
        .add_manual(EmulatorProfile::new("Project64", &exe).with_platform("Nintendo 64"))
        .unwrap();

    let matched = registry.match_platform(Platform::N64).unwrap();
    assert_eq!(matched.id, "Project64");
    assert_eq!(matched.executable, exe);
}

#[test]
fn test_launch_validates_game_path() {
    let env = EmulatorTestEnv::new();
    let exe = env.create_executable("project64");
    let profile = EmulatorProfile::new("Project64", exe);

    let launcher = EmulatorLauncher::new();
    let result = launcher.command_for(&profile, &env.games_dir.join("missing.z64"));
    assert!(result.is_err());
}

#[cfg(unix)]
#[test]
fn test_launch_reports_exit() {
    let env = EmulatorTestEnv::new();
    let game = env.create_game("mario64.z64");

    // `sh -c 'exit 3' <game>`: the game path lands in $0
    let profile = EmulatorProfile::new("shell", "sh")
        .with_platform("Nintendo 64")
        .with_args("-c 'exit 3' %ROM%");

    let (tx, rx) = mpsc::channel();
    let launcher = EmulatorLauncher::new();
    let handle = launcher
        .launch(&profile, &game, move |exit| {
            let _ = tx.send(exit);
        })
        .unwrap();

    assert_eq!(handle.tracking, Tracking::Tracked);
    assert_eq!(handle.emulator, "shell");

    let exit = rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert_eq!(exit.pid, handle.pid);
    assert_eq!(exit.game, game);
    assert_eq!(exit.exit_code, Some(3));
    assert!(exit.ended_at >= exit.started_at);
}

#[cfg(unix)]
#[test]
fn test_launch_untracked() {
    let env = EmulatorTestEnv::new();
    let game = env.create_game("mario64.z64");
    let profile = EmulatorProfile::new("shell", "sh").with_args("-c true %ROM%");

    let launcher = EmulatorLauncher::with_tracking(false);
    let handle = launcher.launch(&profile, &game, |_| {}).unwrap();

    assert_eq!(handle.tracking, Tracking::Untracked);
}
