//! Resolving and launching the emulator for a game

use crate::GameRecord;
use emuhub_emulator::{
    EmulatorError, EmulatorLauncher, EmulatorProfile, LaunchCommand, LaunchHandle, ProcessExit,
    ProfileTable,
};

/// Picks the emulator for a game and starts it
#[derive(Debug, Clone, Default)]
pub struct LaunchCoordinator {
    launcher: EmulatorLauncher,
}

impl LaunchCoordinator {
    pub fn new(launcher: EmulatorLauncher) -> Self {
        Self { launcher }
    }

    /// Profile to use for a game: its override, else the platform default
    pub fn resolve<'a>(
        &self,
        game: &GameRecord,
        profiles: &'a ProfileTable,
    ) -> Result<&'a EmulatorProfile, EmulatorError> {
        if let Some(id) = &game.meta.emulator_override {
            return profiles.get(id).ok_or_else(|| {
                tracing::warn!("Override '{}' for {} is no longer configured", id, game.title);
                EmulatorError::NoEmulatorAvailable(format!(
                    "{} (override '{}' is not configured)",
                    game.platform, id
                ))
            });
        }

        profiles
            .default_for(game.platform)
            .ok_or_else(|| EmulatorError::NoEmulatorAvailable(game.platform.to_string()))
    }

    /// Resolve and build the command line without spawning
    pub fn prepare(
        &self,
        game: &GameRecord,
        profiles: &ProfileTable,
    ) -> Result<LaunchCommand, EmulatorError> {
        if game.needs_install() {
            return Err(EmulatorError::InstallRequired(game.path.clone()));
        }
        let profile = self.resolve(game, profiles)?;
        self.launcher.command_for(profile, &game.launch_target())
    }

    /// Launch a game; `on_exit` fires from the monitor thread when the
    /// emulator exits
    pub fn launch<F>(
        &self,
        game: &GameRecord,
        profiles: &ProfileTable,
        on_exit: F,
    ) -> Result<LaunchHandle, EmulatorError>
    where
        F: FnOnce(ProcessExit) + Send + 'static,
    {
        if game.needs_install() {
            return Err(EmulatorError::InstallRequired(game.path.clone()));
        }
        let profile = self.resolve(game, profiles)?;
        let target = game.launch_target();

        let game_path = game.path.clone();
        self.launcher.launch(profile, &target, move |exit| {
            // Report the catalog identity, not the EBOOT inside a folder game.
            on_exit(ProcessExit {
                game: game_path,
                ..exit
            })
        })
    }
}
