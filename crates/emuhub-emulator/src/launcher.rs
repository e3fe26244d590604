//! Emulator process launching and exit monitoring

use crate::{EmulatorError, EmulatorProfile};
use chrono::{DateTime, Utc};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Marks where the game path goes in an argument template
pub const ROM_PLACEHOLDER: &str = "%ROM%";

/// Fully resolved process invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl LaunchCommand {
    /// Build the argument vector from a template.
    ///
    /// Every `%ROM%` is replaced by the game path. A template without the
    /// placeholder gets the path appended as the last argument.
    pub fn build(program: impl Into<PathBuf>, template: &str, game_path: &Path) -> Self {
        let tokens = split_template(template);

        let mut args: Vec<OsString> = tokens
            .iter()
            .map(|token| substitute(token, game_path))
            .collect();

        if !tokens.iter().any(|t| t.contains(ROM_PLACEHOLDER)) {
            args.push(game_path.as_os_str().to_os_string());
        }

        Self {
            program: program.into(),
            args,
        }
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = self.program.parent().filter(|d| d.is_dir()) {
            // Several emulators look for their config next to the binary.
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        cmd
    }
}

/// Split a template on whitespace, keeping quoted runs together
fn split_template(template: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;
    let mut quote: Option<char> = None;

    for c in template.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                in_token = true;
            }
            (None, c) if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            (None, c) => {
                current.push(c);
                in_token = true;
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    tokens
}

fn substitute(token: &str, game_path: &Path) -> OsString {
    let mut out = OsString::new();
    let mut parts = token.split(ROM_PLACEHOLDER);
    if let Some(first) = parts.next() {
        out.push(first);
    }
    for part in parts {
        out.push(game_path.as_os_str());
        out.push(part);
    }
    out
}

/// Whether the launched process is being watched for playtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tracking {
    /// An exit notification will follow
    Tracked,
    /// No exit notification will arrive; playtime cannot be credited
    Untracked,
}

/// Handle to a launched emulator
#[derive(Debug, Clone)]
pub struct LaunchHandle {
    /// PID of the launched process
    pub pid: u32,

    /// Profile id used
    pub emulator: String,

    /// Game that was launched
    pub game: PathBuf,

    /// Spawn time
    pub started_at: DateTime<Utc>,

    pub tracking: Tracking,
}

/// Exit notification for a tracked process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessExit {
    pub pid: u32,
    pub game: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,

    /// Exit code, if the process exited normally
    pub exit_code: Option<i32>,
}

impl ProcessExit {
    /// Wall-clock session length
    pub fn duration(&self) -> Duration {
        (self.ended_at - self.started_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Spawns emulator processes
#[derive(Debug, Clone)]
pub struct EmulatorLauncher {
    track_playtime: bool,
}

impl Default for EmulatorLauncher {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatorLauncher {
    /// Create a launcher that monitors process exits
    pub fn new() -> Self {
        Self {
            track_playtime: true,
        }
    }

    /// Create a launcher with exit monitoring switched on or off
    pub fn with_tracking(track_playtime: bool) -> Self {
        Self { track_playtime }
    }

    /// Prepare the command for a game without spawning it
    pub fn command_for(
        &self,
        profile: &EmulatorProfile,
        game_path: &Path,
    ) -> Result<LaunchCommand, EmulatorError> {
        let program = profile
            .resolve_executable()
            .ok_or_else(|| EmulatorError::ExecutableNotFound(profile.executable.clone()))?;

        if !game_path.exists() {
            return Err(EmulatorError::GameNotFound(game_path.to_path_buf()));
        }

        Ok(LaunchCommand::build(program, &profile.args, game_path))
    }

    /// Launch a game with the given profile.
    ///
    /// When tracking is on, `on_exit` runs on a monitor thread once the
    /// process ends. It is dropped unused if the handle is `Untracked`.
    pub fn launch<F>(
        &self,
        profile: &EmulatorProfile,
        game_path: &Path,
        on_exit: F,
    ) -> Result<LaunchHandle, EmulatorError>
    where
        F: FnOnce(ProcessExit) + Send + 'static,
    {
        let command = self.command_for(profile, game_path)?;

        tracing::info!(
            "Launching {} with {}",
            game_path.display(),
            profile.id
        );

        let mut child = command
            .to_command()
            .spawn()
            .map_err(|source| EmulatorError::SpawnFailed {
                program: command.program.clone(),
                source,
            })?;

        let pid = child.id();
        let started_at = Utc::now();
        let game = game_path.to_path_buf();

        let tracking = if self.track_playtime {
            let game = game.clone();
            let spawned = thread::Builder::new()
                .name(format!("emuhub-exit-{}", pid))
                .spawn(move || {
                    let exit_code = match child.wait() {
                        Ok(status) => status.code(),
                        Err(e) => {
                            tracing::warn!("Lost track of emulator process {}: {}", pid, e);
                            None
                        }
                    };
                    on_exit(ProcessExit {
                        pid,
                        game,
                        started_at,
                        ended_at: Utc::now(),
                        exit_code,
                    });
                });

            match spawned {
                Ok(_) => Tracking::Tracked,
                Err(e) => {
                    tracing::warn!("Cannot monitor process {}, playtime will not be recorded: {}", pid, e);
                    Tracking::Untracked
                }
            }
        } else {
            Tracking::Untracked
        };

        tracing::debug!("Emulator {} started with PID {} ({:?})", profile.id, pid, tracking);

        Ok(LaunchHandle {
            pid,
            emulator: profile.id.clone(),
            game,
            started_at,
            tracking,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &LaunchCommand) -> Vec<String> {
        cmd.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_build_with_placeholder() {
        let cmd = LaunchCommand::build("/emu/dolphin", "-b -e %ROM%", Path::new("/games/Metroid Prime.iso"));
        assert_eq!(cmd.program, PathBuf::from("/emu/dolphin"));
        assert_eq!(args(&cmd), vec!["-b", "-e", "/games/Metroid Prime.iso"]);
    }

    #[test]
    fn test_build_without_placeholder_appends_path() {
        let cmd = LaunchCommand::build("/emu/mgba", "--fullscreen", Path::new("/games/zelda.gba"));
        assert_eq!(args(&cmd), vec!["--fullscreen", "/games/zelda.gba"]);

        let cmd = LaunchCommand::build("/emu/mgba", "", Path::new("/games/zelda.gba"));
        assert_eq!(args(&cmd), vec!["/games/zelda.gba"]);
    }

    #[test]
    fn test_build_placeholder_inside_argument() {
        let cmd = LaunchCommand::build("/emu/xemu", "-dvd_path=%ROM%", Path::new("/games/halo.iso"));
        assert_eq!(args(&cmd), vec!["-dvd_path=/games/halo.iso"]);
    }

    #[test]
    fn test_split_template_quotes() {
        assert_eq!(
            split_template(r#"--config "C:\My Emu\cfg.ini" -f  %ROM%"#),
            vec![r"--config", r"C:\My Emu\cfg.ini", "-f", "%ROM%"]
        );
        assert_eq!(split_template("'a b' \"\""), vec!["a b", ""]);
        assert!(split_template("   ").is_empty());
    }

    #[test]
    fn test_missing_executable() {
        let launcher = EmulatorLauncher::new();
        let profile = EmulatorProfile::new("Ghost", "/nonexistent/emulator-binary");
        let result = launcher.command_for(&profile, Path::new("/nonexistent/game.z64"));
        assert!(matches!(result, Err(EmulatorError::ExecutableNotFound(_))));
    }

    #[test]
    fn test_process_exit_duration() {
        let started_at = Utc::now();
        let exit = ProcessExit {
            pid: 1,
            game: PathBuf::from("/games/mario64.z64"),
            started_at,
            ended_at: started_at + chrono::Duration::seconds(120),
            exit_code: Some(0),
        };
        assert_eq!(exit.duration(), Duration::from_secs(120));

        let backwards = ProcessExit {
            ended_at: started_at - chrono::Duration::seconds(5),
            ..exit
        };
        assert_eq!(backwards.duration(), Duration::ZERO);
    }
}
