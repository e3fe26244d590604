//! EmulatorHub
//!
//! Command-line front end for the game library: manage library folders and
//! emulator profiles, scan, browse and launch games.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use emuhub_emulator::Platform;
use emuhub_library::{Hub, HubPaths};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "emuhub")]
#[command(about = "Scan, browse and launch your emulated game library", long_about = None)]
struct Cli {
    /// Directory holding config.toml, the scan cache and library data
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Filters shared by listing commands
#[derive(Args, Clone)]
struct ListArgs {
    /// Case-insensitive title search
    #[arg(short, long)]
    search: Option<String>,

    /// Platform name or short name (e.g. n64, "Game Boy Advance")
    #[arg(short, long, value_parser = parse_platform)]
    platform: Option<Platform>,

    /// Only games in this collection
    #[arg(short, long)]
    collection: Option<String>,

    /// Only games with this tag
    #[arg(short, long)]
    tag: Option<String>,

    /// Only favorites
    #[arg(short, long)]
    favorites: bool,

    /// Sort by name, size, playtime, added or last_played
    #[arg(long, default_value = "name")]
    sort: String,

    /// Reverse the sort order
    #[arg(long)]
    desc: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Scan library folders for games
    Scan,

    /// List games in the library
    List(ListArgs),

    /// Show platforms with game counts
    Platforms,

    /// Show recently played games
    Recent {
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },

    /// Launch a game
    Launch {
        /// Path of the game as listed
        game: PathBuf,

        /// Return right away instead of waiting to record playtime
        #[arg(long)]
        detach: bool,
    },

    /// Manage library folders
    Folders {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Manage emulator profiles
    Emulators {
        #[command(subcommand)]
        action: EmulatorAction,
    },

    /// Edit per-game data
    Game {
        #[command(subcommand)]
        action: GameAction,
    },

    /// Manage collections
    Collections {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Manage the scan cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum FolderAction {
    List,
    Add { path: PathBuf },
    Remove { path: PathBuf },
}

#[derive(Subcommand)]
enum EmulatorAction {
    /// List configured profiles and platform defaults
    List,

    /// Look for known emulators in a folder
    Detect { folder: PathBuf },

    /// Register an emulator by hand
    Add {
        id: String,
        executable: PathBuf,

        /// Supported platforms (repeat or comma-separate)
        #[arg(short, long, value_delimiter = ',', required = true, value_parser = parse_platform)]
        platform: Vec<Platform>,

        /// Argument template; %ROM% is replaced by the game path
        #[arg(short, long, default_value = "", allow_hyphen_values = true)]
        args: String,
    },

    /// Change a profile; options left out keep their current value
    Edit {
        id: String,

        /// New id; overrides and defaults follow
        #[arg(long)]
        rename: Option<String>,

        #[arg(long)]
        executable: Option<PathBuf>,

        /// Replace the supported platforms
        #[arg(short, long, value_delimiter = ',', value_parser = parse_platform)]
        platform: Vec<Platform>,

        #[arg(short, long, allow_hyphen_values = true)]
        args: Option<String>,
    },

    Remove { id: String },
    Enable { id: String },
    Disable { id: String },

    /// Pin the default emulator for a platform
    Default {
        #[arg(value_parser = parse_platform)]
        platform: Platform,
        id: String,
    },

    /// Forget the pinned default for a platform
    ClearDefault {
        #[arg(value_parser = parse_platform)]
        platform: Platform,
    },
}

#[derive(Subcommand)]
enum GameAction {
    /// Show everything known about a game
    Info { game: PathBuf },

    /// Toggle the favorite flag
    Favorite { game: PathBuf },

    /// Launch this game with a specific profile, or clear the override
    Override {
        game: PathBuf,
        #[arg(long, conflicts_with = "clear")]
        profile: Option<String>,
        #[arg(long)]
        clear: bool,
    },

    Tag {
        game: PathBuf,
        tag: String,
        #[arg(long)]
        remove: bool,
    },

    Notes { game: PathBuf, notes: String },

    /// Set a custom cover image, or clear it when omitted
    Cover { game: PathBuf, image: Option<PathBuf> },

    /// Delete the game's file or folder from disk and drop it from the library
    Delete {
        game: PathBuf,

        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum CollectionAction {
    List,
    Create { name: String },
    Delete { name: String },
    Rename { from: String, to: String },
    Add { name: String, game: PathBuf },
    Remove { name: String, game: PathBuf },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Delete the scan cache; the next scan classifies everything again
    Clear,
}

fn parse_platform(name: &str) -> Result<Platform, String> {
    Platform::from_name(name).ok_or_else(|| {
        let known: Vec<_> = Platform::ALL.iter().map(|p| p.short_name()).collect();
        format!("unknown platform '{}' (known: {})", name, known.join(", "))
    })
}

/// Setup logging to stderr
fn setup_logging() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging();
    let cli = Cli::parse();

    let paths = match &cli.data_dir {
        Some(dir) => HubPaths::in_dir(dir),
        None => HubPaths::default(),
    };
    let mut hub = Hub::open(paths)?;

    match cli.command {
        Command::Scan => commands::scan(&mut hub).await?,
        Command::List(args) => commands::list(&hub, &args)?,
        Command::Platforms => commands::platforms(&hub),
        Command::Recent { limit } => commands::recent(&hub, limit),
        Command::Launch { game, detach } => commands::launch(&mut hub, &game, detach).await?,
        Command::Folders { action } => commands::folders(&mut hub, action)?,
        Command::Emulators { action } => commands::emulators(&mut hub, action)?,
        Command::Game { action } => commands::game(&mut hub, action)?,
        Command::Collections { action } => commands::collections(&mut hub, action)?,
        Command::Cache { action } => commands::cache(&hub, action)?,
    }

    hub.shutdown()?;
    info!("EmulatorHub exiting");
    Ok(())
}
