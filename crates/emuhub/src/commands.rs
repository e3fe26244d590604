//! Subcommand handlers

use crate::{CacheAction, CollectionAction, EmulatorAction, FolderAction, GameAction, ListArgs};
use anyhow::{Context, Result, bail};
use emuhub_emulator::{EmulatorProfile, Tracking};
use emuhub_library::{CacheStore, GameQuery, GameRecord, Hub, HubEvent, HubUpdate, ScanReport, SortKey};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Game and folder arguments may be relative to the working directory
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Invalid path {}", path.display()))
}

fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}

fn format_playtime(duration: Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60) {
        (0, 0) if secs > 0 => "<1m".to_string(),
        (0, 0) => "-".to_string(),
        (0, m) => format!("{}m", m),
        (h, m) => format!("{}h {:02}m", h, m),
    }
}

fn print_games(games: &[&GameRecord]) {
    for game in games {
        println!(
            "{}{:<40} {:<8} {:>9} {:>8}  {}",
            if game.is_favorite() { "* " } else { "  " },
            game.title,
            game.platform.short_name(),
            format_size(game.size),
            format_playtime(game.playtime()),
            game.path.display()
        );
    }
}

fn print_report(report: &ScanReport) {
    println!(
        "Scan {} in {}ms: {} games ({} unchanged, {} classified), {} removed",
        if report.cancelled { "cancelled" } else { "finished" },
        report.duration_ms,
        report.games_found,
        report.reused,
        report.classified,
        report.tombstones.len()
    );
    for error in &report.errors {
        eprintln!("  error: {}", error);
    }
}

enum Step {
    Event(Option<HubEvent>),
    Interrupt,
}

pub async fn scan(hub: &mut Hub) -> Result<()> {
    if hub.config().library.paths.is_empty() {
        println!("No library folders configured. Add one with `emuhub folders add <path>`.");
        return Ok(());
    }

    if !hub.start_scan()? {
        println!("A scan is already running");
        return Ok(());
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        let step = tokio::select! {
            event = hub.next_event() => Step::Event(event),
            _ = &mut ctrl_c, if !interrupted => Step::Interrupt,
        };

        match step {
            Step::Interrupt => {
                interrupted = true;
                eprintln!();
                hub.cancel_scan();
            }
            Step::Event(None) => break,
            Step::Event(Some(event)) => match hub.apply(event) {
                HubUpdate::ScanProgress { processed, total } => {
                    eprint!("\rScanned {}/{}", processed, total);
                    let _ = std::io::stderr().flush();
                }
                HubUpdate::StorageWarning(message) => eprintln!("\nwarning: {}", message),
                HubUpdate::ScanFinished(report) => {
                    eprintln!();
                    print_report(&report);
                    break;
                }
                _ => {}
            },
        }
    }

    println!("{} games in library", hub.catalog().len());
    Ok(())
}

pub fn list(hub: &Hub, args: &ListArgs) -> Result<()> {
    let sort = SortKey::from_name(&args.sort)
        .with_context(|| format!("Unknown sort order '{}'", args.sort))?;

    let mut query = GameQuery::new().sort_by(sort, args.desc);
    if let Some(text) = &args.search {
        query = query.search(text);
    }
    if let Some(platform) = args.platform {
        query = query.platform(platform);
    }
    if let Some(collection) = &args.collection {
        query = query.collection(collection);
    }
    if let Some(tag) = &args.tag {
        query = query.tag(tag);
    }
    if args.favorites {
        query = query.favorites();
    }

    let games = hub.catalog().query(&query);
    print_games(&games);
    println!("{} of {} games", games.len(), hub.catalog().len());
    Ok(())
}

pub fn platforms(hub: &Hub) {
    let catalog = hub.catalog();
    for (platform, count) in catalog.platforms() {
        println!("{:<32} {:>6}", platform.name(), count);
    }
    println!(
        "{} games, {} played in total",
        catalog.len(),
        format_playtime(Duration::from_secs(catalog.total_playtime_secs()))
    );
}

pub fn recent(hub: &Hub, limit: usize) {
    for game in hub.catalog().recently_played(limit) {
        let when = game
            .meta
            .last_played
            .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!("{}  {:<40} {}", when, game.title, game.platform.short_name());
    }
}

pub async fn launch(hub: &mut Hub, game: &Path, detach: bool) -> Result<()> {
    let game = absolute(game)?;
    let handle = hub
        .launch(&game)
        .with_context(|| format!("Cannot launch {}", game.display()))?;

    println!("Started {} with {} (pid {})", game.display(), handle.emulator, handle.pid);

    match handle.tracking {
        Tracking::Untracked => {
            println!("Playtime tracking is off; this session will not be recorded");
        }
        Tracking::Tracked if detach => {
            println!("Detached; this session will not be recorded");
        }
        Tracking::Tracked => {
            while let Some(event) = hub.next_event().await {
                match hub.apply(event) {
                    HubUpdate::SessionRecorded { seconds, .. } => {
                        println!("Session: {}", format_playtime(Duration::from_secs(seconds)));
                        break;
                    }
                    HubUpdate::StorageWarning(message) => eprintln!("warning: {}", message),
                    HubUpdate::Ignored => break,
                    _ => {}
                }
            }
        }
    }

    Ok(())
}

pub fn folders(hub: &mut Hub, action: FolderAction) -> Result<()> {
    match action {
        FolderAction::List => {
            for path in &hub.config().library.paths {
                let state = if path.is_dir() { "" } else { "  (unavailable)" };
                println!("{}{}", path.display(), state);
            }
        }
        FolderAction::Add { path } => {
            let path = absolute(&path)?;
            if hub.add_library_path(&path)? {
                println!("Added {}; run `emuhub scan` to pick up its games", path.display());
            } else {
                println!("{} is already a library folder", path.display());
            }
        }
        FolderAction::Remove { path } => {
            let path = absolute(&path)?;
            if !hub.remove_library_path(&path)? {
                bail!("{} is not a library folder", path.display());
            }
            println!("Removed {}", path.display());
        }
    }
    Ok(())
}

pub fn emulators(hub: &mut Hub, action: EmulatorAction) -> Result<()> {
    match action {
        EmulatorAction::List => {
            let table = hub.registry().snapshot();
            for profile in table.list() {
                println!(
                    "{:<24} {}{}",
                    profile.id,
                    profile.executable.display(),
                    if profile.enabled { "" } else { "  (disabled)" }
                );
                println!("{:<24} platforms: {}", "", profile.platforms.join(", "));
                if !profile.args.is_empty() {
                    println!("{:<24} args: {}", "", profile.args);
                }
            }
            for (platform, id) in table.platform_defaults() {
                println!("default for {}: {}", platform, id);
            }
        }
        EmulatorAction::Detect { folder } => {
            let added = hub.detect_emulators(&absolute(&folder)?)?;
            println!("Added {} emulator profiles", added);
        }
        EmulatorAction::Add {
            id,
            executable,
            platform,
            args,
        } => {
            let mut profile = EmulatorProfile::new(id.clone(), absolute(&executable)?).with_args(args);
            for p in platform {
                profile = profile.with_platform(p.name());
            }
            hub.add_profile(profile)?;
            println!("Added {}", id);
        }
        EmulatorAction::Edit {
            id,
            rename,
            executable,
            platform,
            args,
        } => {
            let mut profile = hub
                .registry()
                .get(&id)
                .with_context(|| format!("No emulator profile '{}'", id))?;
            if let Some(new_id) = rename {
                profile.id = new_id;
            }
            if let Some(executable) = executable {
                profile.executable = absolute(&executable)?;
            }
            if !platform.is_empty() {
                profile.platforms = platform.iter().map(|p| p.name().to_string()).collect();
            }
            if let Some(args) = args {
                profile.args = args;
            }
            hub.update_profile(&id, profile)?;
        }
        EmulatorAction::Remove { id } => {
            hub.remove_profile(&id)?;
            println!("Removed {}", id);
        }
        EmulatorAction::Enable { id } => hub.set_profile_enabled(&id, true)?,
        EmulatorAction::Disable { id } => hub.set_profile_enabled(&id, false)?,
        EmulatorAction::Default { platform, id } => {
            hub.set_platform_default(platform, &id)?;
            println!("{} now launches with {}", platform, id);
        }
        EmulatorAction::ClearDefault { platform } => {
            if !hub.clear_platform_default(platform)? {
                println!("No default was set for {}", platform);
            }
        }
    }
    Ok(())
}

pub fn game(hub: &mut Hub, action: GameAction) -> Result<()> {
    match action {
        GameAction::Info { game } => {
            let game = absolute(&game)?;
            let record = hub
                .catalog()
                .get(&game)
                .with_context(|| format!("{} is not in the library", game.display()))?;
            let meta = &record.meta;

            println!("{}", record.title);
            println!("  platform:    {}", record.platform);
            println!("  size:        {}", format_size(record.size));
            println!("  playtime:    {}", format_playtime(record.playtime()));
            println!("  play count:  {}", meta.play_count);
            println!("  added:       {}", meta.added_at.format("%Y-%m-%d"));
            if let Some(last) = meta.last_played {
                println!("  last played: {}", last.format("%Y-%m-%d %H:%M"));
            }
            if !meta.tags.is_empty() {
                let tags: Vec<_> = meta.tags.iter().map(String::as_str).collect();
                println!("  tags:        {}", tags.join(", "));
            }
            let collections = hub.catalog().memberships(&game);
            if !collections.is_empty() {
                println!("  collections: {}", collections.join(", "));
            }
            if let Some(cover) = &meta.cover {
                println!("  cover:       {}", cover.display());
            }
            if !meta.notes.is_empty() {
                println!("  notes:       {}", meta.notes);
            }
            match hub.resolve_emulator(&game) {
                Ok(profile) => println!("  emulator:    {}", profile.id),
                Err(e) => println!("  emulator:    none ({})", e),
            }
            return Ok(());
        }
        GameAction::Delete { game, yes } => {
            let game = absolute(&game)?;
            if !yes {
                bail!("This deletes {} from disk; pass --yes to confirm", game.display());
            }
            let record = hub
                .delete_game(&game)
                .with_context(|| format!("Cannot delete {}", game.display()))?;
            println!("Deleted {}", record.title);
            return Ok(());
        }
        GameAction::Favorite { game } => {
            let favorite = hub.catalog_mut().toggle_favorite(&absolute(&game)?)?;
            println!("{}", if favorite { "Added to favorites" } else { "Removed from favorites" });
        }
        GameAction::Override { game, profile, clear } => {
            if profile.is_none() && !clear {
                bail!("Pass --profile <id> or --clear");
            }
            // set_override persists on its own
            return Ok(hub.set_override(&absolute(&game)?, profile.as_deref())?);
        }
        GameAction::Tag { game, tag, remove } => {
            let game = absolute(&game)?;
            if remove {
                hub.catalog_mut().remove_tag(&game, &tag)?;
            } else {
                hub.catalog_mut().add_tag(&game, &tag)?;
            }
        }
        GameAction::Notes { game, notes } => {
            hub.catalog_mut().set_notes(&absolute(&game)?, notes)?;
        }
        GameAction::Cover { game, image } => {
            let image = image.map(|i| absolute(&i)).transpose()?;
            hub.catalog_mut().set_cover(&absolute(&game)?, image)?;
        }
    }

    hub.save_metadata()?;
    Ok(())
}

pub fn collections(hub: &mut Hub, action: CollectionAction) -> Result<()> {
    let catalog = hub.catalog_mut();
    match action {
        CollectionAction::List => {
            for collection in catalog.collections() {
                println!("{:<32} {:>6}", collection.name, collection.games.len());
            }
            return Ok(());
        }
        CollectionAction::Create { name } => catalog.create_collection(&name)?,
        CollectionAction::Delete { name } => {
            catalog.delete_collection(&name)?;
        }
        CollectionAction::Rename { from, to } => catalog.rename_collection(&from, &to)?,
        CollectionAction::Add { name, game } => {
            if !catalog.add_to_collection(&name, &absolute(&game)?)? {
                println!("Already in {}", name);
            }
        }
        CollectionAction::Remove { name, game } => {
            if !catalog.remove_from_collection(&name, &absolute(&game)?)? {
                println!("Not in {}", name);
            }
        }
    }

    hub.save_metadata()?;
    Ok(())
}

pub fn cache(hub: &Hub, action: CacheAction) -> Result<()> {
    match action {
        CacheAction::Clear => {
            let store = CacheStore::new(&hub.paths().cache);
            store
                .clear()
                .with_context(|| format!("Cannot delete {}", store.path().display()))?;
            println!("Scan cache cleared");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(8 * 1024 * 1024), "8.0 MB");
    }

    #[test]
    fn test_format_playtime() {
        assert_eq!(format_playtime(Duration::ZERO), "-");
        assert_eq!(format_playtime(Duration::from_secs(30)), "<1m");
        assert_eq!(format_playtime(Duration::from_secs(120)), "2m");
        assert_eq!(format_playtime(Duration::from_secs(3 * 3600 + 5 * 60)), "3h 05m");
    }
}
