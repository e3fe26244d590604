//! Platform classification
//!
//! Maps file names to platforms using a static extension table. A handful of
//! disc-image extensions are shared between systems; for those the names of
//! the enclosing folders break the tie.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Supported game platforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Platform {
    // Nintendo
    Nes,
    Snes,
    N64,
    GameCube,
    Wii,
    Switch,
    GameBoy,
    GameBoyColor,
    GameBoyAdvance,
    Nds,
    N3ds,

    // Sega
    Genesis,
    GameGear,
    Saturn,
    Dreamcast,

    // Sony
    Psx,
    Ps2,
    Ps3,
    Psp,

    // Microsoft
    Xbox,
    Xbox360,

    // Other
    TurboGrafx16,
    Lynx,

    /// Files with no recognised extension, kept only when configured
    Uncategorized,
}

/// (extension, platform, ambiguous)
const EXTENSIONS: &[(&str, Platform, bool)] = &[
    ("nes", Platform::Nes, false),
    ("sfc", Platform::Snes, false),
    ("smc", Platform::Snes, false),
    ("z64", Platform::N64, false),
    ("n64", Platform::N64, false),
    ("v64", Platform::N64, false),
    ("gcz", Platform::GameCube, false),
    ("rvz", Platform::GameCube, false),
    ("wbfs", Platform::Wii, false),
    ("xci", Platform::Switch, false),
    ("nsp", Platform::Switch, false),
    ("gb", Platform::GameBoy, false),
    ("gbc", Platform::GameBoyColor, false),
    ("gba", Platform::GameBoyAdvance, false),
    ("nds", Platform::Nds, false),
    ("3ds", Platform::N3ds, false),
    ("cci", Platform::N3ds, false),
    ("md", Platform::Genesis, false),
    ("smd", Platform::Genesis, false),
    ("gen", Platform::Genesis, false),
    ("gg", Platform::GameGear, false),
    ("gdi", Platform::Dreamcast, false),
    ("cdi", Platform::Dreamcast, false),
    ("chd", Platform::Psx, true),
    ("cue", Platform::Psx, true),
    ("bin", Platform::Psx, true),
    ("iso", Platform::Ps2, true),
    ("pkg", Platform::Ps3, false),
    ("cso", Platform::Psp, false),
    ("pbp", Platform::Psp, false),
    ("pce", Platform::TurboGrafx16, false),
    ("lnx", Platform::Lynx, false),
];

/// Folder names that identify a platform, compared lower-cased
const FOLDER_HINTS: &[(&str, Platform)] = &[
    ("nes", Platform::Nes),
    ("super nintendo", Platform::Snes),
    ("snes", Platform::Snes),
    ("nintendo 64", Platform::N64),
    ("n64", Platform::N64),
    ("gamecube", Platform::GameCube),
    ("gc", Platform::GameCube),
    ("wii", Platform::Wii),
    ("nintendo switch", Platform::Switch),
    ("switch", Platform::Switch),
    ("game boy", Platform::GameBoy),
    ("gb", Platform::GameBoy),
    ("game boy color", Platform::GameBoyColor),
    ("gbc", Platform::GameBoyColor),
    ("game boy advance", Platform::GameBoyAdvance),
    ("gba", Platform::GameBoyAdvance),
    ("nintendo ds", Platform::Nds),
    ("ds", Platform::Nds),
    ("nintendo 3ds", Platform::N3ds),
    ("3ds", Platform::N3ds),
    ("sega genesis", Platform::Genesis),
    ("genesis", Platform::Genesis),
    ("mega drive", Platform::Genesis),
    ("sega game gear", Platform::GameGear),
    ("gg", Platform::GameGear),
    ("sega saturn", Platform::Saturn),
    ("saturn", Platform::Saturn),
    ("dreamcast", Platform::Dreamcast),
    ("dc", Platform::Dreamcast),
    ("playstation", Platform::Psx),
    ("psx", Platform::Psx),
    ("ps1", Platform::Psx),
    ("playstation 2", Platform::Ps2),
    ("ps2", Platform::Ps2),
    ("playstation 3", Platform::Ps3),
    ("ps3", Platform::Ps3),
    ("playstation portable", Platform::Psp),
    ("psp", Platform::Psp),
    ("xbox", Platform::Xbox),
    ("xbox 360", Platform::Xbox360),
    ("x360", Platform::Xbox360),
    ("turbografx-16", Platform::TurboGrafx16),
    ("pc engine", Platform::TurboGrafx16),
    ("atari lynx", Platform::Lynx),
    ("lynx", Platform::Lynx),
];

impl Platform {
    /// Every real platform, in display order
    pub const ALL: &'static [Platform] = &[
        Platform::Nes,
        Platform::Snes,
        Platform::N64,
        Platform::GameCube,
        Platform::Wii,
        Platform::Switch,
        Platform::GameBoy,
        Platform::GameBoyColor,
        Platform::GameBoyAdvance,
        Platform::Nds,
        Platform::N3ds,
        Platform::Genesis,
        Platform::GameGear,
        Platform::Saturn,
        Platform::Dreamcast,
        Platform::Psx,
        Platform::Ps2,
        Platform::Ps3,
        Platform::Psp,
        Platform::Xbox,
        Platform::Xbox360,
        Platform::TurboGrafx16,
        Platform::Lynx,
    ];

    /// Display name, also the identifier used in profiles and on disk
    pub fn name(&self) -> &'static str {
        match self {
            Platform::Nes => "Nintendo Entertainment System",
            Platform::Snes => "Super Nintendo",
            Platform::N64 => "Nintendo 64",
            Platform::GameCube => "GameCube",
            Platform::Wii => "Wii",
            Platform::Switch => "Nintendo Switch",
            Platform::GameBoy => "Game Boy",
            Platform::GameBoyColor => "Game Boy Color",
            Platform::GameBoyAdvance => "Game Boy Advance",
            Platform::Nds => "Nintendo DS",
            Platform::N3ds => "Nintendo 3DS",
            Platform::Genesis => "Sega Genesis",
            Platform::GameGear => "Sega Game Gear",
            Platform::Saturn => "Sega Saturn",
            Platform::Dreamcast => "Dreamcast",
            Platform::Psx => "PlayStation",
            Platform::Ps2 => "PlayStation 2",
            Platform::Ps3 => "PlayStation 3",
            Platform::Psp => "PSP",
            Platform::Xbox => "Xbox",
            Platform::Xbox360 => "Xbox 360",
            Platform::TurboGrafx16 => "TurboGrafx-16",
            Platform::Lynx => "Atari Lynx",
            Platform::Uncategorized => "Uncategorized",
        }
    }

    /// Short name (for folder names and CLI filters)
    pub fn short_name(&self) -> &'static str {
        match self {
            Platform::Nes => "nes",
            Platform::Snes => "snes",
            Platform::N64 => "n64",
            Platform::GameCube => "gc",
            Platform::Wii => "wii",
            Platform::Switch => "switch",
            Platform::GameBoy => "gb",
            Platform::GameBoyColor => "gbc",
            Platform::GameBoyAdvance => "gba",
            Platform::Nds => "nds",
            Platform::N3ds => "3ds",
            Platform::Genesis => "genesis",
            Platform::GameGear => "gg",
            Platform::Saturn => "saturn",
            Platform::Dreamcast => "dc",
            Platform::Psx => "psx",
            Platform::Ps2 => "ps2",
            Platform::Ps3 => "ps3",
            Platform::Psp => "psp",
            Platform::Xbox => "xbox",
            Platform::Xbox360 => "x360",
            Platform::TurboGrafx16 => "pce",
            Platform::Lynx => "lynx",
            Platform::Uncategorized => "other",
        }
    }

    /// Look a platform up by display name or short name, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Platform::ALL
            .iter()
            .chain(std::iter::once(&Platform::Uncategorized))
            .find(|p| p.name().eq_ignore_ascii_case(name) || p.short_name().eq_ignore_ascii_case(name))
            .copied()
    }

    /// Check whether a profile's platform label refers to this platform
    pub fn matches_label(&self, label: &str) -> bool {
        Platform::from_name(label) == Some(*self)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.name().to_string()
    }
}

impl TryFrom<String> for Platform {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Platform::from_name(&value).ok_or_else(|| format!("unknown platform '{}'", value))
    }
}

/// Extensions (lower-case, without the dot) the classifier recognises
pub fn known_extensions() -> impl Iterator<Item = &'static str> {
    EXTENSIONS.iter().map(|(ext, _, _)| *ext)
}

/// Classify a game file by name.
///
/// Only the path text is inspected. Returns `None` for unknown extensions.
pub fn classify(path: &Path) -> Option<Platform> {
    let name = path.file_name()?.to_str()?.to_ascii_lowercase();

    if name.ends_with(".xiso.iso") {
        return Some(Platform::Xbox);
    }

    let ext = Path::new(&name).extension()?.to_str()?;
    let &(_, platform, ambiguous) = EXTENSIONS.iter().find(|(e, _, _)| *e == ext)?;

    if ambiguous && let Some(hint) = folder_hint(path) {
        return Some(hint);
    }

    Some(platform)
}

/// Nearest ancestor folder whose name identifies a platform
fn folder_hint(path: &Path) -> Option<Platform> {
    path.ancestors().skip(1).find_map(|dir| {
        let name = dir.file_name()?.to_str()?.to_ascii_lowercase();
        FOLDER_HINTS
            .iter()
            .find(|(hint, _)| *hint == name)
            .map(|(_, platform)| *platform)
    })
}

/// Derive a display title from a file stem or folder name.
///
/// Drops dump tags in brackets/parentheses (regions, revisions, `[!]`) and
/// turns `.`/`_` separators into spaces.
pub fn clean_title(stem: &str) -> String {
    let mut title = stem.trim().to_string();

    if title.len() > 5 && title.to_ascii_lowercase().ends_with(".xiso") {
        title.truncate(title.len() - 5);
    }

    let mut clean = String::with_capacity(title.len());
    let mut depth = 0usize;
    for c in title.chars() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' if depth > 0 => depth -= 1,
            '.' | '_' if depth == 0 => clean.push(' '),
            _ if depth == 0 => clean.push(c),
            _ => {}
        }
    }

    let clean = clean.split_whitespace().collect::<Vec<_>>().join(" ");

    if clean.is_empty() {
        title
    } else {
        clean
    }
}
