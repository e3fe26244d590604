//! Known emulator signatures
//!
//! Auto-detection is a table lookup: every signature is evaluated the same
//! way against the lower-cased executable file name.

use crate::Platform;
use std::path::Path;

/// A recognisable emulator executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmulatorSignature {
    /// Canonical emulator name
    pub name: &'static str,

    /// Lower-case fragments, any of which identifies the executable
    pub executables: &'static [&'static str],

    /// Platforms the emulator runs
    pub platforms: &'static [Platform],

    /// Default launch argument template
    pub args: &'static str,
}

pub const SIGNATURES: &[EmulatorSignature] = &[
    // Handhelds
    EmulatorSignature {
        name: "mGBA",
        executables: &["mgba"],
        platforms: &[Platform::GameBoy, Platform::GameBoyColor, Platform::GameBoyAdvance],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "VisualBoyAdvance-M",
        executables: &["visualboyadvance-m", "vbam"],
        platforms: &[Platform::GameBoy, Platform::GameBoyColor, Platform::GameBoyAdvance],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "SameBoy",
        executables: &["sameboy"],
        platforms: &[Platform::GameBoy, Platform::GameBoyColor],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "melonDS",
        executables: &["melonds"],
        platforms: &[Platform::Nds],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "PPSSPP",
        executables: &["ppsspp"],
        platforms: &[Platform::Psp],
        args: "--fullscreen %ROM%",
    },
    // 4th generation
    EmulatorSignature {
        name: "Snes9x",
        executables: &["snes9x"],
        platforms: &[Platform::Snes],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Mesen",
        executables: &["mesen"],
        platforms: &[Platform::Nes, Platform::Snes],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Kega Fusion",
        executables: &["fusion"],
        platforms: &[Platform::Genesis, Platform::GameGear],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "BlastEm",
        executables: &["blastem"],
        platforms: &[Platform::Genesis],
        args: "%ROM%",
    },
    // 5th generation
    EmulatorSignature {
        name: "DuckStation",
        executables: &["duckstation-qt", "duckstation-nogui"],
        platforms: &[Platform::Psx],
        args: "-batch %ROM%",
    },
    EmulatorSignature {
        name: "Project64",
        executables: &["project64"],
        platforms: &[Platform::N64],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "simple64",
        executables: &["simple64-gui", "simple64-cli"],
        platforms: &[Platform::N64],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Mednafen",
        executables: &["mednafen"],
        platforms: &[
            Platform::Psx,
            Platform::Saturn,
            Platform::Snes,
            Platform::Genesis,
            Platform::TurboGrafx16,
            Platform::Lynx,
        ],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "YabaSanshiro",
        executables: &["yabasanshiro"],
        platforms: &[Platform::Saturn],
        args: "-i %ROM%",
    },
    EmulatorSignature {
        name: "Kronos",
        executables: &["kronos"],
        platforms: &[Platform::Saturn],
        args: "-i %ROM%",
    },
    // 6th generation
    EmulatorSignature {
        name: "Dolphin",
        executables: &["dolphin"],
        platforms: &[Platform::GameCube, Platform::Wii],
        args: "-b -e %ROM%",
    },
    EmulatorSignature {
        name: "PCSX2",
        executables: &["pcsx2", "pcsx2-qt"],
        platforms: &[Platform::Ps2],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Xemu",
        executables: &["xemu"],
        platforms: &[Platform::Xbox],
        args: "-dvd_path %ROM%",
    },
    EmulatorSignature {
        name: "Redream",
        executables: &["redream"],
        platforms: &[Platform::Dreamcast],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Flycast",
        executables: &["flycast"],
        platforms: &[Platform::Dreamcast],
        args: "%ROM%",
    },
    // Later generations
    EmulatorSignature {
        name: "RPCS3",
        executables: &["rpcs3"],
        platforms: &[Platform::Ps3],
        args: "--no-gui %ROM%",
    },
    EmulatorSignature {
        name: "Xenia",
        executables: &["xenia"],
        platforms: &[Platform::Xbox360],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Citra",
        executables: &["citra-qt", "lime3ds", "azahar"],
        platforms: &[Platform::N3ds],
        args: "%ROM%",
    },
    EmulatorSignature {
        name: "Ryujinx",
        executables: &["ryujinx"],
        platforms: &[Platform::Switch],
        args: "%ROM%",
    },
];

/// File extensions an emulator executable may carry, lower-case
const EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "appimage", "sh", "bat", "cmd"];

impl EmulatorSignature {
    /// Check whether a lower-cased file name matches this signature
    pub fn matches(&self, file_name: &str) -> bool {
        self.executables.iter().any(|exe| file_name.contains(exe))
    }

    /// Platform display names, as stored in profiles
    pub fn platform_names(&self) -> Vec<String> {
        self.platforms.iter().map(|p| p.name().to_string()).collect()
    }
}

/// Identify an emulator from its executable path.
///
/// Files that cannot be executables (libraries, configs, saves) are never
/// matched, even when their names contain a known fragment.
pub fn identify(path: &Path) -> Option<&'static EmulatorSignature> {
    let file_name = path.file_name()?.to_str()?.to_ascii_lowercase();

    let executable = match Path::new(&file_name).extension().and_then(|e| e.to_str()) {
        None => true,
        Some(ext) => EXECUTABLE_EXTENSIONS.contains(&ext) || ext.chars().any(|c| !c.is_ascii_alphabetic()),
    };
    if !executable {
        return None;
    }

    SIGNATURES.iter().find(|sig| sig.matches(&file_name))
}
