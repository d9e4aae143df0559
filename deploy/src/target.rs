use std::str::FromStr;

use loadout::BinaryFormat;

use crate::Error;

/// Deployment target.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum TargetPlatform {
    /// Generic Linux/ELF userland.
    Posix,
    /// macOS.
    Mac,
    /// Windows.
    Windows,
    /// Android.
    Android,
}

impl TargetPlatform {
    /// Profile value for this target.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Posix => "posix",
            Self::Mac => "mac",
            Self::Windows => "windows",
            Self::Android => "android",
        }
    }

    /// The executable format this target uses.
    pub const fn binary_format(self) -> BinaryFormat {
        match self {
            Self::Posix | Self::Android => BinaryFormat::Elf,
            Self::Mac => BinaryFormat::MachO,
            Self::Windows => BinaryFormat::Pe,
        }
    }

    /// File name of the exclusion list for this target.
    pub fn exclude_file_name(self) -> String {
        format!("{}.txt", self.as_str())
    }

    /// Whether staged libraries land next to the main executable instead of
    /// in the library directory.
    pub const fn libs_beside_executable(self) -> bool {
        matches!(self, Self::Windows)
    }
}

impl FromStr for TargetPlatform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "posix" => Ok(Self::Posix),
            "mac" => Ok(Self::Mac),
            "windows" => Ok(Self::Windows),
            "android" => Ok(Self::Android),
            other => Err(Error::UnknownPlatform(other.into())),
        }
    }
}

/// The platform the engine itself runs on.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HostPlatform {
    /// Linux and the BSDs.
    Posix,
    /// macOS.
    Mac,
    /// Windows.
    Windows,
}

impl HostPlatform {
    /// Detect the host.
    pub const fn current() -> Self {
        if cfg!(target_os = "macos") {
            Self::Mac
        } else if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }
}

/// Build type of the payload, as reported by the build system.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum BuildType {
    /// Unoptimized build with debug information.
    #[default]
    Debug,
    /// Optimized build.
    Release,
    /// Size-optimized build.
    MinSizeRel,
}

impl BuildType {
    /// Whether symbols should be stripped from staged binaries.
    pub const fn strips(self) -> bool {
        matches!(self, Self::Release | Self::MinSizeRel)
    }
}

impl FromStr for BuildType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Debug" => Ok(Self::Debug),
            "Release" => Ok(Self::Release),
            "MinSizeRel" => Ok(Self::MinSizeRel),
            other => Err(Error::UnknownBuildType(other.into())),
        }
    }
}
