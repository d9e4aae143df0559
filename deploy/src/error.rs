use std::path::PathBuf;

/// Deployment errors.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The profile is unusable; nothing has been written yet.
    #[error("Configuration error: {0}")]
    Config(String),
    /// `Package.targetPlatform` names an unsupported target.
    #[error("Unknown target platform {0:?}")]
    UnknownPlatform(String),
    /// `Package.buildType` names an unsupported build type.
    #[error("Unknown build type {0:?}")]
    UnknownBuildType(String),
    /// A binary failed to decode.
    #[error("Binary error: {0}")]
    Binary(#[from] loadout::Error),
    /// A file couldn't be copied into the staging tree.
    #[error("Failed to stage {0:?}: {1}")]
    Stage(PathBuf, std::io::Error),
    /// Input/output error.
    #[error("Input/output error: {0}")]
    Io(#[from] std::io::Error),
}
