use thiserror::Error;

/// Decoding errors.
#[derive(Error, Debug)]
pub enum Error {
    /// The file doesn't start with the ELF magic.
    #[error("Not an ELF file")]
    NotElf,
    /// The file doesn't start with any of the four Mach-O magics.
    #[error("Not a Mach-O file")]
    NotMach,
    /// The file doesn't carry the `MZ`/`PE\0\0` signatures.
    #[error("Not a PE file")]
    NotPe,
    /// Invalid ELF class byte.
    #[error("Invalid ELF class: {0}")]
    InvalidClass(u8),
    /// Invalid ELF data-encoding byte.
    #[error("Invalid byte order: {0}")]
    InvalidByteOrder(u8),
    /// A header field points outside the file or contradicts another field.
    #[error("Malformed {0}")]
    Malformed(&'static str),
    /// Input/output error.
    #[error("Input/output error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the input merely isn't in the queried format.
    ///
    /// Directory walks use this to skip foreign files silently; any other
    /// error on a file with a valid magic is also treated as "not a binary"
    /// by the scanner, per the engine's error policy.
    pub fn is_foreign(&self) -> bool {
        matches!(self, Self::NotElf | Self::NotMach | Self::NotPe)
    }
}

impl From<std::io::ErrorKind> for Error {
    fn from(other: std::io::ErrorKind) -> Self {
        Self::Io(other.into())
    }
}
