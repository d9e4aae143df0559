use core::fmt;

/// Machine-architecture tag read from a binary's header.
///
/// The tag is opaque: the engine only ever compares tags for equality while
/// resolving ELF dependencies. A few well-known values are named for fixtures
/// and diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct Machine(pub u32);

impl Machine {
    /// No machine (`EM_NONE`).
    pub const NONE: Self = Self(0);
    /// Intel 386 (`EM_386`).
    pub const I386: Self = Self(3);
    /// AMD x86-64 (`EM_X86_64`).
    pub const X86_64: Self = Self(62);
    /// Arm 64-bit (`EM_AARCH64`).
    pub const AARCH64: Self = Self(183);

    /// Returns `true` for the "no machine" tag.
    pub const fn is_unknown(self) -> bool {
        self.0 == 0
    }

    /// Two tags are compatible when they're equal or either one is unknown.
    pub const fn matches(self, other: Self) -> bool {
        self.0 == other.0 || self.is_unknown() || other.is_unknown()
    }
}

impl From<u16> for Machine {
    fn from(other: u16) -> Self {
        Self(other.into())
    }
}

impl From<u32> for Machine {
    fn from(other: u32) -> Self {
        Self(other)
    }
}

impl fmt::Display for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
