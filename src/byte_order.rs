use crate::Error;

/// Data encoding of multi-byte fields.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(u8)]
pub enum ByteOrder {
    /// Least significant byte first.
    LittleEndian = 1,
    /// Most significant byte first.
    BigEndian = 2,
}

impl ByteOrder {
    /// Byte order of the host.
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Self::BigEndian
        } else {
            Self::LittleEndian
        }
    }

    /// The opposite byte order.
    pub const fn swapped(self) -> Self {
        match self {
            Self::LittleEndian => Self::BigEndian,
            Self::BigEndian => Self::LittleEndian,
        }
    }
}

impl TryFrom<u8> for ByteOrder {
    type Error = Error;
    fn try_from(other: u8) -> Result<Self, Self::Error> {
        match other {
            1 => Ok(Self::LittleEndian),
            2 => Ok(Self::BigEndian),
            n => Err(Error::InvalidByteOrder(n)),
        }
    }
}
