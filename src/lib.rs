#![doc = include_str!("../README.md")]

mod byte_order;
mod class;
mod elf;
mod error;
mod format;
mod io;
mod kind;
mod machine;
mod macho;
mod pe;
#[cfg(test)]
pub(crate) mod test;

pub use self::byte_order::*;
pub use self::class::*;
pub use self::elf::*;
pub use self::error::*;
pub use self::format::*;
pub use self::io::*;
pub use self::kind::*;
pub use self::machine::*;
pub use self::macho::*;
pub use self::pe::*;
