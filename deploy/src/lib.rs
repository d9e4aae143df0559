#![doc = include_str!("../README.md")]

mod buildinfo;
mod deploy;
mod error;
mod exclude;
mod fixup;
mod launcher;
mod ldconf;
mod ndk;
mod packages;
mod profile;
mod resolver;
mod scanner;
mod stage;
mod sweep;
mod target;
mod tools;
mod vcs;

pub use self::buildinfo::*;
pub use self::deploy::*;
pub use self::error::*;
pub use self::exclude::*;
pub use self::fixup::*;
pub use self::launcher::*;
pub use self::ldconf::*;
pub use self::ndk::*;
pub use self::packages::*;
pub use self::profile::*;
pub use self::resolver::*;
pub use self::scanner::*;
pub use self::stage::*;
pub use self::sweep::*;
pub use self::target::*;
pub use self::tools::*;
pub use self::vcs::*;
