use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use log::trace;

use crate::BinaryKind;
use crate::ElfInfo;
use crate::Error;
use crate::MachInfo;
use crate::Machine;
use crate::PeInfo;

/// The executable formats the engine understands.
///
/// One variant is selected per deployment target at startup; every query on
/// a file goes through that variant.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum BinaryFormat {
    /// ELF (Linux, Android, BSD).
    Elf,
    /// Mach-O (macOS, iOS).
    MachO,
    /// PE/COFF (Windows).
    Pe,
}

/// Dynamic-link information extracted from a binary, format-independent.
#[derive(Debug)]
pub struct BinaryInfo {
    /// The format the file was decoded as.
    pub format: BinaryFormat,
    /// Executable or library.
    pub kind: BinaryKind,
    /// Architecture tag, compared for equality during ELF resolution.
    pub machine: Machine,
    /// Import names; per-format semantics (see the format decoders).
    pub imports: Vec<String>,
    /// Embedded search paths: `DT_RPATH` or `LC_RPATH` entries, unexpanded.
    pub rpaths: Vec<String>,
    /// `DT_RUNPATH` entries; always empty for Mach-O and PE.
    pub runpaths: Vec<String>,
    /// Mach-O install name; absent for executables and other formats.
    pub install_name: Option<String>,
}

impl BinaryFormat {
    /// Quick magic check: is the file at `path` in this format?
    ///
    /// Any I/O error answers `false`; the walk must never abort on an
    /// unreadable file.
    pub fn is_valid<P: AsRef<Path>>(self, path: P) -> bool {
        let Ok(file) = File::open(path.as_ref()) else {
            return false;
        };
        let mut reader = BufReader::new(file);
        match self {
            Self::Elf => ElfInfo::is_valid(&mut reader),
            Self::MachO => MachInfo::is_valid(&mut reader),
            Self::Pe => PeInfo::is_valid(&mut reader),
        }
    }

    /// Decode the file at `path`.
    pub fn decode<P: AsRef<Path>>(self, path: P) -> Result<BinaryInfo, Error> {
        let path = path.as_ref();
        trace!("Decoding {path:?} as {self:?}");
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        match self {
            Self::Elf => {
                let info = ElfInfo::read(&mut reader)?;
                Ok(BinaryInfo {
                    format: self,
                    kind: info.kind,
                    machine: info.machine,
                    imports: info.imports,
                    rpaths: info.rpaths,
                    runpaths: info.runpaths,
                    install_name: None,
                })
            }
            Self::MachO => {
                let info = MachInfo::read(&mut reader)?;
                Ok(BinaryInfo {
                    format: self,
                    kind: info.kind,
                    machine: info.machine,
                    imports: info.imports,
                    rpaths: info.rpaths,
                    runpaths: Vec::new(),
                    install_name: info.install_name,
                })
            }
            Self::Pe => {
                let info = PeInfo::read(&mut reader)?;
                Ok(BinaryInfo {
                    format: self,
                    kind: info.kind,
                    machine: info.machine,
                    imports: info.imports,
                    rpaths: Vec::new(),
                    runpaths: Vec::new(),
                    install_name: None,
                })
            }
        }
    }

    /// The bare library name behind a file name.
    ///
    /// `libfoo.so.1` → `foo`, `libQux.dylib` → `libQux`, `FOO.DLL` → `FOO`.
    pub fn library_name(self, file_name: &str) -> String {
        match self {
            Self::Elf => {
                let name = file_name.strip_prefix("lib").unwrap_or(file_name);
                match name.find(".so") {
                    Some(i) => name[..i].into(),
                    None => name.into(),
                }
            }
            Self::MachO => match file_name.find(".dylib") {
                Some(i) => file_name[..i].into(),
                None => file_name.into(),
            },
            Self::Pe => match file_name.to_lowercase().find(".dll") {
                Some(i) => file_name[..i].into(),
                None => file_name.into(),
            },
        }
    }
}
