use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use crate::BinaryKind;
use crate::BinaryRead;
use crate::ByteOrder;
use crate::Error;
use crate::Machine;

const MH_MAGIC: u32 = 0xfeed_face;
const MH_CIGAM: u32 = 0xcefa_edfe;
const MH_MAGIC_64: u32 = 0xfeed_facf;
const MH_CIGAM_64: u32 = 0xcffa_edfe;

const MH_EXECUTE: u32 = 0x2;

const LC_REQ_DYLD: u32 = 0x8000_0000;
const LC_LOAD_DYLIB: u32 = 0xc;
const LC_ID_DYLIB: u32 = 0xd;
const LC_RPATH: u32 = 0x1c | LC_REQ_DYLD;

/// Hard cap on the load-command count, to bound reads on garbage headers.
const MAX_COMMANDS: u32 = 4096;

/// Dynamic-link information extracted from a Mach-O file.
#[derive(Debug)]
pub struct MachInfo {
    /// `true` for the two 64-bit magics.
    pub is_64bit: bool,
    /// Byte order of the image (reverse-endian magics flip every read).
    pub byte_order: ByteOrder,
    /// CPU type from the header.
    pub machine: Machine,
    /// Executable or library.
    pub kind: BinaryKind,
    /// `LC_LOAD_DYLIB` paths, in load-command order.
    ///
    /// `@rpath/`, `@loader_path/` and `@executable_path/` prefixes are kept
    /// verbatim; substitution is the resolver's job.
    pub imports: Vec<String>,
    /// `LC_RPATH` entries.
    pub rpaths: Vec<String>,
    /// `LC_ID_DYLIB` install name, absent for executables.
    pub install_name: Option<String>,
}

impl MachInfo {
    /// Check the magic without decoding the rest.
    pub fn is_valid<R: Read + Seek>(reader: &mut R) -> bool {
        reader.seek(SeekFrom::Start(0)).is_ok()
            && matches!(
                reader.read_u32(ByteOrder::native()),
                Ok(MH_MAGIC | MH_CIGAM | MH_MAGIC_64 | MH_CIGAM_64)
            )
    }

    /// Decode dynamic-link information from `reader`.
    ///
    /// Returns [`Error::NotMach`] if the magic doesn't match any of the four
    /// accepted variants.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        reader.seek(SeekFrom::Start(0))?;
        let native = ByteOrder::native();
        let magic = reader.read_u32(native).map_err(|e| match e {
            Error::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => Error::NotMach,
            e => e,
        })?;
        let (is_64bit, byte_order) = match magic {
            MH_MAGIC => (false, native),
            MH_MAGIC_64 => (true, native),
            MH_CIGAM => (false, native.swapped()),
            MH_CIGAM_64 => (true, native.swapped()),
            _ => return Err(Error::NotMach),
        };
        let machine: Machine = reader.read_u32(byte_order)?.into();
        let _cpu_subtype = reader.read_u32(byte_order)?;
        let kind = match reader.read_u32(byte_order)? {
            MH_EXECUTE => BinaryKind::Executable,
            _ => BinaryKind::Library,
        };
        let num_commands = reader.read_u32(byte_order)?;
        if num_commands > MAX_COMMANDS {
            return Err(Error::Malformed("load command count"));
        }
        let _commands_len = reader.read_u32(byte_order)?;
        let _flags = reader.read_u32(byte_order)?;
        if is_64bit {
            let _reserved = reader.read_u32(byte_order)?;
        }

        let mut imports = Vec::new();
        let mut rpaths = Vec::new();
        let mut install_name = None;
        for _ in 0..num_commands {
            let command_start = reader.stream_position()?;
            let command = reader.read_u32(byte_order)?;
            let command_len = u64::from(reader.read_u32(byte_order)?);
            if command_len < 8 {
                return Err(Error::Malformed("load command size"));
            }
            // Offsets are built from file-controlled fields; garbled values
            // must surface as an error, never as overflow.
            let command_end = command_start
                .checked_add(command_len)
                .ok_or(Error::Malformed("load command size"))?;
            if matches!(command, LC_LOAD_DYLIB | LC_ID_DYLIB | LC_RPATH) {
                // The payload starts with an offset to a NUL-terminated
                // string, relative to the start of the command.
                let string_offset = u64::from(reader.read_u32(byte_order)?);
                if string_offset > command_len {
                    return Err(Error::Malformed("load command string offset"));
                }
                reader.seek(SeekFrom::Start(command_start + string_offset))?;
                let max_len = (command_len - string_offset) as usize;
                let bytes = reader.read_c_string(max_len)?;
                let path = String::from_utf8_lossy(&bytes).into_owned();
                match command {
                    LC_LOAD_DYLIB => imports.push(path),
                    LC_RPATH => rpaths.push(path),
                    _ => install_name = Some(path),
                }
            }
            reader.seek(SeekFrom::Start(command_end))?;
        }
        Ok(Self {
            is_64bit,
            byte_order,
            machine,
            kind,
            imports,
            rpaths,
            install_name,
        })
    }
}
