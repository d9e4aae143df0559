use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use bitflags::bitflags;

use crate::BinaryKind;
use crate::BinaryRead;
use crate::ByteOrder;
use crate::Error;
use crate::Machine;

const DOS_MAGIC: [u8; 2] = [b'M', b'Z'];
const PE_SIGNATURE: [u8; 4] = [b'P', b'E', 0, 0];

/// Offset of `e_lfanew`, the file offset of the PE signature.
const LFANEW_OFFSET: u64 = 0x3c;

const PE32_MAGIC: u16 = 0x010b;
const PE32_PLUS_MAGIC: u16 = 0x020b;

/// Distance from the end of the optional-header magic to data-directory
/// entry [1], the import table: 94 bytes of standard+windows fields for
/// PE32 (110 for PE32+), then the 8-byte export-table entry.
const PE32_IMPORT_DIRECTORY_SKIP: i64 = 94 + 8;
const PE32_PLUS_IMPORT_DIRECTORY_SKIP: i64 = 110 + 8;

/// Hard cap on the section count, to bound reads on garbage headers.
const MAX_SECTIONS: u16 = 4096;

/// Longest accepted import DLL name.
const MAX_NAME: usize = 4096;

bitflags! {
    /// COFF characteristics word.
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct Characteristics: u16 {
        /// The image can be run (relocations have been resolved).
        const EXECUTABLE_IMAGE = 0x0002;
        /// The image is a dynamic-link library.
        const DLL = 0x2000;
    }
}

/// Import information extracted from a PE/COFF file.
#[derive(Debug)]
pub struct PeInfo {
    /// `true` for PE32+, `false` for PE32.
    pub is_64bit: bool,
    /// Architecture tag from the COFF header.
    pub machine: Machine,
    /// Executable or library.
    pub kind: BinaryKind,
    /// COFF characteristics.
    pub characteristics: Characteristics,
    /// Imported DLL names, in import-directory order, deduplicated.
    pub imports: Vec<String>,
}

/// One section header, reduced to what RVA translation needs.
struct Section {
    virtual_size: u32,
    virtual_address: u32,
    raw_data_offset: u32,
}

impl Section {
    /// Translate a relative virtual address to a file offset.
    fn file_offset(&self, rva: u32) -> Option<u64> {
        if rva >= self.virtual_address && rva - self.virtual_address < self.virtual_size {
            Some(u64::from(rva - self.virtual_address) + u64::from(self.raw_data_offset))
        } else {
            None
        }
    }
}

fn file_offset(sections: &[Section], rva: u32) -> Option<u64> {
    sections.iter().find_map(|s| s.file_offset(rva))
}

impl PeInfo {
    /// Check the `MZ` and `PE\0\0` signatures without decoding the rest.
    pub fn is_valid<R: Read + Seek>(reader: &mut R) -> bool {
        fn sniff<R: Read + Seek>(reader: &mut R) -> Result<bool, Error> {
            reader.seek(SeekFrom::Start(0))?;
            let mut magic = [0_u8; 2];
            reader.read_bytes(&mut magic[..])?;
            if magic != DOS_MAGIC {
                return Ok(false);
            }
            reader.seek(SeekFrom::Start(LFANEW_OFFSET))?;
            let pe_offset = reader.read_u32(ByteOrder::LittleEndian)?;
            reader.seek(SeekFrom::Start(pe_offset.into()))?;
            let mut signature = [0_u8; 4];
            reader.read_bytes(&mut signature[..])?;
            Ok(signature == PE_SIGNATURE)
        }
        sniff(reader).unwrap_or(false)
    }

    /// Decode import information from `reader`.
    ///
    /// Returns [`Error::NotPe`] if the signatures don't match.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        let order = ByteOrder::LittleEndian;
        reader.seek(SeekFrom::Start(0))?;
        let mut magic = [0_u8; 2];
        reader.read_bytes(&mut magic[..]).map_err(|e| match e {
            Error::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => Error::NotPe,
            e => e,
        })?;
        if magic != DOS_MAGIC {
            return Err(Error::NotPe);
        }
        reader.seek(SeekFrom::Start(LFANEW_OFFSET))?;
        let pe_offset = reader.read_u32(order)?;
        reader.seek(SeekFrom::Start(pe_offset.into()))?;
        let mut signature = [0_u8; 4];
        reader.read_bytes(&mut signature[..])?;
        if signature != PE_SIGNATURE {
            return Err(Error::NotPe);
        }

        let machine: Machine = reader.read_u16(order)?.into();
        let num_sections = reader.read_u16(order)?;
        let _timestamp = reader.read_u32(order)?;
        let _symbol_table_offset = reader.read_u32(order)?;
        let _num_symbols = reader.read_u32(order)?;
        let optional_header_len = reader.read_u16(order)?;
        let characteristics = Characteristics::from_bits_retain(reader.read_u16(order)?);
        let kind = if characteristics.contains(Characteristics::DLL) {
            BinaryKind::Library
        } else {
            BinaryKind::Executable
        };
        if num_sections > MAX_SECTIONS {
            return Err(Error::Malformed("section count"));
        }
        let section_table_offset = reader.stream_position()? + u64::from(optional_header_len);

        let is_64bit = match reader.read_u16(order)? {
            PE32_MAGIC => false,
            PE32_PLUS_MAGIC => true,
            _ => return Err(Error::Malformed("optional header magic")),
        };
        let skip = if is_64bit {
            PE32_PLUS_IMPORT_DIRECTORY_SKIP
        } else {
            PE32_IMPORT_DIRECTORY_SKIP
        };
        reader.seek(SeekFrom::Current(skip))?;
        let import_table_rva = reader.read_u32(order)?;
        let import_table_size = reader.read_u32(order)?;

        reader.seek(SeekFrom::Start(section_table_offset))?;
        let mut sections = Vec::with_capacity(num_sections as usize);
        for _ in 0..num_sections {
            // The 8-byte section name is irrelevant: sections are matched by
            // address range, not by name.
            reader.read_bytes(&mut [0_u8; 8])?;
            let virtual_size = reader.read_u32(order)?;
            let virtual_address = reader.read_u32(order)?;
            let _raw_data_len = reader.read_u32(order)?;
            let raw_data_offset = reader.read_u32(order)?;
            // Relocation/line-number fields are irrelevant here.
            reader.seek(SeekFrom::Current(16))?;
            sections.push(Section {
                virtual_size,
                virtual_address,
                raw_data_offset,
            });
        }

        let mut imports = Vec::new();
        if import_table_size > 0 {
            let Some(directory_offset) = file_offset(&sections, import_table_rva) else {
                return Err(Error::Malformed("import table address"));
            };
            // Import directory entries are five little-endian u32s; the
            // directory ends with an all-zero entry.
            let mut name_rvas = Vec::new();
            reader.seek(SeekFrom::Start(directory_offset))?;
            loop {
                let mut entry = [0_u32; 5];
                for field in entry.iter_mut() {
                    *field = match reader.read_u32(order) {
                        Ok(value) => value,
                        Err(Error::Io(ref e))
                            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                        {
                            0
                        }
                        Err(e) => return Err(e),
                    };
                }
                if entry.iter().all(|field| *field == 0) {
                    break;
                }
                name_rvas.push(entry[3]);
            }
            for rva in name_rvas {
                let Some(offset) = file_offset(&sections, rva) else {
                    continue;
                };
                reader.seek(SeekFrom::Start(offset))?;
                let bytes = reader.read_c_string(MAX_NAME)?;
                let name = String::from_utf8_lossy(&bytes).into_owned();
                if !imports.contains(&name) {
                    imports.push(name);
                }
            }
        }
        Ok(Self {
            is_64bit,
            machine,
            kind,
            characteristics,
            imports,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Cursor;

    use crate::test::PeFixture;

    #[test]
    fn decodes_imports_in_directory_order() {
        let image = PeFixture::executable()
            .import("KERNEL32.dll")
            .import("foo.dll")
            .import("bar.dll")
            .build();
        let info = PeInfo::read(&mut Cursor::new(image)).unwrap();
        assert_eq!(vec!["KERNEL32.dll", "foo.dll", "bar.dll"], info.imports);
        assert_eq!(BinaryKind::Executable, info.kind);
        assert!(info.is_64bit);
    }

    #[test]
    fn dll_characteristic_selects_library_kind() {
        let image = PeFixture::library().import("msvcrt.dll").build();
        let info = PeInfo::read(&mut Cursor::new(image)).unwrap();
        assert_eq!(BinaryKind::Library, info.kind);
        assert!(info.characteristics.contains(Characteristics::DLL));
    }

    #[test]
    fn pe32_variant_decodes() {
        let image = PeFixture::executable()
            .pe32()
            .import("user32.dll")
            .build();
        let info = PeInfo::read(&mut Cursor::new(image)).unwrap();
        assert!(!info.is_64bit);
        assert_eq!(vec!["user32.dll"], info.imports);
    }

    #[test]
    fn rejects_foreign_input() {
        assert!(matches!(
            PeInfo::read(&mut Cursor::new(b"\x7fELF".to_vec())),
            Err(Error::NotPe)
        ));
        // An MZ stub without the PE signature (plain DOS program).
        let mut dos = vec![0_u8; 0x48];
        dos[0] = b'M';
        dos[1] = b'Z';
        dos[0x3c] = 0x40;
        assert!(matches!(
            PeInfo::read(&mut Cursor::new(dos)),
            Err(Error::NotPe)
        ));
    }
}
