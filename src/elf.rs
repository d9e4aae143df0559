use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;

use crate::io::string_at;
use crate::BinaryKind;
use crate::BinaryRead;
use crate::ByteOrder;
use crate::Class;
use crate::Error;
use crate::Machine;

pub(crate) const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];

const ET_EXEC: u16 = 2;

const SHT_STRTAB: u32 = 3;
const SHT_DYNAMIC: u32 = 6;

const DT_NULL: u64 = 0;
const DT_NEEDED: u64 = 1;
const DT_RPATH: u64 = 15;
const DT_RUNPATH: u64 = 0x1d;

const DYNSTR_SECTION: &str = ".dynstr";

/// Hard cap on the section count, to bound reads on garbage headers.
const MAX_SECTIONS: u16 = 4096;

/// Dynamic-link information extracted from an ELF file.
#[derive(Debug)]
pub struct ElfInfo {
    /// Bitness.
    pub class: Class,
    /// Data encoding.
    pub byte_order: ByteOrder,
    /// Architecture tag (`e_machine`).
    pub machine: Machine,
    /// Executable or library.
    pub kind: BinaryKind,
    /// `DT_NEEDED` entries, in declaration order.
    pub imports: Vec<String>,
    /// `DT_RPATH` entries, unexpanded (`$ORIGIN` is kept verbatim).
    pub rpaths: Vec<String>,
    /// `DT_RUNPATH` entries, unexpanded.
    pub runpaths: Vec<String>,
}

/// One section header, reduced to the fields the decoder needs.
struct Section {
    name_offset: u32,
    kind: u32,
    offset: u64,
    size: u64,
}

impl ElfInfo {
    /// Check the four-byte magic without decoding the rest.
    pub fn is_valid<R: Read + Seek>(reader: &mut R) -> bool {
        let mut magic = [0_u8; 4];
        reader.seek(SeekFrom::Start(0)).is_ok()
            && reader.read_bytes(&mut magic[..]).is_ok()
            && magic == ELF_MAGIC
    }

    /// Decode dynamic-link information from `reader`.
    ///
    /// Returns [`Error::NotElf`] if the magic doesn't match; any other error
    /// means the file claims to be ELF but couldn't be decoded.
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<Self, Error> {
        reader.seek(SeekFrom::Start(0))?;
        let mut magic = [0_u8; 4];
        reader.read_bytes(&mut magic[..]).map_err(|e| match e {
            Error::Io(ref io) if io.kind() == std::io::ErrorKind::UnexpectedEof => Error::NotElf,
            e => e,
        })?;
        if magic != ELF_MAGIC {
            return Err(Error::NotElf);
        }
        let class: Class = reader.read_u8()?.try_into()?;
        let byte_order: ByteOrder = reader.read_u8()?.try_into()?;
        // EI_VERSION, EI_OSABI, EI_ABIVERSION and padding.
        reader.read_bytes(&mut [0_u8; 10])?;
        let kind = match reader.read_u16(byte_order)? {
            ET_EXEC => BinaryKind::Executable,
            _ => BinaryKind::Library,
        };
        let machine: Machine = reader.read_u16(byte_order)?.into();
        let _version = reader.read_u32(byte_order)?;
        let _entry_point = reader.read_word(class, byte_order)?;
        let _program_header_offset = reader.read_word(class, byte_order)?;
        let section_header_offset = reader.read_word(class, byte_order)?;
        let _flags = reader.read_u32(byte_order)?;
        let _header_len = reader.read_u16(byte_order)?;
        let _segment_len = reader.read_u16(byte_order)?;
        let _num_segments = reader.read_u16(byte_order)?;
        let _section_len = reader.read_u16(byte_order)?;
        let num_sections = reader.read_u16(byte_order)?;
        let section_names_index = reader.read_u16(byte_order)?;
        if num_sections > MAX_SECTIONS {
            return Err(Error::Malformed("section count"));
        }

        let mut sections = Vec::with_capacity(num_sections as usize);
        for i in 0..num_sections {
            // `e_shoff` comes straight from the file; garbled values must
            // surface as an error, never as overflow.
            let offset = u64::from(i)
                .checked_mul(class.section_len())
                .and_then(|entry_offset| section_header_offset.checked_add(entry_offset))
                .ok_or(Error::Malformed("section header offset"))?;
            reader.seek(SeekFrom::Start(offset))?;
            sections.push(Section::read(reader, class, byte_order)?);
        }

        // Offsets into .dynstr, collected while walking the dynamic sections.
        let mut needed = Vec::new();
        let mut rpaths = Vec::new();
        let mut runpaths = Vec::new();
        for section in sections.iter().filter(|s| s.kind == SHT_DYNAMIC) {
            reader.seek(SeekFrom::Start(section.offset))?;
            let max_entries = section.size as usize / class.dynamic_entry_len();
            for _ in 0..max_entries {
                let tag = reader.read_word(class, byte_order)?;
                let value = reader.read_word(class, byte_order)?;
                match tag {
                    DT_NULL => break,
                    DT_NEEDED => needed.push(value),
                    DT_RPATH => rpaths.push(value),
                    DT_RUNPATH => runpaths.push(value),
                    _ => {}
                }
            }
        }

        let dynstr = read_dynstr(reader, &sections, section_names_index)?.unwrap_or_default();
        let resolve = |offsets: Vec<u64>| -> Result<Vec<String>, Error> {
            offsets
                .into_iter()
                .map(|offset| {
                    string_at(&dynstr, offset as usize)
                        .ok_or(Error::Malformed("dynamic string offset"))
                })
                .collect()
        };
        Ok(Self {
            class,
            byte_order,
            machine,
            kind,
            imports: resolve(needed)?,
            rpaths: resolve(rpaths)?,
            runpaths: resolve(runpaths)?,
        })
    }
}

impl Section {
    fn read<R: Read + Seek>(
        reader: &mut R,
        class: Class,
        byte_order: ByteOrder,
    ) -> Result<Self, Error> {
        let name_offset = reader.read_u32(byte_order)?;
        let kind = reader.read_u32(byte_order)?;
        let _flags = reader.read_word(class, byte_order)?;
        let _virtual_address = reader.read_word(class, byte_order)?;
        let offset = reader.read_word(class, byte_order)?;
        let size = reader.read_word(class, byte_order)?;
        Ok(Self {
            name_offset,
            kind,
            offset,
            size,
        })
    }

    fn read_content<R: Read + Seek>(&self, reader: &mut R) -> Result<Vec<u8>, Error> {
        if self.size > u32::MAX as u64 {
            return Err(Error::Malformed("section size"));
        }
        reader.seek(SeekFrom::Start(self.offset))?;
        let mut content = vec![0_u8; self.size as usize];
        reader.read_bytes(&mut content[..])?;
        Ok(content)
    }
}

/// Find the string table named `.dynstr` and read its content.
///
/// Library names and search paths live there; the name lookup goes through
/// the section-name table indexed by the file header.
fn read_dynstr<R: Read + Seek>(
    reader: &mut R,
    sections: &[Section],
    section_names_index: u16,
) -> Result<Option<Vec<u8>>, Error> {
    let Some(names_section) = sections.get(section_names_index as usize) else {
        return Ok(None);
    };
    let names = names_section.read_content(reader)?;
    for section in sections.iter().filter(|s| s.kind == SHT_STRTAB) {
        if string_at(&names, section.name_offset as usize).as_deref() == Some(DYNSTR_SECTION) {
            return Ok(Some(section.read_content(reader)?));
        }
    }
    Ok(None)
}
