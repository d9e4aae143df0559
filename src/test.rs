//! Hand-assembled binary images for the decoder tests.

use crate::BinaryKind;
use crate::ByteOrder;
use crate::Class;
use crate::Machine;

/// Byte-order-aware image writer.
struct Writer {
    buf: Vec<u8>,
    byte_order: ByteOrder,
}

impl Writer {
    fn new(byte_order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            byte_order,
        }
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    fn u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    fn u16(&mut self, value: u16) {
        match self.byte_order {
            ByteOrder::LittleEndian => self.buf.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn u32(&mut self, value: u32) {
        match self.byte_order {
            ByteOrder::LittleEndian => self.buf.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn u64(&mut self, value: u64) {
        match self.byte_order {
            ByteOrder::LittleEndian => self.buf.extend_from_slice(&value.to_le_bytes()),
            ByteOrder::BigEndian => self.buf.extend_from_slice(&value.to_be_bytes()),
        }
    }

    fn word(&mut self, class: Class, value: u64) {
        match class {
            Class::Elf32 => self.u32(value as u32),
            Class::Elf64 => self.u64(value),
        }
    }

    fn pad_to(&mut self, offset: usize) {
        assert!(self.buf.len() <= offset);
        self.buf.resize(offset, 0);
    }
}

fn align(offset: usize, to: usize) -> usize {
    offset.div_ceil(to) * to
}

/// Builds a minimal ELF image with a dynamic section.
pub(crate) struct ElfFixture {
    class: Class,
    byte_order: ByteOrder,
    machine: Machine,
    kind: BinaryKind,
    imports: Vec<String>,
    rpaths: Vec<String>,
    runpaths: Vec<String>,
}

impl ElfFixture {
    pub(crate) fn executable(machine: Machine) -> Self {
        Self::new(machine, BinaryKind::Executable)
    }

    pub(crate) fn library(machine: Machine) -> Self {
        Self::new(machine, BinaryKind::Library)
    }

    fn new(machine: Machine, kind: BinaryKind) -> Self {
        Self {
            class: Class::Elf64,
            byte_order: ByteOrder::LittleEndian,
            machine,
            kind,
            imports: Vec::new(),
            rpaths: Vec::new(),
            runpaths: Vec::new(),
        }
    }

    pub(crate) fn class(mut self, class: Class) -> Self {
        self.class = class;
        self
    }

    pub(crate) fn byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    pub(crate) fn import(mut self, name: &str) -> Self {
        self.imports.push(name.into());
        self
    }

    pub(crate) fn rpath(mut self, path: &str) -> Self {
        self.rpaths.push(path.into());
        self
    }

    pub(crate) fn runpath(mut self, path: &str) -> Self {
        self.runpaths.push(path.into());
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let class = self.class;
        let word = class.word_len();
        let header_len = match class {
            Class::Elf32 => 52,
            Class::Elf64 => 64,
        };

        // String table always starts with a NUL byte.
        let mut dynstr = vec![0_u8];
        let mut intern = |s: &str| -> u64 {
            let offset = dynstr.len() as u64;
            dynstr.extend_from_slice(s.as_bytes());
            dynstr.push(0);
            offset
        };
        let mut dynamic: Vec<(u64, u64)> = Vec::new();
        for import in &self.imports {
            dynamic.push((1, intern(import))); // DT_NEEDED
        }
        for rpath in &self.rpaths {
            dynamic.push((15, intern(rpath))); // DT_RPATH
        }
        for runpath in &self.runpaths {
            dynamic.push((0x1d, intern(runpath))); // DT_RUNPATH
        }
        dynamic.push((0, 0)); // DT_NULL

        let shstrtab: &[u8] = b"\0.dynstr\0.dynamic\0.shstrtab\0";
        let dynstr_offset = header_len;
        let dynamic_offset = align(dynstr_offset + dynstr.len(), 8);
        let dynamic_len = dynamic.len() * 2 * word;
        let shstrtab_offset = dynamic_offset + dynamic_len;
        let section_header_offset = align(shstrtab_offset + shstrtab.len(), 8);

        let mut w = Writer::new(self.byte_order);
        w.bytes(&crate::ELF_MAGIC);
        w.u8(class as u8);
        w.u8(self.byte_order as u8);
        w.u8(1); // EI_VERSION
        w.bytes(&[0_u8; 9]); // OS ABI, ABI version, padding
        w.u16(match self.kind {
            BinaryKind::Executable => 2,
            BinaryKind::Library => 3,
        });
        w.u16(self.machine.0 as u16);
        w.u32(1); // e_version
        w.word(class, 0); // entry point
        w.word(class, 0); // program header offset
        w.word(class, section_header_offset as u64);
        w.u32(0); // flags
        w.u16(header_len as u16);
        w.u16(0); // segment entry size
        w.u16(0); // segment count
        w.u16(class.section_len() as u16);
        w.u16(4); // section count
        w.u16(3); // section name table index
        w.pad_to(dynstr_offset);
        w.bytes(&dynstr);
        w.pad_to(dynamic_offset);
        for (tag, value) in dynamic {
            w.word(class, tag);
            w.word(class, value);
        }
        w.bytes(shstrtab);
        w.pad_to(section_header_offset);

        let mut section = |name: u32, kind: u32, offset: u64, size: u64| {
            w.u32(name);
            w.u32(kind);
            w.word(class, 0); // flags
            w.word(class, 0); // virtual address
            w.word(class, offset);
            w.word(class, size);
            w.u32(0); // link
            w.u32(0); // info
            w.word(class, 0); // alignment
            w.word(class, 0); // entry size
        };
        section(0, 0, 0, 0);
        section(1, 3, dynstr_offset as u64, dynstr.len() as u64); // .dynstr
        section(9, 6, dynamic_offset as u64, dynamic_len as u64); // .dynamic
        section(18, 3, shstrtab_offset as u64, shstrtab.len() as u64); // .shstrtab
        w.buf
    }
}

/// Builds a minimal 64-bit Mach-O image.
pub(crate) struct MachFixture {
    kind: BinaryKind,
    swapped: bool,
    imports: Vec<String>,
    rpaths: Vec<String>,
    install_name: Option<String>,
}

impl MachFixture {
    pub(crate) fn executable() -> Self {
        Self::new(BinaryKind::Executable)
    }

    pub(crate) fn library() -> Self {
        Self::new(BinaryKind::Library)
    }

    fn new(kind: BinaryKind) -> Self {
        Self {
            kind,
            swapped: false,
            imports: Vec::new(),
            rpaths: Vec::new(),
            install_name: None,
        }
    }

    pub(crate) fn byte_swapped(mut self) -> Self {
        self.swapped = true;
        self
    }

    pub(crate) fn import(mut self, path: &str) -> Self {
        self.imports.push(path.into());
        self
    }

    pub(crate) fn rpath(mut self, path: &str) -> Self {
        self.rpaths.push(path.into());
        self
    }

    pub(crate) fn install_name(mut self, path: &str) -> Self {
        self.install_name = Some(path.into());
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        const LC_LOAD_DYLIB: u32 = 0xc;
        const LC_ID_DYLIB: u32 = 0xd;
        const LC_RPATH: u32 = 0x8000_001c;

        let byte_order = if self.swapped {
            ByteOrder::native().swapped()
        } else {
            ByteOrder::native()
        };
        let mut commands = Writer::new(byte_order);
        let mut num_commands = 0_u32;
        let mut dylib_command = |cmd: u32, path: &str| {
            // Payload header: string offset, timestamp, two versions.
            let header_len = 24;
            let len = align(header_len + path.len() + 1, 8);
            commands.u32(cmd);
            commands.u32(len as u32);
            commands.u32(header_len as u32);
            commands.u32(0); // timestamp
            commands.u32(0); // current version
            commands.u32(0); // compatibility version
            let end = commands.buf.len() + len - header_len;
            commands.bytes(path.as_bytes());
            commands.u8(0);
            commands.pad_to(end);
            num_commands += 1;
        };
        if let Some(install_name) = &self.install_name {
            dylib_command(LC_ID_DYLIB, install_name);
        }
        for import in &self.imports {
            dylib_command(LC_LOAD_DYLIB, import);
        }
        for rpath in &self.rpaths {
            let header_len = 12;
            let len = align(header_len + rpath.len() + 1, 8);
            commands.u32(LC_RPATH);
            commands.u32(len as u32);
            commands.u32(header_len as u32);
            let end = commands.buf.len() + len - header_len;
            commands.bytes(rpath.as_bytes());
            commands.u8(0);
            commands.pad_to(end);
            num_commands += 1;
        }

        let mut w = Writer::new(byte_order);
        w.u32(0xfeed_facf); // MH_MAGIC_64
        w.u32(0x0100_0007); // CPU_TYPE_X86_64
        w.u32(3); // cpu subtype
        w.u32(match self.kind {
            BinaryKind::Executable => 0x2,
            BinaryKind::Library => 0x6,
        });
        w.u32(num_commands);
        w.u32(commands.buf.len() as u32);
        w.u32(0); // flags
        w.u32(0); // reserved
        w.bytes(&commands.buf);
        w.buf
    }
}

/// Builds a minimal PE image with an import directory.
pub(crate) struct PeFixture {
    is_64bit: bool,
    dll: bool,
    imports: Vec<String>,
}

impl PeFixture {
    pub(crate) fn executable() -> Self {
        Self {
            is_64bit: true,
            dll: false,
            imports: Vec::new(),
        }
    }

    pub(crate) fn library() -> Self {
        Self {
            dll: true,
            ..Self::executable()
        }
    }

    pub(crate) fn pe32(mut self) -> Self {
        self.is_64bit = false;
        self
    }

    pub(crate) fn import(mut self, name: &str) -> Self {
        self.imports.push(name.into());
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        const SECTION_RVA: u32 = 0x1000;

        // Optional header: standard + windows fields, then 16 data
        // directory entries.
        let optional_len: usize = if self.is_64bit { 112 + 128 } else { 96 + 128 };
        let pe_offset = 0x40_usize;
        let section_table_offset = pe_offset + 4 + 20 + optional_len;
        let raw_data_offset = align(section_table_offset + 40, 0x200);

        // Section payload: import directory entries, a zero terminator,
        // then the DLL name strings.
        let mut names = Writer::new(ByteOrder::LittleEndian);
        let names_start = (self.imports.len() + 1) * 20;
        let mut name_rvas = Vec::new();
        for name in &self.imports {
            name_rvas.push(SECTION_RVA + (names_start + names.buf.len()) as u32);
            names.bytes(name.as_bytes());
            names.u8(0);
        }
        let mut payload = Writer::new(ByteOrder::LittleEndian);
        for rva in &name_rvas {
            payload.u32(0); // import lookup table
            payload.u32(0); // timestamp
            payload.u32(0); // forwarder chain
            payload.u32(*rva);
            payload.u32(0); // import address table
        }
        payload.bytes(&[0_u8; 20]); // terminator
        payload.bytes(&names.buf);

        let mut w = Writer::new(ByteOrder::LittleEndian);
        w.bytes(b"MZ");
        w.pad_to(0x3c);
        w.u32(pe_offset as u32);
        w.bytes(b"PE\0\0");
        w.u16(if self.is_64bit { 0x8664 } else { 0x14c });
        w.u16(1); // section count
        w.u32(0); // timestamp
        w.u32(0); // symbol table offset
        w.u32(0); // symbol count
        w.u16(optional_len as u16);
        w.u16(if self.dll { 0x2002 } else { 0x0002 }); // characteristics
        let optional_start = w.buf.len();
        w.u16(if self.is_64bit { 0x020b } else { 0x010b });
        // Entry [1] of the data directory is the import table.
        let directory_offset = optional_start + if self.is_64bit { 112 } else { 96 } + 8;
        w.pad_to(directory_offset);
        w.u32(SECTION_RVA);
        w.u32((names_start + names.buf.len()) as u32);
        w.pad_to(section_table_offset);
        w.bytes(b".idata\0\0");
        w.u32(payload.buf.len() as u32); // virtual size
        w.u32(SECTION_RVA);
        w.u32(payload.buf.len() as u32); // raw data size
        w.u32(raw_data_offset as u32);
        w.bytes(&[0_u8; 16]);
        w.pad_to(raw_data_offset);
        w.bytes(&payload.buf);
        w.buf
    }
}
