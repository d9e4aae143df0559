//! On-disk binary fixtures for the engine tests.
//!
//! Minimal but structurally correct images: 64-bit little-endian ELF with a
//! dynamic section, 64-bit Mach-O with load commands, PE32+ with an import
//! directory.

#![allow(clippy::unwrap_used)]
#![allow(dead_code)]

use std::path::Path;

fn align(offset: usize, to: usize) -> usize {
    offset.div_ceil(to) * to
}

fn pad_to(buf: &mut Vec<u8>, offset: usize) {
    assert!(buf.len() <= offset);
    buf.resize(offset, 0);
}

/// Write a 64-bit little-endian ELF with the given dynamic entries.
pub fn write_elf(
    path: &Path,
    machine: u16,
    executable: bool,
    imports: &[&str],
    rpaths: &[&str],
    runpaths: &[&str],
) {
    let mut dynstr = vec![0_u8];
    let mut intern = |s: &str| -> u64 {
        let offset = dynstr.len() as u64;
        dynstr.extend_from_slice(s.as_bytes());
        dynstr.push(0);
        offset
    };
    let mut dynamic: Vec<(u64, u64)> = Vec::new();
    for import in imports {
        dynamic.push((1, intern(import))); // DT_NEEDED
    }
    for rpath in rpaths {
        dynamic.push((15, intern(rpath))); // DT_RPATH
    }
    for runpath in runpaths {
        dynamic.push((0x1d, intern(runpath))); // DT_RUNPATH
    }
    dynamic.push((0, 0)); // DT_NULL

    let shstrtab: &[u8] = b"\0.dynstr\0.dynamic\0.shstrtab\0";
    let header_len = 64;
    let dynstr_offset = header_len;
    let dynamic_offset = align(dynstr_offset + dynstr.len(), 8);
    let dynamic_len = dynamic.len() * 16;
    let shstrtab_offset = dynamic_offset + dynamic_len;
    let section_header_offset = align(shstrtab_offset + shstrtab.len(), 8);

    let mut buf = Vec::new();
    buf.extend_from_slice(&[0x7f, b'E', b'L', b'F']);
    buf.push(2); // 64-bit
    buf.push(1); // little-endian
    buf.push(1); // version
    buf.extend_from_slice(&[0_u8; 9]);
    buf.extend_from_slice(&u16::to_le_bytes(if executable { 2 } else { 3 }));
    buf.extend_from_slice(&machine.to_le_bytes());
    buf.extend_from_slice(&1_u32.to_le_bytes()); // version
    buf.extend_from_slice(&0_u64.to_le_bytes()); // entry point
    buf.extend_from_slice(&0_u64.to_le_bytes()); // program header offset
    buf.extend_from_slice(&(section_header_offset as u64).to_le_bytes());
    buf.extend_from_slice(&0_u32.to_le_bytes()); // flags
    buf.extend_from_slice(&64_u16.to_le_bytes()); // header size
    buf.extend_from_slice(&0_u16.to_le_bytes()); // segment entry size
    buf.extend_from_slice(&0_u16.to_le_bytes()); // segment count
    buf.extend_from_slice(&64_u16.to_le_bytes()); // section entry size
    buf.extend_from_slice(&4_u16.to_le_bytes()); // section count
    buf.extend_from_slice(&3_u16.to_le_bytes()); // section name table index
    pad_to(&mut buf, dynstr_offset);
    buf.extend_from_slice(&dynstr);
    pad_to(&mut buf, dynamic_offset);
    for (tag, value) in dynamic {
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf.extend_from_slice(shstrtab);
    pad_to(&mut buf, section_header_offset);
    let mut section = |name: u32, kind: u32, offset: u64, size: u64| {
        buf.extend_from_slice(&name.to_le_bytes());
        buf.extend_from_slice(&kind.to_le_bytes());
        buf.extend_from_slice(&[0_u8; 16]); // flags, virtual address
        buf.extend_from_slice(&offset.to_le_bytes());
        buf.extend_from_slice(&size.to_le_bytes());
        buf.extend_from_slice(&[0_u8; 24]); // link, info, align, entry size
    };
    section(0, 0, 0, 0);
    section(1, 3, dynstr_offset as u64, dynstr.len() as u64); // .dynstr
    section(9, 6, dynamic_offset as u64, dynamic_len as u64); // .dynamic
    section(18, 3, shstrtab_offset as u64, shstrtab.len() as u64); // .shstrtab

    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, buf).unwrap();
}

/// Write a 64-bit native-endian Mach-O with the given load commands.
pub fn write_macho(
    path: &Path,
    executable: bool,
    imports: &[&str],
    rpaths: &[&str],
    install_name: Option<&str>,
) {
    const LC_LOAD_DYLIB: u32 = 0xc;
    const LC_ID_DYLIB: u32 = 0xd;
    const LC_RPATH: u32 = 0x8000_001c;

    let mut commands = Vec::new();
    let mut num_commands = 0_u32;
    let mut dylib_command = |cmd: u32, s: &str| {
        let header_len = 24;
        let len = align(header_len + s.len() + 1, 8);
        commands.extend_from_slice(&cmd.to_ne_bytes());
        commands.extend_from_slice(&(len as u32).to_ne_bytes());
        commands.extend_from_slice(&(header_len as u32).to_ne_bytes());
        commands.extend_from_slice(&[0_u8; 12]); // timestamp, versions
        let end = commands.len() + len - header_len;
        commands.extend_from_slice(s.as_bytes());
        commands.push(0);
        commands.resize(end, 0);
        num_commands += 1;
    };
    if let Some(install_name) = install_name {
        dylib_command(LC_ID_DYLIB, install_name);
    }
    for import in imports {
        dylib_command(LC_LOAD_DYLIB, import);
    }
    for rpath in rpaths {
        let header_len = 12;
        let len = align(header_len + rpath.len() + 1, 8);
        commands.extend_from_slice(&LC_RPATH.to_ne_bytes());
        commands.extend_from_slice(&(len as u32).to_ne_bytes());
        commands.extend_from_slice(&(header_len as u32).to_ne_bytes());
        let end = commands.len() + len - header_len;
        commands.extend_from_slice(rpath.as_bytes());
        commands.push(0);
        commands.resize(end, 0);
        num_commands += 1;
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(&0xfeed_facf_u32.to_ne_bytes()); // MH_MAGIC_64
    buf.extend_from_slice(&0x0100_0007_u32.to_ne_bytes()); // CPU_TYPE_X86_64
    buf.extend_from_slice(&3_u32.to_ne_bytes()); // cpu subtype
    buf.extend_from_slice(&if executable { 2_u32 } else { 6_u32 }.to_ne_bytes());
    buf.extend_from_slice(&num_commands.to_ne_bytes());
    buf.extend_from_slice(&(commands.len() as u32).to_ne_bytes());
    buf.extend_from_slice(&[0_u8; 8]); // flags, reserved
    buf.extend_from_slice(&commands);

    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, buf).unwrap();
}

/// Write a PE32+ image with the given import directory.
pub fn write_pe(path: &Path, dll: bool, imports: &[&str]) {
    const SECTION_RVA: u32 = 0x1000;

    let optional_len = 112 + 128;
    let pe_offset = 0x40_usize;
    let section_table_offset = pe_offset + 4 + 20 + optional_len;
    let raw_data_offset = align(section_table_offset + 40, 0x200);

    let mut names = Vec::new();
    let names_start = (imports.len() + 1) * 20;
    let mut name_rvas = Vec::new();
    for name in imports {
        name_rvas.push(SECTION_RVA + (names_start + names.len()) as u32);
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }
    let mut payload = Vec::new();
    for rva in &name_rvas {
        payload.extend_from_slice(&[0_u8; 12]); // lookup table, timestamp, forwarder
        payload.extend_from_slice(&rva.to_le_bytes());
        payload.extend_from_slice(&[0_u8; 4]); // import address table
    }
    payload.extend_from_slice(&[0_u8; 20]); // terminator
    payload.extend_from_slice(&names);

    let mut buf = Vec::new();
    buf.extend_from_slice(b"MZ");
    pad_to(&mut buf, 0x3c);
    buf.extend_from_slice(&(pe_offset as u32).to_le_bytes());
    buf.extend_from_slice(b"PE\0\0");
    buf.extend_from_slice(&0x8664_u16.to_le_bytes());
    buf.extend_from_slice(&1_u16.to_le_bytes()); // section count
    buf.extend_from_slice(&[0_u8; 12]); // timestamp, symbol table
    buf.extend_from_slice(&(optional_len as u16).to_le_bytes());
    buf.extend_from_slice(&if dll { 0x2002_u16 } else { 0x0002_u16 }.to_le_bytes());
    let optional_start = buf.len();
    buf.extend_from_slice(&0x020b_u16.to_le_bytes());
    pad_to(&mut buf, optional_start + 112 + 8);
    buf.extend_from_slice(&SECTION_RVA.to_le_bytes());
    buf.extend_from_slice(&((names_start + names.len()) as u32).to_le_bytes());
    pad_to(&mut buf, section_table_offset);
    buf.extend_from_slice(b".idata\0\0");
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // virtual size
    buf.extend_from_slice(&SECTION_RVA.to_le_bytes());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes()); // raw size
    buf.extend_from_slice(&(raw_data_offset as u32).to_le_bytes());
    buf.extend_from_slice(&[0_u8; 16]);
    pad_to(&mut buf, raw_data_offset);
    buf.extend_from_slice(&payload);

    fs_err::create_dir_all(path.parent().unwrap()).unwrap();
    fs_err::write(path, buf).unwrap();
}

/// `EM_X86_64`.
pub const MACHINE_X86_64: u16 = 62;
/// `EM_AARCH64`.
pub const MACHINE_AARCH64: u16 = 183;
