/*!
 * ELF Loader
 *
 * Loads 32-bit big-endian MIPS executables into an address space. Two
 * passes over the program headers: define every loadable region first,
 * then copy file contents in, so a bad header leaves nothing half-loaded.
 */

use crate::core::types::{KernelResult, Vaddr};
use crate::vfs::{VfsError, Vnode};
use crate::vm::{AddrSpace, RegionPerms};
use bytes::Buf;
use thiserror::Error;
use tracing::debug;

pub const ELF_MAGIC: [u8; 4] = [0x7f, b'E', b'L', b'F'];
pub const ELFCLASS32: u8 = 1;
pub const ELFDATA2MSB: u8 = 2;
pub const EV_CURRENT: u8 = 1;
pub const ET_EXEC: u16 = 2;
pub const EM_MIPS: u16 = 8;

pub const EHDR_SIZE: usize = 52;
pub const PHDR_SIZE: usize = 32;

pub const PT_NULL: u32 = 0;
pub const PT_LOAD: u32 = 1;
pub const PT_PHDR: u32 = 6;
pub const PT_MIPS_REGINFO: u32 = 0x7000_0000;

pub const PF_X: u32 = 0x1;
pub const PF_W: u32 = 0x2;
pub const PF_R: u32 = 0x4;

/// Executable format errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElfError {
    #[error("Image truncated: {0}")]
    Truncated(&'static str),

    #[error("Bad ELF magic")]
    BadMagic,

    #[error("Not a 32-bit big-endian ELF image")]
    WrongFormat,

    #[error("Not a MIPS image (e_machine {0})")]
    WrongMachine(u16),

    #[error("Not an executable (e_type {0})")]
    NotExecutable(u16),

    #[error("Unsupported segment type {0:#x}")]
    UnsupportedSegment(u32),

    #[error("Segment at {vaddr:#x}: file size {filesz:#x} exceeds memory size {memsz:#x}")]
    SegmentSize { vaddr: Vaddr, filesz: u32, memsz: u32 },
}

/// ELF file header fields the loader uses
#[derive(Debug, Clone, Copy)]
struct FileHeader {
    entry: Vaddr,
    phoff: u32,
    phentsize: u16,
    phnum: u16,
}

/// ELF program header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramHeader {
    pub p_type: u32,
    pub offset: u32,
    pub vaddr: Vaddr,
    pub filesz: u32,
    pub memsz: u32,
    pub flags: u32,
}

impl ProgramHeader {
    fn perms(&self) -> RegionPerms {
        RegionPerms::new(
            self.flags & PF_R != 0,
            self.flags & PF_W != 0,
            self.flags & PF_X != 0,
        )
    }
}

fn parse_header(mut raw: &[u8]) -> Result<FileHeader, ElfError> {
    if raw.len() < EHDR_SIZE {
        return Err(ElfError::Truncated("file header"));
    }
    let mut ident = [0u8; 16];
    raw.copy_to_slice(&mut ident);
    if ident[..4] != ELF_MAGIC {
        return Err(ElfError::BadMagic);
    }
    if ident[4] != ELFCLASS32 || ident[5] != ELFDATA2MSB || ident[6] != EV_CURRENT {
        return Err(ElfError::WrongFormat);
    }

    let e_type = raw.get_u16();
    let e_machine = raw.get_u16();
    let _e_version = raw.get_u32();
    let entry = raw.get_u32();
    let phoff = raw.get_u32();
    let _e_shoff = raw.get_u32();
    let _e_flags = raw.get_u32();
    let _e_ehsize = raw.get_u16();
    let phentsize = raw.get_u16();
    let phnum = raw.get_u16();

    if e_type != ET_EXEC {
        return Err(ElfError::NotExecutable(e_type));
    }
    if e_machine != EM_MIPS {
        return Err(ElfError::WrongMachine(e_machine));
    }
    if phentsize as usize != PHDR_SIZE && phnum != 0 {
        return Err(ElfError::WrongFormat);
    }

    Ok(FileHeader {
        entry,
        phoff,
        phentsize,
        phnum,
    })
}

fn parse_program_header(mut raw: &[u8]) -> ProgramHeader {
    let p_type = raw.get_u32();
    let offset = raw.get_u32();
    let vaddr = raw.get_u32();
    let _paddr = raw.get_u32();
    let filesz = raw.get_u32();
    let memsz = raw.get_u32();
    let flags = raw.get_u32();
    ProgramHeader {
        p_type,
        offset,
        vaddr,
        filesz,
        memsz,
        flags,
    }
}

/// Read the program header table of an open image
pub fn program_headers(vnode: &dyn Vnode) -> KernelResult<(Vaddr, Vec<ProgramHeader>)> {
    let size = vnode.size();
    if size < EHDR_SIZE as u64 {
        return Err(ElfError::Truncated("file header").into());
    }
    let mut raw = [0u8; EHDR_SIZE];
    vnode.read_exact_at(0, &mut raw)?;
    let header = parse_header(&raw)?;

    let table_len = header.phnum as u64 * header.phentsize as u64;
    if header.phoff as u64 + table_len > size {
        return Err(ElfError::Truncated("program header table").into());
    }

    let mut table = vec![0u8; table_len as usize];
    vnode.read_exact_at(header.phoff as u64, &mut table)?;
    let headers = table.chunks_exact(PHDR_SIZE).map(parse_program_header).collect();
    Ok((header.entry, headers))
}

/// Load an executable into `space`; returns the entry point
pub fn load_elf(vnode: &dyn Vnode, space: &mut AddrSpace) -> KernelResult<Vaddr> {
    let (entry, headers) = program_headers(vnode)?;
    let size = vnode.size();

    for ph in &headers {
        match ph.p_type {
            PT_NULL | PT_PHDR | PT_MIPS_REGINFO => continue,
            PT_LOAD => {}
            other => return Err(ElfError::UnsupportedSegment(other).into()),
        }
        if ph.filesz > ph.memsz {
            return Err(ElfError::SegmentSize {
                vaddr: ph.vaddr,
                filesz: ph.filesz,
                memsz: ph.memsz,
            }
            .into());
        }
        if ph.offset as u64 + ph.filesz as u64 > size {
            return Err(ElfError::Truncated("segment data").into());
        }
        if ph.memsz > 0 {
            space.define_region(ph.vaddr, ph.memsz as usize, ph.perms())?;
        }
    }

    for ph in headers.iter().filter(|ph| ph.p_type == PT_LOAD && ph.filesz > 0) {
        let mut data = vec![0u8; ph.filesz as usize];
        vnode
            .read_exact_at(ph.offset as u64, &mut data)
            .map_err(|e| match e {
                VfsError::IoError(_) => VfsError::IoError(format!(
                    "short read in segment at {:#x}",
                    ph.vaddr
                )),
                other => other,
            })?;
        space.load(ph.vaddr, &data)?;
        debug!(vaddr = ph.vaddr, filesz = ph.filesz, memsz = ph.memsz, "Loaded segment");
    }

    Ok(entry)
}
