/*!
 * Executable Image Builder
 * Produces ELF32 big-endian MIPS executables accepted by `load_elf`
 */

use super::elf::{
    EHDR_SIZE, ELFCLASS32, ELFDATA2MSB, ELF_MAGIC, EM_MIPS, ET_EXEC, EV_CURRENT, PHDR_SIZE, PT_LOAD,
};
use crate::core::types::Vaddr;
use bytes::BufMut;

#[derive(Debug, Clone)]
struct Segment {
    vaddr: Vaddr,
    data: Vec<u8>,
    memsz: u32,
    flags: u32,
}

/// Builder for executable images
#[derive(Debug, Clone)]
pub struct ElfBuilder {
    entry: Vaddr,
    segments: Vec<Segment>,
}

impl ElfBuilder {
    pub fn new(entry: Vaddr) -> Self {
        Self {
            entry,
            segments: Vec::new(),
        }
    }

    /// Add a loadable segment whose memory size equals its file contents
    #[must_use]
    pub fn segment(mut self, vaddr: Vaddr, data: Vec<u8>, flags: u32) -> Self {
        let memsz = data.len() as u32;
        self.segments.push(Segment {
            vaddr,
            data,
            memsz,
            flags,
        });
        self
    }

    /// Add a zero-filled segment with no file contents
    #[must_use]
    pub fn bss(mut self, vaddr: Vaddr, memsz: u32, flags: u32) -> Self {
        self.segments.push(Segment {
            vaddr,
            data: Vec::new(),
            memsz,
            flags,
        });
        self
    }

    /// Serialize the image
    pub fn build(&self) -> Vec<u8> {
        let phnum = self.segments.len();
        let data_len: usize = self.segments.iter().map(|s| s.data.len()).sum();
        let mut out = Vec::with_capacity(EHDR_SIZE + phnum * PHDR_SIZE + data_len);

        // e_ident
        out.put_slice(&ELF_MAGIC);
        out.put_u8(ELFCLASS32);
        out.put_u8(ELFDATA2MSB);
        out.put_u8(EV_CURRENT);
        out.put_bytes(0, 9);

        out.put_u16(ET_EXEC);
        out.put_u16(EM_MIPS);
        out.put_u32(EV_CURRENT as u32);
        out.put_u32(self.entry);
        out.put_u32(EHDR_SIZE as u32); // e_phoff
        out.put_u32(0); // e_shoff
        out.put_u32(0); // e_flags
        out.put_u16(EHDR_SIZE as u16);
        out.put_u16(PHDR_SIZE as u16);
        out.put_u16(phnum as u16);
        out.put_u16(0); // e_shentsize
        out.put_u16(0); // e_shnum
        out.put_u16(0); // e_shstrndx

        let mut offset = (EHDR_SIZE + phnum * PHDR_SIZE) as u32;
        for seg in &self.segments {
            out.put_u32(PT_LOAD);
            out.put_u32(offset);
            out.put_u32(seg.vaddr);
            out.put_u32(seg.vaddr); // p_paddr
            out.put_u32(seg.data.len() as u32);
            out.put_u32(seg.memsz);
            out.put_u32(seg.flags);
            out.put_u32(0x1000); // p_align
            offset += seg.data.len() as u32;
        }

        for seg in &self.segments {
            out.put_slice(&seg.data);
        }
        out
    }
}
