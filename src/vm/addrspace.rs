/*!
 * Address Spaces
 *
 * A process's user virtual memory: a set of page-aligned regions backed by
 * frames from the coremap. Dropping an address space destroys it and
 * returns its frames.
 *
 * Each kernel thread plays the role of a CPU; `activate` makes a space the
 * one the calling thread translates user addresses against.
 */

use super::coremap::Coremap;
use crate::core::errors::KernelError;
use crate::core::limits::{PAGE_SIZE, USERSTACK, USER_STACK_PAGES};
use crate::core::types::{KernelResult, Vaddr};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::trace;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    // Address space currently active on this thread
    static ACTIVE: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Region access permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionPerms {
    pub read: bool,
    pub write: bool,
    pub exec: bool,
}

impl RegionPerms {
    pub const READ_ONLY: Self = Self::new(true, false, false);
    pub const READ_WRITE: Self = Self::new(true, true, false);
    pub const READ_EXEC: Self = Self::new(true, false, true);

    pub const fn new(read: bool, write: bool, exec: bool) -> Self {
        Self { read, write, exec }
    }
}

#[derive(Debug, Clone)]
struct Region {
    base: Vaddr,
    data: Vec<u8>,
    perms: RegionPerms,
}

impl Region {
    #[inline]
    fn end(&self) -> u64 {
        self.base as u64 + self.data.len() as u64
    }

    #[inline]
    fn contains(&self, vaddr: Vaddr) -> bool {
        vaddr >= self.base && (vaddr as u64) < self.end()
    }

    #[inline]
    fn pages(&self) -> usize {
        self.data.len() / PAGE_SIZE
    }
}

/// User address space
#[derive(Debug)]
pub struct AddrSpace {
    id: u64,
    regions: Vec<Region>,
    coremap: Arc<Coremap>,
    frames: usize,
}

impl AddrSpace {
    /// Create an empty address space (one frame for the page directory)
    pub fn create(coremap: &Arc<Coremap>) -> KernelResult<Self> {
        coremap.reserve(1)?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(asid = id, "Address space created");
        Ok(Self {
            id,
            regions: Vec::new(),
            coremap: Arc::clone(coremap),
            frames: 1,
        })
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Frames held by this address space
    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Define a zero-filled region covering `[vaddr, vaddr + size)`, rounded
    /// out to page boundaries
    pub fn define_region(&mut self, vaddr: Vaddr, size: usize, perms: RegionPerms) -> KernelResult<()> {
        let page = PAGE_SIZE as u64;
        let base = (vaddr as u64) & !(page - 1);
        let end = (vaddr as u64 + size as u64 + page - 1) & !(page - 1);

        if size == 0 || end > USERSTACK as u64 {
            return Err(KernelError::invalid_argument(format!(
                "region {:#x}+{:#x} outside user space",
                vaddr, size
            )));
        }
        if self
            .regions
            .iter()
            .any(|r| base < r.end() && (r.base as u64) < end)
        {
            return Err(KernelError::invalid_argument(format!(
                "region {:#x}+{:#x} overlaps an existing region",
                vaddr, size
            )));
        }

        let len = (end - base) as usize;
        self.coremap.reserve(len / PAGE_SIZE)?;
        self.frames += len / PAGE_SIZE;
        self.regions.push(Region {
            base: base as Vaddr,
            data: vec![0; len],
            perms,
        });
        Ok(())
    }

    /// Define the user stack region and return the initial stack pointer
    pub fn define_stack(&mut self) -> KernelResult<Vaddr> {
        let size = USER_STACK_PAGES * PAGE_SIZE;
        self.define_region(USERSTACK - size as Vaddr, size, RegionPerms::READ_WRITE)?;
        Ok(USERSTACK)
    }

    /// Deep copy into a new address space with its own frames
    pub fn copy(&self) -> KernelResult<Self> {
        self.coremap.reserve(self.frames)?;
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        trace!(from = self.id, to = id, frames = self.frames, "Address space copied");
        Ok(Self {
            id,
            regions: self.regions.clone(),
            coremap: Arc::clone(&self.coremap),
            frames: self.frames,
        })
    }

    /// Make this the address space the calling thread translates against
    pub fn activate(&self) {
        ACTIVE.with(|active| active.set(Some(self.id)));
    }

    /// Stop translating against this address space on the calling thread
    pub fn deactivate(&self) {
        ACTIVE.with(|active| {
            if active.get() == Some(self.id) {
                active.set(None);
            }
        });
    }

    /// True if this address space is active on the calling thread
    pub fn is_active(&self) -> bool {
        ACTIVE.with(|active| active.get() == Some(self.id))
    }

    /// Copy bytes out of user memory
    pub fn read(&self, vaddr: Vaddr, buf: &mut [u8]) -> KernelResult<()> {
        let mut addr = vaddr;
        let mut done = 0;
        while done < buf.len() {
            let chunk = self.bytes_at(addr).ok_or(KernelError::BadAddress(addr))?;
            let n = chunk.len().min(buf.len() - done);
            buf[done..done + n].copy_from_slice(&chunk[..n]);
            done += n;
            addr = addr.checked_add(n as Vaddr).ok_or(KernelError::BadAddress(vaddr))?;
        }
        Ok(())
    }

    /// Copy bytes into user memory; fails on read-only or unmapped pages
    pub fn write(&mut self, vaddr: Vaddr, data: &[u8]) -> KernelResult<()> {
        self.write_checked(vaddr, data, true)
    }

    /// Kernel-privileged write used while loading segments
    pub(crate) fn load(&mut self, vaddr: Vaddr, data: &[u8]) -> KernelResult<()> {
        self.write_checked(vaddr, data, false)
    }

    /// Remaining bytes of the region containing `vaddr`, starting at `vaddr`
    pub(crate) fn bytes_at(&self, vaddr: Vaddr) -> Option<&[u8]> {
        self.regions
            .iter()
            .find(|r| r.contains(vaddr))
            .map(|r| &r.data[(vaddr - r.base) as usize..])
    }

    fn write_checked(&mut self, vaddr: Vaddr, data: &[u8], enforce_perms: bool) -> KernelResult<()> {
        // Validate the whole range before touching memory
        let mut addr = vaddr as u64;
        let end = vaddr as u64 + data.len() as u64;
        while addr < end {
            let region = self
                .regions
                .iter()
                .find(|r| addr <= Vaddr::MAX as u64 && r.contains(addr as Vaddr))
                .ok_or(KernelError::BadAddress(addr as Vaddr))?;
            if enforce_perms && !region.perms.write {
                return Err(KernelError::BadAddress(addr as Vaddr));
            }
            addr = region.end();
        }

        let mut addr = vaddr;
        let mut done = 0;
        while done < data.len() {
            let region = self
                .regions
                .iter_mut()
                .find(|r| r.contains(addr))
                .ok_or(KernelError::BadAddress(addr))?;
            let offset = (addr - region.base) as usize;
            let n = (region.data.len() - offset).min(data.len() - done);
            region.data[offset..offset + n].copy_from_slice(&data[done..done + n]);
            done += n;
            addr = addr.wrapping_add(n as Vaddr);
        }
        Ok(())
    }
}

impl Drop for AddrSpace {
    fn drop(&mut self) {
        if self.is_active() && !std::thread::panicking() {
            panic!("destroying address space {} while it is active", self.id);
        }
        let pages: usize = self.regions.iter().map(Region::pages).sum();
        debug_assert_eq!(pages + 1, self.frames);
        self.coremap.release(self.frames);
        trace!(asid = self.id, frames = self.frames, "Address space destroyed");
    }
}
