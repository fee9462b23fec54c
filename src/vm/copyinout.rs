/*!
 * User Memory Copy Primitives
 *
 * Move bytes between kernel buffers and user addresses. Bad user ranges
 * surface as `BadAddress` (EFAULT) instead of faulting the kernel.
 */

use super::addrspace::AddrSpace;
use crate::core::errors::KernelError;
use crate::core::limits::USER_WORD_SIZE;
use crate::core::types::{KernelResult, Vaddr};

/// Copy `dst.len()` bytes from user address `src`
#[inline]
pub fn copyin(space: &AddrSpace, src: Vaddr, dst: &mut [u8]) -> KernelResult<()> {
    space.read(src, dst)
}

/// Copy `src` to user address `dst`
#[inline]
pub fn copyout(space: &mut AddrSpace, src: &[u8], dst: Vaddr) -> KernelResult<()> {
    space.write(dst, src)
}

/// Copy a NUL-terminated user string into `buf`, terminator included.
///
/// Returns the number of bytes written, terminator included. Fails with
/// `NameTooLong` if no terminator appears within `buf.len()` bytes.
pub fn copyinstr(space: &AddrSpace, src: Vaddr, buf: &mut [u8]) -> KernelResult<usize> {
    let mut addr = src;
    let mut done = 0;
    while done < buf.len() {
        let chunk = space.bytes_at(addr).ok_or(KernelError::BadAddress(addr))?;
        let window = &chunk[..chunk.len().min(buf.len() - done)];
        if let Some(nul) = window.iter().position(|&b| b == 0) {
            buf[done..=done + nul].copy_from_slice(&window[..=nul]);
            return Ok(done + nul + 1);
        }
        buf[done..done + window.len()].copy_from_slice(window);
        done += window.len();
        addr = addr
            .checked_add(window.len() as Vaddr)
            .ok_or(KernelError::BadAddress(src))?;
    }
    Err(KernelError::NameTooLong {
        addr: src,
        limit: buf.len(),
    })
}

/// Copy a NUL-terminated user string of at most `maxlen` bytes (terminator
/// included) into an owned buffer, terminator stripped
pub fn copyinstr_owned(space: &AddrSpace, src: Vaddr, maxlen: usize) -> KernelResult<Vec<u8>> {
    let mut buf = vec![0u8; maxlen];
    let len = copyinstr(space, src, &mut buf)?;
    buf.truncate(len - 1);
    Ok(buf)
}

/// Copy `s` plus a terminator to user address `dst`; returns bytes written
pub fn copyoutstr(space: &mut AddrSpace, s: &[u8], dst: Vaddr) -> KernelResult<usize> {
    let mut bytes = Vec::with_capacity(s.len() + 1);
    bytes.extend_from_slice(s);
    bytes.push(0);
    space.write(dst, &bytes)?;
    Ok(bytes.len())
}

/// Read one user pointer-sized word (target byte order)
pub fn copyin_word(space: &AddrSpace, src: Vaddr) -> KernelResult<Vaddr> {
    let mut raw = [0u8; USER_WORD_SIZE];
    space.read(src, &mut raw)?;
    Ok(Vaddr::from_be_bytes(raw))
}

/// Write one user pointer-sized word (target byte order)
pub fn copyout_word(space: &mut AddrSpace, word: Vaddr, dst: Vaddr) -> KernelResult<()> {
    space.write(dst, &word.to_be_bytes())
}
