/*!
 * VFS Traits
 * Filesystem abstraction consumed by program loading
 */

use super::types::VfsResult;

/// Virtual filesystem trait
///
/// Paths are absolute or relative to `/`; implementations normalize them.
pub trait FileSystem: Send + Sync {
    /// Open a regular file for reading. Dropping the handle closes it.
    fn open(&self, path: &str) -> VfsResult<Box<dyn Vnode>>;

    /// Write entire file contents (create or overwrite)
    fn write(&self, path: &str, data: &[u8]) -> VfsResult<()>;
}

/// Open file handle
pub trait Vnode: Send + Sync {
    /// File size in bytes
    fn size(&self) -> u64;

    /// Read up to `buf.len()` bytes at `offset`; returns bytes read (0 at EOF)
    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    /// Read exactly `buf.len()` bytes at `offset`
    fn read_exact_at(&self, mut offset: u64, mut buf: &mut [u8]) -> VfsResult<()> {
        while !buf.is_empty() {
            let n = self.read_at(offset, buf)?;
            if n == 0 {
                return Err(super::VfsError::IoError(format!(
                    "short read at offset {}",
                    offset
                )));
            }
            offset += n as u64;
            buf = &mut buf[n..];
        }
        Ok(())
    }
}
