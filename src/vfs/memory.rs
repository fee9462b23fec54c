/*!
 * In-Memory Filesystem Backend
 * Volatile filesystem holding program images for the kernel
 */

use ahash::RandomState;
use bytes::Bytes;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::traits::{FileSystem, Vnode};
use super::types::{VfsError, VfsResult};

/// In-memory filesystem node
#[derive(Debug, Clone)]
enum Node {
    File(Bytes),
    Directory,
}

/// In-memory filesystem implementation
#[derive(Debug, Clone)]
pub struct MemFs {
    nodes: Arc<DashMap<PathBuf, Node, RandomState>>,
    open_handles: Arc<AtomicUsize>,
}

impl MemFs {
    /// Create new in-memory filesystem with an empty root directory
    pub fn new() -> Self {
        let nodes = DashMap::with_hasher(RandomState::new());
        nodes.insert(PathBuf::from("/"), Node::Directory);

        Self {
            nodes: Arc::new(nodes),
            open_handles: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of vnodes currently open
    pub fn open_count(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    /// Create a directory and any missing parents
    pub fn create_dir_all(&self, path: &str) -> VfsResult<()> {
        let path = Self::normalize(path)?;
        self.ensure_dirs(&path)
    }

    /// Normalize path (make absolute and clean)
    fn normalize(path: &str) -> VfsResult<PathBuf> {
        if path.is_empty() {
            return Err(VfsError::InvalidPath("empty path".into()));
        }
        let path = Path::new(path);
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            Path::new("/").join(path)
        };

        // Handles ., .., and repeated separators
        Ok(PathBuf::from(path_clean::clean(&path)))
    }

    fn ensure_dirs(&self, dir: &Path) -> VfsResult<()> {
        for ancestor in dir.ancestors().collect::<Vec<_>>().into_iter().rev() {
            match self.nodes.get(ancestor).map(|n| n.value().clone()) {
                Some(Node::Directory) => {}
                Some(Node::File(_)) => {
                    return Err(VfsError::NotADirectory(ancestor.display().to_string()))
                }
                None => {
                    self.nodes.insert(ancestor.to_path_buf(), Node::Directory);
                }
            }
        }
        Ok(())
    }
}

impl Default for MemFs {
    fn default() -> Self {
        Self::new()
    }
}

impl FileSystem for MemFs {
    fn open(&self, path: &str) -> VfsResult<Box<dyn Vnode>> {
        let path = Self::normalize(path)?;

        match self.nodes.get(&path).map(|n| n.value().clone()) {
            Some(Node::File(data)) => {
                self.open_handles.fetch_add(1, Ordering::SeqCst);
                debug!(path = %path.display(), size = data.len(), "Opened vnode");
                Ok(Box::new(MemVnode {
                    data,
                    open_handles: Arc::clone(&self.open_handles),
                }))
            }
            Some(Node::Directory) => Err(VfsError::IsADirectory(path.display().to_string())),
            None => Err(VfsError::NotFound(path.display().to_string())),
        }
    }

    fn write(&self, path: &str, data: &[u8]) -> VfsResult<()> {
        let path = Self::normalize(path)?;
        if let Some(parent) = path.parent() {
            self.ensure_dirs(parent)?;
        }
        if matches!(self.nodes.get(&path).map(|n| n.value().clone()), Some(Node::Directory)) {
            return Err(VfsError::IsADirectory(path.display().to_string()));
        }
        self.nodes
            .insert(path, Node::File(Bytes::copy_from_slice(data)));
        Ok(())
    }
}

/// Open handle on an in-memory file; closing is dropping
struct MemVnode {
    data: Bytes,
    open_handles: Arc<AtomicUsize>,
}

impl Vnode for MemVnode {
    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let len = self.data.len() as u64;
        if offset >= len {
            return Ok(0);
        }
        let start = offset as usize;
        let n = buf.len().min(self.data.len() - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        Ok(n)
    }
}

impl Drop for MemVnode {
    fn drop(&mut self) {
        self.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}
