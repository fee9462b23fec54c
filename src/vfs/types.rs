/*!
 * VFS Error Types
 * Structured error handling for filesystem operations
 */

use crate::core::errors::Errno;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// VFS operation result
pub type VfsResult<T> = Result<T, VfsError>;

/// VFS errors
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum VfsError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Is a directory: {0}")]
    IsADirectory(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl VfsError {
    /// Errno delivered to user space for this error
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            Self::NotFound(_) => Errno::ENOENT,
            Self::NotADirectory(_) => Errno::ENOTDIR,
            Self::IsADirectory(_) => Errno::EISDIR,
            Self::InvalidPath(_) => Errno::ENOENT,
            Self::IoError(_) => Errno::EIO,
        }
    }
}
