/*!
 * Error Types
 * Centralized error handling with thiserror and miette, plus the errno
 * numbering user programs see as syscall return values
 */

use super::types::{Pid, Vaddr};
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Re-export subsystem errors
pub use crate::loader::ElfError;
pub use crate::vfs::VfsError;

/// Error numbers returned to user programs
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Errno {
    /// Out of memory
    ENOMEM = 3,
    /// Bad memory reference
    EFAULT = 6,
    /// String too long
    ENAMETOOLONG = 7,
    /// Invalid argument
    EINVAL = 8,
    /// Too many processes in system
    ENPROC = 12,
    /// File is not executable
    ENOEXEC = 13,
    /// Argument list too long
    E2BIG = 14,
    /// No such process
    ESRCH = 15,
    /// Not a directory
    ENOTDIR = 17,
    /// Is a directory
    EISDIR = 18,
    /// No such file or directory
    ENOENT = 19,
    /// Input/output error
    EIO = 32,
}

impl Errno {
    /// Raw value as returned in the syscall error register
    #[inline]
    #[must_use]
    pub const fn code(self) -> i32 {
        self as i32
    }
}

/// Kernel errors surfaced by the process-lifecycle syscalls
#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
pub enum KernelError {
    #[error("Invalid argument: {0}")]
    #[diagnostic(
        code(kernel::invalid_argument),
        help("The message names the rejected value.")
    )]
    InvalidArgument(String),

    #[error("No such process: {0}")]
    #[diagnostic(
        code(kernel::no_such_process),
        help("Only unreaped children of the caller can be waited for.")
    )]
    NoSuchProcess(Pid),

    #[error("Out of memory: {0}")]
    #[diagnostic(
        code(kernel::out_of_memory),
        help("The coremap is exhausted. Reap zombies or raise KERNEL_FRAMES.")
    )]
    OutOfMemory(String),

    #[error("Process table full")]
    #[diagnostic(
        code(kernel::process_limit),
        help("Every pid in the user range is taken by a live or zombie process.")
    )]
    ProcessLimit,

    #[error("Bad user address: {0:#010x}")]
    #[diagnostic(
        code(kernel::bad_address),
        help("The range is not mapped, or not writable, in the caller's address space.")
    )]
    BadAddress(Vaddr),

    #[error("String at {addr:#010x} exceeds {limit} bytes")]
    #[diagnostic(code(kernel::name_too_long))]
    NameTooLong { addr: Vaddr, limit: usize },

    #[error("Argument list too long: {0}")]
    #[diagnostic(
        code(kernel::arg_list_too_long),
        help("execv takes at most 16 arguments of at most 128 characters each.")
    )]
    ArgListTooLong(String),

    #[error(transparent)]
    #[diagnostic(code(kernel::vfs))]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    #[diagnostic(code(kernel::exec_format))]
    Exec(#[from] ElfError),
}

impl KernelError {
    /// Create an invalid argument error
    #[inline]
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create an out of memory error
    #[inline]
    pub fn out_of_memory(msg: impl Into<String>) -> Self {
        Self::OutOfMemory(msg.into())
    }

    /// Errno delivered to user space for this error
    #[must_use]
    pub fn errno(&self) -> Errno {
        match self {
            Self::InvalidArgument(_) => Errno::EINVAL,
            Self::NoSuchProcess(_) => Errno::ESRCH,
            Self::OutOfMemory(_) => Errno::ENOMEM,
            Self::ProcessLimit => Errno::ENPROC,
            Self::BadAddress(_) => Errno::EFAULT,
            Self::NameTooLong { .. } => Errno::ENAMETOOLONG,
            Self::ArgListTooLong(_) => Errno::E2BIG,
            Self::Vfs(e) => e.errno(),
            Self::Exec(_) => Errno::ENOEXEC,
        }
    }
}
