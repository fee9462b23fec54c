/*!
 * Process Kernel Library
 * Process lifecycle core: PCBs, exit/waitpid/fork/execv, and the hosted
 * memory, filesystem, loader and thread layers they run on
 */

pub mod core;
pub mod kernel;
pub mod loader;
pub mod monitoring;
pub mod process;
pub mod syscall;
pub mod thread;
pub mod vfs;
pub mod vm;

// Re-exports
pub use crate::core::{
    Errno, ExitCode, KernelConfig, KernelError, KernelResult, Pid, Vaddr, WaitStatus, WaitStrategy,
};
pub use crate::core::types::{mkwait_exit, wexitstatus, wifexited};
pub use kernel::{Kernel, KernelBuilder, KernelStats};
pub use monitoring::{init_tracing, try_init_test_tracing};
pub use process::{Exit, ProcInfo, TableStats, UserContext};
pub use syscall::ExecError;
pub use thread::{reg, TrapFrame, UserRoutine};
pub use vfs::{FileSystem, MemFs, VfsError, Vnode};
