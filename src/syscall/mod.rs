/*!
 * Process System Calls
 *
 * `exit`, `getpid`, `waitpid`, `fork` and `execv`, implemented as methods
 * on the calling process's `UserContext`. Failures come back as
 * `KernelError`; `KernelError::errno` gives the user-visible code.
 */

mod args;
mod exec;
mod exit;
mod fork;
mod wait;

pub use args::{ArgBuffers, ArgvLayout};
pub use exec::ExecError;

use crate::core::types::Pid;
use crate::process::UserContext;

impl UserContext {
    /// Pid of the calling process
    #[inline]
    pub fn getpid(&self) -> Pid {
        self.proc.pid()
    }
}
