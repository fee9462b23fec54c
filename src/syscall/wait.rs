/*!
 * Child Reaping
 */

use crate::core::config::WaitStrategy;
use crate::core::errors::KernelError;
use crate::core::types::{mkwait_exit, KernelResult, Pid, Vaddr};
use crate::process::UserContext;
use crate::thread::clocksleep;
use parking_lot::MutexGuard;
use std::sync::Arc;
use tracing::{debug, info};

impl UserContext {
    /// Wait for child `pid` to exit, destroy it, and store its encoded
    /// status at user address `status` (skipped when `status` is null).
    ///
    /// # Errors
    /// - `InvalidArgument` if `options` is nonzero
    /// - `NoSuchProcess` if `pid` is not a child of the caller
    /// - `BadAddress` if `status` is not writable; the child is still reaped
    pub fn waitpid(&mut self, pid: Pid, status: Vaddr, options: i32) -> KernelResult<Pid> {
        if options != 0 {
            return Err(KernelError::invalid_argument(format!(
                "unsupported waitpid options {:#x}",
                options
            )));
        }

        let kernel = Arc::clone(&self.kernel);
        let child = kernel.procs().take_child(&self.proc, pid)?;
        debug!(pid = self.getpid(), child = pid, "Waiting for child");

        let code = {
            let mut state = child.lock();
            loop {
                if let Some(code) = state.exit_code() {
                    break code;
                }
                match kernel.config().wait_strategy {
                    WaitStrategy::Poll { interval } => {
                        MutexGuard::unlocked(&mut state, || clocksleep(interval))
                    }
                    WaitStrategy::Notify => child.wait_exited(&mut state),
                }
            }
        };

        kernel.procs().destroy(child);
        info!(pid = self.getpid(), child = pid, code, "Reaped child");

        if status != 0 {
            self.copyout_word(mkwait_exit(code) as Vaddr, status)?;
        }
        Ok(pid)
    }
}
