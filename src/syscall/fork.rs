/*!
 * Process Replication
 */

use crate::core::errors::KernelError;
use crate::core::types::{KernelResult, Pid};
use crate::process::{Exit, UserContext};
use crate::thread::{clocksleep, Machine};
use std::sync::Arc;
use tracing::{info, warn};

impl UserContext {
    /// Create a child process with a copy of the caller's address space and
    /// registers. Returns the child's pid to the caller; the child resumes
    /// in `child_main`, seeing 0 as the result of the call.
    ///
    /// # Errors
    /// - `ProcessLimit` if no pid is free
    /// - `OutOfMemory` if the address space cannot be copied or no thread
    ///   can be started; nothing of the child remains in that case
    pub fn fork<F>(&mut self, child_main: F) -> KernelResult<Pid>
    where
        F: FnOnce(UserContext) -> Exit + Send + 'static,
    {
        let kernel = Arc::clone(&self.kernel);
        let procs = kernel.procs();
        let child = procs.create(self.proc.name(), Some(&self.proc))?;
        let child_pid = child.pid();

        let copied = self
            .proc
            .with_addrspace(|space| space.copy())
            .unwrap_or_else(|| Err(KernelError::invalid_argument("fork from a process with no address space")));
        match copied {
            Ok(space) => {
                child.setas(Some(space));
            }
            Err(err) => {
                warn!(pid = self.getpid(), error = %err, "fork: address space copy failed");
                procs.abandon(&self.proc, child);
                return Err(err);
            }
        }

        let tf = self.tf.clone();
        if let Err(err) = kernel.start_thread(&child, tf, move |ctx| {
            Machine::enter_forked_process(ctx, child_main)
        }) {
            warn!(pid = self.getpid(), error = %err, "fork: thread creation failed");
            procs.abandon(&self.proc, child);
            return Err(err);
        }

        info!(pid = self.getpid(), child = child_pid, "Forked");

        if let Some(pause) = kernel.config().fork_yield {
            clocksleep(pause);
        }
        Ok(child_pid)
    }
}
