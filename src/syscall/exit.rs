/*!
 * Process Termination
 */

use crate::core::types::ExitCode;
use crate::process::{Exit, UserContext};
use std::sync::Arc;
use tracing::{debug, info};

impl UserContext {
    /// Terminate the calling process with `code`.
    ///
    /// Releases the address space, destroys exited children and orphans
    /// running ones, then either destroys this process (no parent) or
    /// records the code for the parent to reap. The context is consumed;
    /// the returned token ends the thread.
    pub fn exit(self, code: ExitCode) -> Exit {
        let UserContext { kernel, proc, .. } = self;
        let pid = proc.pid();
        let procs = kernel.procs();

        if let Some(space) = proc.setas(None) {
            space.deactivate();
            drop(space);
        }

        // Own lock only long enough to take the list
        let children = std::mem::take(&mut proc.lock().children);
        for child_pid in children {
            let child = procs
                .lookup(child_pid)
                .unwrap_or_else(|| panic!("pid {}: child {} missing from process table", pid, child_pid));

            let zombie = {
                let mut state = child.lock();
                if state.exit_recorded() {
                    true
                } else {
                    state.parent = None;
                    false
                }
            };

            if zombie {
                debug!(pid, child = child_pid, "Destroying exited child");
                procs.destroy(child);
            } else {
                debug!(pid, child = child_pid, "Orphaned running child");
            }
        }

        proc.detach_thread();

        let orphan = {
            let mut state = proc.lock();
            if state.parent.is_none() {
                true
            } else {
                state.exit_code = Some(code);
                false
            }
        };

        if orphan {
            procs.destroy(Arc::clone(&proc));
        } else {
            proc.notify_exited();
        }

        info!(pid, code, orphan, "Process exited");
        Exit::new(pid, code)
    }
}
