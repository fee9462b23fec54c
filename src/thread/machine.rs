/*!
 * Machine
 *
 * Hosted stand-in for the trap-return path into user mode. Program images
 * carry no real machine code here; instead each entry point is mapped to a
 * native routine that runs as the user program on the process's thread.
 */

use super::trapframe::{reg, TrapFrame};
use crate::core::types::Vaddr;
use crate::process::{Exit, UserContext};
use ahash::RandomState;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// User program body entered through `enter_new_process`
pub type UserRoutine = Arc<dyn Fn(UserContext) -> Exit + Send + Sync>;

/// Native code table keyed by entry address
pub struct Machine {
    code: DashMap<Vaddr, UserRoutine, RandomState>,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            code: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// Map a routine at an entry address, replacing any previous mapping
    pub fn map_code(&self, entry: Vaddr, routine: UserRoutine) {
        self.code.insert(entry, routine);
    }

    pub fn has_code(&self, entry: Vaddr) -> bool {
        self.code.contains_key(&entry)
    }

    /// Resume a forked child: it sees 0 from `fork` and continues past the
    /// syscall instruction
    pub fn enter_forked_process<F>(mut ctx: UserContext, child_main: F) -> Exit
    where
        F: FnOnce(UserContext) -> Exit,
    {
        ctx.activate();
        let tf = ctx.trapframe_mut();
        tf.set_reg(reg::V0, 0);
        tf.set_reg(reg::A3, 0);
        tf.epc = tf.epc.wrapping_add(4);
        debug!(pid = ctx.getpid(), "Entering forked process");
        child_main(ctx)
    }

    /// Enter user mode at `entry` with `argc`/`argv` in the argument
    /// registers. Does not come back to the caller: the result is the exit
    /// of the program that was entered.
    pub fn enter_new_process(
        &self,
        mut ctx: UserContext,
        argc: usize,
        argv: Vaddr,
        stackptr: Vaddr,
        entry: Vaddr,
    ) -> Exit {
        ctx.activate();
        *ctx.trapframe_mut() = TrapFrame::for_entry(argc, argv, stackptr, entry);

        let routine = self
            .code
            .get(&entry)
            .map(|r| Arc::clone(r.value()))
            .unwrap_or_else(|| {
                panic!(
                    "pid {}: no code mapped at entry point {:#010x}",
                    ctx.getpid(),
                    entry
                )
            });

        debug!(pid = ctx.getpid(), entry, argc, argv, "Entering new process");
        routine(ctx)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}
