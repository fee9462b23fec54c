/*!
 * User Context
 *
 * The state a process thread carries while it runs user code: the kernel,
 * its own PCB, and its trap frame. System calls are methods on this type.
 * `exit` and a successful `execv` consume the context, so nothing of the
 * process can run after either one.
 */

use super::pcb::Proc;
use crate::core::errors::KernelError;
use crate::core::types::{ExitCode, KernelResult, Pid, Vaddr};
use crate::kernel::Kernel;
use crate::thread::TrapFrame;
use crate::vm::{copyinout, AddrSpace};
use std::sync::Arc;

/// Execution context of a running process
pub struct UserContext {
    pub(crate) kernel: Arc<Kernel>,
    pub(crate) proc: Arc<Proc>,
    pub(crate) tf: TrapFrame,
}

impl UserContext {
    pub(crate) fn new(kernel: Arc<Kernel>, proc: Arc<Proc>, tf: TrapFrame) -> Self {
        Self { kernel, proc, tf }
    }

    #[inline]
    pub fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }

    #[inline]
    pub fn proc(&self) -> &Arc<Proc> {
        &self.proc
    }

    #[inline]
    pub fn trapframe(&self) -> &TrapFrame {
        &self.tf
    }

    #[inline]
    pub fn trapframe_mut(&mut self) -> &mut TrapFrame {
        &mut self.tf
    }

    /// Make the process's address space current on this thread
    pub(crate) fn activate(&self) {
        self.proc.with_addrspace(|space| space.activate());
    }

    /// Run `f` on the address space; a process without one faults at `addr`
    pub(crate) fn with_space<R>(
        &self,
        addr: Vaddr,
        f: impl FnOnce(&mut AddrSpace) -> KernelResult<R>,
    ) -> KernelResult<R> {
        self.proc
            .with_addrspace(f)
            .unwrap_or(Err(KernelError::BadAddress(addr)))
    }

    pub fn copyin(&self, src: Vaddr, dst: &mut [u8]) -> KernelResult<()> {
        self.with_space(src, |space| copyinout::copyin(space, src, dst))
    }

    pub fn copyout(&self, src: &[u8], dst: Vaddr) -> KernelResult<()> {
        self.with_space(dst, |space| copyinout::copyout(space, src, dst))
    }

    /// Copy in a user string of at most `maxlen` bytes, terminator included
    pub fn copyinstr(&self, src: Vaddr, maxlen: usize) -> KernelResult<Vec<u8>> {
        self.with_space(src, |space| copyinout::copyinstr_owned(space, src, maxlen))
    }

    pub fn copyoutstr(&self, s: &[u8], dst: Vaddr) -> KernelResult<usize> {
        self.with_space(dst, |space| copyinout::copyoutstr(space, s, dst))
    }

    pub fn copyin_word(&self, src: Vaddr) -> KernelResult<Vaddr> {
        self.with_space(src, |space| copyinout::copyin_word(space, src))
    }

    pub fn copyout_word(&self, word: Vaddr, dst: Vaddr) -> KernelResult<()> {
        self.with_space(dst, |space| copyinout::copyout_word(space, word, dst))
    }
}

impl std::fmt::Debug for UserContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserContext")
            .field("pid", &self.proc.pid())
            .field("epc", &format_args!("{:#010x}", self.tf.epc))
            .finish_non_exhaustive()
    }
}

/// Proof that a process ran its termination protocol.
///
/// Only `exit` constructs one. A process thread ends by handing its token
/// to `thread_exit`.
#[must_use = "an Exit must be returned to the thread that ran the process"]
#[derive(Debug, PartialEq, Eq)]
pub struct Exit {
    pid: Pid,
    code: ExitCode,
}

impl Exit {
    pub(crate) fn new(pid: Pid, code: ExitCode) -> Self {
        Self { pid, code }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn code(&self) -> ExitCode {
        self.code
    }
}
