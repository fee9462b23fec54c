/*!
 * Process Control Block
 *
 * One record per process. The PCB lock guards the parent link, the
 * children list, and the exit status; every cross-thread access to those
 * fields goes through `Proc::lock`. A thread never holds two PCB locks at
 * once.
 */

use crate::core::types::{ExitCode, Pid};
use crate::vm::AddrSpace;
use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use std::thread::ThreadId;

/// Lock-protected PCB fields
#[derive(Debug, Default)]
pub struct ProcState {
    pub(crate) parent: Option<Pid>,
    pub(crate) children: Vec<Pid>,
    pub(crate) exit_code: Option<ExitCode>,
}

impl ProcState {
    #[inline]
    pub fn parent(&self) -> Option<Pid> {
        self.parent
    }

    #[inline]
    pub fn children(&self) -> &[Pid] {
        &self.children
    }

    /// True once the process has run its termination protocol
    #[inline]
    pub fn exit_recorded(&self) -> bool {
        self.exit_code.is_some()
    }

    #[inline]
    pub fn exit_code(&self) -> Option<ExitCode> {
        self.exit_code
    }
}

/// Process control block
pub struct Proc {
    pid: Pid,
    name: String,
    state: Mutex<ProcState>,
    exited: Condvar,
    addrspace: Mutex<Option<AddrSpace>>,
    thread: Mutex<Option<ThreadId>>,
}

impl Proc {
    pub(crate) fn new(pid: Pid, name: String, parent: Option<Pid>) -> Self {
        Self {
            pid,
            name,
            state: Mutex::new(ProcState {
                parent,
                ..ProcState::default()
            }),
            exited: Condvar::new(),
            addrspace: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    #[inline]
    pub fn pid(&self) -> Pid {
        self.pid
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Acquire the PCB lock
    #[inline]
    pub fn lock(&self) -> MutexGuard<'_, ProcState> {
        self.state.lock()
    }

    /// Sleep on the exit condition; `guard` must be this PCB's lock
    pub(crate) fn wait_exited(&self, guard: &mut MutexGuard<'_, ProcState>) {
        self.exited.wait(guard);
    }

    pub(crate) fn notify_exited(&self) {
        self.exited.notify_all();
    }

    /// Replace the process's address space, returning the old one
    pub fn setas(&self, space: Option<AddrSpace>) -> Option<AddrSpace> {
        std::mem::replace(&mut *self.addrspace.lock(), space)
    }

    /// Run `f` against the address space, if the process has one
    pub fn with_addrspace<R>(&self, f: impl FnOnce(&mut AddrSpace) -> R) -> Option<R> {
        self.addrspace.lock().as_mut().map(f)
    }

    pub fn has_addrspace(&self) -> bool {
        self.addrspace.lock().is_some()
    }

    pub(crate) fn attach_thread(&self, id: ThreadId) {
        *self.thread.lock() = Some(id);
    }

    pub(crate) fn detach_thread(&self) -> Option<ThreadId> {
        self.thread.lock().take()
    }

    pub fn has_thread(&self) -> bool {
        self.thread.lock().is_some()
    }

    /// Snapshot for introspection
    pub fn info(&self) -> ProcInfo {
        let (parent, children, exit_code) = {
            let state = self.lock();
            (state.parent, state.children.clone(), state.exit_code)
        };
        ProcInfo {
            pid: self.pid,
            name: self.name.clone(),
            parent,
            children,
            exit_code,
            has_thread: self.has_thread(),
            has_addrspace: self.has_addrspace(),
        }
    }
}

impl std::fmt::Debug for Proc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Proc")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Point-in-time view of a PCB
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcInfo {
    pub pid: Pid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Pid>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Pid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<ExitCode>,
    pub has_thread: bool,
    pub has_addrspace: bool,
}

impl ProcInfo {
    /// Exited but not yet reaped
    #[inline]
    pub fn is_zombie(&self) -> bool {
        self.exit_code.is_some()
    }
}
