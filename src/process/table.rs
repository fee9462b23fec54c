/*!
 * Process Table
 *
 * Arena of PCBs keyed by pid. Parent/child links are pids, so a record is
 * only ever reachable through the table or through the single `Arc` its
 * current owner holds. Destroying a record removes it from the arena and
 * releases whatever address space and thread binding it still has.
 */

use super::pcb::{Proc, ProcInfo};
use crate::core::errors::KernelError;
use crate::core::limits::{PID_MAX, PID_MIN};
use crate::core::types::{KernelResult, Pid};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Process table counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct TableStats {
    /// Records currently in the table (running or zombie)
    pub live: usize,
    /// Records whose exit has been recorded but not yet reaped
    pub zombies: usize,
    pub created: u64,
    pub destroyed: u64,
}

/// PCB registry
pub struct ProcTable {
    procs: DashMap<Pid, Arc<Proc>, RandomState>,
    next_pid: Mutex<Pid>,
    created: AtomicU64,
    destroyed: AtomicU64,
}

impl ProcTable {
    pub fn new() -> Self {
        Self {
            procs: DashMap::with_hasher(RandomState::new()),
            next_pid: Mutex::new(PID_MIN),
            created: AtomicU64::new(0),
            destroyed: AtomicU64::new(0),
        }
    }

    /// Allocate a PCB. With a parent, the new pid is appended to the
    /// parent's children under the parent's lock.
    #[instrument(skip(self, parent), fields(parent = parent.map(|p| p.pid())))]
    pub fn create(&self, name: &str, parent: Option<&Arc<Proc>>) -> KernelResult<Arc<Proc>> {
        let proc = {
            let mut cursor = self.next_pid.lock();
            let pid = self.allocate_pid(&mut cursor)?;
            let proc = Arc::new(Proc::new(pid, name.to_string(), parent.map(|p| p.pid())));
            self.procs.insert(pid, Arc::clone(&proc));
            proc
        };

        if let Some(parent) = parent {
            parent.lock().children.push(proc.pid());
        }

        self.created.fetch_add(1, Ordering::Relaxed);
        debug!(pid = proc.pid(), "Created PCB");
        Ok(proc)
    }

    /// Round-robin search for a pid with no record in the table
    fn allocate_pid(&self, cursor: &mut Pid) -> KernelResult<Pid> {
        let range = PID_MAX - PID_MIN + 1;
        for _ in 0..range {
            let candidate = *cursor;
            *cursor = if candidate >= PID_MAX { PID_MIN } else { candidate + 1 };
            if !self.procs.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(KernelError::ProcessLimit)
    }

    pub fn lookup(&self, pid: Pid) -> Option<Arc<Proc>> {
        self.procs.get(&pid).map(|p| Arc::clone(p.value()))
    }

    /// Find `pid` among `parent`'s children
    pub fn lookup_child(&self, parent: &Proc, pid: Pid) -> KernelResult<Arc<Proc>> {
        if !parent.lock().children.contains(&pid) {
            return Err(KernelError::NoSuchProcess(pid));
        }
        self.lookup(pid).ok_or(KernelError::NoSuchProcess(pid))
    }

    /// Remove `pid` from `parent`'s children and hand the record to the caller
    pub(crate) fn take_child(&self, parent: &Proc, pid: Pid) -> KernelResult<Arc<Proc>> {
        {
            let mut state = parent.lock();
            let index = state
                .children
                .iter()
                .position(|&c| c == pid)
                .ok_or(KernelError::NoSuchProcess(pid))?;
            state.children.remove(index);
        }
        self.lookup(pid).ok_or(KernelError::NoSuchProcess(pid))
    }

    /// Unlink a child that never started running and destroy it
    pub(crate) fn abandon(&self, parent: &Proc, child: Arc<Proc>) {
        parent.lock().children.retain(|&c| c != child.pid());
        self.destroy(child);
    }

    /// Destroy a PCB. The caller must be its only remaining user.
    ///
    /// # Panics
    /// If the record was already destroyed.
    pub fn destroy(&self, proc: Arc<Proc>) {
        let pid = proc.pid();
        if self.procs.remove(&pid).is_none() {
            panic!("pid {} destroyed twice", pid);
        }

        if let Some(space) = proc.setas(None) {
            space.deactivate();
            drop(space);
        }
        proc.detach_thread();
        debug_assert!(proc.lock().children.is_empty());

        self.destroyed.fetch_add(1, Ordering::Relaxed);
        debug!(pid, name = proc.name(), "Destroyed PCB");
    }

    pub fn info(&self, pid: Pid) -> Option<ProcInfo> {
        self.lookup(pid).map(|p| p.info())
    }

    /// Snapshot of every record, ordered by pid
    pub fn list(&self) -> Vec<ProcInfo> {
        let mut infos: Vec<ProcInfo> = self.snapshot().iter().map(|p| p.info()).collect();
        infos.sort_by_key(|i| i.pid);
        infos
    }

    pub fn stats(&self) -> TableStats {
        let procs = self.snapshot();
        let zombies = procs.iter().filter(|p| p.lock().exit_recorded()).count();
        TableStats {
            live: procs.len(),
            zombies,
            created: self.created.load(Ordering::Relaxed),
            destroyed: self.destroyed.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.procs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.procs.is_empty()
    }

    // Clone the Arcs out first so no PCB lock is taken under a shard lock
    fn snapshot(&self) -> Vec<Arc<Proc>> {
        self.procs.iter().map(|e| Arc::clone(e.value())).collect()
    }
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}
