/*!
 * Threads
 *
 * Thread creation, termination, and sleeping for process threads. Every
 * process runs on its own host thread; the kernel keeps the join handles
 * so callers can wait for the whole process tree to finish.
 */

mod machine;
mod trapframe;

pub use machine::{Machine, UserRoutine};
pub use trapframe::{reg, TrapFrame};

use crate::core::errors::KernelError;
use crate::core::types::KernelResult;
use crate::process::Exit;
use parking_lot::Mutex;
use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;
use tracing::{debug, error};

type PanicPayload = Box<dyn Any + Send + 'static>;

/// Kernel thread bookkeeping
pub struct ThreadSystem {
    handles: Mutex<Vec<JoinHandle<()>>>,
    /// First panic seen while joining finished threads early
    panicked: Mutex<Option<PanicPayload>>,
    forked: AtomicU64,
}

impl ThreadSystem {
    pub fn new() -> Self {
        Self {
            handles: Mutex::new(Vec::new()),
            panicked: Mutex::new(None),
            forked: AtomicU64::new(0),
        }
    }

    /// Start a new thread running `entry`
    pub fn thread_fork<F>(&self, name: String, entry: F) -> KernelResult<ThreadId>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(entry)
            .map_err(|e| KernelError::out_of_memory(format!("thread_fork {}: {}", name, e)))?;
        let id = handle.thread().id();
        let finished = {
            let mut handles = self.handles.lock();
            let (done, running): (Vec<_>, Vec<_>) =
                std::mem::take(&mut *handles).into_iter().partition(JoinHandle::is_finished);
            *handles = running;
            handles.push(handle);
            done
        };
        for handle in finished {
            self.join_one(handle);
        }
        self.forked.fetch_add(1, Ordering::Relaxed);
        debug!(thread = %name, "Thread forked");
        Ok(id)
    }

    /// Total threads forked so far
    pub fn forked(&self) -> u64 {
        self.forked.load(Ordering::Relaxed)
    }

    /// Threads forked but not yet joined
    pub fn held(&self) -> usize {
        self.handles.lock().len()
    }

    /// Wait for every forked thread, including threads forked while waiting.
    ///
    /// A panic on any process thread is re-raised here once all threads
    /// have been joined.
    pub fn join_all(&self) {
        loop {
            let batch = std::mem::take(&mut *self.handles.lock());
            if batch.is_empty() {
                break;
            }
            for handle in batch {
                self.join_one(handle);
            }
        }
        if let Some(payload) = self.panicked.lock().take() {
            std::panic::resume_unwind(payload);
        }
    }

    fn join_one(&self, handle: JoinHandle<()>) {
        let name = handle.thread().name().unwrap_or("<unnamed>").to_string();
        if let Err(payload) = handle.join() {
            error!(thread = %name, "Thread panicked");
            self.panicked.lock().get_or_insert(payload);
        }
    }
}

impl Default for ThreadSystem {
    fn default() -> Self {
        Self::new()
    }
}

/// Final step of every process thread
pub fn thread_exit(exit: Exit) {
    debug!(pid = exit.pid(), code = exit.code(), "Thread exiting");
}

/// Suspend the calling thread for `duration`
#[inline]
pub fn clocksleep(duration: Duration) {
    std::thread::sleep(duration);
}
