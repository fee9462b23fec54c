/*!
 * Coremap
 * Accounting for the fixed pool of physical frames backing address spaces
 */

use crate::core::errors::KernelError;
use crate::core::types::KernelResult;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Fixed-size frame pool
#[derive(Debug)]
pub struct Coremap {
    total: usize,
    used: AtomicUsize,
}

impl Coremap {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            used: AtomicUsize::new(0),
        }
    }

    /// Reserve `frames` frames atomically, or fail without reserving any
    pub fn reserve(&self, frames: usize) -> KernelResult<()> {
        loop {
            let current = self.used.load(Ordering::SeqCst);
            let wanted = current.saturating_add(frames);
            if wanted > self.total {
                return Err(KernelError::out_of_memory(format!(
                    "need {} frames, {} of {} free",
                    frames,
                    self.total - current,
                    self.total
                )));
            }
            if self
                .used
                .compare_exchange(current, wanted, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return Ok(());
            }
        }
    }

    /// Return frames to the pool
    pub fn release(&self, frames: usize) {
        let previous = self.used.fetch_sub(frames, Ordering::SeqCst);
        assert!(previous >= frames, "coremap released more frames than reserved");
    }

    #[inline]
    pub fn total(&self) -> usize {
        self.total
    }

    #[inline]
    pub fn used(&self) -> usize {
        self.used.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.total - self.used()
    }
}
