/*!
 * Program Replacement
 */

use super::args::ArgBuffers;
use crate::core::errors::KernelError;
use crate::core::limits::PATH_MAX;
use crate::core::types::{KernelResult, Vaddr};
use crate::loader::load_elf;
use crate::process::{Exit, UserContext};
use crate::vfs::VfsError;
use crate::vm::copyinout::copyinstr_owned;
use crate::vm::AddrSpace;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// A failed `execv`, carrying the caller's context back.
///
/// When `image_lost` is set the old address space was already discarded and
/// the process has nothing left to run; the caller should `exit`.
#[derive(Error)]
#[error("execv failed: {error}")]
pub struct ExecError {
    ctx: UserContext,
    #[source]
    error: KernelError,
    image_lost: bool,
}

impl ExecError {
    fn new(ctx: UserContext, error: KernelError, image_lost: bool) -> Self {
        Self {
            ctx,
            error,
            image_lost,
        }
    }

    #[inline]
    pub fn error(&self) -> &KernelError {
        &self.error
    }

    #[inline]
    pub fn image_lost(&self) -> bool {
        self.image_lost
    }

    pub fn into_context(self) -> UserContext {
        self.ctx
    }
}

impl std::fmt::Debug for ExecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecError")
            .field("pid", &self.ctx.getpid())
            .field("error", &self.error)
            .field("image_lost", &self.image_lost)
            .finish()
    }
}

impl UserContext {
    /// Replace the calling process's program with the executable at user
    /// path `path`, passing the NULL-terminated argument vector `argv`.
    ///
    /// On success the new program runs to completion on this thread and
    /// its exit is returned.
    pub fn execv(self, path: Vaddr, argv: Vaddr) -> Result<Exit, ExecError> {
        let (path, args) = match self.exec_copyin(path, argv) {
            Ok(staged) => staged,
            Err(error) => return Err(ExecError::new(self, error, false)),
        };

        let kernel = Arc::clone(&self.kernel);
        let vnode = match kernel.vfs().open(&path) {
            Ok(vnode) => vnode,
            Err(error) => return Err(ExecError::new(self, error.into(), false)),
        };

        let space = match AddrSpace::create(kernel.coremap()) {
            Ok(space) => space,
            Err(error) => return Err(ExecError::new(self, error, false)),
        };

        // Point of no return for the old image
        let old = self.proc.setas(Some(space));
        self.activate();
        drop(old);

        let entry = self.with_space(0, |space| load_elf(vnode.as_ref(), space));
        drop(vnode);

        let loaded = entry.and_then(|entry| {
            self.with_space(0, |space| {
                let stackptr = space.define_stack()?;
                let layout = args.copy_out(space, stackptr)?;
                Ok((entry, layout))
            })
        });

        match loaded {
            Ok((entry, layout)) => {
                info!(pid = self.getpid(), path = %path, argc = layout.argc, entry, "Executing");
                Ok(kernel
                    .machine()
                    .enter_new_process(self, layout.argc, layout.argv, layout.stackptr, entry))
            }
            Err(error) => {
                warn!(pid = self.getpid(), path = %path, error = %error, "execv failed after image swap");
                Err(ExecError::new(self, error, true))
            }
        }
    }

    /// Stage the path and argument strings in kernel memory
    fn exec_copyin(&self, path: Vaddr, argv: Vaddr) -> KernelResult<(String, ArgBuffers)> {
        self.with_space(path, |space| {
            let raw = copyinstr_owned(space, path, PATH_MAX)?;
            let path = String::from_utf8(raw).map_err(|e| {
                VfsError::InvalidPath(String::from_utf8_lossy(e.as_bytes()).into_owned())
            })?;
            let args = ArgBuffers::copy_in(space, argv)?;
            Ok((path, args))
        })
    }
}
