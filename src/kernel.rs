/*!
 * Kernel
 *
 * Owns the process table and the collaborators the lifecycle system calls
 * rely on: physical frames, the filesystem holding program images, the
 * native-code machine, and the thread system. Also hosts bootstrap: the
 * first processes are started from here, without a parent.
 */

use crate::core::config::KernelConfig;
use crate::core::errors::KernelError;
use crate::core::limits::{PAGE_SIZE, PROGRAM_TEXT_BASE, PROGRAM_TEXT_STRIDE, USERSTACK};
use crate::core::types::{KernelResult, Pid, Vaddr};
use crate::loader::{load_elf, ElfBuilder, PF_R, PF_W, PF_X};
use crate::process::{Exit, Proc, ProcInfo, ProcTable, TableStats, UserContext};
use crate::syscall::ArgBuffers;
use crate::thread::{reg, thread_exit, Machine, ThreadSystem, TrapFrame, UserRoutine};
use crate::vfs::{FileSystem, MemFs};
use crate::vm::{AddrSpace, Coremap};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;
use tracing::{error, info, instrument};

// jr $ra; nop
const TEXT_STUB: [u32; 2] = [0x03e0_0008, 0x0000_0000];

/// Whole-kernel counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KernelStats {
    #[serde(flatten)]
    pub procs: TableStats,
    pub frames_used: usize,
    pub frames_total: usize,
    pub threads_forked: u64,
}

/// Process-lifecycle kernel
pub struct Kernel {
    config: KernelConfig,
    procs: ProcTable,
    coremap: Arc<Coremap>,
    vfs: Arc<dyn FileSystem>,
    machine: Machine,
    threads: ThreadSystem,
    next_text: AtomicU32,
}

impl Kernel {
    pub fn builder() -> KernelBuilder {
        KernelBuilder::new()
    }

    #[inline]
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    #[inline]
    pub fn procs(&self) -> &ProcTable {
        &self.procs
    }

    #[inline]
    pub fn coremap(&self) -> &Arc<Coremap> {
        &self.coremap
    }

    #[inline]
    pub fn vfs(&self) -> &Arc<dyn FileSystem> {
        &self.vfs
    }

    #[inline]
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    #[inline]
    pub fn threads(&self) -> &ThreadSystem {
        &self.threads
    }

    /// Write an executable for `routine` to `path` and map the routine at
    /// its entry point. Each installed image gets its own text address.
    pub fn install_program(&self, path: &str, routine: UserRoutine) -> KernelResult<Vaddr> {
        let slot = self.next_text.fetch_add(1, Ordering::Relaxed);
        let entry = slot
            .checked_mul(PROGRAM_TEXT_STRIDE)
            .and_then(|offset| PROGRAM_TEXT_BASE.checked_add(offset))
            .filter(|&base| base <= USERSTACK - PROGRAM_TEXT_STRIDE)
            .ok_or_else(|| KernelError::out_of_memory("no user text space left for programs"))?;

        let text: Vec<u8> = TEXT_STUB.iter().flat_map(|w| w.to_be_bytes()).collect();
        let mut data = path.as_bytes().to_vec();
        data.push(0);

        let image = ElfBuilder::new(entry)
            .segment(entry, text, PF_R | PF_X)
            .segment(entry + PAGE_SIZE as Vaddr, data, PF_R | PF_W)
            .build();
        self.vfs.write(path, &image)?;
        self.machine.map_code(entry, routine);

        info!(path, entry, "Installed program");
        Ok(entry)
    }

    /// Start a parentless process running `routine` on a fresh address space
    /// that has only a stack
    #[instrument(skip(self, routine))]
    pub fn spawn<F>(self: &Arc<Self>, name: &str, routine: F) -> KernelResult<Pid>
    where
        F: FnOnce(UserContext) -> Exit + Send + 'static,
    {
        let proc = self.procs.create(name, None)?;

        let prepared = AddrSpace::create(&self.coremap).and_then(|mut space| {
            let stackptr = space.define_stack()?;
            Ok((space, stackptr))
        });
        let (space, stackptr) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                self.procs.destroy(proc);
                return Err(err);
            }
        };
        proc.setas(Some(space));

        let mut tf = TrapFrame::default();
        tf.set_reg(reg::SP, stackptr);

        let pid = proc.pid();
        if let Err(err) = self.start_thread(&proc, tf, move |ctx| {
            ctx.activate();
            routine(ctx)
        }) {
            self.procs.destroy(proc);
            return Err(err);
        }
        Ok(pid)
    }

    /// Load the executable at `path` into a new parentless process and run
    /// it with `args` as its argument vector
    #[instrument(skip(self))]
    pub fn run_program(self: &Arc<Self>, path: &str, args: &[&str]) -> KernelResult<Pid> {
        let staged = ArgBuffers::from_strs(args)?;
        let vnode = self.vfs.open(path)?;
        let proc = self.procs.create(path, None)?;

        let prepared = AddrSpace::create(&self.coremap).and_then(|mut space| {
            let entry = load_elf(vnode.as_ref(), &mut space)?;
            Ok((space, entry))
        });
        drop(vnode);

        let prepared = prepared.and_then(|(mut space, entry)| {
            let stackptr = space.define_stack()?;
            let layout = staged.copy_out(&mut space, stackptr)?;
            Ok((space, entry, layout))
        });
        let (space, entry, layout) = match prepared {
            Ok(prepared) => prepared,
            Err(err) => {
                error!(path, error = %err, "Failed to load program");
                self.procs.destroy(proc);
                return Err(err);
            }
        };
        proc.setas(Some(space));

        let pid = proc.pid();
        if let Err(err) = self.start_thread(&proc, TrapFrame::default(), move |ctx| {
            let kernel = Arc::clone(ctx.kernel());
            kernel
                .machine()
                .enter_new_process(ctx, layout.argc, layout.argv, layout.stackptr, entry)
        }) {
            self.procs.destroy(proc);
            return Err(err);
        }
        Ok(pid)
    }

    /// Fork a kernel thread bound to `proc` that runs `entry` and then ends
    pub(crate) fn start_thread<F>(
        self: &Arc<Self>,
        proc: &Arc<Proc>,
        tf: TrapFrame,
        entry: F,
    ) -> KernelResult<ThreadId>
    where
        F: FnOnce(UserContext) -> Exit + Send + 'static,
    {
        let kernel = Arc::clone(self);
        let proc = Arc::clone(proc);
        let name = format!("{}[{}]", proc.name(), proc.pid());

        self.threads.thread_fork(name, move || {
            proc.attach_thread(std::thread::current().id());
            let ctx = UserContext::new(kernel, proc, tf);
            thread_exit(entry(ctx));
        })
    }

    /// Wait until every process thread has finished
    pub fn join_all(&self) {
        self.threads.join_all();
    }

    pub fn process_info(&self, pid: Pid) -> Option<ProcInfo> {
        self.procs.info(pid)
    }

    pub fn list_processes(&self) -> Vec<ProcInfo> {
        self.procs.list()
    }

    pub fn stats(&self) -> KernelStats {
        KernelStats {
            procs: self.procs.stats(),
            frames_used: self.coremap.used(),
            frames_total: self.coremap.total(),
            threads_forked: self.threads.forked(),
        }
    }
}

/// Builder for `Kernel`
pub struct KernelBuilder {
    config: Option<KernelConfig>,
    vfs: Option<Arc<dyn FileSystem>>,
}

impl KernelBuilder {
    pub fn new() -> Self {
        Self {
            config: None,
            vfs: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: KernelConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Use `vfs` for program images instead of an empty in-memory filesystem
    #[must_use]
    pub fn with_filesystem(mut self, vfs: Arc<dyn FileSystem>) -> Self {
        self.vfs = Some(vfs);
        self
    }

    pub fn build(self) -> Arc<Kernel> {
        let config = self.config.unwrap_or_default();
        let vfs = self
            .vfs
            .unwrap_or_else(|| Arc::new(MemFs::new()) as Arc<dyn FileSystem>);

        info!(
            frames = config.frames,
            wait_strategy = ?config.wait_strategy,
            fork_yield = ?config.fork_yield,
            "Kernel initialized"
        );

        Arc::new(Kernel {
            coremap: Arc::new(Coremap::new(config.frames)),
            procs: ProcTable::new(),
            vfs,
            machine: Machine::new(),
            threads: ThreadSystem::new(),
            next_text: AtomicU32::new(0),
            config,
        })
    }
}

impl Default for KernelBuilder {
    fn default() -> Self {
        Self::new()
    }
}
