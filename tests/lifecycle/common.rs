/*!
 * Shared helpers for lifecycle tests
 */

#![allow(dead_code)]

use proc_kernel::core::limits::{ARG_BUF_SIZE, USER_WORD_SIZE};
use proc_kernel::core::types::align_up;
use proc_kernel::{
    reg, try_init_test_tracing, Kernel, KernelConfig, UserContext, Vaddr,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const WORD: Vaddr = USER_WORD_SIZE as Vaddr;

/// Kernel that polls every millisecond
pub fn kernel() -> Arc<Kernel> {
    kernel_with(KernelConfig::polling(Duration::from_millis(1)))
}

pub fn kernel_with(config: KernelConfig) -> Arc<Kernel> {
    try_init_test_tracing();
    Kernel::builder().with_config(config).build()
}

/// Join every process thread and check that nothing leaked
pub fn assert_quiescent(kernel: &Kernel) {
    kernel.join_all();
    let stats = kernel.stats();
    assert_eq!(stats.procs.live, 0, "live processes: {:?}", kernel.list_processes());
    assert_eq!(stats.procs.created, stats.procs.destroyed);
    assert_eq!(stats.frames_used, 0);
}

/// User address of a scratch word below the stack pointer
pub fn scratch(ctx: &UserContext) -> Vaddr {
    ctx.trapframe().sp() - 2048
}

/// Place `path` and a NULL-terminated vector of `args` in user memory
pub fn stage_exec(ctx: &UserContext, path: &str, args: &[&str]) -> (Vaddr, Vaddr) {
    let mut at = ctx.trapframe().sp() - 1024;
    let path_addr = at;
    at += ctx.copyoutstr(path.as_bytes(), at).unwrap() as Vaddr;

    let mut ptrs = Vec::new();
    for arg in args {
        ptrs.push(at);
        at += ctx.copyoutstr(arg.as_bytes(), at).unwrap() as Vaddr;
    }
    ptrs.push(0);

    let argv = align_up(at, WORD);
    for (i, ptr) in ptrs.iter().enumerate() {
        ctx.copyout_word(*ptr, argv + i as Vaddr * WORD).unwrap();
    }
    (path_addr, argv)
}

/// What a freshly entered program sees in its registers and stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub argc: usize,
    pub argv: Vaddr,
    pub sp: Vaddr,
    /// `argc + 1` words starting at `argv`
    pub slots: Vec<Vaddr>,
    pub args: Vec<String>,
}

pub fn entry_view(ctx: &UserContext) -> EntryView {
    let tf = ctx.trapframe();
    let argc = tf.reg(reg::A0) as usize;
    let argv = tf.reg(reg::A1);
    let slots: Vec<Vaddr> = (0..=argc)
        .map(|i| ctx.copyin_word(argv + i as Vaddr * WORD).unwrap())
        .collect();
    let args = slots[..argc]
        .iter()
        .map(|&ptr| String::from_utf8(ctx.copyinstr(ptr, ARG_BUF_SIZE).unwrap()).unwrap())
        .collect();
    EntryView {
        argc,
        argv,
        sp: tf.sp(),
        slots,
        args,
    }
}

/// Spin (from inside a process) until `cond` holds
pub fn wait_until(mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not reached");
        std::thread::sleep(Duration::from_millis(1));
    }
}
