/*!
 * Process Kernel - Main Entry Point
 *
 * Boots the kernel with a few built-in programs and runs one of them as the
 * initial process:
 * - /bin/true exits with status 0
 * - /bin/echo logs its arguments
 * - /testbin/forktest forks, execs /bin/echo in the child, and reaps it
 *
 * Usage: `kernel [PROGRAM [ARGS...]]` (default: /testbin/forktest)
 */

use miette::IntoDiagnostic;
use proc_kernel::core::limits::ARG_BUF_SIZE;
use proc_kernel::core::types::align_up;
use proc_kernel::{
    init_tracing, reg, wexitstatus, Kernel, KernelConfig, KernelResult, UserContext, Vaddr,
};
use std::sync::Arc;
use tracing::{error, info, warn};

const USER_WORD: Vaddr = 4;

fn main() -> miette::Result<()> {
    // Initialize structured tracing
    init_tracing();

    info!("Process kernel starting...");
    info!("================================================");

    let config = KernelConfig::from_env();
    let kernel = Kernel::builder().with_config(config).build();

    info!("Installing built-in programs...");
    install_programs(&kernel)?;

    let mut argv: Vec<String> = std::env::args().skip(1).collect();
    if argv.is_empty() {
        argv.push("/testbin/forktest".to_string());
    }
    let args: Vec<&str> = argv.iter().map(String::as_str).collect();

    let pid = kernel.run_program(args[0], &args)?;
    info!(pid, program = args[0], "Initial process started");

    kernel.join_all();

    let stats = kernel.stats();
    info!(
        created = stats.procs.created,
        destroyed = stats.procs.destroyed,
        live = stats.procs.live,
        frames_used = stats.frames_used,
        "All processes finished"
    );
    info!(
        stats = %serde_json::to_string(&stats).into_diagnostic()?,
        "Kernel halted"
    );
    Ok(())
}

fn install_programs(kernel: &Arc<Kernel>) -> KernelResult<()> {
    kernel.install_program("/bin/true", Arc::new(|ctx: UserContext| ctx.exit(0)))?;
    kernel.install_program("/bin/echo", Arc::new(echo))?;
    kernel.install_program("/testbin/forktest", Arc::new(forktest))?;
    Ok(())
}

/// Read the argument vector the kernel placed in a0/a1
fn user_args(ctx: &UserContext) -> KernelResult<Vec<String>> {
    let argc = ctx.trapframe().reg(reg::A0) as Vaddr;
    let argv = ctx.trapframe().reg(reg::A1);
    (0..argc)
        .map(|i| {
            let ptr = ctx.copyin_word(argv + i * USER_WORD)?;
            let raw = ctx.copyinstr(ptr, ARG_BUF_SIZE)?;
            Ok(String::from_utf8_lossy(&raw).into_owned())
        })
        .collect()
}

fn echo(ctx: UserContext) -> proc_kernel::Exit {
    match user_args(&ctx) {
        Ok(args) => {
            info!(pid = ctx.getpid(), "echo: {}", args.get(1..).unwrap_or_default().join(" "));
            ctx.exit(0)
        }
        Err(e) => {
            error!(pid = ctx.getpid(), error = %e, "echo: bad argument vector");
            ctx.exit(1)
        }
    }
}

/// Write `path` and a NULL-terminated argument vector below the stack
/// pointer; returns their user addresses
fn stage_exec(ctx: &UserContext, path: &str, args: &[&str]) -> KernelResult<(Vaddr, Vaddr)> {
    let mut at = ctx.trapframe().sp() - 1024;
    let path_addr = at;
    at += ctx.copyoutstr(path.as_bytes(), at)? as Vaddr;

    let mut ptrs = Vec::with_capacity(args.len() + 1);
    for arg in args {
        ptrs.push(at);
        at += ctx.copyoutstr(arg.as_bytes(), at)? as Vaddr;
    }
    ptrs.push(0);

    let argv = align_up(at, USER_WORD);
    for (i, ptr) in ptrs.iter().enumerate() {
        ctx.copyout_word(*ptr, argv + i as Vaddr * USER_WORD)?;
    }
    Ok((path_addr, argv))
}

fn forktest(mut ctx: UserContext) -> proc_kernel::Exit {
    let pid = ctx.getpid();
    let child = ctx.fork(|ctx| {
        let (path, argv) = match stage_exec(&ctx, "/bin/echo", &["echo", "hello", "from", "child"]) {
            Ok(staged) => staged,
            Err(e) => {
                error!(pid = ctx.getpid(), error = %e, "forktest: cannot stage arguments");
                return ctx.exit(2);
            }
        };
        match ctx.execv(path, argv) {
            Ok(exit) => exit,
            Err(e) => {
                error!(error = %e, errno = ?e.error().errno(), "forktest: execv failed");
                e.into_context().exit(3)
            }
        }
    });

    let child = match child {
        Ok(child) => child,
        Err(e) => {
            error!(pid, error = %e, "forktest: fork failed");
            return ctx.exit(1);
        }
    };

    let status = ctx.trapframe().sp() - USER_WORD;
    match ctx.waitpid(child, status, 0) {
        Ok(reaped) => match ctx.copyin_word(status) {
            Ok(word) => {
                info!(pid, child = reaped, code = wexitstatus(word as i32), "forktest: child reaped");
                ctx.exit(0)
            }
            Err(e) => {
                warn!(pid, error = %e, "forktest: status unreadable");
                ctx.exit(1)
            }
        },
        Err(e) => {
            error!(pid, error = %e, "forktest: waitpid failed");
            ctx.exit(1)
        }
    }
}
