/*!
 * Exit and Waitpid Tests
 * Exit codes reach the parent exactly once; errors leave state untouched
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use proc_kernel::{
    mkwait_exit, wexitstatus, wifexited, Errno, KernelConfig, KernelError, UserContext,
};
use std::time::Duration;

fn reap_code(config: KernelConfig, child_delay: Duration, code: i32) {
    let kernel = kernel_with(config);
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let child = ctx
                .fork(move |ctx| {
                    std::thread::sleep(child_delay);
                    ctx.exit(code)
                })
                .unwrap();
            let status = scratch(&ctx);
            let reaped = ctx.waitpid(child, status, 0);
            let word = ctx.copyin_word(status).unwrap();
            tx.send((child, reaped, word as i32)).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (child, reaped, status) = rx.recv().unwrap();
    assert_eq!(reaped, Ok(child));
    assert!(wifexited(status));
    assert_eq!(status, mkwait_exit(code));
    assert_eq!(wexitstatus(status), code & 0xff);
    assert_quiescent(&kernel);
}

#[test]
fn test_reap_already_exited_child() {
    reap_code(KernelConfig::default(), Duration::ZERO, 42);
}

#[test]
fn test_reap_blocks_until_child_exits_polling() {
    reap_code(
        KernelConfig::polling(Duration::from_millis(2)),
        Duration::from_millis(30),
        7,
    );
}

#[test]
fn test_reap_blocks_until_child_exits_notify() {
    reap_code(KernelConfig::notifying(), Duration::from_millis(30), 9);
}

#[test]
fn test_status_keeps_low_byte_only() {
    reap_code(KernelConfig::notifying(), Duration::ZERO, 0x1ff);
}

#[test]
fn test_second_wait_is_esrch() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let child = ctx.fork(|ctx| ctx.exit(3)).unwrap();
            let first = ctx.waitpid(child, 0, 0);
            let second = ctx.waitpid(child, 0, 0);
            tx.send((child, first, second)).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (child, first, second) = rx.recv().unwrap();
    assert_eq!(first, Ok(child));
    let err = second.unwrap_err();
    assert_eq!(err, KernelError::NoSuchProcess(child));
    assert_eq!(err.errno(), Errno::ESRCH);
    assert_quiescent(&kernel);
}

#[test]
fn test_nonzero_options_rejected_without_side_effects() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let child = ctx.fork(|ctx| ctx.exit(1)).unwrap();
            let rejected = ctx.waitpid(child, scratch(&ctx), 1);
            let still_child = ctx.proc().lock().children().contains(&child);
            let reaped = ctx.waitpid(child, 0, 0);
            tx.send((child, rejected, still_child, reaped)).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (child, rejected, still_child, reaped) = rx.recv().unwrap();
    assert_eq!(rejected.unwrap_err().errno(), Errno::EINVAL);
    assert!(still_child);
    assert_eq!(reaped, Ok(child));
    assert_quiescent(&kernel);
}

#[test]
fn test_waiting_for_non_child_is_esrch() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::bounded::<()>(0);

    let other = kernel
        .spawn("bystander", move |ctx: UserContext| {
            let _ = gate_rx.recv();
            ctx.exit(0)
        })
        .unwrap();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let pid = ctx.getpid();
            let results = vec![
                ctx.waitpid(other, 0, 0),
                ctx.waitpid(pid, 0, 0),
                ctx.waitpid(31_000, 0, 0),
            ];
            tx.send(results).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let results = rx.recv().unwrap();
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(KernelError::NoSuchProcess(_)))));

    // The unrelated process was not disturbed
    assert!(kernel.process_info(other).is_some());
    gate_tx.send(()).unwrap();
    assert_quiescent(&kernel);
}

#[test]
fn test_bad_status_pointer_still_reaps() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let child = ctx.fork(|ctx| ctx.exit(5)).unwrap();
            let faulted = ctx.waitpid(child, 0x10, 0);
            let again = ctx.waitpid(child, 0, 0);
            tx.send((faulted, again)).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (faulted, again) = rx.recv().unwrap();
    assert_eq!(faulted, Err(KernelError::BadAddress(0x10)));
    assert_eq!(faulted.unwrap_err().errno(), Errno::EFAULT);
    assert!(matches!(again, Err(KernelError::NoSuchProcess(_))));
    assert_quiescent(&kernel);
}

#[test]
fn test_exited_child_is_zombie_until_reaped() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::bounded::<()>(0);

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let child = ctx.fork(|ctx| ctx.exit(11)).unwrap();
            tx.send(child).unwrap();
            let _ = gate_rx.recv();
            let reaped = ctx.waitpid(child, 0, 0);
            assert_eq!(reaped, Ok(child));
            ctx.exit(0)
        })
        .unwrap();

    let child = rx.recv().unwrap();
    wait_until(|| kernel.process_info(child).is_some_and(|i| i.is_zombie()));

    let info = kernel.process_info(child).unwrap();
    assert_eq!(info.exit_code, Some(11));
    assert!(!info.has_thread);
    assert!(!info.has_addrspace);
    assert_eq!(kernel.stats().procs.zombies, 1);

    gate_tx.send(()).unwrap();
    assert_quiescent(&kernel);
}
