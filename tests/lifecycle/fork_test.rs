/*!
 * Fork Tests
 * Child identity, register state, address space isolation, and failure cleanup
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use proc_kernel::{reg, Errno, KernelConfig, UserContext};
use std::time::Duration;

#[test]
fn test_fork_returns_child_pid_and_child_sees_zero() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            ctx.trapframe_mut().epc = 0x0040_0100;
            ctx.trapframe_mut().set_reg(reg::GP, 0xdead_beef);

            let child_tx = tx.clone();
            let child = ctx
                .fork(move |ctx| {
                    let tf = ctx.trapframe();
                    child_tx
                        .send((
                            "child",
                            ctx.getpid(),
                            ctx.proc().lock().parent(),
                            tf.reg(reg::V0),
                            tf.reg(reg::A3),
                            tf.epc,
                            tf.reg(reg::GP),
                        ))
                        .unwrap();
                    ctx.exit(0)
                })
                .unwrap();

            ctx.waitpid(child, 0, 0).unwrap();
            let tf = ctx.trapframe();
            tx.send(("parent", child, None, 0, 0, tf.epc, 0)).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (_, child_pid, child_parent, v0, a3, child_epc, probe) = rx.recv().unwrap();
    let (_, returned_pid, _, _, _, parent_epc, _) = rx.recv().unwrap();

    assert_eq!(child_pid, returned_pid);
    assert_eq!(v0, 0);
    assert_eq!(a3, 0);
    assert_eq!(child_epc, parent_epc + 4);
    assert_eq!(probe, 0xdead_beef);
    assert!(child_parent.is_some());
    assert_ne!(child_parent, Some(child_pid));
    assert_quiescent(&kernel);
}

#[test]
fn test_fork_copies_address_space() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let at = scratch(&ctx);
            ctx.copyout(b"parent", at).unwrap();

            let child_tx = tx.clone();
            let child = ctx
                .fork(move |ctx| {
                    let mut seen = [0u8; 6];
                    ctx.copyin(at, &mut seen).unwrap();
                    ctx.copyout(b"child!", at).unwrap();
                    child_tx.send(seen.to_vec()).unwrap();
                    ctx.exit(0)
                })
                .unwrap();

            ctx.waitpid(child, 0, 0).unwrap();
            let mut mine = [0u8; 6];
            ctx.copyin(at, &mut mine).unwrap();
            tx.send(mine.to_vec()).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    assert_eq!(rx.recv().unwrap(), b"parent".to_vec());
    assert_eq!(rx.recv().unwrap(), b"parent".to_vec());
    assert_quiescent(&kernel);
}

#[test]
fn test_fork_out_of_memory_leaves_no_child() {
    // A spawned process holds 13 frames (directory + 12 stack pages)
    let kernel = kernel_with(KernelConfig::default().with_frames(20));
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let result = ctx.fork(|ctx| ctx.exit(0));
            let children = ctx.proc().lock().children().len();
            let live = ctx.kernel().procs().len();
            tx.send((result, children, live)).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (result, children, live) = rx.recv().unwrap();
    assert_eq!(result.unwrap_err().errno(), Errno::ENOMEM);
    assert_eq!(children, 0);
    assert_eq!(live, 1);
    assert_quiescent(&kernel);
}

#[test]
fn test_many_children_reaped_in_any_order() {
    let kernel = kernel_with(KernelConfig::notifying());
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let mut children = Vec::new();
            for code in 0..8 {
                let child = ctx
                    .fork(move |ctx| {
                        std::thread::sleep(Duration::from_millis(8 - code as u64));
                        ctx.exit(code)
                    })
                    .unwrap();
                children.push((child, code));
            }

            let status = scratch(&ctx);
            for &(child, code) in children.iter().rev() {
                assert_eq!(ctx.waitpid(child, status, 0), Ok(child));
                let word = ctx.copyin_word(status).unwrap() as i32;
                tx.send((code, proc_kernel::wexitstatus(word))).unwrap();
            }
            ctx.exit(0)
        })
        .unwrap();

    kernel.join_all();
    let results: Vec<(i32, i32)> = rx.drain().collect();
    assert_eq!(results.len(), 8);
    assert!(results.iter().all(|(expected, got)| expected == got));
    assert_quiescent(&kernel);
}

#[test]
fn test_fork_yield_pauses_parent() {
    let kernel = kernel_with(
        KernelConfig::polling(Duration::from_millis(1)).with_fork_yield(Duration::from_millis(20)),
    );
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let started = std::time::Instant::now();
            let child = ctx.fork(|ctx| ctx.exit(0)).unwrap();
            let elapsed = started.elapsed();
            ctx.waitpid(child, 0, 0).unwrap();
            tx.send(elapsed).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    assert!(rx.recv().unwrap() >= Duration::from_millis(20));
    assert_quiescent(&kernel);
}

#[test]
fn test_pids_are_unique_among_live_processes() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::bounded::<()>(0);

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let mut pids = vec![ctx.getpid()];
            for _ in 0..5 {
                let gate = gate_rx.clone();
                pids.push(
                    ctx.fork(move |ctx| {
                        let _ = gate.recv();
                        ctx.exit(0)
                    })
                    .unwrap(),
                );
            }
            tx.send(pids.clone()).unwrap();
            for &pid in &pids[1..] {
                ctx.waitpid(pid, 0, 0).unwrap();
            }
            ctx.exit(0)
        })
        .unwrap();

    let mut pids = rx.recv().unwrap();
    pids.sort_unstable();
    pids.dedup();
    assert_eq!(pids.len(), 6);
    for _ in 0..5 {
        gate_tx.send(()).unwrap();
    }
    assert_quiescent(&kernel);
}

#[test]
fn test_reaped_children_release_thread_handles() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    kernel
        .spawn("parent", move |mut ctx: UserContext| {
            for _ in 0..200 {
                let child = ctx.fork(|ctx| ctx.exit(0)).unwrap();
                ctx.waitpid(child, 0, 0).unwrap();
            }
            let live = ctx.kernel().procs().len();
            tx.send((live, ctx.kernel().threads().held())).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let (live, held) = rx.recv().unwrap();
    assert_eq!(live, 1);
    // The parent plus the few children still unwinding after exit
    assert!(held < 50, "{} thread handles held", held);
    assert_quiescent(&kernel);
    assert_eq!(kernel.threads().held(), 0);
}
