/*!
 * Orphan Tests
 * Parents exiting before or after their children
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use proc_kernel::UserContext;

#[test]
fn test_running_child_orphaned_and_self_destroys() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::bounded::<()>(0);

    let parent = kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let child = ctx
                .fork(move |ctx| {
                    let _ = gate_rx.recv();
                    ctx.exit(4)
                })
                .unwrap();
            tx.send(child).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    let child = rx.recv().unwrap();
    wait_until(|| kernel.process_info(parent).is_none());

    let info = kernel.process_info(child).unwrap();
    assert_eq!(info.parent, None);
    assert!(!info.is_zombie());

    gate_tx.send(()).unwrap();
    assert_quiescent(&kernel);
}

#[test]
fn test_exited_children_destroyed_with_parent() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();

    let parent = kernel
        .spawn("parent", move |mut ctx: UserContext| {
            let children: Vec<_> = (0..3).map(|code| ctx.fork(move |ctx| ctx.exit(code)).unwrap()).collect();
            let kernel = ctx.kernel().clone();
            wait_until(|| {
                children
                    .iter()
                    .all(|&c| kernel.process_info(c).is_some_and(|i| i.is_zombie()))
            });
            tx.send(kernel.stats().procs.zombies).unwrap();
            ctx.exit(0)
        })
        .unwrap();

    assert_eq!(rx.recv().unwrap(), 3);
    kernel.join_all();
    assert!(kernel.process_info(parent).is_none());
    assert_quiescent(&kernel);
}

#[test]
fn test_grandchild_outlives_child() {
    let kernel = kernel();
    let (tx, rx) = flume::unbounded();
    let (gate_tx, gate_rx) = flume::bounded::<()>(0);

    kernel
        .spawn("init", move |mut ctx: UserContext| {
            let child = ctx
                .fork(move |mut ctx| {
                    let grandchild = ctx
                        .fork(move |ctx| {
                            let _ = gate_rx.recv();
                            ctx.exit(1)
                        })
                        .unwrap();
                    tx.send(grandchild).unwrap();
                    ctx.exit(2)
                })
                .unwrap();

            let status = scratch(&ctx);
            ctx.waitpid(child, status, 0).unwrap();
            assert_eq!(proc_kernel::wexitstatus(ctx.copyin_word(status).unwrap() as i32), 2);
            ctx.exit(0)
        })
        .unwrap();

    let grandchild = rx.recv().unwrap();
    wait_until(|| {
        kernel
            .process_info(grandchild)
            .is_some_and(|i| i.parent.is_none())
    });

    gate_tx.send(()).unwrap();
    assert_quiescent(&kernel);
}
