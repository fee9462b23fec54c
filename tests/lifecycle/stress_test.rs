/*!
 * Lifecycle Stress Tests
 * Randomized process trees; every PCB must be destroyed exactly once
 */

use crate::common::*;
use pretty_assertions::assert_eq;
use proc_kernel::{wexitstatus, Exit, KernelConfig, UserContext};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// What one process does before exiting
#[derive(Debug, Clone)]
struct Plan {
    code: i32,
    delay_ms: u64,
    /// Reap this process from its parent, or leave it to the exit path
    reaped: bool,
    children: Vec<Plan>,
}

fn random_plan(rng: &mut StdRng, depth: usize) -> Plan {
    let fanout = if depth == 0 { 0 } else { rng.gen_range(0..4) };
    Plan {
        code: rng.gen_range(0..256),
        delay_ms: rng.gen_range(0..5),
        reaped: rng.gen_bool(0.5),
        children: (0..fanout).map(|_| random_plan(rng, depth - 1)).collect(),
    }
}

fn count(plan: &Plan) -> u64 {
    1 + plan.children.iter().map(count).sum::<u64>()
}

fn run(mut ctx: UserContext, plan: Plan, mismatches: flume::Sender<(i32, i32)>) -> Exit {
    let mut forked = Vec::new();
    for child_plan in plan.children {
        let reaped = child_plan.reaped;
        let code = child_plan.code;
        let tx = mismatches.clone();
        match ctx.fork(move |ctx| run(ctx, child_plan, tx)) {
            Ok(pid) => forked.push((pid, code, reaped)),
            Err(e) => panic!("fork failed: {e}"),
        }
    }

    std::thread::sleep(Duration::from_millis(plan.delay_ms));

    let status = scratch(&ctx);
    for (pid, code, reaped) in forked {
        if reaped {
            assert_eq!(ctx.waitpid(pid, status, 0), Ok(pid));
            let got = wexitstatus(ctx.copyin_word(status).unwrap() as i32);
            if got != code {
                mismatches.send((code, got)).unwrap();
            }
        }
    }
    ctx.exit(plan.code)
}

fn stress(config: KernelConfig, seed: u64) {
    // Up to 160 live processes of 13 frames each
    let kernel = kernel_with(config.with_frames(4096));
    let mut rng = StdRng::seed_from_u64(seed);
    let (tx, rx) = flume::unbounded();

    let mut expected = 0;
    for _ in 0..4 {
        let plan = random_plan(&mut rng, 3);
        expected += count(&plan);
        let tx = tx.clone();
        kernel.spawn("root", move |ctx| run(ctx, plan, tx)).unwrap();
    }
    drop(tx);

    assert_quiescent(&kernel);
    assert_eq!(kernel.stats().procs.created, expected);
    let mismatches: Vec<(i32, i32)> = rx.drain().collect();
    assert!(mismatches.is_empty(), "status mismatches: {:?}", mismatches);
}

#[test]
fn test_random_trees_polling() {
    for seed in 0..4 {
        stress(KernelConfig::polling(Duration::from_millis(1)), seed);
    }
}

#[test]
fn test_random_trees_notify() {
    for seed in 100..104 {
        stress(KernelConfig::notifying(), seed);
    }
}
