//! Scenarios: the lock/release/cancel handshake between a project and its host

use cruise::core::IntegrationContext;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const SHORT: Duration = Duration::from_millis(20);

#[derive(Clone, Copy, Debug)]
enum Op {
    Lock,
    Release,
    Cancel,
}

fn apply(context: &IntegrationContext, op: Op) {
    match op {
        Op::Lock => context.lock(),
        Op::Release => context.release(),
        Op::Cancel => context.cancel(),
    }
}

/// Every sequence of up to three operations on a fresh context
fn sequences() -> Vec<Vec<Op>> {
    let ops = [Op::Lock, Op::Release, Op::Cancel];
    let mut all = vec![Vec::new()];
    for length in 1..=3 {
        let mut current: Vec<Vec<Op>> = vec![Vec::new()];
        for _ in 0..length {
            current = current
                .into_iter()
                .flat_map(|prefix| {
                    ops.iter().map(move |op| {
                        let mut next = prefix.clone();
                        next.push(*op);
                        next
                    })
                })
                .collect();
        }
        all.extend(current);
    }
    all
}

#[test]
fn test_wait_reflects_lock_and_cancel_state() {
    for sequence in sequences() {
        let context = IntegrationContext::new("Project");
        let mut locked = false;
        let mut cancelled = false;
        for op in &sequence {
            apply(&context, *op);
            match op {
                Op::Lock => locked = true,
                Op::Release => locked = false,
                Op::Cancel => {
                    cancelled = true;
                    locked = false;
                }
            }
        }

        let expected = !locked && !cancelled;
        assert_eq!(
            context.wait(SHORT),
            expected,
            "sequence {:?} should wait with {}",
            sequence,
            expected
        );
    }
}

#[test]
fn test_cancel_is_never_undone() {
    let context = IntegrationContext::new("Project");
    context.cancel();
    for op in [Op::Release, Op::Lock, Op::Release] {
        apply(&context, op);
        assert!(!context.wait(SHORT));
    }
    assert!(context.is_cancelled());
}

#[test]
fn test_wait_times_out_without_answer() {
    let context = IntegrationContext::new("Project");
    context.lock();

    let started = Instant::now();
    assert!(!context.wait(Duration::from_millis(100)));
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100), "returned after {:?}", elapsed);
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn test_deferred_release_from_host_thread() {
    let context = IntegrationContext::new("Project");
    context.lock();

    let host_side = context.clone();
    let host = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        host_side.release();
    });

    let started = Instant::now();
    assert!(context.wait(Duration::from_secs(10)));
    assert!(started.elapsed() < Duration::from_secs(5));
    host.join().unwrap();
}

#[test]
fn test_deferred_cancel_wakes_waiter_promptly() {
    let context = IntegrationContext::new("Project");
    context.lock();

    let host_side = context.clone();
    let host = thread::spawn(move || {
        thread::sleep(Duration::from_millis(30));
        host_side.cancel();
        // A racing release must not turn the refusal into a grant
        host_side.release();
    });

    let started = Instant::now();
    assert!(!context.wait(Duration::from_secs(10)));
    assert!(started.elapsed() < Duration::from_secs(5));
    host.join().unwrap();
}

#[test]
fn test_completion_reaches_only_current_subscribers() {
    let context = IntegrationContext::new("Project");
    let early = Arc::new(AtomicUsize::new(0));
    let late = Arc::new(AtomicUsize::new(0));

    let counter = early.clone();
    context.on_completed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    context.complete();

    let counter = late.clone();
    context.on_completed(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    context.complete();

    assert_eq!(early.load(Ordering::SeqCst), 1);
    assert_eq!(late.load(Ordering::SeqCst), 1);
    assert!(context.is_completed());
}
