mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::common::{Gate, init_tracing, within_timeout};

use nodeforge::errors::BuildError;
use nodeforge::exec::{BuildJob, GroupOutcome, WorkerPool};

/// Counters for one job's callbacks.
#[derive(Default)]
struct Calls {
    items: AtomicUsize,
    complete: AtomicUsize,
    failure: AtomicUsize,
    cleanup: AtomicUsize,
}

fn counted_job(calls: &Arc<Calls>, items: usize) -> BuildJob {
    let mut job = BuildJob::new();
    for _ in 0..items {
        let calls = Arc::clone(calls);
        job.push_item(move || {
            calls.items.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
    }
    let (c, f, d) = (Arc::clone(calls), Arc::clone(calls), Arc::clone(calls));
    job.on_complete(move || {
        c.complete.fetch_add(1, Ordering::SeqCst);
    })
    .on_failure(move || {
        f.failure.fetch_add(1, Ordering::SeqCst);
    })
    .on_cleanup(move || {
        d.cleanup.fetch_add(1, Ordering::SeqCst);
    })
}

#[test]
fn test_pool_runs_plain_items() {
    init_tracing();
    let pool = WorkerPool::new(4).unwrap();
    assert_eq!(pool.thread_count(), 4);

    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..100 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.wait_for_current_tasks();

    assert_eq!(counter.load(Ordering::SeqCst), 100);
    assert_eq!(pool.open_items(), 0);
}

#[test]
fn test_zero_threads_means_available_parallelism() {
    let pool = WorkerPool::new(0).unwrap();
    assert!(pool.thread_count() >= 1);
}

#[test]
fn test_group_completes_once_after_all_items() {
    init_tracing();
    let pool = WorkerPool::new(3).unwrap();
    let calls = Arc::new(Calls::default());

    let handle = pool.submit_group("group", counted_job(&calls, 16));
    assert_eq!(handle.wait(), GroupOutcome::Completed);

    assert_eq!(calls.items.load(Ordering::SeqCst), 16);
    assert_eq!(calls.complete.load(Ordering::SeqCst), 1);
    assert_eq!(calls.failure.load(Ordering::SeqCst), 0);
    assert_eq!(calls.cleanup.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_group_resolves_immediately() {
    let pool = WorkerPool::new(1).unwrap();
    let calls = Arc::new(Calls::default());

    let handle = pool.submit_group("empty", counted_job(&calls, 0));

    assert_eq!(calls.complete.load(Ordering::SeqCst), 1);
    assert_eq!(calls.cleanup.load(Ordering::SeqCst), 1);
    assert_eq!(handle.wait(), GroupOutcome::Completed);
}

#[test]
fn test_failing_item_resolves_group_as_failed() {
    init_tracing();
    let pool = WorkerPool::new(2).unwrap();
    let calls = Arc::new(Calls::default());

    let job = counted_job(&calls, 4).with_item(|| Err(BuildError::new("boom")));
    let handle = pool.submit_group("failing", job);

    assert_eq!(handle.wait(), GroupOutcome::Failed);
    assert_eq!(calls.complete.load(Ordering::SeqCst), 0);
    assert_eq!(calls.failure.load(Ordering::SeqCst), 1);
    assert_eq!(calls.cleanup.load(Ordering::SeqCst), 1);
}

#[test]
fn test_panicking_item_is_contained() {
    init_tracing();
    let pool = WorkerPool::new(1).unwrap();
    let calls = Arc::new(Calls::default());

    let job = BuildJob::new()
        .with_item(|| panic!("item exploded"))
        .on_failure({
            let calls = Arc::clone(&calls);
            move || {
                calls.failure.fetch_add(1, Ordering::SeqCst);
            }
        });
    assert_eq!(pool.submit_group("panics", job).wait(), GroupOutcome::Failed);
    assert_eq!(calls.failure.load(Ordering::SeqCst), 1);

    // The single worker survived the panic.
    let again = Arc::new(Calls::default());
    assert_eq!(
        pool.submit_group("after", counted_job(&again, 2)).wait(),
        GroupOutcome::Completed
    );
}

#[test]
fn test_cancel_discards_queued_group_and_waits_for_running_item() {
    init_tracing();
    let pool = Arc::new(WorkerPool::new(1).unwrap());
    let gate = Gate::new();
    let finished_blocker = Arc::new(AtomicUsize::new(0));

    {
        let gate = Arc::clone(&gate);
        let finished = Arc::clone(&finished_blocker);
        pool.submit(move || {
            gate.pass();
            finished.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert!(gate.wait_entered(1, Duration::from_secs(5)));

    // Queued behind the blocked worker. Its failure callback (run while
    // the queue is drained) releases the blocker.
    let calls = Arc::new(Calls::default());
    let job = {
        let gate = Arc::clone(&gate);
        let calls_f = Arc::clone(&calls);
        let mut job = counted_job(&calls, 3);
        job = job.on_failure(move || {
            calls_f.failure.fetch_add(1, Ordering::SeqCst);
            gate.open();
        });
        job
    };
    let handle = pool.submit_group("queued", job);
    assert_eq!(pool.open_items(), 4);

    let p = Arc::clone(&pool);
    within_timeout(move || p.cancel_current_tasks());

    assert_eq!(handle.wait(), GroupOutcome::Failed);
    assert_eq!(calls.items.load(Ordering::SeqCst), 0, "queued items never ran");
    assert_eq!(calls.failure.load(Ordering::SeqCst), 1);
    assert_eq!(calls.cleanup.load(Ordering::SeqCst), 1);
    assert_eq!(finished_blocker.load(Ordering::SeqCst), 1, "running item finished");
    assert_eq!(pool.open_items(), 0);
}

#[test]
fn test_drop_shuts_down_workers() {
    let pool = WorkerPool::new(4).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    for _ in 0..8 {
        let counter = Arc::clone(&counter);
        pool.submit(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
    }
    pool.wait_for_current_tasks();

    within_timeout(move || drop(pool));
    assert_eq!(counter.load(Ordering::SeqCst), 8);
}

#[test]
fn test_panicking_completion_callback_fails_group_without_hanging() {
    init_tracing();
    let pool = Arc::new(WorkerPool::new(1).unwrap());
    let calls = Arc::new(Calls::default());

    let job = {
        let (f, d) = (Arc::clone(&calls), Arc::clone(&calls));
        BuildJob::new()
            .with_item(|| Ok(()))
            .on_complete(|| panic!("publishing exploded"))
            .on_failure(move || {
                f.failure.fetch_add(1, Ordering::SeqCst);
            })
            .on_cleanup(move || {
                d.cleanup.fetch_add(1, Ordering::SeqCst);
            })
    };
    let handle = pool.submit_group("bad-complete", job);
    assert_eq!(handle.wait(), GroupOutcome::Failed);

    let p = Arc::clone(&pool);
    within_timeout(move || p.wait_for_current_tasks());
    assert_eq!(pool.open_items(), 0);
    assert_eq!(calls.failure.load(Ordering::SeqCst), 1);
    assert_eq!(calls.cleanup.load(Ordering::SeqCst), 1);

    // The single worker is still alive.
    let again = Arc::new(Calls::default());
    assert_eq!(
        pool.submit_group("after", counted_job(&again, 2)).wait(),
        GroupOutcome::Completed
    );
}

#[test]
fn test_panicking_cleanup_still_resolves_group() {
    let pool = WorkerPool::new(1).unwrap();
    let calls = Arc::new(Calls::default());

    let job = counted_job(&calls, 2).on_cleanup(|| panic!("cleanup exploded"));
    assert_eq!(
        pool.submit_group("bad-cleanup", job).wait(),
        GroupOutcome::Completed
    );
    pool.wait_for_current_tasks();
    assert_eq!(calls.complete.load(Ordering::SeqCst), 1);
    assert_eq!(pool.open_items(), 0);
}

#[tokio::test]
async fn test_group_outcome_can_be_awaited() {
    let pool = WorkerPool::new(2).unwrap();
    let calls = Arc::new(Calls::default());

    let handle = pool.submit_group("async", counted_job(&calls, 4));
    let outcome = crate::common::with_timeout(handle.outcome()).await;

    assert_eq!(outcome, GroupOutcome::Completed);
    assert_eq!(calls.items.load(Ordering::SeqCst), 4);
}
