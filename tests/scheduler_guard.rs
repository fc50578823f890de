// tests/scheduler_guard.rs
// The run-guard invariant: a tick that observes a running job must return
// without executing the body or touching any bookkeeping.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use eco_content_pipeline::scheduler::{RunSummary, Schedule, Scheduler, TickOutcome};

async fn wait_until_running(scheduler: &Scheduler, job: &str) {
    for _ in 0..100 {
        if scheduler
            .status()
            .iter()
            .any(|s| s.job_id == job && s.is_running)
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {job} never reached running state");
}

#[tokio::test]
async fn overlapping_tick_skips_without_side_effects() {
    let scheduler = Arc::new(Scheduler::new());
    let gate = Arc::new(Notify::new());
    let executions = Arc::new(AtomicUsize::new(0));

    {
        let gate = gate.clone();
        let executions = executions.clone();
        scheduler.register(
            "slow-job",
            "blocks until released",
            Schedule::Every { hours: 1 },
            move || {
                let gate = gate.clone();
                let executions = executions.clone();
                async move {
                    executions.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    Ok(RunSummary::default())
                }
            },
        );
    }

    let first = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.tick("slow-job").await })
    };
    wait_until_running(&scheduler, "slow-job").await;

    let before = scheduler.status()[0].clone();
    assert!(before.is_running);

    // Second tick while the first holds the guard: skip, no side effects.
    let overlapped = scheduler.tick("slow-job").await;
    assert_eq!(overlapped, TickOutcome::AlreadyRunning);
    assert_eq!(executions.load(Ordering::SeqCst), 1);

    let after = scheduler.status()[0].clone();
    assert_eq!(after.last_run_at, before.last_run_at);
    assert_eq!(after.next_run_at, before.next_run_at);

    // Release the first run and make sure it completes and frees the guard.
    gate.notify_one();
    let outcome = first.await.unwrap();
    assert!(matches!(outcome, TickOutcome::Completed { .. }));
    assert!(!scheduler.status()[0].is_running);

    // The guard is reusable after completion.
    gate.notify_one();
    let again = scheduler.tick("slow-job").await;
    assert!(matches!(again, TickOutcome::Completed { .. }));
    assert_eq!(executions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn manual_trigger_respects_the_same_guard() {
    let scheduler = Arc::new(Scheduler::new());
    let gate = Arc::new(Notify::new());
    {
        let gate = gate.clone();
        scheduler.register(
            "guarded",
            "",
            Schedule::Every { hours: 1 },
            move || {
                let gate = gate.clone();
                async move {
                    gate.notified().await;
                    Ok(RunSummary::default())
                }
            },
        );
    }

    let running = {
        let scheduler = scheduler.clone();
        tokio::spawn(async move { scheduler.tick("guarded").await })
    };
    wait_until_running(&scheduler, "guarded").await;

    let manual = scheduler.run_manually("guarded").await;
    assert_eq!(manual[0].1, TickOutcome::AlreadyRunning);

    gate.notify_one();
    running.await.unwrap();
}
