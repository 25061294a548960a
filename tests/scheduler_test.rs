// Scheduler behaviour through the public API, driven by Tokio's paused clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use warden::config::SchedulerConfig;
use warden::error::SchedulerError;
use warden::scheduler::Scheduler;
use warden::types::TaskState;

fn scheduler() -> Scheduler {
    Scheduler::new(SchedulerConfig {
        poll_interval_ms: 1000,
        stop_timeout_secs: 3,
        history_limit: 128,
    })
}

#[tokio::test(start_paused = true)]
async fn tasks_run_no_earlier_than_delay_and_within_one_poll() {
    let scheduler = scheduler();
    let observed = Arc::new(Mutex::new(Vec::new()));
    let submitted = Instant::now();

    for delay_ms in [0_i64, 2_500, 4_000] {
        let observed = observed.clone();
        scheduler
            .schedule(chrono::Duration::milliseconds(delay_ms), move || async move {
                observed.lock().unwrap().push((delay_ms, Instant::now()));
                Ok(())
            })
            .unwrap();
    }

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;
    scheduler.shutdown().await;

    let observed = observed.lock().unwrap();
    assert_eq!(observed.len(), 3);
    for (delay_ms, at) in observed.iter() {
        let lower = submitted + Duration::from_millis(*delay_ms as u64);
        assert!(*at >= lower, "task with delay {delay_ms}ms ran early");
        assert!(
            *at <= lower + Duration::from_secs(1),
            "task with delay {delay_ms}ms ran more than one poll late"
        );
    }
}

#[tokio::test(start_paused = true)]
async fn cancel_before_due_prevents_execution() {
    let scheduler = scheduler();
    let counter = Arc::new(AtomicUsize::new(0));
    let c = counter.clone();
    let id = scheduler
        .schedule(chrono::Duration::seconds(3), move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.cancel(id), Ok(true));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(counter.load(Ordering::SeqCst), 0);
    assert_eq!(scheduler.state(id), Some(TaskState::Cancelled));
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn cancel_while_running_returns_false() {
    let scheduler = scheduler();
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
    let id = scheduler
        .schedule(chrono::Duration::zero(), move || async move {
            let _ = release_rx.await;
            Ok(())
        })
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(scheduler.state(id), Some(TaskState::Running));
    assert_eq!(scheduler.cancel(id), Ok(false));

    release_tx.send(()).unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(scheduler.state(id), Some(TaskState::Completed));
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn failing_task_does_not_stop_later_work() {
    let scheduler = scheduler();
    let counter = Arc::new(AtomicUsize::new(0));

    let failing = scheduler
        .schedule(chrono::Duration::seconds(1), || async {
            Err::<(), _>(anyhow::anyhow!("work item exploded"))
        })
        .unwrap();
    let c = counter.clone();
    let later = scheduler
        .schedule(chrono::Duration::seconds(3), move || async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(scheduler.state(failing), Some(TaskState::Failed));
    assert_eq!(scheduler.state(later), Some(TaskState::Completed));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert!(scheduler.is_running());
    scheduler.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn slow_task_delays_but_never_drops_later_due_tasks() {
    let scheduler = scheduler();
    let order = Arc::new(Mutex::new(Vec::new()));

    for (label, sleep_secs) in [("slow", 5_u64), ("quick", 0)] {
        let order = order.clone();
        scheduler
            .schedule(chrono::Duration::zero(), move || async move {
                tokio::time::sleep(Duration::from_secs(sleep_secs)).await;
                order.lock().unwrap().push(label);
                Ok(())
            })
            .unwrap();
    }

    scheduler.start().unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(order.lock().unwrap().is_empty());

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(*order.lock().unwrap(), vec!["slow", "quick"]);
    scheduler.shutdown().await;
}

#[tokio::test]
async fn invalid_and_unknown_requests_are_errors() {
    let scheduler = scheduler();
    assert!(matches!(
        scheduler.schedule(chrono::Duration::milliseconds(-5), || async { Ok(()) }),
        Err(SchedulerError::InvalidDelay(_))
    ));

    let other = Scheduler::new(SchedulerConfig::default());
    let foreign = other
        .schedule(chrono::Duration::seconds(1), || async { Ok(()) })
        .unwrap();
    assert_eq!(scheduler.cancel(foreign), Err(SchedulerError::UnknownTask(foreign)));
}
