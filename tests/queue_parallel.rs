// tests/queue_parallel.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep, Instant};

use backrun::queue::{Job, ParallelQueue, Producer};
use backrun_test_utils::init_tracing;

/// Tracks how many producers are inside their critical section at once.
#[derive(Default)]
struct ConcurrencyTracker {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl ConcurrencyTracker {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[tokio::test(start_paused = true)]
async fn active_jobs_never_exceed_slot_count() {
    init_tracing();

    let queue = ParallelQueue::new(2);
    let tracker = Arc::new(ConcurrencyTracker::default());

    let mut handles = Vec::new();
    for i in 0..6u32 {
        let tracker = Arc::clone(&tracker);
        let producer: Producer<u32> = Box::new(move || {
            Box::pin(async move {
                tracker.enter();
                sleep(Duration::from_millis(50)).await;
                tracker.exit();
                Ok(i)
            })
        });
        let (job, handle) = Job::new(producer);
        queue.submit(job);
        handles.push(handle);
    }

    for handle in handles {
        handle.wait().await.expect("job should succeed");
    }

    assert!(tracker.max.load(Ordering::SeqCst) <= 2);
    assert_eq!(tracker.current.load(Ordering::SeqCst), 0);
    assert_eq!(queue.active_count(), 0);
    assert_eq!(queue.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn admission_order_is_submission_order() {
    init_tracing();

    let queue = ParallelQueue::new(1);
    let started: Arc<Mutex<Vec<u32>>> = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for i in 0..5u32 {
        let started = Arc::clone(&started);
        let producer: Producer<u32> = Box::new(move || {
            Box::pin(async move {
                started.lock().unwrap().push(i);
                sleep(Duration::from_millis(10)).await;
                Ok(i)
            })
        });
        let (job, handle) = Job::new(producer);
        queue.submit(job);
        handles.push(handle);
    }

    for handle in handles {
        handle.wait().await.expect("job should succeed");
    }

    assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn single_slot_serializes_jobs() {
    init_tracing();

    let queue = ParallelQueue::new(1);
    let t0 = Instant::now();

    let a_end: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
    let b_start: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));

    let a_end_clone = Arc::clone(&a_end);
    let producer_a: Producer<()> = Box::new(move || {
        Box::pin(async move {
            sleep(Duration::from_millis(250)).await;
            *a_end_clone.lock().unwrap() = Some(Instant::now());
            Ok(())
        })
    });

    let b_start_clone = Arc::clone(&b_start);
    let producer_b: Producer<()> = Box::new(move || {
        Box::pin(async move {
            *b_start_clone.lock().unwrap() = Some(Instant::now());
            Ok(())
        })
    });

    let (job_a, handle_a) = Job::new(producer_a);
    let (job_b, handle_b) = Job::new(producer_b);
    queue.submit(job_a);
    queue.submit(job_b);

    handle_a.wait().await.expect("A should succeed");
    handle_b.wait().await.expect("B should succeed");

    let a_end = a_end.lock().unwrap().expect("A recorded its end");
    let b_start = b_start.lock().unwrap().expect("B recorded its start");

    // B must not start before A finishes, which is ~250ms in.
    assert!(b_start >= a_end);
    assert!(b_start.duration_since(t0) >= Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn is_busy_reflects_full_slots() {
    init_tracing();

    let queue = ParallelQueue::new(1);
    let (started_tx, mut started_rx) = mpsc::channel::<()>(1);
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let producer: Producer<()> = Box::new(move || {
        Box::pin(async move {
            let _ = started_tx.send(()).await;
            let _ = release_rx.await;
            Ok(())
        })
    });
    let (job, handle) = Job::new(producer);

    assert!(!queue.is_busy());
    queue.submit(job);

    started_rx.recv().await.expect("job should start");
    assert!(queue.is_busy());
    assert_eq!(queue.active_count(), 1);

    release_tx.send(()).expect("job is waiting for release");
    handle.wait().await.expect("job should succeed");
    assert!(!queue.is_busy());
}

#[tokio::test(start_paused = true)]
async fn one_failure_does_not_stall_admission() {
    init_tracing();

    let queue = ParallelQueue::new(1);

    let failing: Producer<u32> = Box::new(|| {
        Box::pin(async { anyhow::bail!("deliberate failure") })
    });
    let succeeding: Producer<u32> = Box::new(|| Box::pin(async { Ok(7) }));

    let (job_a, handle_a) = Job::new(failing);
    let (job_b, handle_b) = Job::new(succeeding);
    queue.submit(job_a);
    queue.submit(job_b);

    let err = handle_a.wait().await.expect_err("A should fail");
    assert!(err.to_string().contains("deliberate failure"));

    let value = handle_b.wait().await.expect("B should still run");
    assert_eq!(value, 7);
}
