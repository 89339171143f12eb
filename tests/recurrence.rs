// tests/recurrence.rs

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::sleep;

use backrun::config::AppSection;
use backrun::engine::{
    initial_delay, run_job_loop, JobSpec, RecurrenceOptions, RunOutcome, SkipPredicate,
};
use backrun::exec::JobExecutor;
use backrun::history::{HistoryStore, MemoryHistoryStore, ScheduleRecord};
use backrun::queue::{Dispatcher, ParallelQueue};
use backrun_test_utils::builders::JobConfigBuilder;
use backrun_test_utils::fake_executor::FakeExecutor;
use backrun_test_utils::init_tracing;

fn make_spec(name: &str, interval: &str, error_interval: &str) -> JobSpec {
    let cfg = JobConfigBuilder::tasks_only()
        .interval(interval)
        .error_interval(error_interval)
        .build();
    JobSpec::from_config(name, &cfg, &AppSection::default()).expect("valid job config")
}

struct Harness {
    executor: Arc<FakeExecutor>,
    history: Arc<MemoryHistoryStore>,
    dispatcher: Arc<Dispatcher<RunOutcome>>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
}

impl Harness {
    fn new() -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            executor: Arc::new(FakeExecutor::new()),
            history: Arc::new(MemoryHistoryStore::new()),
            dispatcher: Arc::new(Dispatcher::Parallel(ParallelQueue::new(4))),
            shutdown_tx,
            shutdown_rx,
        }
    }

    fn with_executor(mut self, executor: Arc<FakeExecutor>) -> Self {
        self.executor = executor;
        self
    }

    fn spawn(&self, spec: JobSpec, options: RecurrenceOptions) -> tokio::task::JoinHandle<()> {
        let executor: Arc<dyn JobExecutor> = self.executor.clone();
        let history: Arc<dyn HistoryStore> = self.history.clone();
        tokio::spawn(run_job_loop(
            Arc::new(spec),
            Arc::clone(&self.dispatcher),
            executor,
            history,
            self.shutdown_rx.clone(),
            options,
        ))
    }
}

#[tokio::test(start_paused = true)]
async fn never_run_job_is_submitted_immediately_and_persisted() {
    init_tracing();

    let executor = Arc::new(FakeExecutor::new().with_delay(Duration::from_millis(100)));
    let harness = Harness::new().with_executor(Arc::clone(&executor));

    let handle = harness.spawn(make_spec("docs", "1h", "5m"), RecurrenceOptions::default());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(executor.executed_count("docs"), 1);

    let record = harness
        .history
        .read("docs")
        .expect("history written after success");
    assert!(record.last_duration_ms >= 100);
    assert!(record.last_duration_ms < 1_000);

    // The next occurrence comes a full interval after completion.
    sleep(Duration::from_secs(3601)).await;
    assert_eq!(executor.executed_count("docs"), 2);

    harness.shutdown_tx.send(true).expect("loop is listening");
    handle.await.expect("loop exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn persisted_last_run_delays_the_first_submission() {
    init_tracing();

    let harness = Harness::new();
    harness
        .history
        .write(
            "docs",
            ScheduleRecord {
                last_run: Utc::now() - chrono::Duration::seconds(30),
                last_duration_ms: 5,
            },
        )
        .expect("seeding history");

    let handle = harness.spawn(make_spec("docs", "60s", "5s"), RecurrenceOptions::default());

    // 30 of the 60 seconds have already elapsed before startup.
    sleep(Duration::from_secs(20)).await;
    assert_eq!(harness.executor.executed_count("docs"), 0);

    sleep(Duration::from_secs(15)).await;
    assert_eq!(harness.executor.executed_count("docs"), 1);

    harness.shutdown_tx.send(true).expect("loop is listening");
    handle.await.expect("loop exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn failures_retry_at_error_interval_without_touching_history() {
    init_tracing();

    let harness = Harness::new();
    harness.executor.fail_next("docs", 2);

    let handle = harness.spawn(make_spec("docs", "1h", "5s"), RecurrenceOptions::default());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(harness.executor.executed_count("docs"), 1);
    assert!(harness.history.read("docs").is_none());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.executor.executed_count("docs"), 2);
    assert!(harness.history.read("docs").is_none());

    sleep(Duration::from_secs(5)).await;
    assert_eq!(harness.executor.executed_count("docs"), 3);
    assert!(
        harness.history.read("docs").is_some(),
        "third attempt succeeds and is persisted"
    );

    harness.shutdown_tx.send(true).expect("loop is listening");
    handle.await.expect("loop exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn skip_predicate_suppresses_execution_but_keeps_the_schedule() {
    init_tracing();

    let harness = Harness::new();
    let skips = Arc::new(AtomicUsize::new(0));

    let skip: SkipPredicate = {
        let skips = Arc::clone(&skips);
        Arc::new(move || {
            let skips = Arc::clone(&skips);
            Box::pin(async move {
                skips.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            })
        })
    };

    let spec = make_spec("docs", "1h", "5s").with_skip(skip);
    let handle = harness.spawn(spec, RecurrenceOptions::default());

    sleep(Duration::from_secs(1)).await;
    assert_eq!(skips.load(Ordering::SeqCst), 1);
    assert_eq!(harness.executor.executed_count("docs"), 0);
    assert!(harness.history.read("docs").is_none());

    // A skip reschedules at the success interval, not the error interval.
    sleep(Duration::from_secs(10)).await;
    assert_eq!(skips.load(Ordering::SeqCst), 1);

    sleep(Duration::from_secs(3600)).await;
    assert_eq!(skips.load(Ordering::SeqCst), 2);
    assert_eq!(harness.executor.executed_count("docs"), 0);

    harness.shutdown_tx.send(true).expect("loop is listening");
    handle.await.expect("loop exits cleanly");
}

#[tokio::test(start_paused = true)]
async fn once_mode_runs_immediately_and_returns() {
    init_tracing();

    let harness = Harness::new();
    // History says the job is not due for another hour; --once ignores that.
    harness
        .history
        .write(
            "docs",
            ScheduleRecord {
                last_run: Utc::now(),
                last_duration_ms: 1,
            },
        )
        .expect("seeding history");

    let handle = harness.spawn(
        make_spec("docs", "1h", "5m"),
        RecurrenceOptions { once: true },
    );

    handle.await.expect("once-mode loop returns by itself");
    assert_eq!(harness.executor.executed_count("docs"), 1);
}

#[tokio::test(start_paused = true)]
async fn jobs_recur_independently() {
    init_tracing();

    let harness = Harness::new();
    harness.executor.fail_next("flaky", usize::MAX);

    let h1 = harness.spawn(make_spec("flaky", "1h", "5s"), RecurrenceOptions::default());
    let h2 = harness.spawn(make_spec("steady", "50s", "5s"), RecurrenceOptions::default());

    sleep(Duration::from_secs(101)).await;

    // The flaky job keeps failing on its short interval without disturbing
    // the steady job's cadence (t=0, 50, 100).
    assert!(harness.executor.executed_count("flaky") >= 10);
    assert_eq!(harness.executor.executed_count("steady"), 3);
    assert!(harness.history.read("flaky").is_none());
    assert!(harness.history.read("steady").is_some());

    harness.shutdown_tx.send(true).expect("loops are listening");
    h1.await.expect("flaky loop exits cleanly");
    h2.await.expect("steady loop exits cleanly");
}

#[test]
fn initial_delay_math() {
    let interval = Duration::from_secs(60);
    let now = Utc::now();

    // Never run: due immediately.
    assert_eq!(initial_delay(None, interval, now), Duration::ZERO);

    // Last run long ago: due immediately.
    let stale = ScheduleRecord {
        last_run: now - chrono::Duration::seconds(600),
        last_duration_ms: 10,
    };
    assert_eq!(initial_delay(Some(&stale), interval, now), Duration::ZERO);

    // Last run 30s ago with a 60s interval: 30s remain.
    let recent = ScheduleRecord {
        last_run: now - chrono::Duration::seconds(30),
        last_duration_ms: 10,
    };
    assert_eq!(
        initial_delay(Some(&recent), interval, now),
        Duration::from_secs(30)
    );

    // Last run in the future (clock adjustment): wait a full interval.
    let future = ScheduleRecord {
        last_run: now + chrono::Duration::seconds(120),
        last_duration_ms: 10,
    };
    assert_eq!(initial_delay(Some(&future), interval, now), interval);
}
