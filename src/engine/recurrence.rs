// src/engine/recurrence.rs

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info};

use crate::engine::schedule::{initial_delay, next_delay};
use crate::engine::{JobSpec, RunOutcome};
use crate::exec::JobExecutor;
use crate::history::{HistoryStore, ScheduleRecord};
use crate::queue::{Dispatcher, Job, Producer};

/// Options for one job's recurrence loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurrenceOptions {
    /// Run the job once, immediately, and return — used for `--once`.
    pub once: bool,
}

/// Drive one job's recurrence until shutdown.
///
/// Each iteration waits for the due time, submits a fresh job to the
/// dispatcher, and awaits its terminal state:
/// - success persists `{last_run, last_duration}` and waits a full interval
///   from the completion time;
/// - failure persists nothing and retries after the error interval;
/// - a skip persists nothing and waits a full interval.
///
/// The next occurrence is only created after the previous one terminates, so
/// a job never overlaps itself. Shutdown is honored while waiting, never by
/// aborting a running occurrence.
pub async fn run_job_loop(
    spec: Arc<JobSpec>,
    dispatcher: Arc<Dispatcher<RunOutcome>>,
    executor: Arc<dyn JobExecutor>,
    history: Arc<dyn HistoryStore>,
    mut shutdown: watch::Receiver<bool>,
    options: RecurrenceOptions,
) {
    let mut delay = if options.once {
        Duration::ZERO
    } else {
        let record = history.read(&spec.name);
        initial_delay(record.as_ref(), spec.interval, Utc::now())
    };

    loop {
        if !delay.is_zero() {
            debug!(job = %spec.name, ?delay, "waiting until next occurrence");
            tokio::select! {
                _ = sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!(job = %spec.name, "shutdown requested; stopping recurrence");
                        break;
                    }
                }
            }
        }

        info!(job = %spec.name, "occurrence due; submitting job");
        let (job, handle) = Job::new(make_producer(&spec, &executor));

        if let Err(err) = dispatcher.submit(job, spec.cost) {
            // Submission errors are configuration defects, not run failures.
            error!(
                job = %spec.name,
                error = %err,
                "job submission rejected; stopping recurrence for this job"
            );
            break;
        }

        let succeeded = match handle.wait().await {
            Ok(RunOutcome::Completed { elapsed }) => {
                let record = ScheduleRecord {
                    last_run: Utc::now(),
                    last_duration_ms: elapsed.as_millis() as u64,
                };
                if let Err(err) = history.write(&spec.name, record) {
                    error!(
                        job = %spec.name,
                        error = %err,
                        "failed to persist run history; scheduling continues"
                    );
                }
                info!(
                    job = %spec.name,
                    duration_secs = elapsed.as_secs(),
                    "finished job"
                );
                true
            }
            Ok(RunOutcome::Skipped) => {
                info!(job = %spec.name, "occurrence skipped");
                true
            }
            Err(failure) => {
                error!(
                    job = %spec.name,
                    error = %failure,
                    retry_in = ?spec.error_interval,
                    "job failed; retrying at error interval"
                );
                false
            }
        };

        if options.once {
            break;
        }
        if *shutdown.borrow() {
            info!(job = %spec.name, "shutdown requested; stopping recurrence");
            break;
        }

        delay = next_delay(succeeded, spec.interval, spec.error_interval);
    }
}

/// Build the producer for one occurrence: evaluate the skip predicate, then
/// run the executor, measuring elapsed wall-clock time.
fn make_producer(spec: &Arc<JobSpec>, executor: &Arc<dyn JobExecutor>) -> Producer<RunOutcome> {
    let spec = Arc::clone(spec);
    let executor = Arc::clone(executor);

    Box::new(move || {
        Box::pin(async move {
            if let Some(skip) = spec.skip.as_ref() {
                let skip_now = skip().await.with_context(|| {
                    format!("evaluating skip predicate of job '{}'", spec.name)
                })?;
                if skip_now {
                    return Ok(RunOutcome::Skipped);
                }
            }

            let started = Instant::now();
            executor.execute(&spec).await?;
            Ok(RunOutcome::Completed {
                elapsed: started.elapsed(),
            })
        })
    })
}
