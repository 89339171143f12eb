// src/queue/job.rs

//! Job state machine.
//!
//! A [`Job`] wraps a one-shot asynchronous producer and tracks it through an
//! explicit lifecycle: `Pending -> Running -> {Done, Failed}`. The terminal
//! states are reached exactly once and never left.
//!
//! Ownership is split in two:
//! - the [`Job`] itself is handed to a queue, which is the only caller of
//!   [`Job::run`];
//! - the submitter keeps a [`JobHandle`] to query state, read the result once
//!   the job is `Done`, and await the terminal transition.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::queue::QueueError;

/// Future returned by a job producer.
pub type ProducerFuture<T> = Pin<Box<dyn Future<Output = anyhow::Result<T>> + Send>>;

/// One-shot producer of a job's result.
pub type Producer<T> = Box<dyn FnOnce() -> ProducerFuture<T> + Send>;

/// Lifecycle state of a [`Job`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created but not yet admitted by a queue.
    Pending,
    /// Admitted; the producer is executing.
    Running,
    /// The producer returned a result.
    Done,
    /// The producer returned an error.
    Failed,
}

/// Error that ended a job, shared between the handle and `on_failed`
/// observers.
#[derive(Debug, Clone)]
pub struct JobFailure(Arc<anyhow::Error>);

impl JobFailure {
    pub fn error(&self) -> &anyhow::Error {
        &self.0
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

type StartObserver = Box<dyn FnOnce() + Send>;
type DoneObserver<T> = Box<dyn FnOnce(&T) + Send>;
type FailedObserver = Box<dyn FnOnce(&JobFailure) + Send>;

struct JobCell<T> {
    state: JobState,
    result: Option<T>,
    failure: Option<JobFailure>,
    on_start: Vec<StartObserver>,
    on_done: Vec<DoneObserver<T>>,
    on_failed: Vec<FailedObserver>,
    done_tx: Option<oneshot::Sender<Result<T, JobFailure>>>,
}

struct JobShared<T> {
    cell: Mutex<JobCell<T>>,
}

impl<T> JobShared<T> {
    fn state(&self) -> JobState {
        self.cell.lock().expect("job state mutex poisoned").state
    }
}

/// A unit of asynchronous work owned by a queue until it terminates.
pub struct Job<T> {
    producer: Producer<T>,
    shared: Arc<JobShared<T>>,
}

impl<T> std::fmt::Debug for Job<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl<T> Job<T>
where
    T: Clone + Send + 'static,
{
    /// Create a job from a producer, returning the job (to be submitted to a
    /// queue) and the handle the submitter keeps.
    pub fn new(producer: Producer<T>) -> (Self, JobHandle<T>) {
        let (done_tx, done_rx) = oneshot::channel();

        let shared = Arc::new(JobShared {
            cell: Mutex::new(JobCell {
                state: JobState::Pending,
                result: None,
                failure: None,
                on_start: Vec::new(),
                on_done: Vec::new(),
                on_failed: Vec::new(),
                done_tx: Some(done_tx),
            }),
        });

        let job = Self {
            producer,
            shared: Arc::clone(&shared),
        };
        let handle = JobHandle {
            shared,
            done_rx,
        };

        (job, handle)
    }

    /// Register an observer fired once when the job transitions to `Running`.
    pub fn on_start(&mut self, f: impl FnOnce() + Send + 'static) {
        let mut cell = self.shared.cell.lock().expect("job state mutex poisoned");
        cell.on_start.push(Box::new(f));
    }

    /// Register an observer fired once with the result when the job becomes
    /// `Done`.
    pub fn on_done(&mut self, f: impl FnOnce(&T) + Send + 'static) {
        let mut cell = self.shared.cell.lock().expect("job state mutex poisoned");
        cell.on_done.push(Box::new(f));
    }

    /// Register an observer fired once with the error when the job becomes
    /// `Failed`.
    pub fn on_failed(&mut self, f: impl FnOnce(&JobFailure) + Send + 'static) {
        let mut cell = self.shared.cell.lock().expect("job state mutex poisoned");
        cell.on_failed.push(Box::new(f));
    }

    /// Invoke the producer and drive the job to a terminal state.
    ///
    /// Called exactly once, and only by the queue that admitted the job.
    /// Observers and the handle's completion signal fire as part of the
    /// transition; each fires at most once.
    pub(crate) async fn run(self) -> JobState {
        let observers = {
            let mut cell = self.shared.cell.lock().expect("job state mutex poisoned");
            cell.state = JobState::Running;
            std::mem::take(&mut cell.on_start)
        };
        for obs in observers {
            obs();
        }

        match (self.producer)().await {
            Ok(value) => {
                let (observers, done_tx) = {
                    let mut cell =
                        self.shared.cell.lock().expect("job state mutex poisoned");
                    cell.state = JobState::Done;
                    cell.result = Some(value.clone());
                    (std::mem::take(&mut cell.on_done), cell.done_tx.take())
                };
                for obs in observers {
                    obs(&value);
                }
                if let Some(tx) = done_tx {
                    // The handle may have been dropped; that is fine.
                    let _ = tx.send(Ok(value));
                }
                JobState::Done
            }
            Err(err) => {
                let failure = JobFailure(Arc::new(err));
                let (observers, done_tx) = {
                    let mut cell =
                        self.shared.cell.lock().expect("job state mutex poisoned");
                    cell.state = JobState::Failed;
                    cell.failure = Some(failure.clone());
                    (std::mem::take(&mut cell.on_failed), cell.done_tx.take())
                };
                for obs in observers {
                    obs(&failure);
                }
                if let Some(tx) = done_tx {
                    let _ = tx.send(Err(failure));
                }
                JobState::Failed
            }
        }
    }
}

/// Submitter-side handle to a [`Job`].
pub struct JobHandle<T> {
    shared: Arc<JobShared<T>>,
    done_rx: oneshot::Receiver<Result<T, JobFailure>>,
}

impl<T> std::fmt::Debug for JobHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("state", &self.shared.state())
            .finish_non_exhaustive()
    }
}

impl<T> JobHandle<T>
where
    T: Clone + Send + 'static,
{
    /// Current lifecycle state.
    pub fn state(&self) -> JobState {
        self.shared.state()
    }

    /// `true` once the job reached `Done`.
    pub fn is_done(&self) -> bool {
        self.state() == JobState::Done
    }

    /// `true` once the job reached `Failed`.
    pub fn has_failed(&self) -> bool {
        self.state() == JobState::Failed
    }

    /// Read the result.
    ///
    /// Fails with [`QueueError::InvalidState`] unless the job is `Done`.
    pub fn try_result(&self) -> Result<T, QueueError> {
        let cell = self.shared.cell.lock().expect("job state mutex poisoned");
        match cell.state {
            JobState::Done => {
                // `result` is always populated in the same critical section
                // that sets `Done`.
                cell.result
                    .clone()
                    .ok_or(QueueError::InvalidState(JobState::Done))
            }
            other => Err(QueueError::InvalidState(other)),
        }
    }

    /// The failure, if the job has failed.
    pub fn failure(&self) -> Option<JobFailure> {
        let cell = self.shared.cell.lock().expect("job state mutex poisoned");
        cell.failure.clone()
    }

    /// Await the terminal transition, yielding the result or the failure.
    ///
    /// If the job is dropped without ever running (e.g. its queue was torn
    /// down), a synthetic failure is returned rather than hanging forever.
    pub async fn wait(self) -> Result<T, JobFailure> {
        match self.done_rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(JobFailure(Arc::new(anyhow::anyhow!(
                "job was dropped before reaching a terminal state"
            )))),
        }
    }
}
