// src/queue/mod.rs

//! Job admission queues.
//!
//! Two queue flavours bound how many jobs run concurrently:
//! - [`ParallelQueue`] admits up to a fixed number of jobs at a time,
//!   strictly first-in-first-out.
//! - [`CostQueue`] admits jobs until a cumulative cost budget is reached, and
//!   supports exclusive jobs that must run alone.
//!
//! Both defer admission off the submitter's stack: `submit` only enqueues and
//! schedules an asynchronous admission pass, so bursty submitters never
//! recurse into job execution.
//!
//! [`job`] holds the job state machine itself; [`admission`] is the pure
//! bookkeeping core of the cost queue.

use thiserror::Error;

pub mod admission;
pub mod cost;
pub mod job;
pub mod parallel;

pub use admission::CostLedger;
pub use cost::CostQueue;
pub use job::{Job, JobFailure, JobHandle, JobState, Producer, ProducerFuture};
pub use parallel::ParallelQueue;

use crate::config::model::{QueueKind, QueueSection};

/// Errors raised by the queues themselves, as opposed to failures of the
/// jobs they run. These are configuration defects and surface synchronously
/// at submission (or result-access) time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("job cost must be a finite, non-negative number (got {cost})")]
    InvalidCost { cost: f64 },

    #[error("job cost {cost} exceeds the queue budget {budget} and exclusive admission is disabled")]
    OverBudget { cost: f64, budget: f64 },

    #[error("cost queue requires a cost for every submitted job")]
    MissingCost,

    #[error("job result is not available in state {0:?}")]
    InvalidState(JobState),
}

/// Cost parameters attached to a job submitted to a [`CostQueue`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JobCost {
    pub cost: f64,
    pub exclusive: bool,
}

/// A queue of either flavour, selected by configuration.
///
/// The recurrence engine talks to this enum so that per-job submission code
/// does not care which admission rule is in force.
#[derive(Debug)]
pub enum Dispatcher<T> {
    Parallel(ParallelQueue<T>),
    Cost(CostQueue<T>),
}

impl<T> Dispatcher<T>
where
    T: Clone + Send + 'static,
{
    /// Build the queue described by the validated `[queue]` section.
    pub fn from_config(cfg: &QueueSection) -> Self {
        match cfg.kind {
            QueueKind::Parallel => {
                Dispatcher::Parallel(ParallelQueue::new(cfg.capacity as usize))
            }
            QueueKind::Cost => {
                Dispatcher::Cost(CostQueue::new(cfg.capacity, cfg.allow_exclusive))
            }
        }
    }

    /// Submit a job.
    ///
    /// `cost` is required by cost queues and ignored by parallel queues; a
    /// missing or invalid cost is rejected here, before the job is enqueued.
    pub fn submit(&self, job: Job<T>, cost: Option<JobCost>) -> Result<(), QueueError> {
        match self {
            Dispatcher::Parallel(q) => {
                q.submit(job);
                Ok(())
            }
            Dispatcher::Cost(q) => {
                let caps = cost.ok_or(QueueError::MissingCost)?;
                q.submit(job, caps.cost, caps.exclusive)
            }
        }
    }
}
