// src/queue/parallel.rs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::queue::job::Job;

/// Queue that runs at most `slots` jobs concurrently, strictly
/// first-in-first-out.
///
/// Semantics:
/// - `submit` enqueues and schedules an asynchronous admission pass; the job
///   never starts on the submitter's stack.
/// - Admission pops pending jobs in submission order while a slot is free.
///   Costs and priorities play no part; the head job is always next.
/// - Every terminal transition (success or failure alike) frees its slot and
///   re-triggers admission, so one failed job never stalls the rest.
pub struct ParallelQueue<T> {
    inner: Arc<ParallelInner<T>>,
}

impl<T> std::fmt::Debug for ParallelQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().expect("queue mutex poisoned");
        f.debug_struct("ParallelQueue")
            .field("slots", &self.inner.slots)
            .field("active", &state.active)
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<T> Clone for ParallelQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ParallelInner<T> {
    slots: usize,
    state: Mutex<ParallelState<T>>,
}

struct ParallelState<T> {
    pending: VecDeque<Job<T>>,
    active: usize,
}

impl<T> ParallelQueue<T>
where
    T: Clone + Send + 'static,
{
    /// Create a queue with the given slot count.
    ///
    /// `slots` is clamped to at least 1, as a zero-slot queue could never
    /// admit anything.
    pub fn new(slots: usize) -> Self {
        let slots = slots.max(1);
        Self {
            inner: Arc::new(ParallelInner {
                slots,
                state: Mutex::new(ParallelState {
                    pending: VecDeque::new(),
                    active: 0,
                }),
            }),
        }
    }

    /// Append a job to the pending queue and schedule an admission pass.
    ///
    /// Returns immediately; the submitter observes the job through the
    /// [`JobHandle`](crate::queue::JobHandle) it kept at creation.
    pub fn submit(&self, job: Job<T>) {
        {
            let mut state = self.inner.state.lock().expect("queue mutex poisoned");
            state.pending.push_back(job);
            debug!(pending = state.pending.len(), "job submitted to parallel queue");
        }
        Self::schedule_admission(Arc::clone(&self.inner));
    }

    /// `true` iff every slot is occupied.
    pub fn is_busy(&self) -> bool {
        let state = self.inner.state.lock().expect("queue mutex poisoned");
        state.active == self.inner.slots
    }

    /// Number of currently running jobs.
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().expect("queue mutex poisoned").active
    }

    /// Number of jobs waiting for a slot.
    pub fn pending_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .expect("queue mutex poisoned")
            .pending
            .len()
    }

    /// Defer an admission pass to a fresh task, bounding stack depth under
    /// bursty submission and keeping `submit` non-blocking.
    fn schedule_admission(inner: Arc<ParallelInner<T>>) {
        tokio::spawn(async move {
            Self::admit_ready(inner);
        });
    }

    /// Admit pending jobs while slots are free. Admission decisions happen
    /// under the queue mutex, so concurrent passes cannot double-admit.
    fn admit_ready(inner: Arc<ParallelInner<T>>) {
        loop {
            let job = {
                let mut state = inner.state.lock().expect("queue mutex poisoned");
                if state.active >= inner.slots {
                    break;
                }
                match state.pending.pop_front() {
                    Some(job) => {
                        state.active += 1;
                        job
                    }
                    None => break,
                }
            };

            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                let outcome = job.run().await;
                debug!(?outcome, "parallel queue job reached terminal state");
                {
                    let mut state = inner.state.lock().expect("queue mutex poisoned");
                    state.active -= 1;
                }
                Self::schedule_admission(inner);
            });
        }
    }
}
