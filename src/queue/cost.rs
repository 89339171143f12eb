// src/queue/cost.rs

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::queue::admission::CostLedger;
use crate::queue::job::Job;
use crate::queue::QueueError;

/// Queue that admits jobs until a cumulative cost budget is reached.
///
/// Admission is strict FIFO with head-of-line blocking: the head of the
/// pending queue is admitted when it fits, and nothing behind it is
/// considered while it does not. The alternative (letting cheaper jobs
/// overtake a blocked head) can starve expensive jobs indefinitely under
/// sustained load, so this queue does not do it.
///
/// An exclusive job runs with no other job active, regardless of remaining
/// budget. A job whose cost alone exceeds the budget is rejected at
/// submission, unless the queue was built with `allow_exclusive`, in which
/// case it is treated as exclusive and waits for the queue to drain.
pub struct CostQueue<T> {
    inner: Arc<CostInner<T>>,
}

impl<T> std::fmt::Debug for CostQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock().expect("queue mutex poisoned");
        f.debug_struct("CostQueue")
            .field("budget", &state.ledger.budget())
            .field("active_cost", &state.ledger.active_cost())
            .field("active", &state.ledger.active())
            .field("pending", &state.pending.len())
            .finish()
    }
}

impl<T> Clone for CostQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct CostInner<T> {
    budget: f64,
    allow_exclusive: bool,
    state: Mutex<CostState<T>>,
}

struct CostState<T> {
    pending: VecDeque<PendingCostJob<T>>,
    ledger: CostLedger,
}

struct PendingCostJob<T> {
    job: Job<T>,
    cost: f64,
    exclusive: bool,
}

impl<T> CostQueue<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(budget: f64, allow_exclusive: bool) -> Self {
        Self {
            inner: Arc::new(CostInner {
                budget,
                allow_exclusive,
                state: Mutex::new(CostState {
                    pending: VecDeque::new(),
                    ledger: CostLedger::new(budget),
                }),
            }),
        }
    }

    /// Append a job to the pending queue and schedule an admission pass.
    ///
    /// Fails fast, before enqueueing anything, when `cost` is NaN, infinite,
    /// or negative (a configuration defect, not a job failure), or when the
    /// cost exceeds the whole budget and exclusive admission is disabled.
    pub fn submit(&self, job: Job<T>, cost: f64, exclusive: bool) -> Result<(), QueueError> {
        if !cost.is_finite() || cost < 0.0 {
            return Err(QueueError::InvalidCost { cost });
        }

        let mut exclusive = exclusive;
        if cost > self.inner.budget {
            if !self.inner.allow_exclusive {
                return Err(QueueError::OverBudget {
                    cost,
                    budget: self.inner.budget,
                });
            }
            // Over-budget jobs can only ever run alone.
            exclusive = true;
        }

        {
            let mut state = self.inner.state.lock().expect("queue mutex poisoned");
            state.pending.push_back(PendingCostJob {
                job,
                cost,
                exclusive,
            });
            debug!(
                cost,
                exclusive,
                pending = state.pending.len(),
                "job submitted to cost queue"
            );
        }
        Self::schedule_admission(Arc::clone(&self.inner));
        Ok(())
    }

    /// Cumulative cost of currently running jobs.
    pub fn active_cost(&self) -> f64 {
        self.inner
            .state
            .lock()
            .expect("queue mutex poisoned")
            .ledger
            .active_cost()
    }

    /// Number of currently running jobs.
    pub fn active_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .expect("queue mutex poisoned")
            .ledger
            .active()
    }

    /// Number of jobs waiting for budget.
    pub fn pending_count(&self) -> usize {
        self.inner
            .state
            .lock()
            .expect("queue mutex poisoned")
            .pending
            .len()
    }

    fn schedule_admission(inner: Arc<CostInner<T>>) {
        tokio::spawn(async move {
            Self::admit_ready(inner);
        });
    }

    /// Admit head-of-queue jobs while they fit the ledger. All decisions are
    /// taken under the queue mutex, so concurrent passes observe a
    /// consistent running cost and cannot double-admit.
    fn admit_ready(inner: Arc<CostInner<T>>) {
        loop {
            let admitted = {
                let mut state = inner.state.lock().expect("queue mutex poisoned");
                let fits = match state.pending.front() {
                    Some(head) => state.ledger.can_admit(head.cost, head.exclusive),
                    None => false,
                };
                if !fits {
                    break;
                }
                let head = state
                    .pending
                    .pop_front()
                    .expect("pending head vanished under lock");
                state.ledger.admit(head.cost, head.exclusive);
                head
            };

            let PendingCostJob {
                job,
                cost,
                exclusive,
            } = admitted;

            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                let outcome = job.run().await;
                debug!(cost, exclusive, ?outcome, "cost queue job reached terminal state");
                {
                    let mut state = inner.state.lock().expect("queue mutex poisoned");
                    state.ledger.release(cost, exclusive);
                }
                Self::schedule_admission(inner);
            });
        }
    }
}
