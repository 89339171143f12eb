// src/engine/schedule.rs

//! Pure scheduling arithmetic.
//!
//! These functions are synchronous and deterministic: they take explicit
//! "now" values and return delays, so they can be unit tested without
//! timers. The async loop in [`recurrence`](super::recurrence) is the only
//! place that actually sleeps.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::history::ScheduleRecord;

/// Delay before the first submission after startup.
///
/// A job that has never run successfully is due immediately. Otherwise the
/// job is due one `interval` after its last successful completion; if that
/// moment has already passed, it is due now. A recorded `last_run` in the
/// future (clock adjustment) waits a full interval rather than going
/// negative.
pub fn initial_delay(
    record: Option<&ScheduleRecord>,
    interval: Duration,
    now: DateTime<Utc>,
) -> Duration {
    let Some(record) = record else {
        return Duration::ZERO;
    };

    let elapsed = (now - record.last_run).to_std().unwrap_or(Duration::ZERO);
    if elapsed >= interval {
        Duration::ZERO
    } else {
        interval - elapsed
    }
}

/// Delay until the next occurrence, given how the previous one ended.
///
/// Success and skip both wait the full interval; failure retries after the
/// shorter error interval. Failures keep retrying at the short interval
/// indefinitely until a run succeeds.
pub fn next_delay(succeeded: bool, interval: Duration, error_interval: Duration) -> Duration {
    if succeeded {
        interval
    } else {
        error_interval
    }
}
