// src/engine/mod.rs

//! Recurrence engine.
//!
//! For every enabled job this module owns the loop that decides *when* the
//! next occurrence runs:
//! - at startup, the persisted last-success time plus the job interval gives
//!   the first due time (absent record = due now);
//! - after a successful run, the next occurrence is one interval after the
//!   completion;
//! - after a failed run, the next attempt is one (shorter) error interval
//!   after the failure, indefinitely until a run succeeds;
//! - a skipped occurrence reschedules like a success but records nothing.
//!
//! The pure timing decisions live in [`schedule`]; the async loop that
//! submits jobs and persists history is in [`recurrence`].

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::config::model::{AppSection, JobConfig, JobMode};
use crate::errors::{BackrunError, Result};
use crate::exec::steps::TaskStep;
use crate::queue::JobCost;

pub mod recurrence;
pub mod schedule;

pub use recurrence::{run_job_loop, RecurrenceOptions};
pub use schedule::initial_delay;

/// Optional per-job predicate evaluated before any step; `true` skips the
/// occurrence entirely.
pub type SkipPredicate =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = anyhow::Result<bool>> + Send>> + Send + Sync>;

/// What one finished occurrence reports back to the recurrence loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The executor ran to completion.
    Completed { elapsed: Duration },
    /// The skip predicate asked for this occurrence to be skipped; the
    /// executor never ran.
    Skipped,
}

/// Everything the engine and executor need to know about one job.
///
/// Built once per job from validated configuration; shared read-only between
/// the recurrence loop and the producers it creates.
#[derive(Clone)]
pub struct JobSpec {
    pub name: String,
    pub mode: JobMode,
    pub src: Option<PathBuf>,
    /// Destination template; expanded per run.
    pub dest: Option<String>,
    pub seven_zip: Option<PathBuf>,
    pub seven_zip_args: Vec<String>,
    pub tasks_before: Vec<TaskStep>,
    pub tasks_after: Vec<TaskStep>,
    pub interval: Duration,
    pub error_interval: Duration,
    /// Cost parameters, set when the cost queue is in use.
    pub cost: Option<JobCost>,
    pub skip: Option<SkipPredicate>,
}

impl std::fmt::Debug for JobSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobSpec")
            .field("name", &self.name)
            .field("mode", &self.mode)
            .field("interval", &self.interval)
            .field("error_interval", &self.error_interval)
            .field("cost", &self.cost)
            .finish_non_exhaustive()
    }
}

impl JobSpec {
    /// Build a spec from a validated `[job.<name>]` section.
    pub fn from_config(name: &str, cfg: &JobConfig, app: &AppSection) -> Result<Self> {
        let interval = cfg
            .interval()
            .map_err(|e| BackrunError::ConfigError(format!("job '{name}': {e}")))?;
        let error_interval = cfg
            .error_interval()
            .map_err(|e| BackrunError::ConfigError(format!("job '{name}': {e}")))?;

        let tasks_before = cfg
            .tasks_before
            .iter()
            .map(TaskStep::from_raw)
            .collect::<anyhow::Result<Vec<_>>>()?;
        let tasks_after = cfg
            .tasks_after
            .iter()
            .map(TaskStep::from_raw)
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            name: name.to_string(),
            mode: cfg.mode,
            src: cfg.src.clone(),
            dest: cfg.dest.clone(),
            seven_zip: app.seven_zip.clone(),
            seven_zip_args: cfg.seven_zip_args.clone(),
            tasks_before,
            tasks_after,
            interval,
            error_interval,
            cost: cfg.cost.map(|cost| JobCost {
                cost,
                exclusive: cfg.exclusive,
            }),
            skip: None,
        })
    }

    /// Attach a skip predicate. Not expressible in TOML; embedders wire it
    /// in code.
    pub fn with_skip(mut self, skip: SkipPredicate) -> Self {
        self.skip = Some(skip);
        self
    }

    /// The directory `@empty_dest` operates on.
    ///
    /// For `copy` mode the destination itself is a directory; for `zip` mode
    /// the archive's enclosing directory is used, taken from the template
    /// before expansion (placeholders conventionally live in the filename).
    pub fn dest_dir(&self) -> Option<&Path> {
        let dest = self.dest.as_deref()?;
        match self.mode {
            JobMode::Copy | JobMode::TasksOnly => Some(Path::new(dest)),
            JobMode::Zip => Path::new(dest).parent(),
        }
    }
}
