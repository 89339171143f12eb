// src/exec/backend.rs

//! Pluggable job executor abstraction.
//!
//! The recurrence engine talks to a [`JobExecutor`] instead of running
//! backup actions directly. This makes it easy to swap in a fake executor in
//! tests while keeping the production implementation here.
//!
//! - [`BackupExecutor`] is the default implementation: it runs the before
//!   steps, the mode's primary action, then the after steps, strictly in
//!   order, short-circuiting on the first non-allowed failure.
//! - Tests can provide their own `JobExecutor` that records invocations and
//!   succeeds or fails on demand.

use std::future::Future;
use std::pin::Pin;

use anyhow::{bail, Context, Result};
use chrono::Local;
use tracing::{debug, info};

use crate::config::model::JobMode;
use crate::engine::JobSpec;
use crate::exec::archive::{archive_with_seven_zip, copy_tree};
use crate::exec::steps::{run_steps, StepContext};
use crate::exec::template::expand_dest;

/// Trait abstracting how one job occurrence is executed.
pub trait JobExecutor: Send + Sync {
    /// Execute the job once. An `Err` marks the occurrence as failed; the
    /// engine then reschedules at the error interval.
    fn execute<'a>(
        &'a self,
        spec: &'a JobSpec,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;
}

/// Production executor: before steps, primary backup action, after steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupExecutor;

impl BackupExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn execute_inner(&self, spec: &JobSpec) -> Result<()> {
        let ctx = StepContext {
            job: &spec.name,
            dest_dir: spec.dest_dir(),
        };

        run_steps(&spec.tasks_before, ctx)
            .await
            .with_context(|| format!("tasks_before of job '{}'", spec.name))?;

        match spec.mode {
            JobMode::Zip => self.run_zip(spec).await?,
            JobMode::Copy => self.run_copy(spec).await?,
            JobMode::TasksOnly => {
                debug!(job = %spec.name, "tasks_only mode; no primary action");
            }
        }

        run_steps(&spec.tasks_after, ctx)
            .await
            .with_context(|| format!("tasks_after of job '{}'", spec.name))?;

        Ok(())
    }

    async fn run_zip(&self, spec: &JobSpec) -> Result<()> {
        let (src, dest_template) = spec_paths(spec)?;
        let Some(seven_zip) = spec.seven_zip.as_deref() else {
            bail!("job '{}' uses zip mode but no 7-Zip binary is configured", spec.name);
        };

        let dest = expand_dest(dest_template, &spec.name, Local::now());
        info!(job = %spec.name, dest = ?dest, "archiving");
        archive_with_seven_zip(seven_zip, &spec.seven_zip_args, &dest, src).await
    }

    async fn run_copy(&self, spec: &JobSpec) -> Result<()> {
        let (src, dest_template) = spec_paths(spec)?;
        let dest = expand_dest(dest_template, &spec.name, Local::now());
        info!(job = %spec.name, dest = ?dest, "copying");
        copy_tree(src, &dest).await
    }
}

fn spec_paths(spec: &JobSpec) -> Result<(&std::path::Path, &str)> {
    let src = spec
        .src
        .as_deref()
        .with_context(|| format!("job '{}' has no src", spec.name))?;
    let dest = spec
        .dest
        .as_deref()
        .with_context(|| format!("job '{}' has no dest", spec.name))?;
    Ok((src, dest))
}

impl JobExecutor for BackupExecutor {
    fn execute<'a>(
        &'a self,
        spec: &'a JobSpec,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(self.execute_inner(spec))
    }
}
