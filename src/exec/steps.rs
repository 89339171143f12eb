// src/exec/steps.rs

//! Before/after task steps.
//!
//! A job may run an ordered list of steps before and after its primary
//! action. Steps execute strictly in order; the first failure that is not
//! explicitly allowed short-circuits the rest of the job.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{debug, warn};

use crate::config::model::RawStep;
use crate::exec::command::run_process;

/// Builtin step tag understood in `tasks_before` / `tasks_after`.
pub const BUILTIN_EMPTY_DEST: &str = "@empty_dest";

/// Programmatic step: an async closure, for embedders that build jobs in
/// code rather than from TOML. Failures abort the job like any non-allowed
/// step failure.
pub type ActionFn =
    Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Named built-in actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinStep {
    /// Remove everything inside the job's destination directory.
    EmptyDest,
}

/// A spawned command with its failure policy.
#[derive(Debug, Clone)]
pub struct CommandStep {
    pub exec: String,
    pub args: Vec<String>,
    /// When true, a failing command logs a warning instead of failing the
    /// whole job.
    pub allow_fail: bool,
}

/// One step of a job, as a closed set of variants.
#[derive(Clone)]
pub enum TaskStep {
    Builtin(BuiltinStep),
    Command(CommandStep),
    Action(ActionFn),
}

impl std::fmt::Debug for TaskStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStep::Builtin(b) => f.debug_tuple("Builtin").field(b).finish(),
            TaskStep::Command(c) => f.debug_tuple("Command").field(c).finish(),
            TaskStep::Action(_) => f.write_str("Action(..)"),
        }
    }
}

impl TaskStep {
    /// Convert a validated config step. Unknown builtin tags were rejected
    /// during config validation.
    pub fn from_raw(raw: &RawStep) -> Result<Self> {
        match raw {
            RawStep::Builtin(tag) if tag == BUILTIN_EMPTY_DEST => {
                Ok(TaskStep::Builtin(BuiltinStep::EmptyDest))
            }
            RawStep::Builtin(tag) => bail!("unknown builtin step \"{tag}\""),
            RawStep::Command {
                exec,
                args,
                allow_fail,
            } => Ok(TaskStep::Command(CommandStep {
                exec: exec.clone(),
                args: args.clone(),
                allow_fail: *allow_fail,
            })),
        }
    }
}

/// Context a step runs in.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub job: &'a str,
    /// Directory that `@empty_dest` operates on, when the job has one.
    pub dest_dir: Option<&'a Path>,
}

/// Run `steps` in order.
///
/// A `Command` step with `allow_fail = true` logs and continues on failure;
/// every other failure aborts immediately with the remaining steps unrun.
pub async fn run_steps(steps: &[TaskStep], ctx: StepContext<'_>) -> Result<()> {
    for (idx, step) in steps.iter().enumerate() {
        debug!(job = %ctx.job, step = idx, ?step, "running step");

        match step {
            TaskStep::Builtin(BuiltinStep::EmptyDest) => {
                let dest = ctx.dest_dir.with_context(|| {
                    format!("job '{}' has no destination directory to empty", ctx.job)
                })?;
                empty_dir(dest.to_path_buf())
                    .await
                    .with_context(|| format!("emptying destination {:?}", dest))?;
            }
            TaskStep::Command(cmd) => {
                match run_process(&cmd.exec, &cmd.args).await {
                    Ok(_) => {}
                    Err(err) if cmd.allow_fail => {
                        warn!(
                            job = %ctx.job,
                            step = idx,
                            error = %err,
                            "step failed but allow_fail is set; continuing"
                        );
                    }
                    Err(err) => {
                        return Err(err)
                            .with_context(|| format!("step {idx} of job '{}'", ctx.job));
                    }
                }
            }
            TaskStep::Action(f) => {
                f().await
                    .with_context(|| format!("step {idx} of job '{}'", ctx.job))?;
            }
        }
    }

    Ok(())
}

/// Remove the contents of `dir`, creating it if missing. The directory
/// itself is kept.
pub async fn empty_dir(dir: PathBuf) -> Result<()> {
    tokio::task::spawn_blocking(move || -> Result<()> {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("creating directory {:?}", dir))?;
            return Ok(());
        }

        for entry in std::fs::read_dir(&dir)
            .with_context(|| format!("reading directory {:?}", dir))?
        {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)
                    .with_context(|| format!("removing directory {:?}", path))?;
            } else {
                std::fs::remove_file(&path)
                    .with_context(|| format!("removing file {:?}", path))?;
            }
        }
        Ok(())
    })
    .await
    .context("empty_dir worker panicked")?
}
