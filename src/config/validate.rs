// src/config/validate.rs

use crate::config::model::{ConfigFile, JobConfig, JobMode, QueueKind, RawConfigFile, RawStep};
use crate::errors::{BackrunError, Result};
use crate::exec::steps::BUILTIN_EMPTY_DEST;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BackrunError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.app, raw.queue, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_queue(cfg)?;
    for (name, job) in cfg.job.iter() {
        validate_job(cfg, name, job)?;
    }
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(BackrunError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_queue(cfg: &RawConfigFile) -> Result<()> {
    let capacity = cfg.queue.capacity;

    if !capacity.is_finite() || capacity <= 0.0 {
        return Err(BackrunError::ConfigError(format!(
            "[queue].capacity must be a positive, finite number (got {capacity})"
        )));
    }

    // A slot count has to be a whole number; a cost budget does not.
    if cfg.queue.kind == QueueKind::Parallel && capacity.fract() != 0.0 {
        return Err(BackrunError::ConfigError(format!(
            "[queue].capacity must be a whole number of slots for kind = \"parallel\" (got {capacity})"
        )));
    }

    Ok(())
}

fn validate_job(cfg: &RawConfigFile, name: &str, job: &JobConfig) -> Result<()> {
    validate_intervals(name, job)?;
    validate_mode(cfg, name, job)?;
    validate_steps(name, job)?;
    validate_cost(cfg, name, job)?;
    Ok(())
}

fn validate_intervals(name: &str, job: &JobConfig) -> Result<()> {
    for (field, parsed) in [
        ("interval", job.interval()),
        ("error_interval", job.error_interval()),
    ] {
        let duration = parsed.map_err(|e| {
            BackrunError::ConfigError(format!("job '{name}': invalid {field}: {e}"))
        })?;
        if duration.is_zero() {
            return Err(BackrunError::ConfigError(format!(
                "job '{name}': {field} must be greater than zero"
            )));
        }
    }
    Ok(())
}

fn validate_mode(cfg: &RawConfigFile, name: &str, job: &JobConfig) -> Result<()> {
    match job.mode {
        JobMode::Zip | JobMode::Copy => {
            if job.src.is_none() {
                return Err(BackrunError::ConfigError(format!(
                    "job '{name}': mode {:?} requires `src`",
                    job.mode
                )));
            }
            if job.dest.is_none() {
                return Err(BackrunError::ConfigError(format!(
                    "job '{name}': mode {:?} requires `dest`",
                    job.mode
                )));
            }
            if job.mode == JobMode::Zip && job.enabled && cfg.app.seven_zip.is_none() {
                return Err(BackrunError::ConfigError(format!(
                    "job '{name}' uses mode = \"zip\" but [app].seven_zip is not set"
                )));
            }
        }
        JobMode::TasksOnly => {}
    }
    Ok(())
}

fn validate_steps(name: &str, job: &JobConfig) -> Result<()> {
    for step in job.tasks_before.iter().chain(job.tasks_after.iter()) {
        match step {
            RawStep::Builtin(tag) if tag == BUILTIN_EMPTY_DEST => {
                if job.dest.is_none() {
                    return Err(BackrunError::ConfigError(format!(
                        "job '{name}': step \"{BUILTIN_EMPTY_DEST}\" requires `dest`"
                    )));
                }
            }
            RawStep::Builtin(tag) => {
                return Err(BackrunError::ConfigError(format!(
                    "job '{name}': unknown builtin step \"{tag}\""
                )));
            }
            RawStep::Command { exec, .. } => {
                if exec.trim().is_empty() {
                    return Err(BackrunError::ConfigError(format!(
                        "job '{name}': command step with empty `exec`"
                    )));
                }
            }
        }
    }
    Ok(())
}

fn validate_cost(cfg: &RawConfigFile, name: &str, job: &JobConfig) -> Result<()> {
    if cfg.queue.kind != QueueKind::Cost {
        return Ok(());
    }

    match job.cost {
        None => Err(BackrunError::ConfigError(format!(
            "job '{name}' does not define a cost, but [queue].kind = \"cost\""
        ))),
        Some(cost) if !cost.is_finite() || cost < 0.0 => {
            Err(BackrunError::ConfigError(format!(
                "job '{name}': cost must be a finite, non-negative number (got {cost})"
            )))
        }
        Some(cost) if cost > cfg.queue.capacity && !cfg.queue.allow_exclusive => {
            Err(BackrunError::ConfigError(format!(
                "job '{name}': cost {cost} exceeds [queue].capacity {} and allow_exclusive is off",
                cfg.queue.capacity
            )))
        }
        Some(_) => Ok(()),
    }
}
