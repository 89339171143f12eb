// src/exec/template.rs

//! Destination path templating.
//!
//! Destination strings may contain placeholders that are expanded when a run
//! starts, so every archive gets a distinct, timestamped name:
//!
//! - `%jobname%`   the job's configured name
//! - `%timestamp%` unix time in seconds
//! - `%date%`      `YYYY-MM-DD`
//! - `%time%`      `HH-MM-SS` (dashes, so it is filename-safe)

use std::path::PathBuf;

use chrono::{DateTime, Local};

/// Expand all placeholders in `template` for a run starting at `now`.
pub fn expand_dest(template: &str, job: &str, now: DateTime<Local>) -> PathBuf {
    let expanded = template
        .replace("%jobname%", job)
        .replace("%timestamp%", &now.timestamp().to_string())
        .replace("%date%", &now.format("%Y-%m-%d").to_string())
        .replace("%time%", &now.format("%H-%M-%S").to_string());

    PathBuf::from(expanded)
}
