// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration exactly as deserialized from a TOML file, before
/// semantic validation.
///
/// ```toml
/// [app]
/// seven_zip = "/usr/bin/7z"
///
/// [queue]
/// kind = "cost"
/// capacity = 10.0
/// allow_exclusive = true
///
/// [job.documents]
/// mode = "zip"
/// src = "/home/user/documents"
/// dest = "/backup/documents/%jobname%_%timestamp%.7z"
/// interval = "72h"
/// error_interval = "5m"
/// cost = 6.0
/// ```
///
/// Use `ConfigFile::try_from` (or [`loader::load_and_validate`]) to obtain a
/// validated [`ConfigFile`].
///
/// [`loader::load_and_validate`]: crate::config::loader::load_and_validate
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global application settings from `[app]`.
    #[serde(default)]
    pub app: AppSection,

    /// Queue selection and sizing from `[queue]`.
    #[serde(default)]
    pub queue: QueueSection,

    /// All jobs from `[job.<name>]`. Keys are the job names.
    #[serde(default)]
    pub job: BTreeMap<String, JobConfig>,
}

/// Validated configuration. Construct via `TryFrom<RawConfigFile>`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub app: AppSection,
    pub queue: QueueSection,
    pub job: BTreeMap<String, JobConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        app: AppSection,
        queue: QueueSection,
        job: BTreeMap<String, JobConfig>,
    ) -> Self {
        Self { app, queue, job }
    }
}

/// `[app]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// Path to the 7-Zip binary. Required only when an enabled job uses
    /// `mode = "zip"`.
    #[serde(default)]
    pub seven_zip: Option<PathBuf>,

    /// Path of the JSON file holding last-run history.
    #[serde(default = "default_history_path")]
    pub history: PathBuf,
}

fn default_history_path() -> PathBuf {
    PathBuf::from("history.json")
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            seven_zip: None,
            history: default_history_path(),
        }
    }
}

/// Which admission rule bounds concurrent jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum QueueKind {
    /// Fixed number of parallel slots; `capacity` is the slot count.
    #[default]
    Parallel,
    /// Cumulative cost budget; `capacity` is the budget and every job must
    /// define a `cost`.
    Cost,
}

/// `[queue]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct QueueSection {
    #[serde(default)]
    pub kind: QueueKind,

    /// Slot count (`kind = "parallel"`) or cost budget (`kind = "cost"`).
    #[serde(default = "default_capacity")]
    pub capacity: f64,

    /// Cost queues only: admit a job whose cost exceeds the whole budget by
    /// running it exclusively, instead of rejecting it at submission.
    #[serde(default)]
    pub allow_exclusive: bool,
}

fn default_capacity() -> f64 {
    1.0
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            kind: QueueKind::default(),
            capacity: default_capacity(),
            allow_exclusive: false,
        }
    }
}

/// What a job does between its before/after steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Archive `src` into the templated `dest` file with 7-Zip.
    Zip,
    /// Recursively copy the `src` tree into `dest`.
    Copy,
    /// No primary action; only `tasks_before` / `tasks_after` run.
    TasksOnly,
}

/// A single step in `tasks_before` / `tasks_after`.
///
/// Steps are either a built-in action name (a string starting with `@`) or a
/// command invocation table:
///
/// ```toml
/// tasks_before = [
///     "@empty_dest",
///     { exec = "vmrun", args = ["suspend", "debian.vmx"], allow_fail = true },
/// ]
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawStep {
    Builtin(String),
    Command {
        exec: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        allow_fail: bool,
    },
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    /// Disabled jobs are parsed and validated but never scheduled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub mode: JobMode,

    /// Source file or directory (`zip` / `copy` modes).
    #[serde(default)]
    pub src: Option<PathBuf>,

    /// Destination template; may contain `%jobname%`, `%timestamp%`,
    /// `%date%` and `%time%` placeholders.
    #[serde(default)]
    pub dest: Option<String>,

    /// Time between runs, measured from the previous successful completion.
    /// Duration string such as `"90s"`, `"5m"`, `"72h"`, `"3d"`.
    pub interval: String,

    /// Time to wait after a failed run before attempting again.
    pub error_interval: String,

    /// Extra arguments passed to 7-Zip in `zip` mode.
    #[serde(default)]
    pub seven_zip_args: Vec<String>,

    #[serde(default)]
    pub tasks_before: Vec<RawStep>,

    #[serde(default)]
    pub tasks_after: Vec<RawStep>,

    /// Admission cost; required when `[queue].kind = "cost"`.
    #[serde(default)]
    pub cost: Option<f64>,

    /// Cost queues only: run this job with nothing else active.
    #[serde(default)]
    pub exclusive: bool,
}

fn default_enabled() -> bool {
    true
}

impl JobConfig {
    /// Parsed `interval`.
    pub fn interval(&self) -> Result<Duration, String> {
        parse_duration(&self.interval)
    }

    /// Parsed `error_interval`.
    pub fn error_interval(&self) -> Result<Duration, String> {
        parse_duration(&self.error_interval)
    }
}

/// Parse a simple duration string like `"250ms"`, `"90s"`, `"5m"`, `"72h"`,
/// `"3d"`.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    // Find the boundary between digits and suffix.
    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        "d" => Ok(Duration::from_secs(value * 60 * 60 * 24)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, h, or d",
            unit
        )),
    }
}
