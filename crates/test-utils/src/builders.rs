#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::PathBuf;

use backrun::config::{
    AppSection, ConfigFile, JobConfig, JobMode, QueueKind, QueueSection, RawConfigFile, RawStep,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                app: AppSection::default(),
                queue: QueueSection::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobConfig) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn with_queue(mut self, kind: QueueKind, capacity: f64) -> Self {
        self.config.queue.kind = kind;
        self.config.queue.capacity = capacity;
        self
    }

    pub fn with_allow_exclusive(mut self, val: bool) -> Self {
        self.config.queue.allow_exclusive = val;
        self
    }

    pub fn with_seven_zip(mut self, path: &str) -> Self {
        self.config.app.seven_zip = Some(PathBuf::from(path));
        self
    }

    pub fn with_history(mut self, path: &str) -> Self {
        self.config.app.history = PathBuf::from(path);
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Raw, unvalidated config for tests exercising validation failures.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobConfig`.
pub struct JobConfigBuilder {
    job: JobConfig,
}

impl JobConfigBuilder {
    pub fn new(mode: JobMode) -> Self {
        Self {
            job: JobConfig {
                enabled: true,
                mode,
                src: None,
                dest: None,
                interval: "1h".to_string(),
                error_interval: "5m".to_string(),
                seven_zip_args: vec![],
                tasks_before: vec![],
                tasks_after: vec![],
                cost: None,
                exclusive: false,
            },
        }
    }

    /// Shorthand for a `tasks_only` job, the most common test shape.
    pub fn tasks_only() -> Self {
        Self::new(JobMode::TasksOnly)
    }

    pub fn enabled(mut self, val: bool) -> Self {
        self.job.enabled = val;
        self
    }

    pub fn src(mut self, path: &str) -> Self {
        self.job.src = Some(PathBuf::from(path));
        self
    }

    pub fn dest(mut self, template: &str) -> Self {
        self.job.dest = Some(template.to_string());
        self
    }

    pub fn interval(mut self, val: &str) -> Self {
        self.job.interval = val.to_string();
        self
    }

    pub fn error_interval(mut self, val: &str) -> Self {
        self.job.error_interval = val.to_string();
        self
    }

    pub fn seven_zip_arg(mut self, arg: &str) -> Self {
        self.job.seven_zip_args.push(arg.to_string());
        self
    }

    pub fn task_before(mut self, step: RawStep) -> Self {
        self.job.tasks_before.push(step);
        self
    }

    pub fn task_after(mut self, step: RawStep) -> Self {
        self.job.tasks_after.push(step);
        self
    }

    pub fn cost(mut self, val: f64) -> Self {
        self.job.cost = Some(val);
        self
    }

    pub fn exclusive(mut self, val: bool) -> Self {
        self.job.exclusive = val;
        self
    }

    pub fn build(self) -> JobConfig {
        self.job
    }
}
