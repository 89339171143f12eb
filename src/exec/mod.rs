// src/exec/mod.rs

//! Job execution layer.
//!
//! This module is responsible for actually performing the work of one job
//! occurrence: running before/after steps, spawning 7-Zip, copying trees.
//!
//! - [`backend`] provides the `JobExecutor` trait and the concrete
//!   `BackupExecutor` used in production, which tests replace with a fake.
//! - [`steps`] runs ordered before/after steps with `allow_fail` handling.
//! - [`archive`] holds the primary actions (7-Zip archiving, tree copy).
//! - [`command`] spawns a process and captures its output.
//! - [`template`] expands destination-path placeholders.

pub mod archive;
pub mod backend;
pub mod command;
pub mod steps;
pub mod template;

pub use backend::{BackupExecutor, JobExecutor};
pub use steps::{BuiltinStep, CommandStep, StepContext, TaskStep};
pub use template::expand_dest;
