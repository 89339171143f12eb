// src/config/mod.rs

//! Configuration loading and validation for backrun.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate semantic invariants like intervals and costs (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    AppSection, ConfigFile, JobConfig, JobMode, QueueKind, QueueSection, RawConfigFile, RawStep,
};
