// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::queue::QueueError;

#[derive(Error, Debug)]
pub enum BackrunError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Queue error: {0}")]
    QueueError(#[from] QueueError),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("History file error: {0}")]
    HistoryError(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BackrunError>;
