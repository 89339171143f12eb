// src/history/mod.rs

//! Persistent last-run history.
//!
//! The recurrence engine records, per job, when the last *successful* run
//! completed and how long it took. The record is read back at startup so
//! intervals are honored across process restarts instead of resetting, and
//! it is deliberately never touched on failure: a string of failed attempts
//! leaves the last-success baseline intact.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::Result;

/// Outcome of the last successful run of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRecord {
    /// Completion time of the last successful run.
    pub last_run: DateTime<Utc>,
    /// Wall-clock duration of that run, in milliseconds.
    pub last_duration_ms: u64,
}

/// Durable store of [`ScheduleRecord`]s keyed by job name.
///
/// Only the recurrence engine writes; each job owns a disjoint key, so
/// whole-store last-writer-wins persistence is acceptable.
pub trait HistoryStore: Send + Sync {
    fn read(&self, job: &str) -> Option<ScheduleRecord>;
    fn write(&self, job: &str, record: ScheduleRecord) -> Result<()>;
}

/// History store backed by a single JSON file mapping job name to record.
///
/// The file is read once at open and rewritten in full on every update.
pub struct JsonHistoryStore {
    path: PathBuf,
    records: Mutex<BTreeMap<String, ScheduleRecord>>,
}

impl std::fmt::Debug for JsonHistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonHistoryStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl JsonHistoryStore {
    /// Open (or create) the history file at `path`.
    ///
    /// A missing file starts an empty history; a malformed file is a hard
    /// error rather than silently discarding previous run times.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let records = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            let empty = BTreeMap::new();
            write_records(&path, &empty)?;
            empty
        };

        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }
}

impl HistoryStore for JsonHistoryStore {
    fn read(&self, job: &str) -> Option<ScheduleRecord> {
        let records = self.records.lock().expect("history mutex poisoned");
        records.get(job).cloned()
    }

    fn write(&self, job: &str, record: ScheduleRecord) -> Result<()> {
        let mut records = self.records.lock().expect("history mutex poisoned");
        records.insert(job.to_string(), record);
        write_records(&self.path, &records)
    }
}

fn write_records(path: &Path, records: &BTreeMap<String, ScheduleRecord>) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let contents = serde_json::to_string_pretty(records)?;
    fs::write(path, contents)?;
    Ok(())
}

/// In-memory store for tests and dry runs; contents die with the process.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Mutex<BTreeMap<String, ScheduleRecord>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn read(&self, job: &str) -> Option<ScheduleRecord> {
        let records = self.records.lock().expect("history mutex poisoned");
        records.get(job).cloned()
    }

    fn write(&self, job: &str, record: ScheduleRecord) -> Result<()> {
        let mut records = self.records.lock().expect("history mutex poisoned");
        records.insert(job.to_string(), record);
        Ok(())
    }
}
