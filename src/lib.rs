// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod history;
pub mod logging;
pub mod queue;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{run_job_loop, JobSpec, RecurrenceOptions, RunOutcome};
use crate::exec::{BackupExecutor, JobExecutor};
use crate::history::{HistoryStore, JsonHistoryStore};
use crate::queue::Dispatcher;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the job queue (parallel or cost, from `[queue]`)
/// - the JSON history store
/// - one recurrence loop per enabled job
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let history: Arc<dyn HistoryStore> = Arc::new(JsonHistoryStore::open(&cfg.app.history)?);
    let dispatcher: Arc<Dispatcher<RunOutcome>> = Arc::new(Dispatcher::from_config(&cfg.queue));
    let executor: Arc<dyn JobExecutor> = Arc::new(BackupExecutor::new());

    // Ctrl-C → graceful shutdown between runs; running jobs are never
    // aborted mid-flight.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    {
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            info!("Ctrl-C received; finishing running jobs and stopping");
            let _ = shutdown_tx.send(true);
        });
    }

    let options = RecurrenceOptions { once: args.once };

    let mut handles = Vec::new();
    for (name, job_cfg) in cfg.job.iter() {
        if !job_cfg.enabled {
            debug!(job = %name, "job disabled; not scheduling");
            continue;
        }

        let spec = Arc::new(JobSpec::from_config(name, job_cfg, &cfg.app)?);
        info!(
            job = %name,
            interval = ?spec.interval,
            error_interval = ?spec.error_interval,
            "scheduling job"
        );

        handles.push(tokio::spawn(run_job_loop(
            spec,
            Arc::clone(&dispatcher),
            Arc::clone(&executor),
            Arc::clone(&history),
            shutdown_rx.clone(),
            options,
        )));
    }

    if handles.is_empty() {
        warn!("no enabled jobs in config; nothing to do");
        return Ok(());
    }

    for handle in handles {
        let _ = handle.await;
    }

    info!("backrun exiting");
    Ok(())
}

/// Simple dry-run output: print queue settings and the job plan.
fn print_dry_run(cfg: &ConfigFile) {
    println!("backrun dry-run");
    println!("  queue.kind = {:?}", cfg.queue.kind);
    println!("  queue.capacity = {}", cfg.queue.capacity);
    println!("  queue.allow_exclusive = {}", cfg.queue.allow_exclusive);
    if let Some(ref seven_zip) = cfg.app.seven_zip {
        println!("  app.seven_zip = {}", seven_zip.display());
    }
    println!("  app.history = {}", cfg.app.history.display());
    println!();

    println!("jobs ({}):", cfg.job.len());
    for (name, job) in cfg.job.iter() {
        println!("  - {name}");
        println!("      enabled: {}", job.enabled);
        println!("      mode: {:?}", job.mode);
        if let Some(ref src) = job.src {
            println!("      src: {}", src.display());
        }
        if let Some(ref dest) = job.dest {
            println!("      dest: {dest}");
        }
        println!("      interval: {}", job.interval);
        println!("      error_interval: {}", job.error_interval);
        if !job.tasks_before.is_empty() {
            println!("      tasks_before: {}", job.tasks_before.len());
        }
        if !job.tasks_after.is_empty() {
            println!("      tasks_after: {}", job.tasks_after.len());
        }
        if let Some(cost) = job.cost {
            println!("      cost: {cost}");
        }
        if job.exclusive {
            println!("      exclusive: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
