// src/exec/command.rs

use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::debug;

/// Captured output of a finished process.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Spawn `exec` with `args`, stream its output to the debug log, and wait
/// for it to exit.
///
/// A non-zero exit status is an error carrying the exit code and the tail of
/// stderr, so step failures surface with enough context to diagnose.
pub async fn run_process(exec: &str, args: &[String]) -> Result<ProcessOutput> {
    debug!(exec, ?args, "spawning process");

    let mut cmd = Command::new(exec);
    cmd.args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process '{exec}'"))?;

    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let exec_name = exec.to_string();
    let stdout_task = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(stdout) = stdout {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(exec = %exec_name, "stdout: {}", line);
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    });

    let exec_name = exec.to_string();
    let stderr_task = tokio::spawn(async move {
        let mut collected = String::new();
        if let Some(stderr) = stderr {
            let reader = BufReader::new(stderr);
            let mut lines = reader.lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(exec = %exec_name, "stderr: {}", line);
                collected.push_str(&line);
                collected.push('\n');
            }
        }
        collected
    });

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for process '{exec}'"))?;

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();
    let code = status.code().unwrap_or(-1);

    if !status.success() {
        let lines: Vec<&str> = stderr.lines().collect();
        let tail = lines[lines.len().saturating_sub(5)..].join("; ");
        bail!("process '{exec}' exited with code {code}: {tail}");
    }

    Ok(ProcessOutput {
        code,
        stdout,
        stderr,
    })
}
