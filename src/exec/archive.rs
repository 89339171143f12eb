// src/exec/archive.rs

//! Primary backup actions: 7-Zip archiving and tree copying.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::exec::command::run_process;

/// Build the 7-Zip argument list for archiving `src` into `dest`.
///
/// Shape: `a <extra args...> <dest> <src>`, matching how 7-Zip expects the
/// archive path before the input path.
pub fn seven_zip_args(extra: &[String], dest: &Path, src: &Path) -> Vec<String> {
    let mut args = Vec::with_capacity(extra.len() + 3);
    args.push("a".to_string());
    args.extend(extra.iter().cloned());
    args.push(dest.to_string_lossy().into_owned());
    args.push(src.to_string_lossy().into_owned());
    args
}

/// Archive `src` into `dest` by spawning the 7-Zip binary.
///
/// On failure the partially written archive, if any, is deleted best-effort
/// before the error propagates, so a truncated file is never mistaken for a
/// backup.
pub async fn archive_with_seven_zip(
    seven_zip: &Path,
    extra_args: &[String],
    dest: &Path,
    src: &Path,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating destination directory {:?}", parent))?;
        }
    }

    let args = seven_zip_args(extra_args, dest, src);
    let exec = seven_zip.to_string_lossy().into_owned();

    match run_process(&exec, &args).await {
        Ok(output) => {
            debug!(dest = ?dest, code = output.code, "archive created");
            Ok(())
        }
        Err(err) => {
            if let Err(cleanup_err) = tokio::fs::remove_file(dest).await {
                debug!(
                    dest = ?dest,
                    error = %cleanup_err,
                    "no partial archive to clean up"
                );
            } else {
                warn!(dest = ?dest, "removed partial archive after failure");
            }
            Err(err).with_context(|| format!("archiving {:?} to {:?}", src, dest))
        }
    }
}

/// Recursively copy the `src` tree into `dest`, overwriting existing files.
///
/// Dotfiles are included; directory structure is recreated as encountered.
pub async fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    let src = src.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || copy_tree_blocking(&src, &dest))
        .await
        .context("copy_tree worker panicked")?
}

fn copy_tree_blocking(src: &Path, dest: &Path) -> Result<()> {
    if src.is_file() {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory {:?}", parent))?;
            }
        }
        std::fs::copy(src, dest).with_context(|| format!("copying {:?} to {:?}", src, dest))?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.with_context(|| format!("walking source tree {:?}", src))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("stripping prefix {:?}", src))?;
        let target: PathBuf = dest.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("creating directory {:?}", target))?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating directory {:?}", parent))?;
            }
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("copying {:?} to {:?}", entry.path(), target))?;
        }
    }

    Ok(())
}
