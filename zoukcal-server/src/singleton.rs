//! Ensure only one zoukcal process writes to an output directory.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

const LOCK_SUFFIX: &str = "zoukcal.lock";

/// A lock guard that releases the lock when dropped
pub struct LockGuard {
    _file: File,
}

/// `docs/` is locked through `.docs.zoukcal.lock` beside it, outside what the
/// preview server publishes.
fn lock_path(output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let output_dir = output_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", output_dir.display()))?;
    let (Some(parent), Some(name)) = (output_dir.parent(), output_dir.file_name()) else {
        anyhow::bail!("Cannot lock {}: it has no parent directory", output_dir.display());
    };

    Ok(parent.join(format!(".{}.{LOCK_SUFFIX}", name.to_string_lossy())))
}

/// Acquire an exclusive lock on `output_dir`, failing if another instance holds it
pub fn acquire_lock(output_dir: &Path) -> Result<LockGuard> {
    let path = lock_path(output_dir)?;
    let file = File::create(&path).context("Failed to create lock file")?;

    file.try_lock_exclusive().map_err(|_| {
        anyhow::anyhow!(
            "Another zoukcal instance is already writing to {}.\n\
            If you believe this is an error, remove: {}",
            output_dir.display(),
            path.display()
        )
    })?;

    Ok(LockGuard { _file: file })
}
