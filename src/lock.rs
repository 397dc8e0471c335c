//! File-based locking to prevent concurrent runs on one cache directory.
//!
//! Two runs sharing a cache directory would race on the cache files and on
//! the address-list, so a run holds an advisory flock on
//! `{cache dir}/.asnlist.lock` for its whole duration.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".asnlist.lock";

/// A guard holding an exclusive lock on a cache directory.
/// The lock is released when the guard is dropped.
#[derive(Debug)]
pub struct LockGuard {
    _file: File,
    path: PathBuf,
}

impl LockGuard {
    /// Acquire the lock for `dir`, which must already exist.
    /// Fails immediately if another run holds it.
    pub fn acquire(dir: &Path) -> Result<Self> {
        let path = dir.join(LOCK_FILE);

        // create without truncate: no window between create and lock
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("Failed to open lock file: {}", path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set lock file permissions")?;
        }

        file.try_lock_exclusive().map_err(|_| {
            anyhow::anyhow!(
                "Another asnlist run is using cache directory {}.\n\
                 Wait for it to finish, or remove {} if no run is active.",
                dir.display(),
                path.display()
            )
        })?;

        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
