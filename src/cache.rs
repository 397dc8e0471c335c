//! Per-ASN prefix cache on disk.
//!
//! Each ASN owns one plain-text file, `{dir}/{asn}.asn`, holding one
//! `a.b.c.d/n` prefix per line. Freshness comes from the file's modification
//! time, never from its content.

use chrono::{DateTime, Local};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::fs_abstraction::{FileSystem, RealFileSystem};
use crate::utils::format_age;

/// Cache file extension
const CACHE_EXTENSION: &str = "asn";

/// On-disk store of per-ASN prefix lists
#[derive(Debug, Clone)]
pub struct CacheStore<F: FileSystem = RealFileSystem> {
    dir: PathBuf,
    ttl: Duration,
    fs: F,
}

impl CacheStore<RealFileSystem> {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self::with_fs(dir, ttl, RealFileSystem)
    }
}

impl<F: FileSystem> CacheStore<F> {
    /// Create a store backed by a custom filesystem implementation
    pub fn with_fs(dir: impl Into<PathBuf>, ttl: Duration, fs: F) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            fs,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Path of the cache file for an ASN
    pub fn path_for(&self, asn: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", asn, CACHE_EXTENSION))
    }

    /// Create the cache directory if it does not exist yet
    pub fn ensure_dir(&self) -> Result<()> {
        self.fs
            .create_dir_all(&self.dir)
            .map_err(|e| SyncError::cache_io(&self.dir, e))
    }

    /// Whether the cached prefixes for `asn` can be used without a refresh
    pub fn is_fresh(&self, asn: &str) -> bool {
        self.is_fresh_at(asn, SystemTime::now())
    }

    /// Freshness as seen at `now`.
    ///
    /// Absent files are stale. Otherwise the file is stale exactly when its
    /// age in whole seconds exceeds the TTL.
    pub fn is_fresh_at(&self, asn: &str, now: SystemTime) -> bool {
        let Some(age) = self.age_at(asn, now) else {
            return false;
        };

        let fresh = age.as_secs() <= self.ttl.as_secs();
        debug!(
            "ASN {} cache age {} (ttl {}s): {}",
            asn,
            format_age(age),
            self.ttl.as_secs(),
            if fresh { "fresh" } else { "stale" }
        );
        fresh
    }

    /// Age of the cache file at `now`, `None` if it cannot be inspected.
    ///
    /// A modification time in the future counts as age zero.
    pub fn age_at(&self, asn: &str, now: SystemTime) -> Option<Duration> {
        let path = self.path_for(asn);
        match self.fs.modified(&path) {
            Ok(mtime) => {
                let local: DateTime<Local> = mtime.into();
                debug!(
                    "ASN {} cache file {} modified {}",
                    asn,
                    path.display(),
                    local.format("%Y-%m-%d %H:%M:%S")
                );
                Some(now.duration_since(mtime).unwrap_or(Duration::ZERO))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("ASN {} has no cache file at {}", asn, path.display());
                None
            }
            Err(e) => {
                debug!("Cannot stat cache file {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Read the cached prefixes for `asn`, in file order, duplicates kept
    pub fn load(&self, asn: &str) -> Result<Vec<String>> {
        let path = self.path_for(asn);
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| SyncError::cache_io(&path, e))?;

        Ok(content.lines().map(str::to_string).collect())
    }

    /// Atomically replace the cache file for `asn` with `prefixes`
    pub fn store(&self, asn: &str, prefixes: &[String]) -> Result<()> {
        let path = self.path_for(asn);

        let mut content = String::with_capacity(prefixes.iter().map(|p| p.len() + 1).sum());
        for prefix in prefixes {
            content.push_str(prefix);
            content.push('\n');
        }

        self.fs
            .write_atomic(&path, content.as_bytes())
            .map_err(|e| SyncError::cache_io(&path, e))?;

        debug!(
            "ASN {} cache written: {} prefixes to {}",
            asn,
            prefixes.len(),
            path.display()
        );
        Ok(())
    }
}
