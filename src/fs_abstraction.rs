//! Filesystem abstraction layer for testability
//!
//! The cache store only needs a handful of filesystem operations. Putting
//! them behind a trait lets freshness logic be tested against arbitrary
//! modification times without touching the real filesystem.
//! Uses mockall for automatic mock generation in test builds.

use std::io::{self, Write};
use std::path::Path;
use std::time::SystemTime;

/// Mode of files written by `write_atomic` (temp files start out 0600)
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

#[cfg(test)]
use mockall::automock;

/// Trait abstracting the filesystem operations used by the cache.
///
/// # Example (testing)
/// ```ignore
/// use asnlist::fs_abstraction::MockFileSystem;
///
/// let mut mock_fs = MockFileSystem::new();
/// mock_fs.expect_modified()
///     .returning(|_| Ok(std::time::SystemTime::UNIX_EPOCH));
/// ```
#[cfg_attr(test, automock)]
pub trait FileSystem: Send + Sync {
    /// Read file contents as a string.
    fn read_to_string(&self, path: &Path) -> io::Result<String>;

    /// Last modification time of a file.
    fn modified(&self, path: &Path) -> io::Result<SystemTime>;

    /// Create a directory and all parent directories.
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Replace `path` with `contents` so readers see either the old file or
    /// the complete new one.
    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()>;
}

/// Real filesystem implementation using std::fs.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        std::fs::read_to_string(path)
    }

    fn modified(&self, path: &Path) -> io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn write_atomic(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        use tempfile::NamedTempFile;

        // Temp file must live in the same directory for rename to be atomic
        let parent_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(parent_dir)?;

        temp_file.write_all(contents)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .as_file()
                .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))?;
        }
        temp_file.as_file().sync_all()?;

        temp_file.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
