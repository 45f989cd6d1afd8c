// src/exec/log_file.rs

//! Ephemeral tee log files under the cache directory.

use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blake3::Hasher;
use tracing::{debug, info, warn};

use crate::errors::Result;

/// Name of the per-user cache sub-directory.
pub const CACHE_DIR_NAME: &str = "buildterm";

/// `<user cache dir>/buildterm`, or `<tmp>/buildterm` when the platform has
/// no cache directory.
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
}

/// One log file that the tee stage of a run writes and the tailer reads.
///
/// The file is created on construction and removed by [`LogFile::remove`]
/// or, at the latest, on drop.
#[derive(Debug)]
pub struct LogFile {
    path: PathBuf,
}

impl LogFile {
    /// Create a new, empty log file for `command` in `cache_dir`.
    ///
    /// The name is `<blake3(command)>_<local timestamp>.log`; a numeric suffix
    /// is added if that name is already taken.
    pub fn create(cache_dir: &Path, command: &str) -> Result<Self> {
        fs::create_dir_all(cache_dir)
            .with_context(|| format!("creating cache dir {:?}", cache_dir))?;

        let stem = log_file_stem(command);
        let mut attempt = 0u32;

        loop {
            let name = if attempt == 0 {
                format!("{stem}.log")
            } else {
                format!("{stem}-{attempt}.log")
            };
            let path = cache_dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => {
                    debug!(log_file = ?path, "created log file");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("creating log file {:?}", path))
                        .into());
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. Missing files and files still locked by another
    /// process are ignored.
    pub fn remove(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(log_file = ?self.path, "removed log file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                debug!(log_file = ?self.path, "log file still in use; leaving it for clear-cache");
            }
            Err(e) => warn!(log_file = ?self.path, error = %e, "failed to remove log file"),
        }
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        self.remove();
    }
}

fn log_file_stem(command: &str) -> String {
    let mut hasher = Hasher::new();
    hasher.update(command.as_bytes());
    let hash = hasher.finalize().to_hex();
    let stamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S%.6f");
    format!("{hash}_{stamp}")
}

/// Remove every entry of the cache directory.
///
/// Per-entry failures are logged and skipped. Returns the number of entries
/// removed.
pub fn clear_cache(cache_dir: &Path) -> Result<usize> {
    if !cache_dir.exists() {
        info!(cache_dir = ?cache_dir, "cache dir does not exist; nothing to clear");
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(cache_dir)? {
        let path = entry?.path();
        let res = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        match res {
            Ok(()) => removed += 1,
            Err(e) => warn!(path = ?path, error = %e, "failed to remove cache entry"),
        }
    }

    info!(cache_dir = ?cache_dir, removed, "cache cleared");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_command_gets_distinct_files() {
        let dir = tempfile::tempdir().unwrap();

        let a = LogFile::create(dir.path(), "make").unwrap();
        let b = LogFile::create(dir.path(), "make").unwrap();

        assert_ne!(a.path(), b.path());
        assert!(a.path().exists() && b.path().exists());

        let name = a.path().file_name().unwrap().to_string_lossy().into_owned();
        let hash = blake3::hash(b"make").to_hex().to_string();
        assert!(name.starts_with(&format!("{hash}_")), "unexpected name {name}");
        assert!(name.ends_with(".log"));
    }

    #[test]
    fn drop_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let log = LogFile::create(dir.path(), "echo").unwrap();
            log.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn clear_cache_removes_files_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.log"), "x").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested").join("b.log"), "y").unwrap();

        assert_eq!(clear_cache(dir.path()).unwrap(), 2);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
        assert_eq!(clear_cache(&dir.path().join("missing")).unwrap(), 0);
    }
}
