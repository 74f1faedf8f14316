//! Archive directory management.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! ├─ data00000.arb     # First archive file
//! ├─ data00001.arb     # Rolled over when the previous file grew too large
//! └─ ...
//! ```
//!
//! The LOCK file ensures only one process opens the archive at a time.

use crate::error::{CoreError, CoreResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const DATA_PREFIX: &str = "data";
const DATA_SUFFIX: &str = ".arb";

/// Holds the exclusive lock on an archive directory and names its files.
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    /// Lock file handle; the lock is released when it is dropped.
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates an archive directory and takes its lock.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if the directory is missing and
    ///   `create_if_missing` is false
    /// - [`CoreError::StoreLocked`] if another handle holds the lock
    pub fn open(path: &Path, create_if_missing: bool) -> CoreResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(CoreError::not_found(format!(
                    "archive directory {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(CoreError::invalid_path(path.display().to_string()));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of archive file `file_id`.
    #[must_use]
    pub fn archive_path(&self, file_id: u32) -> PathBuf {
        self.path.join(archive_file_name(file_id))
    }

    /// Lists archive file ids in ascending order.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupt`] if the ids are not contiguous from 0.
    pub fn archive_files(&self) -> CoreResult<Vec<u32>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.path)? {
            let entry = entry?;
            if let Some(id) = entry.file_name().to_str().and_then(parse_archive_file_name) {
                ids.push(id);
            }
        }
        ids.sort_unstable();

        for (expected, id) in (0u32..).zip(&ids) {
            if *id != expected {
                return Err(CoreError::corrupt(format!(
                    "archive file {} is missing",
                    archive_file_name(expected)
                )));
            }
        }
        Ok(ids)
    }

    /// Syncs the directory entry so newly created files survive a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be opened or synced.
    pub fn sync(&self) -> CoreResult<()> {
        #[cfg(unix)]
        {
            File::open(&self.path)?.sync_all()?;
        }
        Ok(())
    }
}

fn archive_file_name(file_id: u32) -> String {
    format!("{DATA_PREFIX}{file_id:05}{DATA_SUFFIX}")
}

fn parse_archive_file_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(DATA_PREFIX)?.strip_suffix(DATA_SUFFIX)?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
