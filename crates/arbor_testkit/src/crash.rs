//! Crash simulation for archive recovery tests.
//!
//! Two ways to damage a store:
//!
//! 1. **On disk** - [`truncate_tail`] and [`flip_byte`] edit closed archive
//!    files, as a power cut or a bad sector would.
//! 2. **In flight** - [`FailingBackend`] makes a chosen append fail, either
//!    cleanly or after writing part of the bytes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use arbor_testkit::crash::{last_archive_file, truncate_tail};
//!
//! store.close();
//! truncate_tail(&last_archive_file(store.path())?, 3)?;
//! store.reopen();
//! ```

use arbor_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};
use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lists the archive files in `dir`, oldest first.
pub fn archive_files(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension().is_some_and(|ext| ext == "arb")
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("data"))
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Returns the archive file new blocks are appended to.
pub fn last_archive_file(dir: &Path) -> io::Result<PathBuf> {
    archive_files(dir)?
        .pop()
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no archive files"))
}

/// Cuts `bytes` off the end of `path`, returning the new length.
pub fn truncate_tail(path: &Path, bytes: u64) -> io::Result<u64> {
    let file = OpenOptions::new().write(true).open(path)?;
    let len = file.metadata()?.len();
    let new_len = len.saturating_sub(bytes);
    file.set_len(new_len)?;
    file.sync_all()?;
    Ok(new_len)
}

/// Inverts every bit of the byte at `offset` in `path`.
pub fn flip_byte(path: &Path, offset: u64) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let mut byte = [0u8; 1];
    file.seek(SeekFrom::Start(offset))?;
    file.read_exact(&mut byte)?;
    byte[0] = !byte[0];
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(&byte)?;
    file.sync_all()
}

/// Size of `path` in bytes.
pub fn file_len(path: &Path) -> io::Result<u64> {
    Ok(fs::metadata(path)?.len())
}

#[derive(Debug, Default)]
struct FailState {
    appends: AtomicUsize,
    fail_in: AtomicUsize,
    partial: AtomicBool,
    failures: AtomicUsize,
}

/// An in-memory backend whose appends can be made to fail.
///
/// Clones share both the bytes and the failure switch, so a test keeps one
/// clone to arm failures after handing the other to a store.
#[derive(Debug, Clone, Default)]
pub struct FailingBackend {
    inner: InMemoryBackend,
    state: Arc<FailState>,
}

impl FailingBackend {
    /// Creates an empty backend that never fails until armed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `inner`, sharing its bytes.
    pub fn wrap(inner: InMemoryBackend) -> Self {
        Self {
            inner,
            state: Arc::default(),
        }
    }

    /// Makes the `n`-th append from now fail. `n == 1` is the next append.
    ///
    /// With `partial`, the failing append writes the first half of its bytes
    /// before reporting the error, leaving a torn block behind.
    pub fn fail_on_append(&self, n: usize, partial: bool) {
        self.state.partial.store(partial, Ordering::SeqCst);
        self.state.fail_in.store(n, Ordering::SeqCst);
    }

    /// Disarms a pending failure.
    pub fn disarm(&self) {
        self.state.fail_in.store(0, Ordering::SeqCst);
    }

    /// Number of appends that succeeded.
    pub fn appends(&self) -> usize {
        self.state.appends.load(Ordering::SeqCst)
    }

    /// Number of appends that were failed on purpose.
    pub fn failures(&self) -> usize {
        self.state.failures.load(Ordering::SeqCst)
    }

    /// A copy of the bytes written so far.
    pub fn data(&self) -> Vec<u8> {
        self.inner.data()
    }

    /// A plain backend over a copy of the current bytes, for reopening.
    pub fn snapshot(&self) -> InMemoryBackend {
        InMemoryBackend::with_data(self.inner.data())
    }

    fn should_fail(&self) -> bool {
        self.state
            .fail_in
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| match left {
                0 => None,
                n => Some(n - 1),
            })
            .is_ok_and(|left| left == 1)
    }
}

impl StorageBackend for FailingBackend {
    fn read_at(&self, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        self.inner.read_at(offset, len)
    }

    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.should_fail() {
            self.state.failures.fetch_add(1, Ordering::SeqCst);
            if self.state.partial.load(Ordering::SeqCst) && data.len() > 1 {
                self.inner.append(&data[..data.len() / 2])?;
            }
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::Other,
                "simulated append failure",
            )));
        }
        let offset = self.inner.append(data)?;
        self.state.appends.fetch_add(1, Ordering::SeqCst);
        Ok(offset)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.inner.flush()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn sync(&mut self) -> StorageResult<()> {
        self.inner.sync()
    }

    fn truncate(&mut self, new_size: u64) -> StorageResult<()> {
        self.inner.truncate(new_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fails_exactly_the_armed_append() {
        let mut backend = FailingBackend::new();
        backend.fail_on_append(2, false);

        assert!(backend.append(b"one").is_ok());
        assert!(backend.append(b"two").is_err());
        assert!(backend.append(b"three").is_ok());
        assert_eq!(backend.appends(), 2);
        assert_eq!(backend.failures(), 1);
        assert_eq!(backend.data(), b"onethree");
    }

    #[test]
    fn partial_failure_leaves_half_the_bytes() {
        let mut backend = FailingBackend::new();
        backend.fail_on_append(1, true);

        assert!(backend.append(b"abcdef").is_err());
        assert_eq!(backend.data(), b"abc");
    }

    #[test]
    fn clones_share_the_switch() {
        let mut backend = FailingBackend::new();
        let handle = backend.clone();
        handle.fail_on_append(1, false);
        assert!(backend.append(b"x").is_err());
        assert_eq!(handle.failures(), 1);
    }

    #[test]
    fn disarm_cancels_failure() {
        let mut backend = FailingBackend::new();
        backend.fail_on_append(1, false);
        backend.disarm();
        assert!(backend.append(b"x").is_ok());
    }

    #[test]
    fn file_damage_helpers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data00000.arb");
        fs::write(&path, [0u8, 1, 2, 3]).unwrap();
        fs::write(dir.path().join("LOCK"), b"").unwrap();

        assert_eq!(archive_files(dir.path()).unwrap(), vec![path.clone()]);
        flip_byte(&path, 1).unwrap();
        assert_eq!(fs::read(&path).unwrap(), vec![0, 0xFE, 2, 3]);
        assert_eq!(truncate_tail(&path, 3).unwrap(), 1);
        assert_eq!(file_len(&path).unwrap(), 1);
    }
}
