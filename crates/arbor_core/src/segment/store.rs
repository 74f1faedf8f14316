//! Content-addressed segment store over archive files.

use crate::cache::FifoCache;
use crate::config::Config;
use crate::dir::StoreDir;
use crate::error::{CoreError, CoreResult};
use crate::segment::archive::{
    encode_file_header, encode_head_block, encode_segment_block, scan_file, Block,
    BLOCK_HEADER_SIZE, FILE_HEADER_SIZE,
};
use crate::types::{Address, Head, RecordId, Sequence};
use arbor_storage::{FileBackend, InMemoryBackend, StorageBackend};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type SharedFile = Arc<RwLock<Box<dyn StorageBackend>>>;

/// Where a segment's bytes live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SegmentLocation {
    file: u32,
    offset: u64,
    len: u32,
}

/// Append-side state, guarded by the writer mutex.
#[derive(Debug)]
struct WriterState {
    current: u32,
    /// Size of the current file after the last fully written block.
    good_size: u64,
    /// Set when an append failed part-way; the tail is cut before the next one.
    poisoned: bool,
}

/// Summary counters for a store.
#[derive(Debug, Clone, Default)]
pub struct SegmentStoreStats {
    /// Number of archive files.
    pub files: usize,
    /// Number of distinct segments.
    pub segments: usize,
    /// Sum of segment payload sizes.
    pub segment_bytes: u64,
    /// Total size of all archive files.
    pub archive_bytes: u64,
    /// Published head, if any.
    pub head: Option<Head>,
}

/// Result of [`SegmentStore::verify`].
#[derive(Debug, Clone, Default)]
pub struct VerifyReport {
    /// Archive files scanned.
    pub files: usize,
    /// Valid segment blocks.
    pub segment_blocks: usize,
    /// Valid head blocks.
    pub head_blocks: usize,
    /// Bytes of incomplete trailing blocks.
    pub torn_bytes: u64,
    /// Problems found, one line each.
    pub errors: Vec<String>,
}

impl VerifyReport {
    /// True when no problem was found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Durable, content-addressed segment storage with a single head pointer.
///
/// Segments are immutable and identified by the SHA-256 of their bytes. The
/// head names the current root record and only changes through
/// [`compare_and_swap_root`](Self::compare_and_swap_root).
///
/// # Thread Safety
///
/// All methods take `&self`. Appends and head swaps are serialized by one
/// writer mutex; reads go through the index and never wait for an append
/// to finish beyond the brief per-file lock.
pub struct SegmentStore {
    config: Config,
    dir: Mutex<Option<StoreDir>>,
    path: Option<PathBuf>,
    rolls: bool,
    files: RwLock<Vec<SharedFile>>,
    writer: Mutex<WriterState>,
    index: RwLock<HashMap<Address, SegmentLocation>>,
    head: RwLock<Option<Head>>,
    cache: Mutex<FifoCache<Address, Bytes>>,
    closed: AtomicBool,
}

impl SegmentStore {
    /// Opens the archive in directory `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::NotFound`] if there is no archive and
    ///   `create_if_missing` is false
    /// - [`CoreError::AlreadyExists`] if an archive exists and
    ///   `error_if_exists` is true
    /// - [`CoreError::StoreLocked`] if another handle has the directory
    /// - [`CoreError::Corrupt`] / [`CoreError::ChecksumMismatch`] if recovery
    ///   finds damage other than a torn tail
    pub fn open(path: &Path, config: Config) -> CoreResult<Self> {
        let dir = StoreDir::open(path, config.create_if_missing)?;
        let ids = dir.archive_files()?;

        let files: Vec<Box<dyn StorageBackend>> = if ids.is_empty() {
            if !config.create_if_missing {
                return Err(CoreError::not_found(format!(
                    "archive in {}",
                    path.display()
                )));
            }
            let mut file = FileBackend::create_new(&dir.archive_path(0))?;
            file.append(&encode_file_header(0))?;
            file.sync()?;
            dir.sync()?;
            info!(path = %path.display(), "created archive");
            vec![Box::new(file)]
        } else {
            if config.error_if_exists {
                return Err(CoreError::AlreadyExists {
                    name: path.display().to_string(),
                });
            }
            ids.iter()
                .map(|id| {
                    FileBackend::open_existing(&dir.archive_path(*id))
                        .map(|f| Box::new(f) as Box<dyn StorageBackend>)
                })
                .collect::<Result<_, _>>()?
        };

        let store = Self::recover(config, Some(dir), files)?;
        info!(
            path = %path.display(),
            files = store.files.read().len(),
            segments = store.index.read().len(),
            head = ?store.head().map(|h| h.sequence.as_u64()),
            "opened segment store"
        );
        Ok(store)
    }

    /// Creates a fresh archive in `path`, failing if one already exists.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn create(path: &Path, config: Config) -> CoreResult<Self> {
        Self::open(path, config.create_if_missing(true).error_if_exists(true))
    }

    /// Creates a store held entirely in memory.
    ///
    /// # Errors
    ///
    /// Only fails if the initial header cannot be written.
    pub fn in_memory(config: Config) -> CoreResult<Self> {
        Self::with_backend(Box::new(InMemoryBackend::new()), config)
    }

    /// Creates a single-file store over an arbitrary backend.
    ///
    /// An empty backend is initialized; a non-empty one is recovered the
    /// same way an archive file is on [`open`](Self::open). No directory lock
    /// is taken and the file never rolls over.
    ///
    /// # Errors
    ///
    /// Same recovery errors as [`open`](Self::open).
    pub fn with_backend(backend: Box<dyn StorageBackend>, config: Config) -> CoreResult<Self> {
        Self::recover(config, None, vec![backend])
    }

    fn recover(
        config: Config,
        dir: Option<StoreDir>,
        mut files: Vec<Box<dyn StorageBackend>>,
    ) -> CoreResult<Self> {
        let last = u32::try_from(files.len().saturating_sub(1))
            .map_err(|_| CoreError::corrupt("too many archive files"))?;
        let mut index = HashMap::new();
        let mut head = None;

        for (id, file) in (0u32..).zip(files.iter_mut()) {
            if id == last && file.size()? == 0 {
                file.append(&encode_file_header(id))?;
                file.sync()?;
            }

            let outcome = scan_file(&**file, id)?;
            if outcome.is_torn() {
                if id != last {
                    return Err(CoreError::corrupt(format!(
                        "archive file {id} ends in an incomplete block"
                    )));
                }
                warn!(
                    file = id,
                    valid_end = outcome.valid_end,
                    torn_bytes = outcome.torn_bytes,
                    "discarding incomplete block at end of archive"
                );
                file.truncate(outcome.valid_end)?;
                if outcome.valid_end == 0 {
                    file.append(&encode_file_header(id))?;
                }
                file.sync()?;
            }

            for block in outcome.blocks {
                match block {
                    Block::Segment {
                        address,
                        payload_offset,
                        len,
                    } => {
                        index.entry(address).or_insert(SegmentLocation {
                            file: id,
                            offset: payload_offset,
                            len,
                        });
                    }
                    Block::Head(found) => head = Some(found),
                }
            }
        }

        if let Some(head) = head {
            if !index.contains_key(&head.root.segment) {
                return Err(CoreError::corrupt(format!(
                    "head {} names missing segment {}",
                    head.sequence,
                    head.root.segment.short()
                )));
            }
        }

        let good_size = match files.last() {
            Some(file) => file.size()?,
            None => return Err(CoreError::corrupt("archive has no files")),
        };

        let path = dir.as_ref().map(|d| d.path().to_path_buf());
        let rolls = dir.is_some();
        let cache = FifoCache::new(config.segment_cache_size);

        Ok(Self {
            config,
            dir: Mutex::new(dir),
            path,
            rolls,
            files: RwLock::new(
                files
                    .into_iter()
                    .map(|f| Arc::new(RwLock::new(f)))
                    .collect(),
            ),
            writer: Mutex::new(WriterState {
                current: last,
                good_size,
                poisoned: false,
            }),
            index: RwLock::new(index),
            head: RwLock::new(head),
            cache: Mutex::new(cache),
            closed: AtomicBool::new(false),
        })
    }

    /// Returns the configuration the store was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the archive directory, or `None` for a backend-only store.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Reads the bytes of segment `address`.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] for an unknown address,
    /// [`CoreError::Storage`] if the bytes cannot be read.
    pub fn read_segment(&self, address: &Address) -> CoreResult<Bytes> {
        self.ensure_open()?;
        if let Some(bytes) = self.cache.lock().get(address) {
            return Ok(bytes);
        }

        let location = self
            .index
            .read()
            .get(address)
            .copied()
            .ok_or_else(|| CoreError::not_found(format!("segment {}", address.short())))?;
        let file = self.file(location.file)?;
        let data = file.read().read_at(location.offset, location.len as usize)?;

        let bytes = Bytes::from(data);
        self.cache.lock().insert(*address, bytes.clone());
        Ok(bytes)
    }

    /// Returns true if segment `address` is stored.
    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.index.read().contains_key(address)
    }

    /// Stores `data` and returns its address.
    ///
    /// Writing bytes that are already stored is a no-op that returns the
    /// existing address.
    ///
    /// # Errors
    ///
    /// [`CoreError::SegmentTooLarge`] above `max_segment_size`, storage
    /// errors if the append fails.
    pub fn write_segment(&self, data: &[u8]) -> CoreResult<Address> {
        self.ensure_open()?;
        if data.len() > self.config.max_segment_size {
            return Err(CoreError::SegmentTooLarge {
                size: data.len(),
                max: self.config.max_segment_size,
            });
        }

        let address = Address::of(data);
        if self.contains(&address) {
            return Ok(address);
        }

        let mut writer = self.writer.lock();
        self.ensure_open()?;
        if self.contains(&address) {
            return Ok(address);
        }

        let block = encode_segment_block(&address, data);
        let (file, offset) = self.append_block(&mut writer, &block)?;
        #[allow(clippy::cast_possible_truncation)]
        let location = SegmentLocation {
            file,
            offset: offset + BLOCK_HEADER_SIZE as u64,
            len: data.len() as u32,
        };
        self.index.write().insert(address, location);

        debug!(segment = %address.short(), len = data.len(), file, "wrote segment");
        Ok(address)
    }

    /// Returns the published head, or `None` before the first swap.
    #[must_use]
    pub fn head(&self) -> Option<Head> {
        *self.head.read()
    }

    /// Atomically replaces the head root.
    ///
    /// Returns `Ok(false)` without touching the archive when the current
    /// root is not `expected`. On success the head block is flushed (and
    /// synced when `sync_on_commit` is set) before the new head becomes
    /// visible to readers.
    ///
    /// # Errors
    ///
    /// [`CoreError::NotFound`] if `new.segment` has not been written,
    /// storage errors if the head block cannot be made durable.
    pub fn compare_and_swap_root(
        &self,
        expected: Option<RecordId>,
        new: RecordId,
    ) -> CoreResult<bool> {
        self.ensure_open()?;
        let mut writer = self.writer.lock();
        self.ensure_open()?;

        let current = self.head();
        if current.map(|h| h.root) != expected {
            debug!(expected = ?expected, "root swap lost");
            return Ok(false);
        }
        if !self.contains(&new.segment) {
            return Err(CoreError::not_found(format!(
                "root segment {}",
                new.segment.short()
            )));
        }

        let head = Head {
            root: new,
            sequence: current.map_or(Sequence::new(1), |h| h.sequence.next()),
        };
        let (file, offset) = self.append_block(&mut writer, &encode_head_block(&head))?;

        let durable = self.file(file).and_then(|f| {
            let mut f = f.write();
            f.flush()?;
            if self.config.sync_on_commit {
                f.sync()?;
            }
            Ok(())
        });
        if let Err(e) = durable {
            writer.good_size = offset;
            writer.poisoned = true;
            warn!(error = %e, "head record could not be made durable");
            return Err(e);
        }

        *self.head.write() = Some(head);
        debug!(root = %new, sequence = %head.sequence, "published head");
        Ok(true)
    }

    /// Flushes and releases every file handle and the directory lock.
    ///
    /// Idempotent. Later operations fail with [`CoreError::StoreClosed`].
    ///
    /// # Errors
    ///
    /// Returns the error of the final sync, after releasing resources anyway.
    pub fn close(&self) -> CoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let writer = self.writer.lock();
        let result = self.file(writer.current).and_then(|f| {
            let mut f = f.write();
            f.flush()?;
            f.sync()?;
            Ok(())
        });

        self.files.write().clear();
        self.cache.lock().clear();
        *self.dir.lock() = None;

        info!(path = ?self.path, "closed segment store");
        result
    }

    /// Returns true once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns summary counters.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or a file size cannot be read.
    pub fn stats(&self) -> CoreResult<SegmentStoreStats> {
        self.ensure_open()?;
        let files = self.files.read();
        let mut archive_bytes = 0;
        for file in files.iter() {
            archive_bytes += file.read().size()?;
        }
        let index = self.index.read();
        Ok(SegmentStoreStats {
            files: files.len(),
            segments: index.len(),
            segment_bytes: index.values().map(|l| u64::from(l.len)).sum(),
            archive_bytes,
            head: self.head(),
        })
    }

    /// Re-scans every block of every archive file.
    ///
    /// Problems are collected in the report instead of aborting at the
    /// first one.
    ///
    /// # Errors
    ///
    /// Only fails if the store is closed.
    pub fn verify(&self) -> CoreResult<VerifyReport> {
        self.ensure_open()?;
        let _writer = self.writer.lock();
        let files = self.files.read();
        let last = files.len().saturating_sub(1);
        let mut report = VerifyReport {
            files: files.len(),
            ..VerifyReport::default()
        };

        for (id, file) in (0u32..).zip(files.iter()) {
            let file = file.read();
            match scan_file(&**file, id) {
                Ok(outcome) => {
                    for block in &outcome.blocks {
                        match block {
                            Block::Segment { .. } => report.segment_blocks += 1,
                            Block::Head(_) => report.head_blocks += 1,
                        }
                    }
                    if outcome.is_torn() {
                        report.torn_bytes += outcome.torn_bytes;
                        if id as usize != last {
                            report
                                .errors
                                .push(format!("file {id}: incomplete block before end of archive"));
                        }
                    }
                }
                Err(e) => report.errors.push(format!("file {id}: {e}")),
            }
        }

        if let Some(head) = self.head() {
            if !self.contains(&head.root.segment) {
                report.errors.push(format!(
                    "head {} names missing segment {}",
                    head.sequence,
                    head.root.segment.short()
                ));
            }
        }
        Ok(report)
    }

    fn ensure_open(&self) -> CoreResult<()> {
        if self.is_closed() {
            Err(CoreError::StoreClosed)
        } else {
            Ok(())
        }
    }

    fn file(&self, id: u32) -> CoreResult<SharedFile> {
        self.files
            .read()
            .get(id as usize)
            .cloned()
            .ok_or(CoreError::StoreClosed)
    }

    /// Appends one block, healing a poisoned tail and rolling files first.
    /// Returns the file id and the block's offset in it.
    fn append_block(&self, writer: &mut WriterState, block: &[u8]) -> CoreResult<(u32, u64)> {
        if writer.poisoned {
            let file = self.file(writer.current)?;
            warn!(file = writer.current, good_size = writer.good_size, "cutting torn tail after failed append");
            file.write().truncate(writer.good_size)?;
            writer.poisoned = false;
        }

        let len = block.len() as u64;
        if self.rolls
            && writer.good_size > FILE_HEADER_SIZE as u64
            && writer.good_size + len > self.config.max_archive_file_size
        {
            self.roll(writer)?;
        }

        let file = self.file(writer.current)?;
        let mut file = file.write();
        match file.append(block) {
            Ok(offset) => {
                writer.good_size = offset + len;
                Ok((writer.current, offset))
            }
            Err(e) => {
                writer.poisoned = true;
                warn!(file = writer.current, error = %e, "archive append failed");
                Err(e.into())
            }
        }
    }

    fn roll(&self, writer: &mut WriterState) -> CoreResult<()> {
        let dir = self.dir.lock();
        let dir = dir.as_ref().ok_or(CoreError::StoreClosed)?;

        self.file(writer.current)?.write().sync()?;

        let next = writer.current + 1;
        let mut file = FileBackend::create_new(&dir.archive_path(next))?;
        file.append(&encode_file_header(next))?;
        file.sync()?;
        dir.sync()?;

        self.files.write().push(Arc::new(RwLock::new(Box::new(file))));
        writer.current = next;
        writer.good_size = FILE_HEADER_SIZE as u64;
        info!(file = next, "rolled over to new archive file");
        Ok(())
    }
}

impl std::fmt::Debug for SegmentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegmentStore")
            .field("path", &self.path)
            .field("segments", &self.index.read().len())
            .field("head", &self.head())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl Drop for SegmentStore {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn small_config() -> Config {
        Config::default().sync_on_commit(false)
    }

    #[test]
    fn write_then_read() {
        let store = SegmentStore::in_memory(small_config()).unwrap();
        let address = store.write_segment(b"hello segment").unwrap();
        assert_eq!(address, Address::of(b"hello segment"));
        assert_eq!(&store.read_segment(&address).unwrap()[..], b"hello segment");
    }

    #[test]
    fn boundary_sizes_roundtrip() {
        let config = small_config().max_segment_size(4096);
        let store = SegmentStore::in_memory(config).unwrap();
        for size in [0usize, 1, 4096] {
            let data = vec![0xA5; size];
            let address = store.write_segment(&data).unwrap();
            assert_eq!(store.read_segment(&address).unwrap().len(), size);
        }
        assert!(matches!(
            store.write_segment(&[0; 4097]),
            Err(CoreError::SegmentTooLarge { size: 4097, max: 4096 })
        ));
    }

    #[test]
    fn duplicate_write_is_deduplicated() {
        let backend = InMemoryBackend::new();
        let store = SegmentStore::with_backend(Box::new(backend.clone()), small_config()).unwrap();
        store.write_segment(b"same").unwrap();
        let size = backend.data().len();
        store.write_segment(b"same").unwrap();
        assert_eq!(backend.data().len(), size);
        assert_eq!(store.stats().unwrap().segments, 1);
    }

    #[test]
    fn unknown_segment_is_not_found() {
        let store = SegmentStore::in_memory(small_config()).unwrap();
        assert!(matches!(
            store.read_segment(&Address::of(b"nothing")),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn compare_and_swap_semantics() {
        let store = SegmentStore::in_memory(small_config()).unwrap();
        let a = RecordId::new(store.write_segment(b"a").unwrap(), 0);
        let b = RecordId::new(store.write_segment(b"b").unwrap(), 0);

        assert!(store.head().is_none());
        assert!(store.compare_and_swap_root(None, a).unwrap());
        assert_eq!(store.head().unwrap().sequence, Sequence::new(1));

        // Stale expectation loses and changes nothing.
        assert!(!store.compare_and_swap_root(None, b).unwrap());
        assert_eq!(store.head().unwrap().root, a);

        assert!(store.compare_and_swap_root(Some(a), b).unwrap());
        let head = store.head().unwrap();
        assert_eq!(head.root, b);
        assert_eq!(head.sequence, Sequence::new(2));
    }

    #[test]
    fn swap_to_unwritten_segment_fails() {
        let store = SegmentStore::in_memory(small_config()).unwrap();
        let ghost = RecordId::new(Address::of(b"never written"), 0);
        assert!(matches!(
            store.compare_and_swap_root(None, ghost),
            Err(CoreError::NotFound { .. })
        ));
        assert!(store.head().is_none());
    }

    #[test]
    fn reopen_restores_index_and_head() {
        let dir = tempdir().unwrap();
        let root;
        {
            let store = SegmentStore::create(dir.path(), Config::default()).unwrap();
            root = RecordId::new(store.write_segment(b"root segment").unwrap(), 3);
            store.compare_and_swap_root(None, root).unwrap();
            store.close().unwrap();
        }

        let store = SegmentStore::open(dir.path(), Config::default()).unwrap();
        let head = store.head().unwrap();
        assert_eq!(head.root, root);
        assert_eq!(head.sequence, Sequence::new(1));
        assert_eq!(&store.read_segment(&root.segment).unwrap()[..], b"root segment");
    }

    #[test]
    fn create_refuses_existing_archive() {
        let dir = tempdir().unwrap();
        drop(SegmentStore::create(dir.path(), Config::default()).unwrap());
        assert!(matches!(
            SegmentStore::create(dir.path(), Config::default()),
            Err(CoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn open_without_create_needs_archive() {
        let dir = tempdir().unwrap();
        let config = Config::default().create_if_missing(false);
        assert!(matches!(
            SegmentStore::open(dir.path(), config),
            Err(CoreError::NotFound { .. })
        ));
    }

    #[test]
    fn second_handle_is_locked_out() {
        let dir = tempdir().unwrap();
        let _first = SegmentStore::open(dir.path(), Config::default()).unwrap();
        assert!(matches!(
            SegmentStore::open(dir.path(), Config::default()),
            Err(CoreError::StoreLocked)
        ));
    }

    #[test]
    fn torn_tail_is_truncated_on_open() {
        let backend = InMemoryBackend::new();
        let root = {
            let store =
                SegmentStore::with_backend(Box::new(backend.clone()), small_config()).unwrap();
            let root = RecordId::new(store.write_segment(b"committed").unwrap(), 0);
            store.compare_and_swap_root(None, root).unwrap();
            store.write_segment(b"in flight").unwrap();
            root
        };
        let committed_len = backend.data().len();
        backend.mutate(|data| data.truncate(committed_len - 5));

        let store = SegmentStore::with_backend(Box::new(backend.clone()), small_config()).unwrap();
        assert_eq!(store.head().unwrap().root, root);
        assert!(!store.contains(&Address::of(b"in flight")));
        assert!(backend.data().len() < committed_len - 5);
        assert!(store.verify().unwrap().is_ok());
    }

    #[test]
    fn flipped_byte_fails_open() {
        let backend = InMemoryBackend::new();
        {
            let store =
                SegmentStore::with_backend(Box::new(backend.clone()), small_config()).unwrap();
            store.write_segment(b"some segment bytes").unwrap();
        }
        backend.mutate(|data| data[FILE_HEADER_SIZE + BLOCK_HEADER_SIZE + 2] ^= 0x40);

        let result = SegmentStore::with_backend(Box::new(backend), small_config());
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn rolls_over_to_new_file() {
        let dir = tempdir().unwrap();
        let config = small_config().max_archive_file_size(256);
        let addresses: Vec<Address> = {
            let store = SegmentStore::open(dir.path(), config.clone()).unwrap();
            let addresses = (0u8..6)
                .map(|i| store.write_segment(&[i; 100]).unwrap())
                .collect();
            assert!(store.stats().unwrap().files > 1);
            addresses
        };
        assert!(dir.path().join("data00001.arb").exists());

        let store = SegmentStore::open(dir.path(), config).unwrap();
        for (i, address) in (0u8..).zip(&addresses) {
            assert_eq!(&store.read_segment(address).unwrap()[..], &[i; 100][..]);
        }
        assert!(store.verify().unwrap().is_ok());
    }

    #[test]
    fn closed_store_rejects_operations() {
        let store = SegmentStore::in_memory(small_config()).unwrap();
        let address = store.write_segment(b"x").unwrap();
        store.close().unwrap();
        store.close().unwrap();

        assert!(matches!(store.read_segment(&address), Err(CoreError::StoreClosed)));
        assert!(matches!(store.write_segment(b"y"), Err(CoreError::StoreClosed)));
        assert!(matches!(store.stats(), Err(CoreError::StoreClosed)));
    }

    #[test]
    fn close_releases_lock() {
        let dir = tempdir().unwrap();
        let store = SegmentStore::open(dir.path(), Config::default()).unwrap();
        store.close().unwrap();
        assert!(SegmentStore::open(dir.path(), Config::default()).is_ok());
    }

    #[test]
    fn stats_count_bytes() {
        let store = SegmentStore::in_memory(small_config()).unwrap();
        store.write_segment(&[1; 10]).unwrap();
        store.write_segment(&[2; 20]).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.files, 1);
        assert_eq!(stats.segments, 2);
        assert_eq!(stats.segment_bytes, 30);
        assert!(stats.archive_bytes > 30);
    }
}
