//! # Storage Driver Abstraction Layer
//!
//! This module provides the `StorageDriver` trait, the byte-stream
//! abstraction the record buffer engine sits on top of. The engine only
//! ever issues four operations against a file: position the stream, read
//! an exact number of bytes, write an exact number of bytes, and force
//! pending writes down to storage.
//!
//! ## Design Philosophy
//!
//! The engine addresses storage as a flat byte stream with one mutable
//! position, because that is what its record arithmetic produces: seeks
//! are elided whenever the engine's mirror of the stream position
//! (`io_pos`) already matches, and sparse extension appends fill records
//! in strictly ascending order. A page-indexed or memory-mapped interface
//! cannot express "append N fill records, then this buffer" without
//! materializing the gap, so the stream shape is the right seam.
//!
//! ## Exact-Length Contract
//!
//! `read` and `write` transfer exactly `buf.len()` bytes or fail. Short
//! reads are errors, not partial results: a record either loads fully or
//! the slot is not bound. This keeps every caller free of retry loops.
//!
//! ## Backends
//!
//! | Backend       | Medium            | Intended use              |
//! |---------------|-------------------|---------------------------|
//! | `FileStorage` | `std::fs::File`   | Real FITS files on disk   |
//! | `MemStorage`  | shared `Vec<u8>`  | Tests and in-memory files |
//!
//! `MemStorage` is backed by a cloneable [`MemBacking`] handle, so a test
//! can hand the storage to the engine and still inspect the "on-disk"
//! bytes afterwards. The backing also counts seeks, reads, and writes,
//! which lets tests observe cache hits and evictions from the outside.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;

/// Byte-stream storage consumed by the record buffer engine.
///
/// Implementations carry their own stream position; `seek` moves it and
/// `read`/`write` advance it by the transfer length.
pub trait StorageDriver: Send {
    /// Set the stream position to `pos` bytes from the start.
    fn seek(&mut self, pos: u64) -> Result<()>;

    /// Read exactly `dst.len()` bytes at the current position.
    fn read(&mut self, dst: &mut [u8]) -> Result<()>;

    /// Write exactly `src.len()` bytes at the current position, extending
    /// the file if the write runs past the current end.
    fn write(&mut self, src: &[u8]) -> Result<()>;

    /// Force buffered writes down to durable storage.
    fn flush(&mut self) -> Result<()>;
}

/// Storage driver over a file on disk.
#[derive(Debug)]
pub struct FileStorage {
    file: File,
}

impl FileStorage {
    /// Create a new, empty file at `path`, truncating anything there.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Open an existing file at `path` for reading and writing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file })
    }

    /// Current length of the file in bytes.
    pub fn len(&self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Whether the file is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl StorageDriver for FileStorage {
    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<()> {
        self.file.read_exact(dst)?;
        Ok(())
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        self.file.write_all(src)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }
}

/// Counters of driver operations, readable through [`MemBacking::counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IoCounts {
    /// Number of `seek` calls.
    pub seeks: u64,
    /// Number of `read` calls.
    pub reads: u64,
    /// Number of `write` calls.
    pub writes: u64,
}

#[derive(Default)]
struct MemInner {
    data: Vec<u8>,
    counts: IoCounts,
}

/// Shared handle to the bytes behind one or more [`MemStorage`] drivers.
///
/// Clones refer to the same backing, so a test can keep one handle for
/// inspection while the engine owns the driver.
#[derive(Clone, Default)]
pub struct MemBacking {
    inner: Arc<Mutex<MemInner>>,
}

impl MemBacking {
    /// A fresh, empty backing.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backing pre-filled with `data`.
    pub fn with_data(data: Vec<u8>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemInner {
                data,
                counts: IoCounts::default(),
            })),
        }
    }

    /// Create a driver over this backing, positioned at byte 0.
    pub fn storage(&self) -> MemStorage {
        MemStorage {
            backing: self.clone(),
            pos: 0,
        }
    }

    /// Current length of the backing in bytes.
    pub fn len(&self) -> u64 {
        self.inner.lock().data.len() as u64
    }

    /// Whether the backing holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of the backing bytes.
    pub fn bytes(&self) -> Vec<u8> {
        self.inner.lock().data.clone()
    }

    /// Operation counters accumulated across all drivers on this backing.
    pub fn counts(&self) -> IoCounts {
        self.inner.lock().counts
    }
}

/// In-memory storage driver, used by tests and for scratch files.
pub struct MemStorage {
    backing: MemBacking,
    pos: u64,
}

impl StorageDriver for MemStorage {
    fn seek(&mut self, pos: u64) -> Result<()> {
        self.backing.inner.lock().counts.seeks += 1;
        self.pos = pos;
        Ok(())
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<()> {
        let mut inner = self.backing.inner.lock();
        inner.counts.reads += 1;
        let start = self.pos as usize;
        let end = start + dst.len();
        if end > inner.data.len() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past end of backing",
            )
            .into());
        }
        dst.copy_from_slice(&inner.data[start..end]);
        drop(inner);
        self.pos = end as u64;
        Ok(())
    }

    fn write(&mut self, src: &[u8]) -> Result<()> {
        let mut inner = self.backing.inner.lock();
        inner.counts.writes += 1;
        let start = self.pos as usize;
        let end = start + src.len();
        if end > inner.data.len() {
            inner.data.resize(end, 0);
        }
        inner.data[start..end].copy_from_slice(src);
        drop(inner);
        self.pos = end as u64;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn mem_storage_write_then_read_back() {
        let backing = MemBacking::new();
        let mut storage = backing.storage();

        storage.write(b"hello records").unwrap();
        storage.seek(0).unwrap();

        let mut buf = [0u8; 13];
        storage.read(&mut buf).unwrap();
        assert_eq!(&buf, b"hello records");
    }

    #[test]
    fn mem_storage_write_past_end_extends() {
        let backing = MemBacking::new();
        let mut storage = backing.storage();

        storage.seek(10).unwrap();
        storage.write(b"xy").unwrap();

        assert_eq!(backing.len(), 12);
        let bytes = backing.bytes();
        assert_eq!(&bytes[..10], &[0u8; 10]);
        assert_eq!(&bytes[10..], b"xy");
    }

    #[test]
    fn mem_storage_short_read_is_an_error() {
        let backing = MemBacking::with_data(vec![1, 2, 3]);
        let mut storage = backing.storage();

        let mut buf = [0u8; 4];
        assert!(storage.read(&mut buf).is_err());
    }

    #[test]
    fn mem_storage_counts_operations() {
        let backing = MemBacking::new();
        let mut storage = backing.storage();

        storage.write(&[0u8; 8]).unwrap();
        storage.seek(0).unwrap();
        let mut buf = [0u8; 8];
        storage.read(&mut buf).unwrap();
        storage.read(&mut []).unwrap();

        let counts = backing.counts();
        assert_eq!(
            counts,
            IoCounts {
                seeks: 1,
                reads: 2,
                writes: 1
            }
        );
    }

    #[test]
    fn mem_backing_shared_across_clones() {
        let backing = MemBacking::new();
        let mut a = backing.storage();
        let mut b = backing.storage();

        a.write(b"abc").unwrap();
        let mut buf = [0u8; 3];
        b.read(&mut buf).unwrap();
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn file_storage_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scratch.fits");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(b"SIMPLE  =").unwrap();
        storage.flush().unwrap();
        assert_eq!(storage.len().unwrap(), 9);

        let mut reopened = FileStorage::open(&path).unwrap();
        let mut buf = [0u8; 9];
        reopened.read(&mut buf).unwrap();
        assert_eq!(&buf, b"SIMPLE  =");
    }

    #[test]
    fn file_storage_seek_and_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scratch.fits");

        let mut storage = FileStorage::create(&path).unwrap();
        storage.write(b"aaaaaaaa").unwrap();
        storage.seek(2).unwrap();
        storage.write(b"XX").unwrap();

        storage.seek(0).unwrap();
        let mut buf = [0u8; 8];
        storage.read(&mut buf).unwrap();
        assert_eq!(&buf, b"aaXXaaaa");
    }
}
