//! # Record Buffer Engine
//!
//! This module implements the buffered record I/O engine that mediates all
//! byte traffic between FITS file handles and their storage drivers. Every
//! read and write funnels through a small, fixed pool of 2880-byte record
//! buffers shared across all open files.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Typed codecs / table rows (codec, table)    │
//! ├─────────────────────────────────────────────┤
//! │  Byte transfer engine (transfer)             │
//! │    cached small path · direct bulk path ·    │
//! │    grouped strided path                      │
//! ├─────────────────────────────────────────────┤
//! │  Record pool (pool)                          │
//! │    LRU age index · victim choice · loader ·  │
//! │    write-back flush · sparse extension       │
//! ├─────────────────────────────────────────────┤
//! │  StorageDriver (seek/read/write/flush)       │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Ownership Model
//!
//! All mutable state lives in one owning [`IoEngine`] value: the slot
//! pool, the LRU age index, and the table of open files. There are no
//! process-wide statics; constructing two engines gives two fully
//! independent caches, which keeps tests deterministic. Callers that want
//! one engine shared across a process wrap it in [`SharedEngine`], which
//! serializes every operation behind a single mutex.
//!
//! ## Pinning
//!
//! Each open file designates one slot as its *current buffer*. That slot
//! is pinned: the replacement policy will not hand it to another record
//! while it remains current, because the transfer paths hold byte offsets
//! into it across calls. When every slot in the pool is pinned, loading a
//! new record degrades to recycling the caller's own current buffer, and
//! once a file has no current buffer at all the load fails with
//! [`Error::TooManyFiles`](crate::Error::TooManyFiles).
//!
//! ## Memory
//!
//! The payload footprint is exactly `NBUF * RECORD_LEN` bytes, allocated
//! at construction. The cached transfer paths allocate nothing.

mod codec;
mod file;
mod pool;
mod table;
mod transfer;

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::config::{NBUF, RECORD_LEN};
use crate::error::Result;
use crate::storage::StorageDriver;

pub use file::{HduInfo, HduKind};
use file::FitsFile;
use pool::Slot;

/// Handle to a file opened on an [`IoEngine`].
///
/// Ids are engine-local; using an id after [`IoEngine::close`] or on a
/// different engine is a caller bug and panics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub(crate) usize);

/// What to do when a record at or past the logical end of file is
/// requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EofMode {
    /// Fail with [`Error::EndOfFile`](crate::Error::EndOfFile).
    Report,
    /// Succeed; the record is synthesized from the HDU's fill byte and
    /// marked dirty, as if the file were already zero-extended.
    Ignore,
}

/// The record buffer engine. See the module docs for the architecture.
pub struct IoEngine {
    pub(crate) slots: Vec<Slot>,
    /// Permutation of slot indices ordered by age: `age[0]` is the oldest
    /// slot (preferred eviction victim), `age[NBUF-1]` the youngest.
    pub(crate) age: Vec<usize>,
    pub(crate) files: Vec<Option<FitsFile>>,
}

impl IoEngine {
    /// A fresh engine with all `NBUF` buffers unbound.
    pub fn new() -> Self {
        Self {
            slots: (0..NBUF).map(|_| Slot::new()).collect(),
            age: (0..NBUF).collect(),
            files: Vec::new(),
        }
    }

    /// Register an open file with the engine.
    ///
    /// `filesize` is the file's current on-disk length in bytes; the
    /// caller (the open machinery above this crate) is expected to have
    /// measured it. The logical size starts at `filesize` rounded up to a
    /// record boundary.
    pub fn open(&mut self, driver: Box<dyn StorageDriver>, filesize: u64) -> FileId {
        let file = FitsFile::new(driver, filesize);
        match self.files.iter().position(|f| f.is_none()) {
            Some(i) => {
                self.files[i] = Some(file);
                FileId(i)
            }
            None => {
                self.files.push(Some(file));
                FileId(self.files.len() - 1)
            }
        }
    }

    /// Flush the file's dirty buffers, release its slots, and forget it.
    ///
    /// On flush failure the file stays open with its dirty buffers intact
    /// so the caller can retry.
    pub fn close(&mut self, file: FileId) -> Result<()> {
        self.flush_file(file, true)?;
        self.files[file.0] = None;
        Ok(())
    }

    /// Replace the file's HDU metadata.
    ///
    /// Called by the HDU layer whenever the file is repositioned onto a
    /// different header-data unit.
    pub fn set_hdu(&mut self, file: FileId, hdu: HduInfo) {
        self.file_mut(file).hdu = hdu;
    }

    /// The file's HDU metadata as last set.
    pub fn hdu(&self, file: FileId) -> &HduInfo {
        &self.file(file).hdu
    }

    /// The file's logical read/write cursor.
    pub fn bytepos(&self, file: FileId) -> u64 {
        self.file(file).bytepos
    }

    /// The file's on-disk length in bytes.
    pub fn filesize(&self, file: FileId) -> u64 {
        self.file(file).filesize
    }

    /// Number of files currently open on this engine.
    pub fn num_open_files(&self) -> usize {
        self.files.iter().flatten().count()
    }

    /// Record number held by the file's current buffer, if it has one.
    pub fn current_record(&self, file: FileId) -> Option<u64> {
        self.current_slot(file).map(|i| self.slots[i].record)
    }

    pub(crate) fn file(&self, id: FileId) -> &FitsFile {
        self.files[id.0].as_ref().expect("operation on closed file")
    }

    pub(crate) fn file_mut(&mut self, id: FileId) -> &mut FitsFile {
        self.files[id.0].as_mut().expect("operation on closed file")
    }

    /// Index of the file's current slot, provided the slot still belongs
    /// to the file. A slot stolen by invalidation or eviction no longer
    /// counts as current even though `curbuf` still names it.
    pub(crate) fn current_slot(&self, id: FileId) -> Option<usize> {
        let f = self.files[id.0].as_ref()?;
        let idx = f.curbuf?;
        (self.slots[idx].owner == Some(id)).then_some(idx)
    }

    /// The current slot if it covers `bytepos` (a cursor sitting exactly
    /// on the slot's upper record boundary counts as covered); otherwise
    /// load the record containing `bytepos` and return its slot.
    pub(crate) fn ensure_covering(&mut self, id: FileId, eof: EofMode) -> Result<usize> {
        let bytepos = self.file(id).bytepos;
        if let Some(idx) = self.current_slot(id) {
            let lo = self.slots[idx].record * RECORD_LEN as u64;
            if bytepos >= lo && bytepos <= lo + RECORD_LEN as u64 {
                return Ok(idx);
            }
        }
        self.load_record(id, bytepos / RECORD_LEN as u64, eof)?;
        Ok(self
            .current_slot(id)
            .expect("load_record leaves a current buffer"))
    }
}

impl Default for IoEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// An [`IoEngine`] behind a single mutex, for callers that need one
/// process-wide engine. Every operation runs under the lock; clones share
/// the same engine.
#[derive(Clone, Default)]
pub struct SharedEngine {
    inner: Arc<Mutex<IoEngine>>,
}

impl SharedEngine {
    /// A fresh shared engine.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock the engine for a sequence of operations.
    pub fn lock(&self) -> MutexGuard<'_, IoEngine> {
        self.inner.lock()
    }
}
