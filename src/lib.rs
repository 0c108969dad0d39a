//! # fitsbuf - Buffered Record I/O for FITS Files
//!
//! fitsbuf mediates all byte traffic between FITS file handles and their
//! storage through a small, fixed pool of 2880-byte record buffers. It is
//! the layer a FITS library builds its header, image, and table access on
//! top of:
//!
//! - **Small-access locality**: reads and writes of a few bytes land in
//!   cached record buffers with LRU replacement, keyed by
//!   `(file, record)`.
//! - **Bulk bypass**: transfers of [`config::MIN_DIRECT`] bytes or more
//!   go straight to storage, after flushing and (for writes)
//!   invalidating any overlapping cached records.
//! - **Write-back with sparse extension**: dirty buffers reach disk on
//!   flush or eviction; a buffer parked past EOF triggers an in-order
//!   append pass that zero-fills the gap.
//! - **Machine-independent codecs**: typed array readers and writers
//!   convert between FITS big-endian and host order, contiguous or
//!   strided.
//!
//! ## Quick Start
//!
//! ```no_run
//! use fitsbuf::{EofMode, IoEngine};
//! use fitsbuf::storage::FileStorage;
//!
//! # fn main() -> fitsbuf::Result<()> {
//! let mut engine = IoEngine::new();
//! let storage = FileStorage::create("scratch.fits")?;
//! let file = engine.open(Box::new(storage), 0);
//!
//! engine.seek_to(file, 0, EofMode::Ignore)?;
//! engine.put_bytes(file, b"SIMPLE  =                    T")?;
//! engine.flush_file(file, false)?;
//! engine.close(file)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   Typed codecs / table row access    │
//! ├─────────────────────────────────────┤
//! │   Byte transfer engine               │
//! │   (cached · direct · grouped)        │
//! ├─────────────────────────────────────┤
//! │   Record pool: LRU + write-back      │
//! ├─────────────────────────────────────┤
//! │   StorageDriver (file / memory)      │
//! └─────────────────────────────────────┘
//! ```
//!
//! Everything above the storage driver is deterministic and allocation-
//! free in steady state; two [`IoEngine`] values are fully independent.
//! See the [`engine`] module docs for the ownership and pinning model.
#![warn(missing_docs)]

pub mod config;
pub mod endian;
pub mod engine;
pub mod error;
pub mod storage;

pub use engine::{EofMode, FileId, HduInfo, HduKind, IoEngine, SharedEngine};
pub use error::{Error, Result};
