//! # Storage Module
//!
//! The byte-stream seam between the record buffer engine and whatever
//! actually holds the bytes. See [`driver`] for the `StorageDriver` trait
//! and the file-backed and in-memory implementations.

mod driver;

pub use driver::{FileStorage, IoCounts, MemBacking, MemStorage, StorageDriver};
