//! Per-file state tracked by the engine.

use crate::config::{ASCII_FILL, DATA_FILL, RECORD_LEN};
use crate::storage::StorageDriver;

/// Kind of the HDU (Header-Data Unit) currently mapped by a file.
///
/// The engine does not parse headers; the HDU layer above pushes this
/// metadata down via [`IoEngine::set_hdu`](crate::engine::IoEngine::set_hdu).
/// The kind decides the fill byte for records created past EOF, and the
/// table kinds carry the row geometry used by the table byte accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HduKind {
    /// Image extension (or primary array).
    Image,
    /// ASCII table extension. Fill is the blank character, not zero.
    AsciiTable,
    /// Binary table extension.
    BinaryTable,
}

/// HDU metadata consumed by the engine.
#[derive(Debug, Clone, Copy)]
pub struct HduInfo {
    /// Kind of the current HDU.
    pub kind: HduKind,
    /// Byte offset of the start of the HDU's data area.
    pub datastart: u64,
    /// Length of one table row in bytes (tables only).
    pub rowlength: u64,
    /// Number of rows in the table (tables only; grows on table writes).
    pub numrows: u64,
    /// Bytes per pixel of the image data (images only).
    pub bytes_per_pixel: u64,
}

impl Default for HduInfo {
    fn default() -> Self {
        Self {
            kind: HduKind::Image,
            datastart: 0,
            rowlength: 0,
            numrows: 0,
            bytes_per_pixel: 1,
        }
    }
}

/// State the engine keeps for one open file.
///
/// `io_pos` mirrors the storage driver's stream position so redundant
/// seeks can be elided. `logfilesize` tracks the highest record boundary
/// any buffer has been associated with; it runs ahead of `filesize` while
/// dirty buffers sit past EOF awaiting flush.
pub(crate) struct FitsFile {
    pub(crate) driver: Box<dyn StorageDriver>,
    pub(crate) bytepos: u64,
    pub(crate) io_pos: u64,
    pub(crate) filesize: u64,
    pub(crate) logfilesize: u64,
    pub(crate) curbuf: Option<usize>,
    pub(crate) hdu: HduInfo,
}

impl FitsFile {
    pub(crate) fn new(driver: Box<dyn StorageDriver>, filesize: u64) -> Self {
        Self {
            driver,
            bytepos: 0,
            io_pos: 0,
            filesize,
            logfilesize: filesize.div_ceil(RECORD_LEN as u64) * RECORD_LEN as u64,
            curbuf: None,
            hdu: HduInfo::default(),
        }
    }

    /// Fill byte for records synthesized past EOF in this file's HDU.
    pub(crate) fn fill_byte(&self) -> u8 {
        match self.hdu.kind {
            HduKind::AsciiTable => ASCII_FILL,
            _ => DATA_FILL,
        }
    }
}
