//! # fitsbuf Configuration Constants
//!
//! This module centralizes the engine's configuration constants. Constants
//! that depend on each other are co-located and the relationships are
//! enforced through compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! RECORD_LEN (2880 bytes, fixed by the FITS standard)
//!       │
//!       ├─> MIN_DIRECT (must be a multiple of RECORD_LEN, and at least
//!       │     2 * RECORD_LEN: the direct write path fills the remainder of
//!       │     the current record first, and the bulk write that follows
//!       │     must never be empty)
//!       │
//!       └─> NBUF * RECORD_LEN = resident cache footprint (~112KB)
//!
//! NBUF (40)
//!       │
//!       └─> upper bound on simultaneously active files: each open file
//!           pins at most one record buffer as its current buffer
//! ```
//!
//! ## Modifying Constants
//!
//! `RECORD_LEN` is not tunable: FITS files are defined as sequences of
//! 2880-byte logical records. `NBUF` and `MIN_DIRECT` may be tuned, subject
//! to the compile-time assertions below.

/// Size of one FITS logical record in bytes.
///
/// Every FITS file is a sequence of 2880-byte records; all buffering,
/// caching, and fill logic in this crate operates in units of this size.
pub const RECORD_LEN: usize = 2880;

/// Number of record buffers in the pool.
///
/// The pool is shared by all open files. Each open file keeps at most one
/// buffer pinned as its current buffer, so NBUF also bounds the number of
/// files that can be active at once.
pub const NBUF: usize = 40;

/// Transfer size at or above which reads and writes bypass the record
/// buffers and go directly to storage.
///
/// Three records is the historical threshold: below it, the cost of
/// flushing and invalidating overlapping buffers outweighs the saved copy.
pub const MIN_DIRECT: usize = 3 * RECORD_LEN;

/// Fill byte for records created beyond EOF in ASCII table HDUs.
pub const ASCII_FILL: u8 = 0x20;

/// Fill byte for records created beyond EOF in all other HDUs.
pub const DATA_FILL: u8 = 0x00;

const _: () = assert!(
    MIN_DIRECT % RECORD_LEN == 0,
    "MIN_DIRECT must be a whole number of records"
);

const _: () = assert!(
    MIN_DIRECT >= 2 * RECORD_LEN,
    "MIN_DIRECT below two records would make the direct-path bulk write empty"
);

const _: () = assert!(NBUF >= 2, "the pool needs at least two buffers");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_len_matches_fits_standard() {
        assert_eq!(RECORD_LEN, 2880);
    }

    #[test]
    fn min_direct_is_three_records() {
        assert_eq!(MIN_DIRECT, 8640);
        assert_eq!(MIN_DIRECT % RECORD_LEN, 0);
    }

    #[test]
    fn fill_bytes() {
        assert_eq!(ASCII_FILL, b' ');
        assert_eq!(DATA_FILL, 0);
    }
}
