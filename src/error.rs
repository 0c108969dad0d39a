//! Error types used throughout the crate.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors that can occur during buffered record I/O.
///
/// Callers are expected to match on these: `EndOfFile` in particular is a
/// normal outcome when probing past the last record with
/// [`EofMode::Report`](crate::engine::EofMode::Report).
#[derive(Debug, Error)]
pub enum Error {
    /// A seek was requested to a negative byte position.
    #[error("negative file position")]
    NegativeFilePos,

    /// A record at or past the logical end of file was requested while
    /// EOF reporting was in effect.
    #[error("end of file")]
    EndOfFile,

    /// Every record buffer is pinned as some file's current buffer, so no
    /// buffer can be recycled. More files are active than the pool can
    /// serve.
    #[error("too many open files: all record buffers are pinned")]
    TooManyFiles,

    /// A table access named a row outside the table.
    #[error("row number out of range")]
    BadRowNum,

    /// A table access named a character position before the start of a row.
    #[error("element number out of range")]
    BadElemNum,

    /// An error from the underlying storage driver.
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}
