//! The error type returned by every fallible operation in this crate.

use thiserror::Error;

/// Errors produced while reading or writing an MSF container.
///
/// These map directly onto the distinguishable failure modes a host
/// application needs: [`MsfError::WrongFormat`] is the "not an MSF file at
/// all" signal used by archive-probing code to try another format, while
/// the rest indicate that the bytes were recognized as MSF but are broken
/// in some way.
#[derive(Debug, Error)]
pub enum MsfError {
    /// The magic signature at file offset 0 did not match. The byte
    /// stream's position is unspecified after this error; callers that
    /// want to try a different format should re-seek to 0 first.
    #[error("not an MSF file (magic signature did not match)")]
    WrongFormat,

    /// The file has the MSF magic but a header field, directory entry, or
    /// block list failed validation, or a mandatory read came up short.
    #[error("malformed MSF file: {0}")]
    Malformed(String),

    /// Enumeration or indexed access ran past the last stream.
    #[error("no more streams")]
    NoMoreFiles,

    /// The writer could not lay out the requested streams: the directory
    /// grew past what a single block-map page can address.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A seek, read, or write against the underlying byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The page-sized scratch buffer used to read a block could not be
    /// allocated.
    #[error("out of memory")]
    OutOfMemory,
}

/// Convenience alias used throughout this crate.
pub type Result<T> = std::result::Result<T, MsfError>;
