//! Reads and writes Multi-Stream Files (MSF). MSF is the underlying container format used by
//! Program Database (PDB) files.
//!
//! MSF files contain a set of numbered _streams_. Each stream is like a file; a stream is a
//! sequence of bytes.
//!
//! The bytes stored within a single stream are usually not stored sequentially on disk. A
//! superblock at the start of the file names a block-map page, which in turn lists the blocks
//! that make up the directory stream. The directory stream then lists, for every stream, its
//! size and the physical blocks that hold its payload. Reading any stream therefore passes
//! through this two-level indirection once: block-map, then directory, then data.
//!
//! This crate implements the read side of that format ([`Archive`]) and a one-shot writer
//! ([`write_msf`]) that lays out a fresh file from a list of stream payloads. It does not provide
//! in-place modification of an existing MSF file, and it does not provide any means for building
//! or parsing the data structures stored inside PDB streams; it only handles the container.
//!
//! # References
//! * <https://llvm.org/docs/PDB/index.html>
//! * <https://llvm.org/docs/PDB/MsfFile.html>
//! * <https://github.com/microsoft/microsoft-pdb>

#![forbid(unused_must_use)]
#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod blockio;
mod blockmap;
mod directory;
mod error;
mod superblock;
mod stream;
mod writer;

pub use error::{MsfError, Result};
pub use stream::{Archive, StreamObject, STREAM_MODE};
pub use superblock::{MIN_BLOCK_SIZE, MAX_BLOCK_SIZE, MSF_MAGIC, NIL_STREAM_SIZE};
pub use writer::{write_msf, WRITE_BLOCK_SIZE};

pub use sync_file::{RandomAccessFile, ReadAt, WriteAt};

/// A block size, always a power of two. Valid archives carry one in
/// `[MIN_BLOCK_SIZE, MAX_BLOCK_SIZE]`.
pub type PageSize = pow2::Pow2;

#[cfg(test)]
#[static_init::dynamic]
static INIT_LOGGER: () = {
    tracing_subscriber::fmt()
        .with_ansi(false)
        .with_test_writer()
        .with_file(true)
        .with_line_number(true)
        .with_max_level(tracing::Level::DEBUG)
        .compact()
        .without_time()
        .init();
};
