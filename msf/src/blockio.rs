//! Positioned reads and writes of whole and partial blocks against the
//! underlying byte stream.
//!
//! This is the lowest layer of the engine: it knows nothing about the
//! superblock, the block map, or the directory. It just turns block
//! indices into byte offsets.

use crate::error::{MsfError, Result};
use sync_file::{ReadAt, WriteAt};

/// Reads `len` bytes starting at `intra_block_offset` within block
/// `block_index`.
pub(crate) fn read_at<F: ReadAt>(
    file: &F,
    block_size: u32,
    block_index: u32,
    intra_block_offset: u32,
    len: u32,
) -> Result<Vec<u8>> {
    let file_offset = (block_index as u64) * (block_size as u64) + intra_block_offset as u64;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len as usize)
        .map_err(|_| MsfError::OutOfMemory)?;
    buf.resize(len as usize, 0);
    file.read_exact_at(&mut buf, file_offset).map_err(|e| {
        MsfError::Malformed(format!(
            "short read at block {block_index} offset {intra_block_offset}: {e}"
        ))
    })?;
    Ok(buf)
}

/// Writes exactly one full block's worth of bytes at `block_index`.
///
/// `bytes.len()` must equal `block_size`; this is an invariant maintained by
/// every caller in this crate (the writer always hands over a full,
/// zero-padded block buffer), not a condition callers can violate through
/// public API.
pub(crate) fn write_block<F: WriteAt>(
    file: &F,
    block_size: u32,
    block_index: u32,
    bytes: &[u8],
) -> Result<()> {
    debug_assert_eq!(bytes.len(), block_size as usize);
    let file_offset = (block_index as u64) * (block_size as u64);
    file.write_all_at(bytes, file_offset)?;
    Ok(())
}
