//! The block-map page: the single level of indirection between the
//! directory stream (a logical byte sequence) and the physical blocks that
//! store it.

use crate::error::{MsfError, Result};
use crate::superblock::Superblock;
use sync_file::ReadAt;
use zerocopy::{FromBytes, LE, U32};

/// The block-map page, cached in memory for the archive's lifetime.
///
/// The block-map page always fits in one block, since
/// `num_directory_bytes / block_size * 4 <= block_size`, so holding it in
/// memory is cheap and avoids re-reading it on every directory access.
pub(crate) struct BlockMap {
    /// Packed little-endian `u32` block indices, one per directory block.
    entries: Vec<u8>,
    block_size: u32,
}

impl BlockMap {
    /// Reads the block-map page named by `superblock.block_map_addr`.
    pub(crate) fn load<F: ReadAt>(file: &F, superblock: &Superblock) -> Result<Self> {
        let block_size = u32::from(superblock.block_size);
        let entries = crate::blockio::read_at(
            file,
            block_size,
            superblock.block_map_addr,
            0,
            block_size,
        )?;
        Ok(BlockMap {
            entries,
            block_size,
        })
    }

    /// Resolves a byte offset `d` within the directory stream to the
    /// physical block that contains it, and the intra-block offset within
    /// that block.
    pub(crate) fn resolve(&self, d: u64) -> Result<(u32, u32)> {
        let slot = d / self.block_size as u64;
        let intra = (d % self.block_size as u64) as u32;

        let slot_offset = (slot as usize) * 4;
        let slot_bytes = self.entries.get(slot_offset..slot_offset + 4).ok_or_else(|| {
            MsfError::Malformed(format!(
                "directory offset {d} resolves to block-map slot {slot}, which is out of range"
            ))
        })?;

        let (value, _) =
            U32::<LE>::ref_from_prefix(slot_bytes).expect("4-byte slice always parses as U32");

        Ok((value.get(), intra))
    }
}
