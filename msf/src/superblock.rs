//! The MSF File Header (the "superblock"), at file offset 0, and its codec.

use crate::error::{MsfError, Result};
use crate::PageSize;
use std::mem::size_of;
use sync_file::{ReadAt, WriteAt};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned, LE, U32};

/// `"Microsoft C/C++ MSF 7.00\r\n\x1aDS\0\0\0"`, exactly 32 bytes.
pub const MSF_MAGIC: [u8; 32] = *b"Microsoft C/C++ MSF 7.00\r\n\x1a\x44\x53\x00\x00\x00";

/// The minimum permitted block size.
pub const MIN_BLOCK_SIZE: PageSize = PageSize::from_exponent(9);

/// The maximum permitted block size.
pub const MAX_BLOCK_SIZE: PageSize = PageSize::from_exponent(12);

/// This value marks a directory entry as referring to a "nil" stream; it is
/// read back as a stream size of zero.
pub const NIL_STREAM_SIZE: u32 = 0xffff_ffff;

/// The on-disk layout of the MSF File Header.
///
/// Two `u32` fields (`free_block_map_block` and the reserved field) sit
/// between `num_directory_bytes` and `block_map_addr`; the reader must walk
/// past both without interpreting them further than spec requires.
#[derive(AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C)]
struct RawSuperblock {
    magic: [u8; 32],
    block_size: U32<LE>,
    free_block_map_block: U32<LE>,
    num_blocks: U32<LE>,
    num_directory_bytes: U32<LE>,
    reserved: U32<LE>,
    block_map_addr: U32<LE>,
}

const RAW_SUPERBLOCK_LEN: usize = size_of::<RawSuperblock>();
static_assertions::const_assert_eq!(RAW_SUPERBLOCK_LEN, 56);

/// The parsed, validated contents of the MSF File Header.
#[derive(Clone, Copy, Debug)]
pub struct Superblock {
    /// The size of each block, in bytes. Always a power of two in
    /// `[512, 4096]`.
    pub block_size: PageSize,
    /// Identifies which of the two free-block-map slots holds the active
    /// generation's bitmap. Conventionally `1` or `2`; read as-is and not
    /// validated, since only `block_size` is fatal on read.
    pub free_block_map_block: u32,
    /// Total number of blocks in the file.
    pub num_blocks: u32,
    /// Byte length of the directory stream.
    pub num_directory_bytes: u32,
    /// Block index of the block-map page.
    pub block_map_addr: u32,
}

impl Superblock {
    /// Reads and validates the superblock from the start of `file`.
    ///
    /// Distinguishes [`MsfError::WrongFormat`] (magic mismatch, the
    /// archive-probe path) from [`MsfError::Malformed`] (anything else).
    /// Reads exactly 32 bytes before comparing the magic, and never reads
    /// past those 32 bytes if the magic does not match.
    pub fn parse<F: ReadAt>(file: &F) -> Result<Self> {
        let mut magic = [0u8; 32];
        file.read_exact_at(&mut magic, 0)
            .map_err(|_| MsfError::WrongFormat)?;
        if magic != MSF_MAGIC {
            return Err(MsfError::WrongFormat);
        }

        let mut raw_bytes = [0u8; RAW_SUPERBLOCK_LEN];
        raw_bytes[..32].copy_from_slice(&magic);
        file.read_exact_at(&mut raw_bytes[32..], 32).map_err(|e| {
            MsfError::Malformed(format!("short read of MSF header: {e}"))
        })?;

        let raw = RawSuperblock::ref_from(&raw_bytes[..])
            .expect("buffer length matches RawSuperblock size");

        let block_size_raw = raw.block_size.get();
        let block_size = PageSize::try_from(block_size_raw).map_err(|_| {
            MsfError::Malformed(format!(
                "block_size ({block_size_raw}) is not a power of two"
            ))
        })?;
        if u32::from(block_size) < u32::from(MIN_BLOCK_SIZE)
            || u32::from(block_size) > u32::from(MAX_BLOCK_SIZE)
        {
            return Err(MsfError::Malformed(format!(
                "block_size ({block_size_raw}) is out of range [512, 4096]"
            )));
        }

        Ok(Superblock {
            block_size,
            free_block_map_block: raw.free_block_map_block.get(),
            num_blocks: raw.num_blocks.get(),
            num_directory_bytes: raw.num_directory_bytes.get(),
            block_map_addr: raw.block_map_addr.get(),
        })
    }

    /// Writes the header to `file` at offset 0, leaving `num_blocks` as
    /// whatever value is passed in. Callers that don't know the final block
    /// count yet should pass `0` and call [`Superblock::patch_num_blocks`]
    /// once it is known.
    pub fn emit<F: WriteAt>(&self, file: &F) -> Result<()> {
        let raw = RawSuperblock {
            magic: MSF_MAGIC,
            block_size: U32::new(u32::from(self.block_size)),
            free_block_map_block: U32::new(self.free_block_map_block),
            num_blocks: U32::new(self.num_blocks),
            num_directory_bytes: U32::new(self.num_directory_bytes),
            reserved: U32::new(0),
            block_map_addr: U32::new(self.block_map_addr),
        };
        file.write_all_at(raw.as_bytes(), 0)?;
        Ok(())
    }

    /// The byte offset, within the file, of the `num_blocks` field. Used by
    /// the writer to patch this field in after the final block count is
    /// known, without rewriting the whole header.
    pub const NUM_BLOCKS_FILE_OFFSET: u64 = 32 + 4 + 4;

    /// Seeks back and writes the final `num_blocks` value into the header.
    pub fn patch_num_blocks<F: WriteAt>(file: &F, num_blocks: u32) -> Result<()> {
        file.write_all_at(&num_blocks.to_le_bytes(), Self::NUM_BLOCKS_FILE_OFFSET)?;
        Ok(())
    }
}
