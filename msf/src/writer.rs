//! The writer: plans a block layout for a set of stream payloads, obeying
//! the free-block-map stride, and emits a complete MSF file in one pass.
//!
//! There is no in-place mutation here. `write_msf` always produces a fresh
//! file from a full list of payloads; it does not read anything back from
//! `file` while writing.

use crate::error::{MsfError, Result};
use crate::superblock::Superblock;
use bitvec::prelude::{BitVec, Msb0};
use sync_file::WriteAt;
use tracing::{trace, trace_span};

/// The block size this writer always uses. Readers must accept any valid
/// power-of-two block size in `[512, 4096]`, but this crate's writer
/// hardwires 1024, matching the files produced by MSVC.
pub const WRITE_BLOCK_SIZE: u32 = 1024;

/// The free-block-map slot this writer always uses for the (only)
/// generation it emits.
const WRITE_FREE_BLOCK_MAP_BLOCK: u32 = 1;

/// Blocks 0 (superblock) and 1/2 (the two free-block-map slots of the
/// first interval) are pre-consumed before any allocation happens.
const FIRST_ALLOCATABLE_BLOCK_COUNTER: u32 = 3;

/// Allocates the next block, skipping the pair of free-block-map blocks
/// that sit at the start of every `block_size`-sized interval.
fn allocate_block(num_blocks: &mut u32, block_size: u32) -> u32 {
    let mut block = *num_blocks;
    *num_blocks += 1;
    if block % block_size == 1 {
        block += 2;
        *num_blocks += 2;
    }
    block
}

/// The planned block layout for a write: which block holds the block-map
/// page, which blocks (in order) hold the directory stream, which blocks
/// (in order) hold each stream's payload, and the final block count.
struct Layout {
    block_map_addr: u32,
    directory_blocks: Vec<u32>,
    stream_blocks: Vec<Vec<u32>>,
    num_blocks: u32,
}

/// Tracks how much room is left in the directory block currently being
/// planned, allocating a new one (and recording it in the block-map) each
/// time the current one fills, mirroring the directory-overflow rule.
struct DirectoryCursor {
    directory_blocks: Vec<u32>,
    left: u32,
    block_size: u32,
}

impl DirectoryCursor {
    fn new(first_block: u32, block_size: u32) -> Self {
        DirectoryCursor {
            directory_blocks: vec![first_block],
            left: block_size,
            block_size,
        }
    }

    /// Accounts for writing one `u32` entry into the directory, allocating
    /// a new directory block first if the current one is full. Fails with
    /// [`MsfError::InvalidOperation`] if the block-map page itself has no
    /// room for another directory-block pointer.
    fn advance(&mut self, num_blocks: &mut u32) -> Result<()> {
        if self.left == 0 {
            if self.directory_blocks.len() as u32 * 4 >= self.block_size {
                return Err(MsfError::InvalidOperation(
                    "directory grew past what a single block-map page can address".to_string(),
                ));
            }
            let block = allocate_block(num_blocks, self.block_size);
            self.directory_blocks.push(block);
            self.left = self.block_size;
        }
        self.left -= 4;
        Ok(())
    }
}

fn plan(block_size: u32, stream_sizes: &[u32]) -> Result<Layout> {
    let mut num_blocks = FIRST_ALLOCATABLE_BLOCK_COUNTER;

    let block_map_addr = allocate_block(&mut num_blocks, block_size);

    let first_directory_block = allocate_block(&mut num_blocks, block_size);
    let mut cursor = DirectoryCursor::new(first_directory_block, block_size);

    // num_streams
    cursor.advance(&mut num_blocks)?;

    // stream sizes
    for _ in stream_sizes {
        cursor.advance(&mut num_blocks)?;
    }

    // per-stream block lists, interleaved with data-block allocation
    let mut stream_blocks = Vec::with_capacity(stream_sizes.len());
    for &size in stream_sizes {
        let num_stream_blocks = size.div_ceil(block_size);
        let mut blocks = Vec::with_capacity(num_stream_blocks as usize);
        for _ in 0..num_stream_blocks {
            cursor.advance(&mut num_blocks)?;
            blocks.push(allocate_block(&mut num_blocks, block_size));
        }
        stream_blocks.push(blocks);
    }

    Ok(Layout {
        block_map_addr,
        directory_blocks: cursor.directory_blocks,
        stream_blocks,
        num_blocks,
    })
}

/// Builds the directory stream's logical bytes: `num_streams`, all
/// `stream_size`s, then each stream's block list in order.
fn directory_bytes(stream_sizes: &[u32], layout: &Layout) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(
        4 + 4 * stream_sizes.len() + 4 * layout.stream_blocks.iter().map(Vec::len).sum::<usize>(),
    );
    bytes.extend_from_slice(&(stream_sizes.len() as u32).to_le_bytes());
    for &size in stream_sizes {
        bytes.extend_from_slice(&size.to_le_bytes());
    }
    for blocks in &layout.stream_blocks {
        for &block in blocks {
            bytes.extend_from_slice(&block.to_le_bytes());
        }
    }
    bytes
}

fn write_block_map<F: WriteAt>(file: &F, block_size: u32, addr: u32, blocks: &[u32]) -> Result<()> {
    // DirectoryCursor::advance already rejects any layout that would need
    // more directory-block pointers than a single block-map page can hold.
    debug_assert!(blocks.len() * 4 <= block_size as usize);
    let mut buf = vec![0u8; block_size as usize];
    for (i, &block) in blocks.iter().enumerate() {
        buf[i * 4..i * 4 + 4].copy_from_slice(&block.to_le_bytes());
    }
    crate::blockio::write_block(file, block_size, addr, &buf)
}

fn write_directory<F: WriteAt>(
    file: &F,
    block_size: u32,
    directory_blocks: &[u32],
    bytes: &[u8],
) -> Result<()> {
    for (chunk, &block) in bytes.chunks(block_size as usize).zip(directory_blocks) {
        let mut buf = vec![0u8; block_size as usize];
        buf[..chunk.len()].copy_from_slice(chunk);
        crate::blockio::write_block(file, block_size, block, &buf)?;
    }
    Ok(())
}

fn write_streams<F: WriteAt>(
    file: &F,
    block_size: u32,
    payloads: &[&[u8]],
    layout: &Layout,
) -> Result<()> {
    for (payload, blocks) in payloads.iter().zip(&layout.stream_blocks) {
        for (chunk_index, &block) in blocks.iter().enumerate() {
            let start = chunk_index * block_size as usize;
            let end = (start + block_size as usize).min(payload.len());
            let mut buf = vec![0u8; block_size as usize];
            buf[..end - start].copy_from_slice(&payload[start..end]);
            crate::blockio::write_block(file, block_size, block, &buf)?;
        }
    }
    Ok(())
}

/// Writes the free-block bitmap for every `block_size`-sized interval of
/// the file. Bit layout: `0 = used`, `1 = free`, bit 0 of each byte being
/// the byte's most-significant bit (the on-disk convention this format
/// uses, distinct from `bitvec`'s more commonly reached-for `Lsb0`). The
/// first `num_blocks - 1` bits (the superblock itself is excluded from the
/// count) are used; everything past that, including the rest of the file's
/// nominal size and the conceptually-unbounded tail beyond it, is free.
fn write_free_block_map<F: WriteAt>(file: &F, block_size: u32, num_blocks: u32) -> Result<()> {
    let num_intervals = num_blocks.div_ceil(block_size) as usize;
    let total_bits = num_intervals * block_size as usize * 8;
    let num_used_bits = (num_blocks - 1) as usize;

    let mut fpm: BitVec<u8, Msb0> = BitVec::with_capacity(total_bits);
    fpm.resize(total_bits, true);
    for i in 0..num_used_bits.min(total_bits) {
        fpm.set(i, false);
    }

    let fpm_bytes: &[u8] = fpm.as_raw_slice();
    for (k, chunk) in fpm_bytes.chunks(block_size as usize).enumerate() {
        let slot_block = (k as u32) * block_size + WRITE_FREE_BLOCK_MAP_BLOCK;
        crate::blockio::write_block(file, block_size, slot_block, chunk)?;
    }

    Ok(())
}

/// Writes a complete MSF file containing `payloads`, in order, as streams
/// `0..payloads.len()`.
///
/// This is a one-shot emission: there is no existing file to preserve or
/// merge with. On any failure, no further output is produced. The state
/// machine this function drives (header, directory paging, stream data,
/// bitmap, finalize) has no salvageable partial state once it fails.
pub fn write_msf<F: WriteAt>(file: &F, payloads: &[impl AsRef<[u8]>]) -> Result<()> {
    let _span = trace_span!("write_msf", num_streams = payloads.len()).entered();

    let payloads: Vec<&[u8]> = payloads.iter().map(|p| p.as_ref()).collect();
    for p in &payloads {
        if u32::try_from(p.len()).is_err() {
            return Err(MsfError::InvalidOperation(
                "stream payload exceeds the 32-bit MSF stream size limit".to_string(),
            ));
        }
    }

    let block_size = WRITE_BLOCK_SIZE;
    let stream_sizes: Vec<u32> = payloads.iter().map(|p| p.len() as u32).collect();

    let layout = plan(block_size, &stream_sizes)?;
    trace!(
        num_blocks = layout.num_blocks,
        block_map_addr = layout.block_map_addr,
        num_directory_blocks = layout.directory_blocks.len(),
        "layout planned"
    );

    let dir_bytes = directory_bytes(&stream_sizes, &layout);

    // Header, with num_blocks left as a placeholder; patched in at the end
    // once the final count is known.
    let superblock = Superblock {
        block_size: crate::PageSize::try_from(block_size)
            .expect("WRITE_BLOCK_SIZE is a valid power of two"),
        free_block_map_block: WRITE_FREE_BLOCK_MAP_BLOCK,
        num_blocks: 0,
        num_directory_bytes: dir_bytes.len() as u32,
        block_map_addr: layout.block_map_addr,
    };
    superblock.emit(file)?;

    write_block_map(file, block_size, layout.block_map_addr, &layout.directory_blocks)?;
    write_directory(file, block_size, &layout.directory_blocks, &dir_bytes)?;
    write_streams(file, block_size, &payloads, &layout)?;
    write_free_block_map(file, block_size, layout.num_blocks)?;

    Superblock::patch_num_blocks(file, layout.num_blocks)?;

    trace!(num_blocks = layout.num_blocks, "write_msf complete");
    Ok(())
}
