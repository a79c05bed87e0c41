//! The directory reader: stream count, per-stream size, and per-stream
//! block lists, all resolved through the block-map on demand.

use crate::blockmap::BlockMap;
use crate::error::Result;
use crate::superblock::{Superblock, NIL_STREAM_SIZE};
use sync_file::ReadAt;

/// Number of blocks needed to hold `size` bytes of a stream, given
/// `block_size`. Correctly maps the nil-stream sentinel to zero blocks.
pub(crate) fn blocks_for_stream_size(size: u32, block_size: u32) -> u32 {
    if size == NIL_STREAM_SIZE {
        0
    } else {
        size.div_ceil(block_size)
    }
}

/// A read-only view of the directory stream, layered over the block-map.
pub(crate) struct DirectoryReader<'a, F> {
    file: &'a F,
    block_size: u32,
    block_map: &'a BlockMap,
}

impl<'a, F: ReadAt> DirectoryReader<'a, F> {
    pub(crate) fn new(file: &'a F, superblock: &Superblock, block_map: &'a BlockMap) -> Self {
        DirectoryReader {
            file,
            block_size: u32::from(superblock.block_size),
            block_map,
        }
    }

    fn read_u32_at(&self, directory_offset: u64) -> Result<u32> {
        let (block, intra) = self.block_map.resolve(directory_offset)?;
        let bytes = crate::blockio::read_at(self.file, self.block_size, block, intra, 4)?;
        Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
    }

    /// The total number of streams, including nil and zero-length streams.
    pub(crate) fn count(&self) -> Result<u32> {
        self.read_u32_at(0)
    }

    /// The size in bytes of stream `i`. A raw value of [`NIL_STREAM_SIZE`]
    /// is reported as `0`.
    pub(crate) fn size_of(&self, i: u32) -> Result<u32> {
        let raw = self.read_u32_at(4 * (i as u64 + 1))?;
        Ok(if raw == NIL_STREAM_SIZE { 0 } else { raw })
    }

    /// The raw (un-substituted) size of stream `i`, needed by the extractor
    /// to tell a genuinely nil stream apart from one whose size happens to
    /// be zero (both report `size_of() == 0`, but only the former has zero
    /// block-list entries either way, so this only matters for diagnostics).
    fn raw_size_of(&self, i: u32) -> Result<u32> {
        self.read_u32_at(4 * (i as u64 + 1))
    }

    /// The directory offset where stream `i`'s block list begins: past the
    /// stream count, all `num_streams` sizes, and the block lists of every
    /// earlier stream.
    fn blocks_offset(&self, num_streams: u32, i: u32) -> Result<u64> {
        let mut offset = 4u64 * (num_streams as u64 + 1);
        for j in 0..i {
            let size = self.size_of(j)?;
            offset += 4 * blocks_for_stream_size(size, self.block_size) as u64;
        }
        Ok(offset)
    }

    /// The physical block indices that, concatenated, store stream `i`'s
    /// payload, in order.
    pub(crate) fn blocks_of(&self, i: u32) -> Result<Vec<u32>> {
        let num_streams = self.count()?;
        let size = self.raw_size_of(i)?;
        let num_blocks = blocks_for_stream_size(size, self.block_size);
        let mut offset = self.blocks_offset(num_streams, i)?;

        let mut blocks = Vec::with_capacity(num_blocks as usize);
        for _ in 0..num_blocks {
            blocks.push(self.read_u32_at(offset)?);
            offset += 4;
        }
        Ok(blocks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockmap::BlockMap;
    use crate::superblock::Superblock;
    use crate::PageSize;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemFile(Mutex<Vec<u8>>);

    impl ReadAt for MemFile {
        fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
            let data = self.0.lock().unwrap();
            let start = offset as usize;
            let end = start + buf.len();
            if end > data.len() {
                return Err(std::io::ErrorKind::UnexpectedEof.into());
            }
            buf.copy_from_slice(&data[start..end]);
            Ok(())
        }
        fn read_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<usize> {
            let data = self.0.lock().unwrap();
            let start = offset as usize;
            if start >= data.len() {
                return Ok(0);
            }
            let end = (start + buf.len()).min(data.len());
            let n = end - start;
            buf[..n].copy_from_slice(&data[start..end]);
            Ok(n)
        }
    }

    /// Builds a tiny MSF-shaped disk image by hand: one block-map block,
    /// one directory block, a handful of data blocks. Block size 64 so
    /// everything stays small and readable.
    struct TestImage {
        file: MemFile,
        superblock: Superblock,
        block_map: BlockMap,
    }

    impl TestImage {
        fn build(block_size: u32, streams: &[&[u8]]) -> Self {
            let num_streams = streams.len() as u32;
            let mut dir_bytes: Vec<u8> = Vec::new();
            dir_bytes.extend_from_slice(&num_streams.to_le_bytes());
            for s in streams {
                dir_bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
            }
            let mut next_block = 3u32; // 0 = superblock, 1 = block-map, 2 = directory
            let mut all_blocks: Vec<(u32, Vec<u8>)> = Vec::new();
            for s in streams {
                let num_blocks = blocks_for_stream_size(s.len() as u32, block_size);
                for chunk_index in 0..num_blocks {
                    let b = next_block;
                    next_block += 1;
                    dir_bytes.extend_from_slice(&b.to_le_bytes());
                    let start = (chunk_index * block_size) as usize;
                    let end = ((start + block_size as usize)).min(s.len());
                    let mut block_data = vec![0u8; block_size as usize];
                    block_data[..end - start].copy_from_slice(&s[start..end]);
                    all_blocks.push((b, block_data));
                }
            }

            let dir_num_blocks = blocks_for_stream_size(dir_bytes.len() as u32, block_size);
            assert_eq!(dir_num_blocks, 1, "keep the test directory to one block");

            let total_blocks = next_block;
            let mut disk = vec![0u8; (total_blocks as usize) * (block_size as usize)];

            // Block-map page at block 1: single entry pointing at directory block 2.
            disk[(block_size as usize)..(block_size as usize + 4)]
                .copy_from_slice(&2u32.to_le_bytes());

            // Directory block at block 2.
            let dir_start = 2 * block_size as usize;
            disk[dir_start..dir_start + dir_bytes.len()].copy_from_slice(&dir_bytes);

            for (b, data) in &all_blocks {
                let start = (*b as usize) * block_size as usize;
                disk[start..start + block_size as usize].copy_from_slice(data);
            }

            let superblock = Superblock {
                block_size: PageSize::try_from(block_size).unwrap(),
                free_block_map_block: 1,
                num_blocks: total_blocks,
                num_directory_bytes: dir_bytes.len() as u32,
                block_map_addr: 1,
            };

            let file = MemFile(Mutex::new(disk));
            let block_map = BlockMap::load(&file, &superblock).unwrap();

            TestImage {
                file,
                superblock,
                block_map,
            }
        }

        fn reader(&self) -> DirectoryReader<'_, MemFile> {
            DirectoryReader::new(&self.file, &self.superblock, &self.block_map)
        }
    }

    #[test]
    fn three_small_streams() {
        let image = TestImage::build(64, &[b"A", b"BB", b"CCC"]);
        let dir = image.reader();
        assert_eq!(dir.count().unwrap(), 3);
        assert_eq!(dir.size_of(0).unwrap(), 1);
        assert_eq!(dir.size_of(1).unwrap(), 2);
        assert_eq!(dir.size_of(2).unwrap(), 3);
        assert_eq!(dir.blocks_of(0).unwrap().len(), 1);
        assert_eq!(dir.blocks_of(1).unwrap().len(), 1);
        assert_eq!(dir.blocks_of(2).unwrap().len(), 1);
    }

    #[test]
    fn size_sentinel_reads_as_zero_with_no_blocks() {
        let image = TestImage::build(64, &[b"A", b""]);
        // Hand-craft stream 1's directory entry as the nil sentinel.
        {
            let mut disk = image.file.0.lock().unwrap();
            let dir_start = 2 * 64;
            // offset of stream_size[1] within the directory: 4 (count) + 4 (size_0).
            let entry_off = dir_start + 4 + 4;
            disk[entry_off..entry_off + 4].copy_from_slice(&NIL_STREAM_SIZE.to_le_bytes());
        }
        let dir = image.reader();
        assert_eq!(dir.size_of(1).unwrap(), 0);
        assert!(dir.blocks_of(1).unwrap().is_empty());
    }
}
