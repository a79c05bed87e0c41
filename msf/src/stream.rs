//! The stream extractor and the archive-level API: [`Archive::probe`],
//! [`Archive::get_at`], and [`Archive::next_after`].

use crate::blockmap::BlockMap;
use crate::directory::DirectoryReader;
use crate::error::{MsfError, Result};
use crate::superblock::Superblock;
use sync_file::ReadAt;
use tracing::{trace, trace_span};

/// A single extracted stream: its identity, size, and payload.
///
/// Once extracted, a `StreamObject` owns its bytes independently of the
/// archive it came from; it may be moved across threads freely.
#[derive(Clone, Debug)]
pub struct StreamObject {
    index: u32,
    size: u32,
    data: Vec<u8>,
}

/// Standard Unix file mode reported for every emitted stream (`0644`).
pub const STREAM_MODE: u32 = 0o644;

impl StreamObject {
    /// The stream's identity key, rendered as a 4-digit lowercase
    /// hexadecimal name (e.g. `"002f"`), matching the 16-bit logical
    /// stream-number range used by PDB.
    pub fn name(&self) -> String {
        format!("{:04x}", self.index)
    }

    /// The 0-based stream index within the archive.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// The size attribute, in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// The stream's payload.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consumes this stream object, returning its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// The file mode reported for this stream (`0o644`).
    pub fn mode(&self) -> u32 {
        STREAM_MODE
    }

    /// uid, gid, and mtime are always zero for MSF streams.
    pub fn uid(&self) -> u32 {
        0
    }

    /// See [`StreamObject::uid`].
    pub fn gid(&self) -> u32 {
        0
    }

    /// See [`StreamObject::uid`].
    pub fn mtime(&self) -> u64 {
        0
    }
}

/// A probed, open MSF archive: the superblock and block-map page, cached for
/// the archive's lifetime. Everything else (directory bytes, stream block
/// lists) is re-resolved from `file` on every access.
pub struct Archive<F> {
    file: F,
    superblock: Superblock,
    block_map: BlockMap,
}

impl<F: ReadAt> Archive<F> {
    /// Checks whether `file` looks like an MSF archive and, if so, opens it.
    ///
    /// Reads exactly 32 bytes to check the magic; on mismatch this returns
    /// [`MsfError::WrongFormat`] without reading anything else, so that an
    /// outer dispatcher can try a different format against the same byte
    /// stream.
    pub fn probe(file: F) -> Result<Self> {
        let _span = trace_span!("Archive::probe").entered();
        let superblock = Superblock::parse(&file)?;
        trace!(
            block_size = u32::from(superblock.block_size),
            num_blocks = superblock.num_blocks,
            "MSF header recognized"
        );
        let block_map = BlockMap::load(&file, &superblock)?;
        Ok(Archive {
            file,
            superblock,
            block_map,
        })
    }

    fn directory(&self) -> DirectoryReader<'_, F> {
        DirectoryReader::new(&self.file, &self.superblock, &self.block_map)
    }

    /// The page size (block size) used by this archive.
    pub fn block_size(&self) -> u32 {
        u32::from(self.superblock.block_size)
    }

    /// The number of streams in this archive, including nil and
    /// zero-length streams.
    pub fn num_streams(&self) -> Result<u32> {
        self.directory().count()
    }

    /// Extracts stream `index`.
    ///
    /// Returns [`MsfError::NoMoreFiles`] if `index >= num_streams()`.
    pub fn get_at(&self, index: u32) -> Result<StreamObject> {
        let _span = trace_span!("Archive::get_at", index).entered();

        let dir = self.directory();
        let num_streams = dir.count()?;
        if index >= num_streams {
            return Err(MsfError::NoMoreFiles);
        }

        let size = dir.size_of(index)?;
        if size == 0 {
            trace!(index, "empty stream");
            return Ok(StreamObject {
                index,
                size: 0,
                data: Vec::new(),
            });
        }

        let blocks = dir.blocks_of(index)?;
        let block_size = self.block_size();

        let mut data = Vec::with_capacity(size as usize);
        let mut remaining = size;
        for block in blocks {
            let want = remaining.min(block_size);
            let chunk = crate::blockio::read_at(&self.file, block_size, block, 0, want)?;
            data.extend_from_slice(&chunk);
            remaining -= want;
            if remaining == 0 {
                break;
            }
        }

        trace!(index, size, "extracted stream");
        Ok(StreamObject { index, size, data })
    }

    /// Enumerates streams in order: `next_after(None)` yields stream 0;
    /// `next_after(Some(last.index()))` yields the stream after `last`.
    /// Returns [`MsfError::NoMoreFiles`] once the index runs past the end.
    pub fn next_after(&self, prev: Option<u32>) -> Result<StreamObject> {
        let next_index = match prev {
            None => 0,
            Some(last) => last + 1,
        };
        self.get_at(next_index)
    }
}
