//! The storage region and the address translation every data path goes through.

use crate::error::ErrorKind;
use crate::storage::Geometry;
use alloc::boxed::Box;
use alloc::vec;
use log::trace;

/// A validated byte span inside a [`Region`].
///
/// Only [`Region::translate`] hands these out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    offset: usize,
    len: usize,
}

impl BlockRange {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Fixed-size, block addressed memory region.
pub struct Region {
    geometry: Geometry,
    bytes: Box<[u8]>,
}

impl Region {
    pub fn new(geometry: Geometry) -> Self {
        Region {
            geometry,
            bytes: vec![0u8; geometry.capacity()].into_boxed_slice(),
        }
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Map `count` blocks starting at `block` onto a byte span, or reject.
    pub fn translate(&self, block: u32, count: u16) -> Result<BlockRange, ErrorKind> {
        let num_blocks = self.geometry.num_blocks;
        let block = block as usize;
        if block >= num_blocks {
            trace!("reject block {} count {}: past last block", block, count);
            return Err(ErrorKind::OutOfRange);
        }
        // block < num_blocks, so this cannot overflow.
        if block + count as usize > num_blocks {
            trace!("reject block {} count {}: runs off the end", block, count);
            return Err(ErrorKind::OutOfRange);
        }

        Ok(BlockRange {
            offset: block * self.geometry.lba_size,
            len: count as usize * self.geometry.lba_size,
        })
    }

    /// Borrow the bytes of a validated span.
    pub fn bytes(&self, range: &BlockRange) -> &[u8] {
        &self.bytes[range.offset..range.offset + range.len]
    }

    fn bytes_mut(&mut self, range: &BlockRange) -> &mut [u8] {
        &mut self.bytes[range.offset..range.offset + range.len]
    }

    /// Copy `count` blocks starting at `block` into the front of `dst`.
    pub fn read_blocks(&self, block: u32, count: u16, dst: &mut [u8]) -> Result<(), ErrorKind> {
        let range = self.translate(block, count)?;
        if dst.len() < range.len {
            return Err(ErrorKind::OutOfRange);
        }
        dst[..range.len].copy_from_slice(self.bytes(&range));
        Ok(())
    }

    /// Copy the front of `src` into `count` blocks starting at `block`.
    pub fn write_blocks(&mut self, block: u32, count: u16, src: &[u8]) -> Result<(), ErrorKind> {
        let range = self.translate(block, count)?;
        if src.len() < range.len {
            return Err(ErrorKind::OutOfRange);
        }
        self.bytes_mut(&range).copy_from_slice(&src[..range.len]);
        Ok(())
    }

    /// Set every byte of `count` blocks starting at `block` to `value`.
    pub fn fill(&mut self, block: u32, count: u16, value: u8) -> Result<(), ErrorKind> {
        let range = self.translate(block, count)?;
        self.bytes_mut(&range).fill(value);
        Ok(())
    }

    /// Overwrite the whole region with `value`.
    pub fn wipe(&mut self, value: u8) {
        self.bytes.fill(value);
    }
}
