use crate::error::FsError;

/// Index of a logical block (sector) on a block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LbaId(pub usize);

/// Shape of a block store: sector size in bytes and number of sectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub lba_size: usize,
    pub num_blocks: usize,
}

impl Geometry {
    /// Total capacity in bytes.
    pub const fn capacity(&self) -> usize {
        self.lba_size * self.num_blocks
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Geometry {
            lba_size: crate::BLOCK_SIZE,
            num_blocks: crate::BLOCK_COUNT,
        }
    }
}

/// Sector store the FAT layer formats and mounts.
///
/// `data` is always a whole number of sectors long.
pub trait Storage {
    fn read(&self, lba: LbaId, data: &mut [u8]) -> Result<(), FsError>;
    fn write(&mut self, lba: LbaId, data: &[u8]) -> Result<(), FsError>;
    fn geometry(&self) -> Geometry;
}
