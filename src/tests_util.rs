use crate::error::FsError;
use crate::storage::{Geometry, LbaId, Storage};
use crate::BLOCK_SIZE;

/// Blocks in the small regions most tests use.
pub(crate) const SMALL_BLOCKS: usize = 64;

/// Sectors in a store large enough to hold a FAT16 volume.
pub(crate) const FAT_BLOCKS: usize = 8192;

pub(crate) fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn small_geometry() -> Geometry {
    Geometry {
        lba_size: BLOCK_SIZE,
        num_blocks: SMALL_BLOCKS,
    }
}

/// Zero-filled in-memory sector store.
pub(crate) struct RamStorage(Vec<u8>);

impl RamStorage {
    pub(crate) fn new(num_blocks: usize) -> Self {
        RamStorage(vec![0u8; num_blocks * BLOCK_SIZE])
    }

    fn range(&self, lba: LbaId, len: usize) -> Result<core::ops::Range<usize>, FsError> {
        let start = lba.0 * BLOCK_SIZE;
        if len % BLOCK_SIZE != 0 || start + len > self.0.len() {
            return Err(FsError::Io);
        }
        Ok(start..start + len)
    }
}

impl Storage for RamStorage {
    fn read(&self, lba: LbaId, data: &mut [u8]) -> Result<(), FsError> {
        let range = self.range(lba, data.len())?;
        data.clone_from_slice(&self.0[range]);
        Ok(())
    }

    fn write(&mut self, lba: LbaId, data: &[u8]) -> Result<(), FsError> {
        let range = self.range(lba, data.len())?;
        self.0[range].copy_from_slice(data);
        Ok(())
    }

    fn geometry(&self) -> Geometry {
        Geometry {
            lba_size: BLOCK_SIZE,
            num_blocks: self.0.len() / BLOCK_SIZE,
        }
    }
}
