//! Adapters that let the FAT layer use the region as its sector store.

use crate::blockdev::BlockDevice;
use crate::error::FsError;
use crate::region::Region;
use crate::storage::{Geometry, LbaId, Storage};
use log::{debug, warn};

/// Block and block count covered by a sector-multiple buffer at `lba`.
fn span(geometry: Geometry, lba: LbaId, len: usize) -> Result<(u32, u32), FsError> {
    if len % geometry.lba_size != 0 {
        debug!("partial sector transfer of {} bytes", len);
        return Err(FsError::Io);
    }
    let block = u32::try_from(lba.0).map_err(|_| FsError::Io)?;
    let count = u32::try_from(len / geometry.lba_size).map_err(|_| FsError::Io)?;
    Ok((block, count))
}

/// Read-write store used while formatting; goes through the raw bypass pair.
pub struct VolumeBinding<'a> {
    device: BlockDevice<'a>,
}

impl<'a> VolumeBinding<'a> {
    pub fn new(region: &'a mut Region) -> Self {
        VolumeBinding {
            device: BlockDevice::new(region),
        }
    }
}

impl<'a> Storage for VolumeBinding<'a> {
    fn read(&self, lba: LbaId, data: &mut [u8]) -> Result<(), FsError> {
        let (block, count) = span(self.geometry(), lba, data.len())?;
        match self.device.raw_read(data, block, count) {
            0 => Ok(()),
            status => {
                debug!("read of {} blocks at {} failed: {}", count, block, status);
                Err(FsError::Io)
            }
        }
    }

    fn write(&mut self, lba: LbaId, data: &[u8]) -> Result<(), FsError> {
        let (block, count) = span(self.geometry(), lba, data.len())?;
        match self.device.raw_write(data, block, count) {
            0 => Ok(()),
            status => {
                debug!("write of {} blocks at {} failed: {}", count, block, status);
                Err(FsError::Io)
            }
        }
    }

    fn geometry(&self) -> Geometry {
        self.device.geometry()
    }
}

/// Read-only view of the region for mounting without the right to modify it.
pub struct SnapshotBinding<'a> {
    region: &'a Region,
}

impl<'a> SnapshotBinding<'a> {
    pub fn new(region: &'a Region) -> Self {
        SnapshotBinding { region }
    }
}

impl<'a> Storage for SnapshotBinding<'a> {
    fn read(&self, lba: LbaId, data: &mut [u8]) -> Result<(), FsError> {
        let (block, count) = span(self.geometry(), lba, data.len())?;
        let count = u16::try_from(count).map_err(|_| FsError::Io)?;
        self.region
            .read_blocks(block, count, data)
            .map_err(|_| FsError::Io)
    }

    fn write(&mut self, lba: LbaId, _data: &[u8]) -> Result<(), FsError> {
        warn!("write to sector {} through a read-only binding", lba.0);
        Err(FsError::Denied)
    }

    fn geometry(&self) -> Geometry {
        self.region.geometry()
    }
}
