#![cfg_attr(not(test), no_std)]

//! A RAM disk over a fixed byte region, shared by a USB mass-storage responder and a
//! block-device interface, with FAT16 bootstrap and file extent mapping.

extern crate alloc;

mod binding;
mod blockdev;
mod error;
pub mod fat;
mod ident;
mod mmap;
mod msc;
mod region;
mod setup;
mod storage;

#[cfg(test)]
mod tests_util;

pub use binding::{SnapshotBinding, VolumeBinding};
pub use blockdev::{BlockDev, BlockDevice, IoctlOp, IoctlReply};
pub use error::{ErrorKind, FsError};
pub use ident::{IdentRecord, UniqueId, IDENT_LEN};
pub use mmap::Extent;
pub use msc::{Capacity, InquiryRequest, LogicalUnit, MscResponder, MscStorage};
pub use region::{BlockRange, Region};
pub use storage::{Geometry, LbaId, Storage};

pub const BLOCK_SIZE: usize = 512;

pub const BLOCK_COUNT: usize = 16384;

/// Logical units answered by the mass-storage responder.
pub const LUN_COUNT: usize = 1;

/// Fill byte written over the whole region before formatting.
pub const WIPE_BYTE: u8 = 0x21;

/// Value of every byte of a block after `BLOCK_ERASE`.
pub const ERASED_BYTE: u8 = 0xFF;

pub const VOLUME_LABEL: &str = "PSRAMDISK";

pub const IDENT_FILE_PREFIX: &str = "disk-";

pub const SERIAL_FILE_NAME: &str = "serial.txt";

/// Capacity of the run table used when mapping a file.
pub const LINK_MAP_RUNS: usize = 31;

/// Owner of the storage region and the logical-unit table.
///
/// The front ends borrow the disk mutably, so at most one of them touches the region at a
/// time.
pub struct PsramDisk {
    region: Region,
    units: [LogicalUnit; LUN_COUNT],
    unique_id: UniqueId,
}

impl PsramDisk {
    /// A disk of the default geometry. The region is zeroed and unformatted.
    pub fn new(unique_id: UniqueId) -> Self {
        Self::with_geometry(Geometry::default(), unique_id)
    }

    pub fn with_geometry(geometry: Geometry, unique_id: UniqueId) -> Self {
        PsramDisk {
            region: Region::new(geometry),
            units: [LogicalUnit::default(); LUN_COUNT],
            unique_id,
        }
    }

    /// A default disk, freshly wiped and formatted.
    pub fn init(unique_id: UniqueId) -> Result<Self, ErrorKind> {
        let mut disk = Self::new(unique_id);
        disk.wipe_and_setup()?;
        Ok(disk)
    }

    pub fn geometry(&self) -> Geometry {
        self.region.geometry()
    }

    pub fn unique_id(&self) -> &UniqueId {
        &self.unique_id
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// The mass-storage front end.
    pub fn msc(&mut self) -> MscResponder<'_> {
        MscResponder::new(&mut self.region, &mut self.units)
    }

    /// The scripting runtime's block-device front end.
    pub fn block_device(&mut self) -> BlockDevice<'_> {
        BlockDevice::new(&mut self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::*;

    #[test]
    fn test_new_disk_is_not_ready() {
        init();
        let mut disk = PsramDisk::with_geometry(small_geometry(), UniqueId([1; 12]));
        let mut msc = disk.msc();
        assert!(!msc.is_ready(0));
        msc.init(0).unwrap();
        assert!(msc.is_ready(0));
        assert_eq!(disk.geometry(), small_geometry());
    }

    #[test]
    fn test_front_ends_share_the_region() {
        init();
        let mut disk = PsramDisk::with_geometry(small_geometry(), UniqueId([1; 12]));
        let data = rust_counter_strings::generate(BLOCK_SIZE);
        disk.block_device().write_blocks(5, data.as_bytes()).unwrap();

        let mut msc = disk.msc();
        msc.init(0).unwrap();
        let mut back = [0u8; BLOCK_SIZE];
        msc.read(0, 5, 1, &mut back).unwrap();
        assert_eq!(&back[..], data.as_bytes());
    }

    #[test]
    fn test_unit_flags_outlive_the_responder() {
        init();
        let mut disk = PsramDisk::with_geometry(small_geometry(), UniqueId([1; 12]));
        disk.msc().init(0).unwrap();
        disk.msc().set_write_protected(0, true).unwrap();
        let mut msc = disk.msc();
        assert!(msc.is_ready(0));
        assert_eq!(
            msc.write(0, 0, 1, &[0u8; BLOCK_SIZE]),
            Err(ErrorKind::WriteProtected)
        );
    }
}
