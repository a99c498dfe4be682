//! FAT16 boot sector and the volume layout derived from it.

use crate::error::FsError;
use log::{debug, error};
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

use super::SECTOR_SIZE;

/// Smallest and largest cluster counts of a FAT16 volume.
pub(crate) const MIN_FAT16_CLUSTERS: u32 = 4085;
pub(crate) const MAX_FAT16_CLUSTERS: u32 = 65524;

pub(crate) const MEDIA_FIXED: u8 = 0xF8;

const SIGNATURE: [u8; 2] = [0x55, 0xAA];
const EXT_BOOT_SIGNATURE: u8 = 0x29;
const FS_TYPE_FAT16: [u8; 8] = *b"FAT16   ";
pub(crate) const NO_NAME: [u8; 11] = *b"NO NAME    ";

#[derive(AsBytes, FromBytes, Unaligned, Clone, Copy)]
#[repr(C)]
pub(crate) struct BootSector {
    jump: [u8; 3],
    oem_name: [u8; 8],
    bytes_per_sector: U16<LittleEndian>,
    sectors_per_cluster: u8,
    reserved_sectors: U16<LittleEndian>,
    num_fats: u8,
    root_entries: U16<LittleEndian>,
    total_sectors_16: U16<LittleEndian>,
    media: u8,
    fat_size_16: U16<LittleEndian>,
    sectors_per_track: U16<LittleEndian>,
    num_heads: U16<LittleEndian>,
    hidden_sectors: U32<LittleEndian>,
    total_sectors_32: U32<LittleEndian>,
    drive_number: u8,
    reserved1: u8,
    boot_signature: u8,
    volume_id: U32<LittleEndian>,
    pub(crate) volume_label: [u8; 11],
    fs_type: [u8; 8],
    boot_code: [u8; 448],
    signature: [u8; 2],
}

impl BootSector {
    /// Boot sector for a freshly planned, unpartitioned volume.
    pub(crate) fn new(layout: &Layout, volume_id: u32) -> Self {
        let (total_sectors_16, total_sectors_32) = match u16::try_from(layout.total_sectors) {
            Ok(small) => (small, 0),
            Err(_) => (0, layout.total_sectors),
        };
        BootSector {
            jump: [0xEB, 0xFE, 0x90],
            oem_name: *b"MSDOS5.0",
            bytes_per_sector: U16::new(SECTOR_SIZE as u16),
            sectors_per_cluster: layout.sectors_per_cluster as u8,
            reserved_sectors: U16::new(layout.fat_start as u16),
            num_fats: layout.num_fats as u8,
            root_entries: U16::new(layout.root_entries as u16),
            total_sectors_16: U16::new(total_sectors_16),
            media: MEDIA_FIXED,
            fat_size_16: U16::new(layout.fat_sectors as u16),
            sectors_per_track: U16::new(63),
            num_heads: U16::new(255),
            hidden_sectors: U32::new(0),
            total_sectors_32: U32::new(total_sectors_32),
            drive_number: 0x80,
            reserved1: 0,
            boot_signature: EXT_BOOT_SIGNATURE,
            volume_id: U32::new(volume_id),
            volume_label: NO_NAME,
            fs_type: FS_TYPE_FAT16,
            boot_code: [0u8; 448],
            signature: SIGNATURE,
        }
    }

    pub(crate) fn volume_id(&self) -> u32 {
        self.volume_id.get()
    }
}

impl TryFrom<&[u8]> for BootSector {
    type Error = FsError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let block: Option<LayoutVerified<_, BootSector>> = LayoutVerified::new_unaligned(bytes);
        match block {
            Some(block) if block.signature == SIGNATURE => Ok(*block),
            Some(_) => {
                debug!("boot sector signature missing");
                Err(FsError::NoFilesystem)
            }
            None => {
                error!("Failure to create boot sector from {} bytes.", bytes.len());
                Err(FsError::NoFilesystem)
            }
        }
    }
}

/// Sector addresses of the regions of a FAT16 volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    pub sectors_per_cluster: u32,
    /// First FAT sector; equals the reserved sector count.
    pub fat_start: u32,
    pub fat_sectors: u32,
    pub num_fats: u32,
    pub root_start: u32,
    pub root_sectors: u32,
    pub root_entries: u32,
    pub data_start: u32,
    pub total_sectors: u32,
    pub cluster_count: u32,
}

impl Layout {
    /// Plan a volume of `total_sectors` with one reserved sector.
    ///
    /// The FAT is sized for the upper bound on the cluster count, which never leaves it
    /// short of entries.
    pub(crate) fn plan(
        total_sectors: u32,
        sectors_per_cluster: u32,
        num_fats: u32,
        root_entries: u32,
    ) -> Result<Self, FsError> {
        const RESERVED_SECTORS: u32 = 1;
        let root_sectors = (root_entries * 32 + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32;
        let overhead = RESERVED_SECTORS + root_sectors;
        if total_sectors <= overhead || sectors_per_cluster == 0 || num_fats == 0 {
            return Err(FsError::InvalidGeometry);
        }

        let max_clusters = (total_sectors - overhead) / sectors_per_cluster;
        let fat_sectors = ((max_clusters + 2) * 2 + SECTOR_SIZE as u32 - 1) / SECTOR_SIZE as u32;
        Self::from_parts(
            total_sectors,
            sectors_per_cluster,
            RESERVED_SECTORS,
            num_fats,
            fat_sectors,
            root_entries,
        )
    }

    pub(crate) fn from_boot_sector(bs: &BootSector) -> Result<Self, FsError> {
        if bs.bytes_per_sector.get() as usize != SECTOR_SIZE {
            debug!("unsupported sector size {}", bs.bytes_per_sector.get());
            return Err(FsError::NoFilesystem);
        }
        let spc = bs.sectors_per_cluster as u32;
        if spc == 0 || !spc.is_power_of_two() {
            return Err(FsError::NoFilesystem);
        }
        let total_sectors = match bs.total_sectors_16.get() {
            0 => bs.total_sectors_32.get(),
            small => small as u32,
        };
        let root_entries = bs.root_entries.get() as u32;
        if bs.reserved_sectors.get() == 0
            || bs.num_fats == 0
            || bs.fat_size_16.get() == 0
            || root_entries == 0
            || (root_entries * 32) % SECTOR_SIZE as u32 != 0
        {
            return Err(FsError::NoFilesystem);
        }

        Self::from_parts(
            total_sectors,
            spc,
            bs.reserved_sectors.get() as u32,
            bs.num_fats as u32,
            bs.fat_size_16.get() as u32,
            root_entries,
        )
        .map_err(|_| FsError::NoFilesystem)
    }

    fn from_parts(
        total_sectors: u32,
        sectors_per_cluster: u32,
        reserved_sectors: u32,
        num_fats: u32,
        fat_sectors: u32,
        root_entries: u32,
    ) -> Result<Self, FsError> {
        let root_start = reserved_sectors + num_fats * fat_sectors;
        let root_sectors = root_entries * 32 / SECTOR_SIZE as u32;
        let data_start = root_start + root_sectors;
        if data_start >= total_sectors {
            return Err(FsError::InvalidGeometry);
        }
        let cluster_count = (total_sectors - data_start) / sectors_per_cluster;
        if !(MIN_FAT16_CLUSTERS..=MAX_FAT16_CLUSTERS).contains(&cluster_count)
            || (cluster_count + 2) * 2 > fat_sectors * SECTOR_SIZE as u32
        {
            debug!("{} clusters do not make a FAT16 volume", cluster_count);
            return Err(FsError::InvalidGeometry);
        }

        Ok(Layout {
            sectors_per_cluster,
            fat_start: reserved_sectors,
            fat_sectors,
            num_fats,
            root_start,
            root_sectors,
            root_entries,
            data_start,
            total_sectors,
            cluster_count,
        })
    }

    pub fn cluster_bytes(&self) -> usize {
        self.sectors_per_cluster as usize * SECTOR_SIZE
    }

    /// First sector of `cluster`; data clusters are numbered from 2.
    pub fn cluster_to_sector(&self, cluster: u32) -> Option<u32> {
        let index = cluster.checked_sub(2)?;
        if index >= self.cluster_count {
            return None;
        }
        Some(self.data_start + self.sectors_per_cluster * index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_boot_sector_size() {
        assert_eq!(core::mem::size_of::<BootSector>(), SECTOR_SIZE);
    }

    #[test]
    fn test_plan_default_region() {
        let layout = Layout::plan(16384, 1, 1, 512).unwrap();
        assert_eq!(layout.fat_start, 1);
        assert_eq!(layout.fat_sectors, 64);
        assert_eq!(layout.root_start, 65);
        assert_eq!(layout.root_sectors, 32);
        assert_eq!(layout.data_start, 97);
        assert_eq!(layout.cluster_count, 16287);
        assert_eq!(layout.cluster_to_sector(2), Some(97));
        assert_eq!(layout.cluster_to_sector(10), Some(105));
        assert_eq!(layout.cluster_to_sector(1), None);
        assert_eq!(layout.cluster_to_sector(16289), None);
    }

    #[test]
    fn test_plan_rejects_fat12_sized_volume() {
        assert_eq!(
            Layout::plan(2048, 1, 1, 512),
            Err(FsError::InvalidGeometry)
        );
    }

    #[test]
    fn test_boot_sector_round_trip() {
        let layout = Layout::plan(16384, 1, 2, 512).unwrap();
        let bs = BootSector::new(&layout, 0x1234_5678);
        let parsed = BootSector::try_from(bs.as_bytes()).unwrap();
        assert_eq!(Layout::from_boot_sector(&parsed), Ok(layout));
        assert_eq!(parsed.volume_id(), 0x1234_5678);
    }

    #[test]
    fn test_unsigned_sector_rejected() {
        let blank = [0x21u8; SECTOR_SIZE];
        assert!(matches!(
            BootSector::try_from(&blank[..]),
            Err(FsError::NoFilesystem)
        ));
    }
}
