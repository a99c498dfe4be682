//! FAT16 allocation table access.

use super::boot_sector::Layout;
use super::SECTOR_SIZE;
use crate::error::FsError;
use crate::storage::{LbaId, Storage};
use log::trace;

/// Entries at or above this value end a cluster chain.
pub(crate) const EOC_MIN: u16 = 0xFFF8;
pub(crate) const EOC: u16 = 0xFFFF;
const BAD_CLUSTER: u16 = 0xFFF7;

fn entry_position(layout: &Layout, cluster: u32) -> (u32, usize) {
    let offset = cluster as usize * 2;
    (
        layout.fat_start + (offset / SECTOR_SIZE) as u32,
        offset % SECTOR_SIZE,
    )
}

pub(crate) fn read_entry<S: Storage>(
    storage: &S,
    layout: &Layout,
    cluster: u32,
) -> Result<u16, FsError> {
    let (lba, off) = entry_position(layout, cluster);
    let mut sector = [0u8; SECTOR_SIZE];
    storage.read(LbaId(lba as usize), &mut sector)?;
    Ok(u16::from_le_bytes([sector[off], sector[off + 1]]))
}

/// Write the entry for `cluster` into every FAT copy.
pub(crate) fn write_entry<S: Storage>(
    storage: &mut S,
    layout: &Layout,
    cluster: u32,
    value: u16,
) -> Result<(), FsError> {
    let (lba, off) = entry_position(layout, cluster);
    let mut sector = [0u8; SECTOR_SIZE];
    for copy in 0..layout.num_fats {
        let lba = LbaId((lba + copy * layout.fat_sectors) as usize);
        storage.read(lba, &mut sector)?;
        sector[off..off + 2].copy_from_slice(&value.to_le_bytes());
        storage.write(lba, &sector)?;
    }
    Ok(())
}

fn is_data_cluster(layout: &Layout, cluster: u32) -> bool {
    cluster >= 2 && cluster < layout.cluster_count + 2
}

/// Cluster following `cluster`, or `None` at the end of the chain.
pub(crate) fn next_cluster<S: Storage>(
    storage: &S,
    layout: &Layout,
    cluster: u32,
) -> Result<Option<u32>, FsError> {
    if !is_data_cluster(layout, cluster) {
        return Err(FsError::Corrupt);
    }
    match read_entry(storage, layout, cluster)? {
        value if value >= EOC_MIN => Ok(None),
        BAD_CLUSTER => Err(FsError::Corrupt),
        value if is_data_cluster(layout, value as u32) => Ok(Some(value as u32)),
        _ => Err(FsError::Corrupt),
    }
}

/// Claim the first free cluster and append it after `prev`.
pub(crate) fn allocate<S: Storage>(
    storage: &mut S,
    layout: &Layout,
    prev: Option<u32>,
) -> Result<u32, FsError> {
    for cluster in 2..layout.cluster_count + 2 {
        if read_entry(storage, layout, cluster)? == 0 {
            write_entry(storage, layout, cluster, EOC)?;
            if let Some(prev) = prev {
                write_entry(storage, layout, prev, cluster as u16)?;
            }
            trace!("allocated cluster {} after {:?}", cluster, prev);
            return Ok(cluster);
        }
    }
    Err(FsError::NoSpace)
}

/// Return every cluster of the chain starting at `first` to the free pool.
pub(crate) fn free_chain<S: Storage>(
    storage: &mut S,
    layout: &Layout,
    first: u32,
) -> Result<(), FsError> {
    let mut cluster = Some(first);
    let mut steps = 0;
    while let Some(current) = cluster {
        steps += 1;
        if steps > layout.cluster_count {
            return Err(FsError::Corrupt);
        }
        cluster = next_cluster(storage, layout, current)?;
        write_entry(storage, layout, current, 0)?;
    }
    Ok(())
}
