use crate::binding::SnapshotBinding;
use crate::error::{ErrorKind, FsError};
use crate::fat::{FatFs, OpenMode, Run};
use crate::{PsramDisk, LINK_MAP_RUNS};
use alloc::vec::Vec;
use log::{debug, error};

/// A contiguous run of a file's clusters, located in the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Extent {
    /// First sector of the run.
    pub sector: u32,
    /// Byte offset of `sector` in the region.
    pub offset: usize,
    /// Length of the run in bytes; a whole number of clusters.
    pub length: usize,
}

impl PsramDisk {
    /// Locate the on-disk extents of `name` without modifying the region.
    pub fn mmap(&self, name: &str) -> Result<Vec<Extent>, ErrorKind> {
        let mut fs = FatFs::mount(SnapshotBinding::new(&self.region)).map_err(|e| {
            error!("mount failed: {}", e);
            ErrorKind::Mount(e)
        })?;
        let file = fs.open(name, OpenMode::Read).map_err(|e| match e {
            FsError::NotFound => ErrorKind::NotFound,
            e => {
                error!("open {} failed: {}", name, e);
                ErrorKind::Filesystem(e)
            }
        })?;

        let mut table = [Run::default(); LINK_MAP_RUNS];
        let runs = fs.link_map(&file, &mut table).map_err(|e| {
            error!("link map of {} failed: {}", name, e);
            ErrorKind::Seek(e)
        })?;

        let lba_size = self.region.geometry().lba_size;
        let cluster_bytes = fs.layout().cluster_bytes();
        let mut extents = Vec::with_capacity(runs.len());
        for run in runs {
            let sector = fs.cluster_to_sector(run.start).map_err(ErrorKind::Seek)?;
            extents.push(Extent {
                sector,
                offset: sector as usize * lba_size,
                length: run.len as usize * cluster_bytes,
            });
        }
        debug!("{} maps to {:?}", name, extents);

        fs.close(file).map_err(ErrorKind::Filesystem)?;
        Ok(extents)
    }

    /// The region bytes an extent covers, validated like any other block request.
    pub fn extent_bytes(&self, extent: &Extent) -> Result<&[u8], ErrorKind> {
        let lba_size = self.region.geometry().lba_size;
        if extent.offset != extent.sector as usize * lba_size || extent.length % lba_size != 0 {
            return Err(ErrorKind::Misaligned);
        }
        let count = u16::try_from(extent.length / lba_size).map_err(|_| ErrorKind::OutOfRange)?;
        let range = self.region.translate(extent.sector, count)?;
        Ok(self.region.bytes(&range))
    }
}
