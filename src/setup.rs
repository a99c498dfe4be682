use crate::binding::VolumeBinding;
use crate::error::{ErrorKind, FsError};
use crate::fat::{FatFs, FormatOptions, OpenMode};
use crate::ident::IdentRecord;
use crate::storage::Storage;
use crate::{PsramDisk, IDENT_FILE_PREFIX, SERIAL_FILE_NAME, VOLUME_LABEL, WIPE_BYTE};
use alloc::format;
use log::{error, info};

impl PsramDisk {
    /// Wipe the region and lay down a labelled FAT16 volume holding the ident files.
    ///
    /// The same unique id always produces the same volume, byte for byte.
    pub fn wipe_and_setup(&mut self) -> Result<IdentRecord, ErrorKind> {
        let geometry = self.region.geometry();
        info!(
            "wiping {} blocks of {} bytes",
            geometry.num_blocks, geometry.lba_size
        );
        self.region.wipe(WIPE_BYTE);

        let options = FormatOptions {
            cluster_size: geometry.lba_size,
            volume_id: self.unique_id.volume_serial(),
            ..FormatOptions::default()
        };
        let mut fs = FatFs::format(VolumeBinding::new(&mut self.region), &options).map_err(|e| {
            error!("format failed: {}", e);
            ErrorKind::Format(e)
        })?;

        let record = IdentRecord::from_unique_id(&self.unique_id);
        populate(&mut fs, &record).map_err(|e| {
            error!("writing ident files failed: {}", e);
            ErrorKind::Filesystem(e)
        })?;
        info!("volume {} ready, ident {}", VOLUME_LABEL, record);
        Ok(record)
    }
}

fn populate<S: Storage>(fs: &mut FatFs<S>, record: &IdentRecord) -> Result<(), FsError> {
    fs.set_label(VOLUME_LABEL)?;
    let disk_file = format!("{}{}.txt", IDENT_FILE_PREFIX, record);
    for name in [disk_file.as_str(), SERIAL_FILE_NAME] {
        let mut file = fs.open(name, OpenMode::CreateAlways)?;
        fs.write(&mut file, record.as_bytes())?;
        fs.close(file)?;
    }
    Ok(())
}
