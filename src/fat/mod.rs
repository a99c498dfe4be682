//! Minimal FAT16 filesystem over a [`Storage`].
//!
//! Only what the disk needs: super-floppy formatting, a fixed root directory with long
//! file names, sequential file I/O and the cluster link map of a file.

mod boot_sector;
mod dir_entry;
mod table;

pub use boot_sector::Layout;

use crate::error::FsError;
use crate::storage::{LbaId, Storage};
use alloc::string::String;
use alloc::vec::Vec;
use boot_sector::{BootSector, MEDIA_FIXED};
use core::ops::ControlFlow;
use dir_entry::{
    label_bytes, lfn_entries, numbered_short_name, plan_name, sfn_checksum, DirEntry, LfnBuilder,
    LfnEntry, NamePlan, ATTR_ARCHIVE, ATTR_DIRECTORY, ATTR_VOLUME_ID, DIR_ENTRY_SIZE,
    SLOT_DELETED, SLOT_FREE,
};
use log::{debug, info, trace};
use zerocopy::AsBytes;

pub const SECTOR_SIZE: usize = 512;

const ENTRIES_PER_SECTOR: u32 = (SECTOR_SIZE / DIR_ENTRY_SIZE) as u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatOptions {
    /// Allocation unit in bytes; a power-of-two multiple of the sector size.
    pub cluster_size: usize,
    pub num_fats: u32,
    /// Root directory capacity; a multiple of 16.
    pub root_entries: u32,
    /// Volume serial number.
    pub volume_id: u32,
}

impl Default for FormatOptions {
    fn default() -> Self {
        FormatOptions {
            cluster_size: SECTOR_SIZE,
            num_fats: 1,
            root_entries: 512,
            volume_id: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    /// Create the file, truncating it if it exists.
    CreateAlways,
}

/// `len` consecutive clusters starting at cluster `start`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Run {
    pub len: u32,
    pub start: u32,
}

/// A root directory listing entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirItem {
    pub name: String,
    pub attr: u8,
    pub size: u32,
    pub first_cluster: u32,
}

/// Index of a 32-byte slot in the root directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot(u32);

impl Slot {
    fn lba(&self, layout: &Layout) -> u32 {
        layout.root_start + self.0 / ENTRIES_PER_SECTOR
    }

    fn offset(&self) -> usize {
        (self.0 % ENTRIES_PER_SECTOR) as usize * DIR_ENTRY_SIZE
    }

    fn nth(&self, n: usize) -> Slot {
        Slot(self.0 + n as u32)
    }
}

/// An open file. Hand it back to [`FatFs::close`] to persist writes.
#[derive(Debug)]
pub struct File {
    slot: Slot,
    first_cluster: u32,
    size: u32,
    pos: u32,
    /// Cluster holding the byte before `pos`; 0 while `pos` is 0.
    cluster: u32,
    writable: bool,
    dirty: bool,
}

impl File {
    fn new(slot: Slot, entry: &DirEntry, writable: bool) -> Self {
        File {
            slot,
            first_cluster: entry.first_cluster(),
            size: entry.size(),
            pos: 0,
            cluster: 0,
            writable,
            dirty: false,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn first_cluster(&self) -> u32 {
        self.first_cluster
    }
}

pub struct FatFs<S: Storage> {
    storage: S,
    layout: Layout,
    volume_id: u32,
}

impl<S: Storage> FatFs<S> {
    /// Lay down an empty FAT16 volume over the whole store and mount it.
    pub fn format(mut storage: S, options: &FormatOptions) -> Result<Self, FsError> {
        let geometry = storage.geometry();
        if geometry.lba_size != SECTOR_SIZE
            || options.cluster_size % SECTOR_SIZE != 0
            || options.root_entries == 0
            || options.root_entries % ENTRIES_PER_SECTOR != 0
        {
            return Err(FsError::InvalidGeometry);
        }
        let sectors_per_cluster = (options.cluster_size / SECTOR_SIZE) as u32;
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            return Err(FsError::InvalidGeometry);
        }
        let total_sectors =
            u32::try_from(geometry.num_blocks).map_err(|_| FsError::InvalidGeometry)?;
        let layout = Layout::plan(
            total_sectors,
            sectors_per_cluster,
            options.num_fats,
            options.root_entries,
        )?;
        info!(
            "mkfs: FAT16, {} clusters of {} bytes, data area at sector {}",
            layout.cluster_count,
            layout.cluster_bytes(),
            layout.data_start
        );

        let zero = [0u8; SECTOR_SIZE];
        for lba in 1..layout.data_start {
            storage.write(LbaId(lba as usize), &zero)?;
        }
        let boot_sector = BootSector::new(&layout, options.volume_id);
        storage.write(LbaId(0), boot_sector.as_bytes())?;

        let mut head = [0u8; SECTOR_SIZE];
        head[..2].copy_from_slice(&(0xFF00 | MEDIA_FIXED as u16).to_le_bytes());
        head[2..4].copy_from_slice(&table::EOC.to_le_bytes());
        for copy in 0..layout.num_fats {
            let lba = layout.fat_start + copy * layout.fat_sectors;
            storage.write(LbaId(lba as usize), &head)?;
        }

        Self::mount(storage)
    }

    pub fn mount(storage: S) -> Result<Self, FsError> {
        if storage.geometry().lba_size != SECTOR_SIZE {
            return Err(FsError::NoFilesystem);
        }
        let mut sector = [0u8; SECTOR_SIZE];
        storage.read(LbaId(0), &mut sector)?;
        let boot_sector = BootSector::try_from(&sector[..])?;
        let layout = Layout::from_boot_sector(&boot_sector)?;
        if layout.total_sectors as usize > storage.geometry().num_blocks {
            debug!("volume is larger than its store");
            return Err(FsError::NoFilesystem);
        }
        trace!("mounted {:?}", layout);
        Ok(FatFs {
            storage,
            layout,
            volume_id: boot_sector.volume_id(),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn volume_id(&self) -> u32 {
        self.volume_id
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    /// First sector of a data cluster.
    pub fn cluster_to_sector(&self, cluster: u32) -> Result<u32, FsError> {
        self.layout
            .cluster_to_sector(cluster)
            .ok_or(FsError::Corrupt)
    }

    fn read_slot(&self, slot: Slot) -> Result<DirEntry, FsError> {
        let mut sector = [0u8; SECTOR_SIZE];
        self.storage
            .read(LbaId(slot.lba(&self.layout) as usize), &mut sector)?;
        DirEntry::parse(&sector[slot.offset()..slot.offset() + DIR_ENTRY_SIZE])
    }

    fn write_slot(&mut self, slot: Slot, bytes: &[u8]) -> Result<(), FsError> {
        let lba = LbaId(slot.lba(&self.layout) as usize);
        let mut sector = [0u8; SECTOR_SIZE];
        self.storage.read(lba, &mut sector)?;
        sector[slot.offset()..slot.offset() + DIR_ENTRY_SIZE].copy_from_slice(bytes);
        self.storage.write(lba, &sector)
    }

    /// Visit root directory slots in order until `visit` breaks.
    fn scan_root<T>(
        &self,
        mut visit: impl FnMut(Slot, &DirEntry) -> ControlFlow<T>,
    ) -> Result<Option<T>, FsError> {
        let mut sector = [0u8; SECTOR_SIZE];
        for n in 0..self.layout.root_sectors {
            let lba = self.layout.root_start + n;
            self.storage.read(LbaId(lba as usize), &mut sector)?;
            for (i, bytes) in sector.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
                let entry = DirEntry::parse(bytes)?;
                let slot = Slot(n * ENTRIES_PER_SECTOR + i as u32);
                if let ControlFlow::Break(found) = visit(slot, &entry) {
                    return Ok(Some(found));
                }
            }
        }
        Ok(None)
    }

    /// Walk file entries with their resolved names until `visit` breaks.
    fn scan_files<T>(
        &self,
        mut visit: impl FnMut(Slot, &DirEntry, String) -> ControlFlow<T>,
    ) -> Result<Option<T>, FsError> {
        let mut lfn = LfnBuilder::default();
        self.scan_root(|slot, entry| {
            match entry.name[0] {
                SLOT_FREE => return ControlFlow::Break(None),
                SLOT_DELETED => {
                    lfn.reset();
                    return ControlFlow::Continue(());
                }
                _ => {}
            }
            if entry.is_long_name() {
                if let Ok(part) = LfnEntry::parse(entry.as_bytes()) {
                    lfn.push(&part);
                }
                return ControlFlow::Continue(());
            }
            if entry.is_volume_label() {
                lfn.reset();
                return ControlFlow::Continue(());
            }
            let name = lfn.finish(entry).unwrap_or_else(|| entry.display_name());
            match visit(slot, entry, name) {
                ControlFlow::Break(found) => ControlFlow::Break(Some(found)),
                ControlFlow::Continue(()) => ControlFlow::Continue(()),
            }
        })
        .map(Option::flatten)
    }

    fn find(&self, name: &str) -> Result<Option<(Slot, DirEntry)>, FsError> {
        self.scan_files(|slot, entry, entry_name| {
            if entry_name.eq_ignore_ascii_case(name) {
                ControlFlow::Break((slot, *entry))
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    pub fn list_root(&self) -> Result<Vec<DirItem>, FsError> {
        let mut items = Vec::new();
        self.scan_files::<()>(|_, entry, name| {
            items.push(DirItem {
                name,
                attr: entry.attr,
                size: entry.size(),
                first_cluster: entry.first_cluster(),
            });
            ControlFlow::Continue(())
        })?;
        Ok(items)
    }

    /// First of `count` consecutive unused root slots.
    fn free_slots(&self, count: usize) -> Result<Slot, FsError> {
        let mut run_start = None;
        let mut run_len = 0;
        self.scan_root(|slot, entry| {
            if entry.name[0] == SLOT_FREE || entry.name[0] == SLOT_DELETED {
                let start = *run_start.get_or_insert(slot);
                run_len += 1;
                if run_len == count {
                    return ControlFlow::Break(start);
                }
            } else {
                run_start = None;
                run_len = 0;
            }
            ControlFlow::Continue(())
        })?
        .ok_or(FsError::DirFull)
    }

    fn unique_short_name(&self, stem: &[u8; 11]) -> Result<[u8; 11], FsError> {
        let mut taken = Vec::new();
        self.scan_root::<()>(|_, entry| {
            if entry.name[0] != SLOT_FREE && entry.name[0] != SLOT_DELETED && !entry.is_long_name()
            {
                taken.push(entry.name);
            }
            ControlFlow::Continue(())
        })?;
        (1..=self.layout.root_entries)
            .map(|n| numbered_short_name(stem, n))
            .find(|candidate| !taken.contains(candidate))
            .ok_or(FsError::DirFull)
    }

    fn create_entry(&mut self, name: &str) -> Result<(Slot, DirEntry), FsError> {
        match plan_name(name)? {
            NamePlan::Short { name, nt_res } => {
                let slot = self.free_slots(1)?;
                let entry = DirEntry::new(name, ATTR_ARCHIVE, nt_res);
                self.write_slot(slot, entry.as_bytes())?;
                Ok((slot, entry))
            }
            NamePlan::Long { units, stem } => {
                let short = self.unique_short_name(&stem)?;
                let entry = DirEntry::new(short, ATTR_ARCHIVE, 0);
                let parts = lfn_entries(&units, sfn_checksum(&short));
                let first = self.free_slots(parts.len() + 1)?;
                for (i, part) in parts.iter().enumerate() {
                    self.write_slot(first.nth(i), part.as_bytes())?;
                }
                let slot = first.nth(parts.len());
                self.write_slot(slot, entry.as_bytes())?;
                trace!("{} stored as {:?}", name, entry.display_name());
                Ok((slot, entry))
            }
        }
    }

    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<File, FsError> {
        match (mode, self.find(name)?) {
            (_, Some((_, entry))) if entry.attr & (ATTR_DIRECTORY | ATTR_VOLUME_ID) != 0 => {
                Err(FsError::Denied)
            }
            (OpenMode::Read, Some((slot, entry))) => Ok(File::new(slot, &entry, false)),
            (OpenMode::Read, None) => Err(FsError::NotFound),
            (OpenMode::CreateAlways, Some((slot, mut entry))) => {
                if entry.first_cluster() != 0 {
                    table::free_chain(&mut self.storage, &self.layout, entry.first_cluster())?;
                }
                entry.set_first_cluster(0);
                entry.set_size(0);
                self.write_slot(slot, entry.as_bytes())?;
                Ok(File::new(slot, &entry, true))
            }
            (OpenMode::CreateAlways, None) => {
                let (slot, entry) = self.create_entry(name)?;
                Ok(File::new(slot, &entry, true))
            }
        }
    }

    pub fn read(&self, file: &mut File, buf: &mut [u8]) -> Result<usize, FsError> {
        let cluster_bytes = self.layout.cluster_bytes() as u32;
        let mut sector = [0u8; SECTOR_SIZE];
        let mut done = 0;
        while done < buf.len() && file.pos < file.size {
            let in_cluster = file.pos % cluster_bytes;
            if in_cluster == 0 {
                file.cluster = if file.cluster == 0 {
                    file.first_cluster
                } else {
                    table::next_cluster(&self.storage, &self.layout, file.cluster)?
                        .ok_or(FsError::Corrupt)?
                };
            }
            let lba = self.cluster_to_sector(file.cluster)? + in_cluster / SECTOR_SIZE as u32;
            let off = in_cluster as usize % SECTOR_SIZE;
            let n = [
                SECTOR_SIZE - off,
                buf.len() - done,
                (file.size - file.pos) as usize,
            ]
            .into_iter()
            .min()
            .unwrap_or(0);

            self.storage.read(LbaId(lba as usize), &mut sector)?;
            buf[done..done + n].copy_from_slice(&sector[off..off + n]);
            done += n;
            file.pos += n as u32;
        }
        Ok(done)
    }

    pub fn write(&mut self, file: &mut File, data: &[u8]) -> Result<usize, FsError> {
        if !file.writable {
            return Err(FsError::Denied);
        }
        let cluster_bytes = self.layout.cluster_bytes() as u32;
        let mut sector = [0u8; SECTOR_SIZE];
        let mut done = 0;
        while done < data.len() {
            let in_cluster = file.pos % cluster_bytes;
            if in_cluster == 0 {
                let next = if file.cluster == 0 {
                    Some(file.first_cluster).filter(|c| *c != 0)
                } else {
                    table::next_cluster(&self.storage, &self.layout, file.cluster)?
                };
                file.cluster = match next {
                    Some(cluster) => cluster,
                    None => {
                        let prev = Some(file.cluster).filter(|c| *c != 0);
                        let cluster = table::allocate(&mut self.storage, &self.layout, prev)?;
                        if file.first_cluster == 0 {
                            file.first_cluster = cluster;
                        }
                        cluster
                    }
                };
            }
            let lba = LbaId(
                (self.cluster_to_sector(file.cluster)? + in_cluster / SECTOR_SIZE as u32) as usize,
            );
            let off = in_cluster as usize % SECTOR_SIZE;
            let n = core::cmp::min(SECTOR_SIZE - off, data.len() - done);

            if n < SECTOR_SIZE {
                self.storage.read(lba, &mut sector)?;
            }
            sector[off..off + n].copy_from_slice(&data[done..done + n]);
            self.storage.write(lba, &sector)?;

            done += n;
            file.pos += n as u32;
            file.size = core::cmp::max(file.size, file.pos);
            file.dirty = true;
        }
        Ok(done)
    }

    /// Flush size and first cluster of a written file to its directory entry.
    pub fn close(&mut self, file: File) -> Result<(), FsError> {
        if !file.dirty {
            return Ok(());
        }
        let mut entry = self.read_slot(file.slot)?;
        entry.set_first_cluster(file.first_cluster);
        entry.set_size(file.size);
        entry.attr |= ATTR_ARCHIVE;
        self.write_slot(file.slot, entry.as_bytes())
    }

    /// Run-length encode the cluster chain of `file` into `table`.
    ///
    /// Fails with `NotEnoughCore` instead of returning a partial map when the file has
    /// more fragments than `table` holds.
    pub fn link_map<'t>(&self, file: &File, table: &'t mut [Run]) -> Result<&'t [Run], FsError> {
        fn push(table: &mut [Run], used: &mut usize, run: Run) {
            if let Some(slot) = table.get_mut(*used) {
                *slot = run;
            }
            *used += 1;
        }

        let mut used = 0;
        let mut run: Option<Run> = None;
        let mut current = Some(file.first_cluster).filter(|c| *c != 0);
        let mut steps = 0;
        while let Some(cluster) = current {
            steps += 1;
            if steps > self.layout.cluster_count {
                return Err(FsError::Corrupt);
            }
            run = match run {
                Some(mut r) if r.start + r.len == cluster => {
                    r.len += 1;
                    Some(r)
                }
                Some(r) => {
                    push(table, &mut used, r);
                    Some(Run {
                        len: 1,
                        start: cluster,
                    })
                }
                None => Some(Run {
                    len: 1,
                    start: cluster,
                }),
            };
            current = table::next_cluster(&self.storage, &self.layout, cluster)?;
        }
        if let Some(r) = run {
            push(table, &mut used, r);
        }

        if used > table.len() {
            debug!("link map needs {} runs, table holds {}", used, table.len());
            return Err(FsError::NotEnoughCore { required: used });
        }
        Ok(&table[..used])
    }

    /// Volume label from the root directory, if one is set.
    pub fn label(&self) -> Result<Option<String>, FsError> {
        self.scan_root(|_, entry| {
            if entry.name[0] == SLOT_FREE {
                return ControlFlow::Break(None);
            }
            if entry.name[0] != SLOT_DELETED && entry.is_volume_label() {
                let name: String = entry.name.iter().map(|c| *c as char).collect();
                return ControlFlow::Break(Some(String::from(name.trim_end())));
            }
            ControlFlow::Continue(())
        })
        .map(Option::flatten)
    }

    pub fn set_label(&mut self, label: &str) -> Result<(), FsError> {
        let name = label_bytes(label)?;
        let existing = self.scan_root(|slot, entry| {
            if entry.name[0] == SLOT_FREE {
                return ControlFlow::Break(None);
            }
            if entry.name[0] != SLOT_DELETED && entry.is_volume_label() {
                return ControlFlow::Break(Some(slot));
            }
            ControlFlow::Continue(())
        })?;
        let slot = match existing.flatten() {
            Some(slot) => slot,
            None => self.free_slots(1)?,
        };
        let entry = DirEntry::new(name, ATTR_VOLUME_ID, 0);
        self.write_slot(slot, entry.as_bytes())?;

        // Keep the boot sector copy in step for hosts that read it from there.
        let mut sector = [0u8; SECTOR_SIZE];
        self.storage.read(LbaId(0), &mut sector)?;
        let mut boot_sector = BootSector::try_from(&sector[..])?;
        boot_sector.volume_label = name;
        self.storage.write(LbaId(0), boot_sector.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_util::*;

    fn formatted() -> FatFs<RamStorage> {
        init();
        FatFs::format(RamStorage::new(FAT_BLOCKS), &FormatOptions::default()).unwrap()
    }

    fn write_file(fs: &mut FatFs<RamStorage>, name: &str, data: &[u8]) {
        let mut file = fs.open(name, OpenMode::CreateAlways).unwrap();
        assert_eq!(fs.write(&mut file, data).unwrap(), data.len());
        fs.close(file).unwrap();
    }

    fn read_file(fs: &mut FatFs<RamStorage>, name: &str) -> Vec<u8> {
        let mut file = fs.open(name, OpenMode::Read).unwrap();
        let mut data = vec![0u8; file.size() as usize];
        assert_eq!(fs.read(&mut file, &mut data).unwrap(), data.len());
        fs.close(file).unwrap();
        data
    }

    #[test]
    fn test_format_then_mount() {
        let fs = formatted();
        let layout = *fs.layout();
        let storage = fs.into_storage();
        let fs = FatFs::mount(storage).unwrap();
        assert_eq!(*fs.layout(), layout);
        assert_eq!(fs.label().unwrap(), None);
        assert!(fs.list_root().unwrap().is_empty());
    }

    #[test]
    fn test_mount_rejects_blank_store() {
        let storage = RamStorage::new(FAT_BLOCKS);
        assert!(matches!(FatFs::mount(storage), Err(FsError::NoFilesystem)));
    }

    #[test]
    fn test_format_rejects_tiny_store() {
        let storage = RamStorage::new(1024);
        assert!(matches!(
            FatFs::format(storage, &FormatOptions::default()),
            Err(FsError::InvalidGeometry)
        ));
    }

    #[test]
    fn test_label() {
        let mut fs = formatted();
        fs.set_label("scratch").unwrap();
        assert_eq!(fs.label().unwrap().as_deref(), Some("SCRATCH"));
        fs.set_label("OTHER").unwrap();
        assert_eq!(fs.label().unwrap().as_deref(), Some("OTHER"));
        assert!(fs.list_root().unwrap().is_empty());
        assert!(fs.set_label("name:bad").is_err());
    }

    #[test]
    fn test_multi_cluster_file() {
        let mut fs = formatted();
        let txt = rust_counter_strings::generate(3 * SECTOR_SIZE + 100);
        write_file(&mut fs, "counter.txt", txt.as_bytes());
        assert_eq!(read_file(&mut fs, "COUNTER.TXT"), txt.as_bytes());

        let items = fs.list_root().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].name, "counter.txt");
        assert_eq!(items[0].size as usize, txt.len());
        assert_eq!(items[0].first_cluster, 2);
    }

    #[test]
    fn test_long_names() {
        let mut fs = formatted();
        write_file(&mut fs, "disk-0C0E0A0A0807.txt", b"0C0E0A0A0807");
        write_file(&mut fs, "disk-0C0E0A0A0808.txt", b"0C0E0A0A0808");
        assert_eq!(
            read_file(&mut fs, "disk-0c0e0a0a0808.txt"),
            b"0C0E0A0A0808".to_vec()
        );
        let names: Vec<String> = fs.list_root().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, ["disk-0C0E0A0A0807.txt", "disk-0C0E0A0A0808.txt"]);
        assert_eq!(
            fs.open("disk-0C0E0A0A0809.txt", OpenMode::Read).unwrap_err(),
            FsError::NotFound
        );
    }

    #[test]
    fn test_create_always_truncates() {
        let mut fs = formatted();
        write_file(&mut fs, "a.bin", &[1u8; 2 * SECTOR_SIZE]);
        write_file(&mut fs, "a.bin", b"short");
        assert_eq!(read_file(&mut fs, "a.bin"), b"short".to_vec());
        assert_eq!(fs.list_root().unwrap().len(), 1);
    }

    #[test]
    fn test_read_only_handle_rejects_write() {
        let mut fs = formatted();
        write_file(&mut fs, "a.bin", b"data");
        let mut file = fs.open("a.bin", OpenMode::Read).unwrap();
        assert_eq!(fs.write(&mut file, b"x"), Err(FsError::Denied));
    }

    #[test]
    fn test_link_map_runs() {
        let mut fs = formatted();
        // a.bin takes cluster 2, b.bin cluster 3; rewriting a.bin then reuses 2 and
        // continues after b.bin.
        write_file(&mut fs, "a.bin", &[1u8; SECTOR_SIZE]);
        write_file(&mut fs, "b.bin", &[2u8; SECTOR_SIZE]);
        write_file(&mut fs, "a.bin", &[3u8; 3 * SECTOR_SIZE]);

        let file = fs.open("a.bin", OpenMode::Read).unwrap();
        let mut table = [Run::default(); 4];
        let runs = fs.link_map(&file, &mut table).unwrap();
        assert_eq!(runs, &[Run { len: 1, start: 2 }, Run { len: 2, start: 4 }]);
        assert_eq!(fs.cluster_to_sector(4).unwrap(), fs.layout().data_start + 2);

        let mut small = [Run::default(); 1];
        assert_eq!(
            fs.link_map(&file, &mut small),
            Err(FsError::NotEnoughCore { required: 2 })
        );
    }

    #[test]
    fn test_link_map_of_empty_file() {
        let mut fs = formatted();
        write_file(&mut fs, "empty", b"");
        let file = fs.open("empty", OpenMode::Read).unwrap();
        let mut table = [Run::default(); 2];
        assert!(fs.link_map(&file, &mut table).unwrap().is_empty());
    }

    #[test]
    fn test_fat_copies_stay_in_step() {
        init();
        let options = FormatOptions {
            num_fats: 2,
            ..FormatOptions::default()
        };
        let mut fs = FatFs::format(RamStorage::new(FAT_BLOCKS), &options).unwrap();
        write_file(&mut fs, "a.bin", &[9u8; 2 * SECTOR_SIZE]);
        let layout = *fs.layout();
        let storage = fs.into_storage();
        let mut first = [0u8; SECTOR_SIZE];
        let mut second = [0u8; SECTOR_SIZE];
        storage.read(LbaId(layout.fat_start as usize), &mut first).unwrap();
        storage
            .read(LbaId((layout.fat_start + layout.fat_sectors) as usize), &mut second)
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(u16::from_le_bytes([first[4], first[5]]), 3);
        assert_eq!(u16::from_le_bytes([first[6], first[7]]), table::EOC);
    }
}
