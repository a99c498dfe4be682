//! Mass-storage class responder.
//!
//! The transport layer parses SCSI command blocks and calls into [`MscStorage`]; this
//! module only answers them for the single logical unit backed by the region.

use crate::error::ErrorKind;
use crate::region::Region;
use crate::LUN_COUNT;
use log::{debug, info};

const STANDARD_INQUIRY_DATA_LEN: usize = 36;

const INQUIRY_DATA: [u8; STANDARD_INQUIRY_DATA_LEN] = [
    0x00, // peripheral qualifier; peripheral device type
    0x80, // removable medium
    0x02, // version
    0x02, // response data format
    (STANDARD_INQUIRY_DATA_LEN - 5) as u8,
    0x00,
    0x00,
    0x00,
    b'G', b'e', b'n', b'e', b'r', b'i', b'c', b' ', // vendor: 8 bytes
    b'P', b'S', b'R', b'A', b'M', b' ', b'D', b'i', // product: 16 bytes
    b's', b'k', b' ', b' ', b' ', b' ', b' ', b' ',
    b'1', b'.', b'0', b'0', // revision: 4 bytes
];

/// Supported VPD pages.
const VPD_PAGE_LIST: [u8; 6] = [0x00, 0x00, 0x00, 2, 0x00, 0x83];

/// Device identification page with no descriptors.
const VPD_DEVICE_ID: [u8; 4] = [0x00, 0x83, 0x00, 0x00];

const MODE_SENSE_WP: u8 = 0x80;

/// Per unit state, mutated only by command handlers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogicalUnit {
    /// Medium is present; cleared by the host to "eject" without unplugging.
    pub started: bool,
    pub readonly: bool,
}

/// Fields of an INQUIRY command block the responder cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InquiryRequest {
    pub evpd: bool,
    pub page_code: u8,
    pub allocation_length: u16,
}

impl InquiryRequest {
    pub fn standard(allocation_length: u16) -> Self {
        InquiryRequest {
            evpd: false,
            page_code: 0,
            allocation_length,
        }
    }

    pub fn vpd(page_code: u8, allocation_length: u16) -> Self {
        InquiryRequest {
            evpd: true,
            page_code,
            allocation_length,
        }
    }

    /// Decode a 6-byte INQUIRY CDB.
    pub fn from_cdb(cdb: &[u8; 6]) -> Self {
        InquiryRequest {
            evpd: cdb[1] & 0x01 != 0,
            page_code: cdb[2],
            allocation_length: u16::from_be_bytes([cdb[3], cdb[4]]),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capacity {
    pub block_count: u32,
    pub block_size: u16,
}

/// Operation table the mass-storage transport drives.
pub trait MscStorage {
    fn init(&mut self, lun: u8) -> Result<(), ErrorKind>;
    fn inquiry(&self, lun: u8, request: &InquiryRequest) -> Result<&'static [u8], ErrorKind>;
    fn capacity(&self, lun: u8) -> Capacity;
    /// Polled by the host; must stay cheap.
    fn is_ready(&self, lun: u8) -> bool;
    fn is_write_protected(&self, lun: u8) -> Result<bool, ErrorKind>;
    fn start_stop_unit(&mut self, lun: u8, started: bool) -> Result<(), ErrorKind>;
    fn prevent_allow_medium_removal(&mut self, lun: u8, prevent: bool) -> Result<(), ErrorKind>;
    fn mode_sense6(&self, lun: u8) -> Result<[u8; 4], ErrorKind>;
    fn mode_sense10(&self, lun: u8) -> Result<[u8; 8], ErrorKind>;
    fn read(&self, lun: u8, block: u32, count: u16, buf: &mut [u8]) -> Result<(), ErrorKind>;
    fn write(&mut self, lun: u8, block: u32, count: u16, data: &[u8]) -> Result<(), ErrorKind>;
    fn max_lun(&self) -> u8;
}

/// Responder over a borrowed region and unit table.
pub struct MscResponder<'a> {
    region: &'a mut Region,
    units: &'a mut [LogicalUnit; LUN_COUNT],
}

impl<'a> MscResponder<'a> {
    pub fn new(region: &'a mut Region, units: &'a mut [LogicalUnit; LUN_COUNT]) -> Self {
        MscResponder { region, units }
    }

    fn unit(&self, lun: u8) -> Result<&LogicalUnit, ErrorKind> {
        self.units.get(lun as usize).ok_or(ErrorKind::InvalidLun)
    }

    fn unit_mut(&mut self, lun: u8) -> Result<&mut LogicalUnit, ErrorKind> {
        self.units.get_mut(lun as usize).ok_or(ErrorKind::InvalidLun)
    }

    /// Flag the unit read-only; the flag is cleared again by `init`.
    pub fn set_write_protected(&mut self, lun: u8, readonly: bool) -> Result<(), ErrorKind> {
        info!("PSRAMdisk: readonly={}", readonly);
        self.unit_mut(lun)?.readonly = readonly;
        Ok(())
    }
}

impl<'a> MscStorage for MscResponder<'a> {
    fn init(&mut self, lun: u8) -> Result<(), ErrorKind> {
        if lun != 0 {
            return Err(ErrorKind::InvalidLun);
        }
        let unit = self.unit_mut(lun)?;
        unit.started = true;
        unit.readonly = false;
        Ok(())
    }

    fn inquiry(&self, lun: u8, request: &InquiryRequest) -> Result<&'static [u8], ErrorKind> {
        if request.evpd {
            return match request.page_code {
                0x00 => Ok(&VPD_PAGE_LIST),
                0x83 => Ok(&VPD_DEVICE_ID),
                page => {
                    debug!("inquiry for unsupported VPD page 0x{:02x}", page);
                    Err(ErrorKind::UnsupportedPage(page))
                }
            };
        }

        self.unit(lun)?;
        let len = core::cmp::min(INQUIRY_DATA.len(), request.allocation_length as usize);
        Ok(&INQUIRY_DATA[..len])
    }

    fn capacity(&self, _lun: u8) -> Capacity {
        let geometry = self.region.geometry();
        Capacity {
            block_count: geometry.num_blocks as u32,
            block_size: geometry.lba_size as u16,
        }
    }

    fn is_ready(&self, lun: u8) -> bool {
        self.unit(lun).map(|unit| unit.started).unwrap_or(false)
    }

    fn is_write_protected(&self, lun: u8) -> Result<bool, ErrorKind> {
        Ok(self.unit(lun)?.readonly)
    }

    fn start_stop_unit(&mut self, lun: u8, started: bool) -> Result<(), ErrorKind> {
        self.unit_mut(lun)?.started = started;
        info!("PSRAMdisk: started={}", started);
        Ok(())
    }

    fn prevent_allow_medium_removal(&mut self, lun: u8, prevent: bool) -> Result<(), ErrorKind> {
        info!("PSRAMdisk: prevallow={} lun={}", prevent, lun);
        Ok(())
    }

    fn mode_sense6(&self, lun: u8) -> Result<[u8; 4], ErrorKind> {
        let wp = if self.unit(lun)?.readonly { MODE_SENSE_WP } else { 0 };
        Ok([0x03, 0x00, wp, 0x00])
    }

    fn mode_sense10(&self, lun: u8) -> Result<[u8; 8], ErrorKind> {
        let wp = if self.unit(lun)?.readonly { MODE_SENSE_WP } else { 0 };
        Ok([0x00, 0x06, 0x00, wp, 0x00, 0x00, 0x00, 0x00])
    }

    fn read(&self, lun: u8, block: u32, count: u16, buf: &mut [u8]) -> Result<(), ErrorKind> {
        self.unit(lun)?;
        self.region.read_blocks(block, count, buf)
    }

    fn write(&mut self, lun: u8, block: u32, count: u16, data: &[u8]) -> Result<(), ErrorKind> {
        if self.unit(lun)?.readonly {
            debug!("write to protected unit at block {}", block);
            return Err(ErrorKind::WriteProtected);
        }
        self.region.write_blocks(block, count, data)
    }

    fn max_lun(&self) -> u8 {
        (LUN_COUNT - 1) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Geometry;
    use crate::tests_util::*;
    use crate::BLOCK_SIZE;

    fn fixture(geometry: Geometry) -> (Region, [LogicalUnit; LUN_COUNT]) {
        init();
        (Region::new(geometry), [LogicalUnit::default(); LUN_COUNT])
    }

    #[test]
    fn test_readiness_lifecycle() {
        let (mut region, mut units) = fixture(small_geometry());
        let mut msc = MscResponder::new(&mut region, &mut units);
        assert!(!msc.is_ready(0));
        msc.init(0).unwrap();
        assert!(msc.is_ready(0));
        msc.start_stop_unit(0, false).unwrap();
        assert!(!msc.is_ready(0));
        msc.start_stop_unit(0, true).unwrap();
        assert!(msc.is_ready(0));
        assert!(!msc.is_ready(1));
    }

    #[test]
    fn test_init_is_idempotent_and_lun0_only() {
        let (mut region, mut units) = fixture(small_geometry());
        let mut msc = MscResponder::new(&mut region, &mut units);
        msc.init(0).unwrap();
        msc.init(0).unwrap();
        assert_eq!(msc.init(1), Err(ErrorKind::InvalidLun));
        assert!(msc.is_ready(0));
        assert_eq!(msc.is_write_protected(0), Ok(false));
    }

    #[test]
    fn test_single_lun() {
        let (mut region, mut units) = fixture(small_geometry());
        let msc = MscResponder::new(&mut region, &mut units);
        assert_eq!(msc.max_lun(), 0);
    }

    #[test]
    fn test_capacity_of_default_region() {
        let (mut region, mut units) = fixture(Geometry::default());
        let msc = MscResponder::new(&mut region, &mut units);
        let capacity = msc.capacity(0);
        assert_eq!(
            capacity,
            Capacity {
                block_count: 16384,
                block_size: 512
            }
        );
        assert_eq!(
            capacity.block_count as usize * capacity.block_size as usize,
            8 * 1024 * 1024
        );
    }

    #[test]
    fn test_vpd_page_list() {
        let (mut region, mut units) = fixture(small_geometry());
        let msc = MscResponder::new(&mut region, &mut units);
        let page = msc.inquiry(0, &InquiryRequest::vpd(0x00, 255)).unwrap();
        let count = page[3] as usize;
        assert_eq!(&page[4..4 + count], &[0x00, 0x83]);
        assert_eq!(page.len(), 4 + count);

        let page = msc.inquiry(0, &InquiryRequest::vpd(0x83, 255)).unwrap();
        assert_eq!(page, &[0x00, 0x83, 0x00, 0x00]);

        assert_eq!(
            msc.inquiry(0, &InquiryRequest::vpd(0x80, 255)),
            Err(ErrorKind::UnsupportedPage(0x80))
        );
    }

    #[test]
    fn test_standard_inquiry_truncates() {
        let (mut region, mut units) = fixture(small_geometry());
        let msc = MscResponder::new(&mut region, &mut units);
        let full = msc.inquiry(0, &InquiryRequest::standard(96)).unwrap();
        assert_eq!(full.len(), 36);
        assert_eq!(full[1] & 0x80, 0x80);
        assert_eq!(full[4] as usize, 36 - 5);

        let cdb = [0x12, 0x00, 0x00, 0x00, 0x05, 0x00];
        let short = msc.inquiry(0, &InquiryRequest::from_cdb(&cdb)).unwrap();
        assert_eq!(short, &full[..5]);

        assert_eq!(
            msc.inquiry(1, &InquiryRequest::standard(36)),
            Err(ErrorKind::InvalidLun)
        );
    }

    #[test]
    fn test_inquiry_cdb_decodes_evpd() {
        let request = InquiryRequest::from_cdb(&[0x12, 0x01, 0x83, 0x01, 0x00, 0x00]);
        assert_eq!(request, InquiryRequest::vpd(0x83, 256));
    }

    #[test]
    fn test_read_write_round_trip() {
        let (mut region, mut units) = fixture(small_geometry());
        let mut msc = MscResponder::new(&mut region, &mut units);
        msc.init(0).unwrap();

        let txt = rust_counter_strings::generate(3 * BLOCK_SIZE);
        let data = txt.as_bytes();
        msc.write(0, 5, 3, data).unwrap();
        let mut data2 = vec![0u8; 3 * BLOCK_SIZE];
        msc.read(0, 5, 3, &mut data2).unwrap();
        assert_eq!(&data[..], &data2[..]);
    }

    #[test]
    fn test_data_path_rejections() {
        let (mut region, mut units) = fixture(small_geometry());
        let mut msc = MscResponder::new(&mut region, &mut units);
        msc.init(0).unwrap();
        let mut buf = vec![0u8; 2 * BLOCK_SIZE];
        assert_eq!(msc.read(1, 0, 1, &mut buf), Err(ErrorKind::InvalidLun));
        assert_eq!(
            msc.read(0, SMALL_BLOCKS as u32 - 1, 2, &mut buf),
            Err(ErrorKind::OutOfRange)
        );
        assert_eq!(
            msc.write(0, SMALL_BLOCKS as u32, 1, &buf),
            Err(ErrorKind::OutOfRange)
        );
        assert_eq!(msc.write(1, 0, 1, &buf), Err(ErrorKind::InvalidLun));
    }

    #[test]
    fn test_write_protect_blocks_writes() {
        let (mut region, mut units) = fixture(small_geometry());
        let mut msc = MscResponder::new(&mut region, &mut units);
        msc.init(0).unwrap();
        msc.set_write_protected(0, true).unwrap();
        assert_eq!(msc.is_write_protected(0), Ok(true));
        assert_eq!(msc.mode_sense6(0).unwrap()[2], MODE_SENSE_WP);
        assert_eq!(msc.mode_sense10(0).unwrap()[3], MODE_SENSE_WP);

        let data = [0xAAu8; BLOCK_SIZE];
        assert_eq!(msc.write(0, 0, 1, &data), Err(ErrorKind::WriteProtected));
        let mut back = [0u8; BLOCK_SIZE];
        msc.read(0, 0, 1, &mut back).unwrap();
        assert_eq!(back, [0u8; BLOCK_SIZE]);

        // Re-initialising the unit clears the flag.
        msc.init(0).unwrap();
        msc.write(0, 0, 1, &data).unwrap();
    }

    #[test]
    fn test_mode_sense_default() {
        let (mut region, mut units) = fixture(small_geometry());
        let mut msc = MscResponder::new(&mut region, &mut units);
        msc.init(0).unwrap();
        assert_eq!(msc.mode_sense6(0), Ok([0x03, 0x00, 0x00, 0x00]));
        assert_eq!(msc.mode_sense10(0), Ok([0x00, 0x06, 0, 0, 0, 0, 0, 0]));
        assert_eq!(msc.mode_sense6(1), Err(ErrorKind::InvalidLun));
        msc.prevent_allow_medium_removal(0, true).unwrap();
    }
}
