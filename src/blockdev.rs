//! Block device interface for the scripting runtime's filesystem layer.

use crate::error::ErrorKind;
use crate::region::Region;
use crate::storage::Geometry;
use crate::ERASED_BYTE;
use log::{debug, trace};

/// Control requests understood by [`BlockDev::ioctl`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlOp {
    Init = 0,
    Deinit = 1,
    Sync = 2,
    BlockCount = 3,
    BlockSize = 4,
    BlockErase = 5,
}

impl TryFrom<i32> for IoctlOp {
    type Error = i32;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(IoctlOp::Init),
            1 => Ok(IoctlOp::Deinit),
            2 => Ok(IoctlOp::Sync),
            3 => Ok(IoctlOp::BlockCount),
            4 => Ok(IoctlOp::BlockSize),
            5 => Ok(IoctlOp::BlockErase),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoctlReply {
    /// Request carried out.
    Done,
    Value(u32),
    /// The command code is not one this device knows.
    Unsupported,
}

/// Strict, block aligned access contract of the runtime's mountable devices.
pub trait BlockDev {
    fn read_blocks(&self, block: u32, buf: &mut [u8]) -> Result<(), ErrorKind>;
    fn write_blocks(&mut self, block: u32, buf: &[u8]) -> Result<(), ErrorKind>;
    fn ioctl(&mut self, op: i32, arg: u32) -> Result<IoctlReply, ErrorKind>;
}

pub struct BlockDevice<'a> {
    region: &'a mut Region,
}

impl<'a> BlockDevice<'a> {
    pub fn new(region: &'a mut Region) -> Self {
        BlockDevice { region }
    }

    pub fn geometry(&self) -> Geometry {
        self.region.geometry()
    }

    /// Whole blocks covered by `len`, rejecting partial and empty buffers.
    fn block_count(&self, len: usize) -> Result<u16, ErrorKind> {
        let lba_size = self.region.geometry().lba_size;
        if len == 0 || len % lba_size != 0 {
            debug!("reject buffer of {} bytes", len);
            return Err(ErrorKind::Misaligned);
        }
        u16::try_from(len / lba_size).map_err(|_| ErrorKind::OutOfRange)
    }

    /// Unchecked-caller read: 0 on success, `-EIO` when the range is bad.
    pub fn raw_read(&self, dest: &mut [u8], block: u32, count: u32) -> i32 {
        let result = u16::try_from(count)
            .map_err(|_| ErrorKind::OutOfRange)
            .and_then(|count| self.region.read_blocks(block, count, dest));
        match result {
            Ok(()) => 0,
            Err(_) => -libc::EIO,
        }
    }

    /// Unchecked-caller write: 0 on success, `-EIO` when the range is bad.
    pub fn raw_write(&mut self, src: &[u8], block: u32, count: u32) -> i32 {
        let result = match u16::try_from(count) {
            Ok(count) => self.region.write_blocks(block, count, src),
            Err(_) => Err(ErrorKind::OutOfRange),
        };
        match result {
            Ok(()) => 0,
            Err(_) => -libc::EIO,
        }
    }
}

impl<'a> BlockDev for BlockDevice<'a> {
    fn read_blocks(&self, block: u32, buf: &mut [u8]) -> Result<(), ErrorKind> {
        let count = self.block_count(buf.len())?;
        self.region.read_blocks(block, count, buf)
    }

    fn write_blocks(&mut self, block: u32, buf: &[u8]) -> Result<(), ErrorKind> {
        let count = self.block_count(buf.len())?;
        self.region.write_blocks(block, count, buf)
    }

    fn ioctl(&mut self, op: i32, arg: u32) -> Result<IoctlReply, ErrorKind> {
        let op = match IoctlOp::try_from(op) {
            Ok(op) => op,
            Err(code) => {
                trace!("unsupported ioctl {}", code);
                return Ok(IoctlReply::Unsupported);
            }
        };

        let geometry = self.region.geometry();
        match op {
            IoctlOp::Init | IoctlOp::Deinit | IoctlOp::Sync => Ok(IoctlReply::Done),
            IoctlOp::BlockCount => Ok(IoctlReply::Value(geometry.num_blocks as u32)),
            IoctlOp::BlockSize => Ok(IoctlReply::Value(geometry.lba_size as u32)),
            IoctlOp::BlockErase => {
                self.region.fill(arg, 1, ERASED_BYTE)?;
                Ok(IoctlReply::Done)
            }
        }
    }
}
