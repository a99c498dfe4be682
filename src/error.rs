use core::fmt;

/// Errors surfaced by the disk front-ends, the bootstrapper and the extent mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Logical unit index beyond the single unit this device has.
    InvalidLun,
    /// Block address or block count runs outside the region, or the caller's buffer is
    /// too short for the requested span.
    OutOfRange,
    /// Buffer length is not a positive multiple of the block size.
    Misaligned,
    /// Write refused because the unit is flagged read-only.
    WriteProtected,
    /// Inquiry asked for a vital product data page this device does not provide.
    UnsupportedPage(u8),
    /// Creating the filesystem failed.
    Format(FsError),
    /// The region does not hold a mountable volume.
    Mount(FsError),
    /// The named file does not exist on the volume.
    NotFound,
    /// The cluster link map of a file could not be built.
    Seek(FsError),
    /// Any other filesystem failure.
    Filesystem(FsError),
}

impl ErrorKind {
    /// True for errors the block-device caller sees as a bad argument.
    pub fn is_value_error(&self) -> bool {
        matches!(self, ErrorKind::OutOfRange | ErrorKind::Misaligned)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidLun => write!(f, "invalid logical unit"),
            ErrorKind::OutOfRange => write!(f, "block range out of bounds"),
            ErrorKind::Misaligned => write!(f, "buffer is not a whole number of blocks"),
            ErrorKind::WriteProtected => write!(f, "unit is write protected"),
            ErrorKind::UnsupportedPage(page) => write!(f, "unsupported VPD page 0x{:02x}", page),
            ErrorKind::Format(e) => write!(f, "can't create filesystem: {}", e),
            ErrorKind::Mount(e) => write!(f, "unmounted: {}", e),
            ErrorKind::NotFound => write!(f, "open file: no such file"),
            ErrorKind::Seek(e) => write!(f, "link map: {}", e),
            ErrorKind::Filesystem(e) => write!(f, "filesystem: {}", e),
        }
    }
}

/// Errors raised by the FAT layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// The underlying store rejected a sector transfer.
    Io,
    /// No valid FAT16 boot sector.
    NoFilesystem,
    /// Sector size or cluster count cannot hold a FAT16 volume.
    InvalidGeometry,
    NotFound,
    InvalidName,
    /// No free slot left in the root directory.
    DirFull,
    /// No free cluster left.
    NoSpace,
    /// Write to a file opened for reading.
    Denied,
    /// Cluster chain or directory contents are inconsistent.
    Corrupt,
    /// Caller's link map table is too small; `required` runs are needed.
    NotEnoughCore { required: usize },
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsError::Io => write!(f, "i/o error"),
            FsError::NoFilesystem => write!(f, "no FAT16 filesystem"),
            FsError::InvalidGeometry => write!(f, "geometry unsuitable for FAT16"),
            FsError::NotFound => write!(f, "not found"),
            FsError::InvalidName => write!(f, "invalid name"),
            FsError::DirFull => write!(f, "root directory full"),
            FsError::NoSpace => write!(f, "volume full"),
            FsError::Denied => write!(f, "access denied"),
            FsError::Corrupt => write!(f, "filesystem corrupt"),
            FsError::NotEnoughCore { required } => {
                write!(f, "link map needs {} runs", required)
            }
        }
    }
}
