use core::fmt;

const HEX_DIGITS: &[u8; 16] = b"0123456789ABCDEF";

pub const IDENT_LEN: usize = 12;

/// The 12-byte factory unique identifier of the chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniqueId(pub [u8; 12]);

impl UniqueId {
    /// CRC-32 of the identifier, used as the FAT volume serial number.
    pub fn volume_serial(&self) -> u32 {
        const CRC: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_CKSUM);
        CRC.checksum(&self.0)
    }
}

/// Twelve uppercase hex characters naming this unit, as printed in the ident files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentRecord([u8; IDENT_LEN]);

impl IdentRecord {
    pub fn from_unique_id(id: &UniqueId) -> Self {
        let id = &id.0;
        let folded = [
            id[11],
            id[10].wrapping_add(id[2]),
            id[9],
            id[8].wrapping_add(id[0]),
            id[7],
            id[6],
        ];

        let mut record = [0u8; IDENT_LEN];
        for (pair, byte) in record.chunks_exact_mut(2).zip(folded) {
            pair[0] = HEX_DIGITS[(byte >> 4) as usize];
            pair[1] = HEX_DIGITS[(byte & 0x0F) as usize];
        }
        IdentRecord(record)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for IdentRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0 {
            write!(f, "{}", c as char)?;
        }
        Ok(())
    }
}
