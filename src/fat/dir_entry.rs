//! Root directory records: short (8.3) entries, VFAT long name entries and name rules.

use crate::error::FsError;
use alloc::string::String;
use alloc::vec::Vec;
use zerocopy::byteorder::{LittleEndian, U16, U32};
use zerocopy::{AsBytes, FromBytes, LayoutVerified, Unaligned};

pub(crate) const DIR_ENTRY_SIZE: usize = 32;

pub(crate) const ATTR_VOLUME_ID: u8 = 0x08;
pub(crate) const ATTR_DIRECTORY: u8 = 0x10;
pub(crate) const ATTR_ARCHIVE: u8 = 0x20;
pub(crate) const ATTR_LONG_NAME: u8 = 0x0F;

pub(crate) const SLOT_FREE: u8 = 0x00;
pub(crate) const SLOT_DELETED: u8 = 0xE5;

/// NT reserved byte flags marking a lowercase base name / extension.
const NT_LOWER_BASE: u8 = 0x08;
const NT_LOWER_EXT: u8 = 0x10;

const LFN_LAST: u8 = 0x40;
const LFN_CHARS: usize = 13;
const MAX_NAME_LEN: usize = 255;

#[derive(Debug, AsBytes, FromBytes, Unaligned, Clone, Copy)]
#[repr(C)]
pub(crate) struct DirEntry {
    pub(crate) name: [u8; 11],
    pub(crate) attr: u8,
    pub(crate) nt_res: u8,
    crt_time_tenth: u8,
    crt_time: U16<LittleEndian>,
    crt_date: U16<LittleEndian>,
    lst_acc_date: U16<LittleEndian>,
    first_cluster_hi: U16<LittleEndian>,
    wrt_time: U16<LittleEndian>,
    wrt_date: U16<LittleEndian>,
    first_cluster_lo: U16<LittleEndian>,
    file_size: U32<LittleEndian>,
}

impl DirEntry {
    pub(crate) fn new(name: [u8; 11], attr: u8, nt_res: u8) -> Self {
        DirEntry {
            name,
            attr,
            nt_res,
            crt_time_tenth: 0,
            crt_time: U16::new(0),
            crt_date: U16::new(0),
            lst_acc_date: U16::new(0),
            first_cluster_hi: U16::new(0),
            wrt_time: U16::new(0),
            wrt_date: U16::new(0),
            first_cluster_lo: U16::new(0),
            file_size: U32::new(0),
        }
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, FsError> {
        let entry: Option<LayoutVerified<_, DirEntry>> = LayoutVerified::new_unaligned(bytes);
        entry.map(|entry| *entry).ok_or(FsError::Corrupt)
    }

    pub(crate) fn first_cluster(&self) -> u32 {
        ((self.first_cluster_hi.get() as u32) << 16) | self.first_cluster_lo.get() as u32
    }

    pub(crate) fn set_first_cluster(&mut self, cluster: u32) {
        self.first_cluster_hi = U16::new((cluster >> 16) as u16);
        self.first_cluster_lo = U16::new(cluster as u16);
    }

    pub(crate) fn size(&self) -> u32 {
        self.file_size.get()
    }

    pub(crate) fn set_size(&mut self, size: u32) {
        self.file_size = U32::new(size);
    }

    pub(crate) fn is_long_name(&self) -> bool {
        self.attr & 0x3F == ATTR_LONG_NAME
    }

    pub(crate) fn is_volume_label(&self) -> bool {
        !self.is_long_name() && self.attr & ATTR_VOLUME_ID != 0
    }

    /// Short name as shown to users, honouring the lowercase flags.
    pub(crate) fn display_name(&self) -> String {
        let mut out = String::new();
        for &c in self.name[..8].iter().take_while(|c| **c != b' ') {
            out.push(apply_case(c, self.nt_res & NT_LOWER_BASE != 0));
        }
        let ext: Vec<u8> = self.name[8..].iter().copied().take_while(|c| *c != b' ').collect();
        if !ext.is_empty() {
            out.push('.');
            for c in ext {
                out.push(apply_case(c, self.nt_res & NT_LOWER_EXT != 0));
            }
        }
        out
    }
}

fn apply_case(c: u8, lower: bool) -> char {
    if lower {
        c.to_ascii_lowercase() as char
    } else {
        c as char
    }
}

#[derive(Debug, AsBytes, FromBytes, Unaligned, Clone, Copy)]
#[repr(C)]
pub(crate) struct LfnEntry {
    pub(crate) ord: u8,
    name1: [U16<LittleEndian>; 5],
    attr: u8,
    kind: u8,
    pub(crate) checksum: u8,
    name2: [U16<LittleEndian>; 6],
    first_cluster_lo: U16<LittleEndian>,
    name3: [U16<LittleEndian>; 2],
}

impl LfnEntry {
    /// Entry `ord` (1 based) holding `chunk`, at most 13 UTF-16 units of the name.
    fn new(ord: u8, last: bool, checksum: u8, chunk: &[u16]) -> Self {
        // Unused slots after the terminating NUL are padded with 0xFFFF.
        let mut units = [0xFFFFu16; LFN_CHARS];
        units[..chunk.len()].copy_from_slice(chunk);
        if chunk.len() < LFN_CHARS {
            units[chunk.len()] = 0;
        }
        let unit = |i: usize| U16::new(units[i]);
        LfnEntry {
            ord: if last { ord | LFN_LAST } else { ord },
            name1: [unit(0), unit(1), unit(2), unit(3), unit(4)],
            attr: ATTR_LONG_NAME,
            kind: 0,
            checksum,
            name2: [unit(5), unit(6), unit(7), unit(8), unit(9), unit(10)],
            first_cluster_lo: U16::new(0),
            name3: [unit(11), unit(12)],
        }
    }

    pub(crate) fn parse(bytes: &[u8]) -> Result<Self, FsError> {
        let entry: Option<LayoutVerified<_, LfnEntry>> = LayoutVerified::new_unaligned(bytes);
        entry.map(|entry| *entry).ok_or(FsError::Corrupt)
    }

    pub(crate) fn sequence(&self) -> usize {
        (self.ord & !LFN_LAST) as usize
    }

    pub(crate) fn is_last(&self) -> bool {
        self.ord & LFN_LAST != 0
    }

    pub(crate) fn units(&self) -> [u16; LFN_CHARS] {
        let mut units = [0u16; LFN_CHARS];
        let all = self.name1.iter().chain(self.name2.iter()).chain(self.name3.iter());
        for (dst, src) in units.iter_mut().zip(all) {
            *dst = src.get();
        }
        units
    }
}

/// Collects the long name entries that precede a short entry.
#[derive(Default)]
pub(crate) struct LfnBuilder {
    units: Vec<u16>,
    checksum: u8,
    expected: usize,
}

impl LfnBuilder {
    pub(crate) fn reset(&mut self) {
        self.units.clear();
        self.expected = 0;
    }

    pub(crate) fn push(&mut self, entry: &LfnEntry) {
        let seq = entry.sequence();
        if entry.is_last() {
            if seq == 0 || seq * LFN_CHARS > MAX_NAME_LEN + LFN_CHARS {
                self.reset();
                return;
            }
            self.units = alloc::vec![0xFFFF; seq * LFN_CHARS];
            self.checksum = entry.checksum;
            self.expected = seq;
        } else if seq == 0 || seq != self.expected || entry.checksum != self.checksum {
            self.reset();
            return;
        }

        let start = (seq - 1) * LFN_CHARS;
        self.units[start..start + LFN_CHARS].copy_from_slice(&entry.units());
        self.expected = seq - 1;
    }

    /// The long name, if a complete set belonging to `short` was collected.
    pub(crate) fn finish(&mut self, short: &DirEntry) -> Option<String> {
        let complete = !self.units.is_empty() && self.expected == 0;
        let name = if complete && self.checksum == sfn_checksum(&short.name) {
            let len = self
                .units
                .iter()
                .position(|u| *u == 0 || *u == 0xFFFF)
                .unwrap_or(self.units.len());
            char::decode_utf16(self.units[..len].iter().copied())
                .collect::<Result<String, _>>()
                .ok()
        } else {
            None
        };
        self.reset();
        name
    }
}

pub(crate) fn sfn_checksum(name: &[u8; 11]) -> u8 {
    name.iter()
        .fold(0u8, |sum, c| ((sum & 1) << 7).wrapping_add(sum >> 1).wrapping_add(*c))
}

/// How a long name is stored in the directory.
pub(crate) enum NamePlan {
    /// Fits 8.3 exactly; only the case flags are needed.
    Short { name: [u8; 11], nt_res: u8 },
    /// Needs long name entries in front of a generated `BASE~N` short entry.
    Long { units: Vec<u16>, stem: [u8; 11] },
}

fn is_sfn_char(c: u8) -> bool {
    c.is_ascii_alphanumeric() || b"$%'-_@~`!(){}^#&".contains(&c)
}

/// Validate `name` and decide how to store it.
pub(crate) fn plan_name(name: &str) -> Result<NamePlan, FsError> {
    if name.is_empty()
        || name.encode_utf16().count() > MAX_NAME_LEN
        || name.ends_with('.')
        || name.ends_with(' ')
        || name == "."
        || name == ".."
        || name
            .chars()
            .any(|c| (c as u32) < 0x20 || "\"*/:<>?\\|".contains(c))
    {
        return Err(FsError::InvalidName);
    }

    let (base, ext) = match name.rfind('.') {
        Some(0) | None => (name, ""),
        Some(dot) => (&name[..dot], &name[dot + 1..]),
    };

    if let Some(short) = exact_short_name(base, ext) {
        return Ok(short);
    }

    let mut stem = [b' '; 11];
    let squeeze = |part: &str, out: &mut [u8]| {
        let mut n = 0;
        for c in part.bytes().filter(|c| *c != b' ' && *c != b'.') {
            if n == out.len() {
                break;
            }
            let up = c.to_ascii_uppercase();
            out[n] = if is_sfn_char(up) { up } else { b'_' };
            n += 1;
        }
    };
    squeeze(base, &mut stem[..8]);
    squeeze(ext, &mut stem[8..]);
    if stem[0] == b' ' {
        stem[0] = b'_';
    }

    Ok(NamePlan::Long {
        units: name.encode_utf16().collect(),
        stem,
    })
}

fn exact_short_name(base: &str, ext: &str) -> Option<NamePlan> {
    if base.is_empty() || base.len() > 8 || ext.len() > 3 {
        return None;
    }
    let mut name = [b' '; 11];
    let mut nt_res = 0;
    let (base_out, ext_out) = name.split_at_mut(8);
    for (part, out, flag) in [(base, base_out, NT_LOWER_BASE), (ext, ext_out, NT_LOWER_EXT)] {
        let bytes = part.as_bytes();
        if !bytes.iter().all(|c| is_sfn_char(*c)) {
            return None;
        }
        let has_lower = bytes.iter().any(u8::is_ascii_lowercase);
        let has_upper = bytes.iter().any(u8::is_ascii_uppercase);
        if has_lower && has_upper {
            return None;
        }
        if has_lower {
            nt_res |= flag;
        }
        for (dst, src) in out.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }
    }
    Some(NamePlan::Short { name, nt_res })
}

/// `stem` with a `~n` tail, shortening the base so the tail fits in eight bytes.
pub(crate) fn numbered_short_name(stem: &[u8; 11], n: u32) -> [u8; 11] {
    let mut digits = [0u8; 10];
    let mut len = 0;
    let mut value = n;
    loop {
        digits[len] = b'0' + (value % 10) as u8;
        len += 1;
        value /= 10;
        if value == 0 {
            break;
        }
    }

    let base_len = stem[..8].iter().position(|c| *c == b' ').unwrap_or(8);
    let keep = core::cmp::min(base_len, 8 - (len + 1));
    let mut out = [b' '; 11];
    out[..keep].copy_from_slice(&stem[..keep]);
    out[keep] = b'~';
    for i in 0..len {
        out[keep + 1 + i] = digits[len - 1 - i];
    }
    out[8..].copy_from_slice(&stem[8..]);
    out
}

/// The long name entries for `units`, in on-disk order (highest sequence first).
pub(crate) fn lfn_entries(units: &[u16], checksum: u8) -> Vec<LfnEntry> {
    let count = (units.len() + LFN_CHARS - 1) / LFN_CHARS;
    (1..=count)
        .rev()
        .map(|seq| {
            let start = (seq - 1) * LFN_CHARS;
            let end = core::cmp::min(start + LFN_CHARS, units.len());
            LfnEntry::new(seq as u8, seq == count, checksum, &units[start..end])
        })
        .collect()
}

/// Label bytes for the volume-id entry: uppercase, space padded.
pub(crate) fn label_bytes(label: &str) -> Result<[u8; 11], FsError> {
    if label.is_empty() || label.len() > 11 {
        return Err(FsError::InvalidName);
    }
    let mut out = [b' '; 11];
    for (dst, c) in out.iter_mut().zip(label.bytes()) {
        let up = c.to_ascii_uppercase();
        if !(is_sfn_char(up) || up == b' ') {
            return Err(FsError::InvalidName);
        }
        *dst = up;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_dir_entry_size() {
        assert_eq!(core::mem::size_of::<DirEntry>(), DIR_ENTRY_SIZE);
        assert_eq!(core::mem::size_of::<LfnEntry>(), DIR_ENTRY_SIZE);
    }

    #[test]
    fn test_lowercase_short_name() {
        match plan_name("serial.txt").unwrap() {
            NamePlan::Short { name, nt_res } => {
                assert_eq!(&name, b"SERIAL  TXT");
                assert_eq!(nt_res, NT_LOWER_BASE | NT_LOWER_EXT);
                let entry = DirEntry::new(name, ATTR_ARCHIVE, nt_res);
                assert_eq!(entry.display_name(), "serial.txt");
            }
            NamePlan::Long { .. } => panic!("serial.txt fits 8.3"),
        }
    }

    #[test]
    fn test_long_name_needs_lfn() {
        match plan_name("disk-0C0E0A0A0807.txt").unwrap() {
            NamePlan::Long { units, stem } => {
                assert_eq!(units.len(), 21);
                assert_eq!(&stem, b"DISK-0C0TXT");
                assert_eq!(&numbered_short_name(&stem, 1), b"DISK-0~1TXT");
                assert_eq!(&numbered_short_name(&stem, 12), b"DISK-~12TXT");
            }
            NamePlan::Short { .. } => panic!("name is longer than 8.3"),
        }
    }

    #[test]
    fn test_mixed_case_needs_lfn() {
        assert!(matches!(plan_name("Serial.txt"), Ok(NamePlan::Long { .. })));
    }

    #[test]
    fn test_invalid_names() {
        for name in ["", "a/b", "what?", "trailing.", "..", "tab\there"] {
            assert!(matches!(plan_name(name), Err(FsError::InvalidName)), "{}", name);
        }
    }

    #[test]
    fn test_lfn_round_trip_through_builder() {
        let name = "disk-0C0E0A0A0807.txt";
        let units: Vec<u16> = name.encode_utf16().collect();
        let short = DirEntry::new(*b"DISK-0~1TXT", ATTR_ARCHIVE, 0);
        let entries = lfn_entries(&units, sfn_checksum(&short.name));
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_last());

        let mut builder = LfnBuilder::default();
        for entry in &entries {
            let parsed = LfnEntry::parse(entry.as_bytes()).unwrap();
            builder.push(&parsed);
        }
        assert_eq!(builder.finish(&short).as_deref(), Some(name));
    }

    #[test]
    fn test_lfn_checksum_mismatch_ignored() {
        let units: Vec<u16> = "a-long-file-name.txt".encode_utf16().collect();
        let entries = lfn_entries(&units, 0x42);
        let mut builder = LfnBuilder::default();
        for entry in &entries {
            builder.push(entry);
        }
        let short = DirEntry::new(*b"A-LONG~1TXT", ATTR_ARCHIVE, 0);
        assert_eq!(builder.finish(&short), None);
    }

    #[test]
    fn test_label_bytes() {
        assert_eq!(&label_bytes("PsramDisk").unwrap(), b"PSRAMDISK  ");
        assert!(label_bytes("far too long label").is_err());
    }
}
