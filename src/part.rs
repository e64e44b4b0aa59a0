//! Master boot record partition table.

use log::info;

/// MBR partitions per unit; the raw whole-disk entry comes on top of these.
pub const NPARTITIONS: usize = 4;
pub const RAWPART: usize = 0;

pub const MBR_TABLE_OFFSET: usize = 446;
pub const MBR_ENTRY_LEN: usize = 16;
pub const MBR_MAGIC_OFFSET: usize = 510;
pub const MBR_MAGIC: u16 = 0xAA55;

/// One partition table entry. Offsets and sizes count 512-byte sectors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Partition {
    pub status: u8,
    pub kind: u8,
    pub offset: u32,
    pub size: u32,
}

impl Partition {
    pub const fn raw(size: u32) -> Self {
        Self {
            status: 0,
            kind: 0,
            offset: 0,
            size,
        }
    }

    /// Decode a 16-byte MBR entry. The CHS fields are ignored.
    pub fn from_entry(entry: &[u8]) -> Self {
        let le = |at: usize| u32::from_le_bytes([entry[at], entry[at + 1], entry[at + 2], entry[at + 3]]);
        Self {
            status: entry[0],
            kind: entry[4],
            offset: le(8),
            size: le(12),
        }
    }

    pub fn is_present(&self) -> bool {
        self.kind != 0
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }

    pub fn overlaps(&self, other: &Partition) -> bool {
        (other.offset as u64) < self.end() && other.end() > self.offset as u64
    }
}

/// Parse the partition table in sector 0.
///
/// Returns `None` unless the sector ends with the 0xAA55 signature.
pub fn parse_mbr(sector: &[u8]) -> Option<[Partition; NPARTITIONS]> {
    if sector.len() < MBR_MAGIC_OFFSET + 2 {
        return None;
    }
    let magic = u16::from_le_bytes([sector[MBR_MAGIC_OFFSET], sector[MBR_MAGIC_OFFSET + 1]]);
    if magic != MBR_MAGIC {
        return None;
    }

    let mut table = [Partition::default(); NPARTITIONS];
    let entries = sector[MBR_TABLE_OFFSET..MBR_MAGIC_OFFSET].chunks_exact(MBR_ENTRY_LEN);
    for (slot, entry) in table.iter_mut().zip(entries) {
        *slot = Partition::from_entry(entry);
    }
    Some(table)
}

/// Log the partitions in use, `name` being the disk's prefix.
pub fn log_table(name: &str, unit: usize, table: &[Partition]) {
    for (i, p) in table.iter().enumerate().filter(|(_, p)| p.is_present()) {
        info!(
            "{}{}{}:  partition type {:02x}, sector {}, size {} kbytes",
            name,
            unit,
            (b'a' + i as u8) as char,
            p.kind,
            p.offset,
            p.size / 2
        );
    }
}
