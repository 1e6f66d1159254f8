//! Root directory sectors.

use crate::{
    file_table::{FileContent, FileTable, NAME_LEN},
    geometry::{DIR_ENTRIES_PER_SECTOR, DIR_ENTRY_SIZE, SECTOR_SIZE},
};
use uf2_bootloader_boot_config::BuildTimestamp;

pub mod attributes {
    pub const READ_ONLY: u8 = 0x01;
    pub const HIDDEN: u8 = 0x02;
    pub const SYSTEM: u8 = 0x04;
    pub const VOLUME_ID: u8 = 0x08;
    pub const DIRECTORY: u8 = 0x10;
    pub const ARCHIVE: u8 = 0x20;
}

mod offsets {
    pub const NAME: usize = 0;
    pub const ATTRIBUTES: usize = 11;
    pub const CREATE_TIME_FINE: usize = 13;
    pub const CREATE_TIME: usize = 14;
    pub const CREATE_DATE: usize = 16;
    pub const LAST_ACCESS_DATE: usize = 18;
    pub const HIGH_START_CLUSTER: usize = 20;
    pub const UPDATE_TIME: usize = 22;
    pub const UPDATE_DATE: usize = 24;
    pub const START_CLUSTER: usize = 26;
    pub const SIZE: usize = 28;
}

/// A timestamp in the packed DOS format used by directory entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosTimestamp {
    pub date: u16,
    pub time: u16,
    /// Additional 10 ms units, `0` or `100` since `time` has two second resolution.
    pub fine: u8,
}

impl From<BuildTimestamp> for DosTimestamp {
    fn from(ts: BuildTimestamp) -> Self {
        let years_since_1980 = ts.year.saturating_sub(1980).min(127);
        Self {
            date: years_since_1980 << 9 | u16::from(ts.month) << 5 | u16::from(ts.day),
            time: u16::from(ts.hour) << 11 | u16::from(ts.minute) << 5 | u16::from(ts.second / 2),
            fine: ts.second % 2 * 100,
        }
    }
}

/// A 32 byte short name directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry {
    pub name: [u8; NAME_LEN],
    pub attributes: u8,
    pub created: DosTimestamp,
    pub last_access_date: u16,
    pub updated: DosTimestamp,
    pub start_cluster: u32,
    pub size: u32,
}

impl DirEntry {
    pub fn volume_label(label: &[u8; NAME_LEN]) -> Self {
        Self {
            name: *label,
            attributes: attributes::VOLUME_ID | attributes::ARCHIVE,
            created: DosTimestamp::default(),
            last_access_date: 0,
            updated: DosTimestamp::default(),
            start_cluster: 0,
            size: 0,
        }
    }

    pub fn file(name: &[u8; NAME_LEN], start_cluster: u32, size: u32, time: DosTimestamp) -> Self {
        Self {
            name: *name,
            attributes: 0,
            created: time,
            last_access_date: time.date,
            updated: DosTimestamp { fine: 0, ..time },
            start_cluster,
            size,
        }
    }

    pub fn encode(&self, out: &mut [u8]) {
        let out = &mut out[..DIR_ENTRY_SIZE];
        out.fill(0);
        out[offsets::NAME..][..NAME_LEN].copy_from_slice(&self.name);
        out[offsets::ATTRIBUTES] = self.attributes;
        out[offsets::CREATE_TIME_FINE] = self.created.fine;
        put_u16(out, offsets::CREATE_TIME, self.created.time);
        put_u16(out, offsets::CREATE_DATE, self.created.date);
        put_u16(out, offsets::LAST_ACCESS_DATE, self.last_access_date);
        put_u16(out, offsets::HIGH_START_CLUSTER, (self.start_cluster >> 16) as u16);
        put_u16(out, offsets::UPDATE_TIME, self.updated.time);
        put_u16(out, offsets::UPDATE_DATE, self.updated.date);
        put_u16(out, offsets::START_CLUSTER, self.start_cluster as u16);
        out[offsets::SIZE..][..4].copy_from_slice(&self.size.to_le_bytes());
    }

    pub fn parse(raw: &[u8]) -> Self {
        let u16_at = |offset: usize| u16::from_le_bytes([raw[offset], raw[offset + 1]]);
        let mut name = [0; NAME_LEN];
        name.copy_from_slice(&raw[offsets::NAME..][..NAME_LEN]);
        let mut size = [0; 4];
        size.copy_from_slice(&raw[offsets::SIZE..][..4]);
        Self {
            name,
            attributes: raw[offsets::ATTRIBUTES],
            created: DosTimestamp {
                date: u16_at(offsets::CREATE_DATE),
                time: u16_at(offsets::CREATE_TIME),
                fine: raw[offsets::CREATE_TIME_FINE],
            },
            last_access_date: u16_at(offsets::LAST_ACCESS_DATE),
            updated: DosTimestamp {
                date: u16_at(offsets::UPDATE_DATE),
                time: u16_at(offsets::UPDATE_TIME),
                fine: 0,
            },
            start_cluster: u32::from(u16_at(offsets::HIGH_START_CLUSTER)) << 16
                | u32::from(u16_at(offsets::START_CLUSTER)),
            size: u32::from_le_bytes(size),
        }
    }
}

/// Everything a root directory sector is derived from.
pub struct RootDirectory<'a> {
    pub files: &'a FileTable<'a>,
    pub volume_label: &'a [u8; NAME_LEN],
    pub timestamp: DosTimestamp,
    /// Size reported for the firmware file.
    pub firmware_size: u32,
}

impl RootDirectory<'_> {
    /// Writes sector `sector` of the root directory into `out`.
    ///
    /// The volume label takes the first slot, followed by one entry per file.
    /// Unused slots stay zeroed, which ends the directory.
    pub fn write_sector(&self, sector: u32, out: &mut [u8; SECTOR_SIZE]) {
        out.fill(0);

        let first_slot = sector as usize * DIR_ENTRIES_PER_SECTOR;
        for (slot, raw) in out.chunks_exact_mut(DIR_ENTRY_SIZE).enumerate() {
            match (first_slot + slot).checked_sub(1) {
                None => DirEntry::volume_label(self.volume_label).encode(raw),
                Some(index) => match self.entry(index) {
                    Some(entry) => entry.encode(raw),
                    None => break,
                },
            }
        }
    }

    fn entry(&self, index: usize) -> Option<DirEntry> {
        let file = self.files.get(index)?;
        let size = match file.content() {
            FileContent::Inline(bytes) => bytes.len() as u32,
            FileContent::Firmware => self.firmware_size,
        };
        Some(DirEntry::file(
            file.name(),
            self.files.start_cluster(index),
            size,
            self.timestamp,
        ))
    }
}

fn put_u16(out: &mut [u8], offset: usize, value: u16) {
    out[offset..][..2].copy_from_slice(&value.to_le_bytes());
}
