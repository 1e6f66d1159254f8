//! FAT sectors, computed from the file table without a backing store.

use crate::{
    boot_sector::MEDIA_DESCRIPTOR,
    file_table::FileTable,
    geometry::{FAT_ENTRIES_PER_SECTOR, FAT_ENTRY_SIZE, SECTOR_SIZE},
};
use core::ops::RangeInclusive;

/// FAT16 entry marking the last cluster of a chain.
pub const END_OF_CHAIN: u16 = 0xFFFF;

/// Writes sector `sector` of the FAT into `out`.
///
/// `sector` is relative to the start of a FAT copy; both copies are identical.
/// `firmware_clusters` is the length of the firmware's cluster chain and must
/// not be zero.
pub fn write_fat_sector(
    files: &FileTable,
    firmware_clusters: u32,
    sector: u32,
    out: &mut [u8; SECTOR_SIZE],
) {
    out.fill(0);

    if sector == 0 {
        // entry 0 mirrors the media descriptor, entry 1 and every
        // single-cluster file end their chain immediately
        set_entry(out, 0, 0xFF00 | u16::from(MEDIA_DESCRIPTOR));
        for index in 1..files.len() + 2 {
            set_entry(out, index, END_OF_CHAIN);
        }
    }

    let chain = firmware_chain(files, firmware_clusters);
    let first_in_sector = sector * FAT_ENTRIES_PER_SECTOR;
    for index in 0..FAT_ENTRIES_PER_SECTOR {
        let cluster = first_in_sector + index;
        if chain.contains(&cluster) {
            let link = if cluster == *chain.end() {
                END_OF_CHAIN
            } else {
                // clusters never exceed 0xFFD5, see `geometry::MAX_CLUSTER_COUNT`
                (cluster + 1) as u16
            };
            set_entry(out, index as usize, link);
        }
    }
}

/// The cluster numbers occupied by the firmware file.
pub fn firmware_chain(files: &FileTable, firmware_clusters: u32) -> RangeInclusive<u32> {
    let first = files.firmware_start_cluster();
    first..=first + firmware_clusters.saturating_sub(1)
}

fn set_entry(out: &mut [u8; SECTOR_SIZE], index: usize, value: u16) {
    out[index * FAT_ENTRY_SIZE..][..FAT_ENTRY_SIZE].copy_from_slice(&value.to_le_bytes());
}
