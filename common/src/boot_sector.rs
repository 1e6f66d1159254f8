use crate::{
    file_table::NAME_LEN,
    geometry::{Geometry, FAT_COPIES, RESERVED_SECTORS, SECTORS_PER_CLUSTER, SECTOR_SIZE},
};

pub const MEDIA_DESCRIPTOR: u8 = 0xF8;

const JUMP_INSTRUCTION: [u8; 3] = [0xEB, 0x3C, 0x90];
const OEM_NAME: &[u8; 8] = b"UF2 UF2 ";
const FILESYSTEM_TYPE: &[u8; 8] = b"FAT16   ";
// fixed disk, matching the media descriptor
const PHYSICAL_DRIVE_NUMBER: u8 = 0x80;
const EXTENDED_BOOT_SIGNATURE: u8 = 0x29;
const VOLUME_SERIAL_NUMBER: u32 = 0x0042_0042;

// byte offsets of the BIOS parameter block fields
mod offsets {
    pub const JUMP: usize = 0;
    pub const OEM_NAME: usize = 3;
    pub const BYTES_PER_SECTOR: usize = 11;
    pub const SECTORS_PER_CLUSTER: usize = 13;
    pub const RESERVED_SECTORS: usize = 14;
    pub const FAT_COPIES: usize = 16;
    pub const ROOT_DIR_ENTRIES: usize = 17;
    pub const TOTAL_SECTORS_16: usize = 19;
    pub const MEDIA_DESCRIPTOR: usize = 21;
    pub const SECTORS_PER_FAT: usize = 22;
    pub const SECTORS_PER_TRACK: usize = 24;
    pub const HEADS: usize = 26;
    pub const HIDDEN_SECTORS: usize = 28;
    pub const TOTAL_SECTORS_32: usize = 32;
    pub const PHYSICAL_DRIVE: usize = 36;
    pub const EXTENDED_BOOT_SIGNATURE: usize = 38;
    pub const VOLUME_SERIAL: usize = 39;
    pub const VOLUME_LABEL: usize = 43;
    pub const FILESYSTEM_TYPE: usize = 54;
    pub const BOOT_SIGNATURE: usize = 510;
}

/// Writes the boot sector of a volume with the given layout into `out`.
///
/// The output only depends on the arguments.
pub fn write_boot_sector(
    geometry: &Geometry,
    volume_label: &[u8; NAME_LEN],
    out: &mut [u8; SECTOR_SIZE],
) {
    out.fill(0);

    let total_sectors = geometry.total_sectors();
    let (total_sectors_16, total_sectors_32) = match u16::try_from(total_sectors) {
        Ok(small) => (small, 0),
        Err(_) => (0, total_sectors),
    };

    out[offsets::JUMP..][..3].copy_from_slice(&JUMP_INSTRUCTION);
    out[offsets::OEM_NAME..][..8].copy_from_slice(OEM_NAME);
    put_u16(out, offsets::BYTES_PER_SECTOR, SECTOR_SIZE as u16);
    out[offsets::SECTORS_PER_CLUSTER] = SECTORS_PER_CLUSTER as u8;
    put_u16(out, offsets::RESERVED_SECTORS, RESERVED_SECTORS as u16);
    out[offsets::FAT_COPIES] = FAT_COPIES as u8;
    put_u16(out, offsets::ROOT_DIR_ENTRIES, geometry.root_dir_entries());
    put_u16(out, offsets::TOTAL_SECTORS_16, total_sectors_16);
    out[offsets::MEDIA_DESCRIPTOR] = MEDIA_DESCRIPTOR;
    put_u16(out, offsets::SECTORS_PER_FAT, geometry.sectors_per_fat() as u16);
    put_u16(out, offsets::SECTORS_PER_TRACK, 1);
    put_u16(out, offsets::HEADS, 1);
    out[offsets::HIDDEN_SECTORS..][..4].copy_from_slice(&0u32.to_le_bytes());
    out[offsets::TOTAL_SECTORS_32..][..4].copy_from_slice(&total_sectors_32.to_le_bytes());
    out[offsets::PHYSICAL_DRIVE] = PHYSICAL_DRIVE_NUMBER;
    out[offsets::EXTENDED_BOOT_SIGNATURE] = EXTENDED_BOOT_SIGNATURE;
    out[offsets::VOLUME_SERIAL..][..4].copy_from_slice(&VOLUME_SERIAL_NUMBER.to_le_bytes());
    out[offsets::VOLUME_LABEL..][..NAME_LEN].copy_from_slice(volume_label);
    out[offsets::FILESYSTEM_TYPE..][..8].copy_from_slice(FILESYSTEM_TYPE);

    // always at 510/511, whatever the sector size
    out[offsets::BOOT_SIGNATURE] = 0x55;
    out[offsets::BOOT_SIGNATURE + 1] = 0xAA;
}

fn put_u16(out: &mut [u8], offset: usize, value: u16) {
    out[offset..][..2].copy_from_slice(&value.to_le_bytes());
}
