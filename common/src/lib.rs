//! A virtual FAT16 drive for UF2 bootloaders.
//!
//! The drive has no storage of its own. Every sector the host reads is computed
//! from the board configuration, a small file table and the firmware currently
//! in flash: `INFO_UF2.TXT`, `INDEX.HTM` and `CURRENT.UF2`, the last being the
//! flash content wrapped in UF2 blocks. Sector writes are scanned for UF2
//! blocks, whose payload is programmed into flash while a [`WriteState`] keeps
//! track of the upload's progress.
//!
//! The USB mass storage stack calls [`GhostFat::read_block`] and
//! [`GhostFat::write_block`] for every sector request.

#![cfg_attr(not(test), no_std)]

pub use crate::{
    flash::{Flash, FlashError, SliceFlash},
    volume::{GhostFat, VolumeError},
    write::{TotalBlocks, WriteOutcome, WriteState},
};
pub use uf2_bootloader_boot_config::{BoardConfig, BuildTimestamp, LevelFilter};

/// Emits the boot sector with the BIOS parameter block.
pub mod boot_sector;
/// Parses the board configuration from JSON.
pub mod config;
pub mod directory;
pub mod fat;
/// The files of the root directory.
pub mod file_table;
/// Provides the trait for the flash partition receiving the firmware.
pub mod flash;
/// Derives the volume layout and checks it against the FAT16 limits.
pub mod geometry;
/// Provides a logger type that writes log output as text lines to a byte sink.
pub mod logger;
pub mod uf2;
mod volume;
/// Tracks which blocks of an upload have arrived.
pub mod write;

pub use geometry::SECTOR_SIZE;
