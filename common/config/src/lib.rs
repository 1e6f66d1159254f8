#![no_std]

use serde::{Deserialize, Serialize};

/// Configures the virtual drive that the bootloader presents to the host.
///
/// Every value here is fixed at build time. Strings are borrowed so that the
/// configuration can be deserialized in place from a JSON blob without an
/// allocator.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
#[non_exhaustive]
pub struct BoardConfig<'a> {
    /// Volume label, at most 11 characters.
    ///
    /// Used both in the boot sector and as the first root directory entry.
    pub volume_label: &'a str,

    /// Bootloader version reported in `INFO_UF2.TXT`.
    pub version: &'a str,

    /// Human readable product name reported in `INFO_UF2.TXT`.
    pub product_name: &'a str,

    /// Board identifier reported in `INFO_UF2.TXT`.
    pub board_id: &'a str,

    /// Target of the redirect in `INDEX.HTM`.
    pub index_url: &'a str,

    /// UF2 family identifier of the firmware this board accepts.
    pub family_id: u32,

    /// Total number of 512 byte sectors of the emulated drive.
    ///
    /// The default yields a FAT16 volume of slightly more than 32 MiB.
    pub total_sectors: u32,

    /// Number of entries reserved for the root directory.
    pub root_dir_entries: u16,

    /// Number of firmware bytes carried by each synthesized UF2 block.
    pub payload_chunk_size: u32,

    /// Timestamp stamped on every synthesized directory entry.
    pub build_timestamp: BuildTimestamp,

    /// The minimum level of log messages that are emitted.
    ///
    /// The default is [`LevelFilter::Info`].
    pub log_level: LevelFilter,
}

impl<'a> Default for BoardConfig<'a> {
    fn default() -> Self {
        Self {
            volume_label: "ESP32SBOOT",
            version: "0.0.0",
            product_name: "Espressif saola",
            board_id: "adafruit-test-board",
            index_url: "https://adafruit.com",
            family_id: 0xBFDD_4EEE,
            total_sectors: 0x10109,
            root_dir_entries: 64,
            payload_chunk_size: 256,
            build_timestamp: BuildTimestamp::default(),
            log_level: LevelFilter::default(),
        }
    }
}

/// A calendar date and wall clock time, as recorded when the bootloader was built.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(default)]
pub struct BuildTimestamp {
    /// Full year, e.g. `2021`. DOS timestamps can only represent 1980 to 2107.
    pub year: u16,
    /// Month of the year, `1..=12`.
    pub month: u8,
    /// Day of the month, `1..=31`.
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Default for BuildTimestamp {
    fn default() -> Self {
        Self {
            year: 2021,
            month: 1,
            day: 1,
            hour: 0,
            minute: 0,
            second: 0,
        }
    }
}

/// An enum representing the available verbosity level filters of the logger.
///
/// Based on
/// <https://github.com/rust-lang/log/blob/dc32ab999f52805d5ce579b526bd9d9684c38d1a/src/lib.rs#L552-565>
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LevelFilter {
    /// A level lower than all log levels.
    Off,
    /// Corresponds to the `Error` log level.
    Error,
    /// Corresponds to the `Warn` log level.
    Warn,
    /// Corresponds to the `Info` log level.
    Info,
    /// Corresponds to the `Debug` log level.
    Debug,
    /// Corresponds to the `Trace` log level.
    Trace,
}

impl Default for LevelFilter {
    fn default() -> Self {
        Self::Info
    }
}
