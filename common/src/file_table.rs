//! The fixed set of files shown in the root directory.
//!
//! Every file except the last one has its content inline and occupies a single
//! cluster. The last file is the firmware image, which is synthesized from
//! flash on every read.

use crate::geometry::SECTOR_SIZE;
use core::fmt::{self, Write};
use uf2_bootloader_boot_config::BoardConfig;

/// Length of a space padded 8.3 name.
pub const NAME_LEN: usize = 11;
/// Cluster number of the first file; clusters 0 and 1 are reserved.
pub const FIRST_CLUSTER: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileContent<'a> {
    Inline(&'a [u8]),
    /// The UF2 view of the firmware stored in flash.
    Firmware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileEntry<'a> {
    name: [u8; NAME_LEN],
    content: FileContent<'a>,
}

impl<'a> FileEntry<'a> {
    /// Creates an entry from a raw, already padded 8.3 name such as `*b"INDEX   HTM"`.
    pub const fn new(name: [u8; NAME_LEN], content: FileContent<'a>) -> Self {
        Self { name, content }
    }

    /// Creates an entry from a dotted file name such as `"INFO_UF2.TXT"`.
    pub fn name(&self) -> &[u8; NAME_LEN] {
        &self.name
    }

    pub fn content(&self) -> FileContent<'a> {
        self.content
    }
}

/// A validated list of files: all inline files fit into one sector and exactly
/// one firmware entry comes last.
#[derive(Debug, Clone, Copy)]
pub struct FileTable<'a> {
    entries: &'a [FileEntry<'a>],
}

impl<'a> FileTable<'a> {
    pub fn new(entries: &'a [FileEntry<'a>]) -> Result<Self, FileTableError> {
        let (last, inline) = entries
            .split_last()
            .ok_or(FileTableError::MissingFirmware)?;
        if last.content != FileContent::Firmware {
            return Err(FileTableError::MissingFirmware);
        }
        if !entries.iter().all(|entry| is_short_name(&entry.name)) {
            return Err(FileTableError::InvalidName);
        }
        for (index, entry) in inline.iter().enumerate() {
            match entry.content {
                FileContent::Firmware => return Err(FileTableError::MisplacedFirmware(index)),
                FileContent::Inline(bytes) if bytes.len() > SECTOR_SIZE => {
                    return Err(FileTableError::FileTooLarge {
                        name: entry.name,
                        len: bytes.len(),
                    })
                }
                FileContent::Inline(_) => {}
            }
        }
        Ok(Self { entries })
    }

    /// Number of files, including the firmware.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of single-cluster files in front of the firmware.
    pub fn inline_count(&self) -> usize {
        self.entries.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&FileEntry<'a>> {
        self.entries.get(index)
    }

    /// Cluster numbers are assigned in table order.
    pub fn start_cluster(&self, index: usize) -> u32 {
        index as u32 + FIRST_CLUSTER
    }

    pub fn firmware_start_cluster(&self) -> u32 {
        self.start_cluster(self.inline_count())
    }
}

/// Checks a padded 8.3 name such as `INFO_UF2TXT`: upper case letters, digits
/// and the DOS punctuation, a non-empty base, padding only at the end of each part.
fn is_short_name<'a>(name: &'a [u8; NAME_LEN]) -> bool {
    let (base, extension) = name.split_at(8);
    let trimmed = |part: &'a [u8]| -> &'a [u8] {
        let len = part.iter().rposition(|&c| c != b' ').map_or(0, |last| last + 1);
        &part[..len]
    };
    let (base, extension) = (trimmed(base), trimmed(extension));

    let valid_char =
        |c: &u8| c.is_ascii_uppercase() || c.is_ascii_digit() || b"!#$%&'()-@^_`{}~".contains(c);
    !base.is_empty() && base.iter().chain(extension).all(valid_char)
}

/// Copies `src` into a space padded array, stopping at the first NUL byte.
pub fn space_padded<const N: usize>(src: &[u8]) -> [u8; N] {
    let mut padded = [b' '; N];
    for (dst, &byte) in padded.iter_mut().zip(src.iter().take_while(|&&b| b != 0)) {
        *dst = byte;
    }
    padded
}

/// The content of `INFO_UF2.TXT` and `INDEX.HTM`, rendered from the board configuration.
pub struct StandardFiles {
    info: SectorBuffer,
    index: SectorBuffer,
}

impl StandardFiles {
    pub fn new(config: &BoardConfig) -> Result<Self, FileTableError> {
        let mut info = SectorBuffer::new();
        write!(
            info,
            "UF2 Bootloader {}\r\nModel: {}\r\nBoard-ID: {}\r\n",
            config.version, config.product_name, config.board_id
        )
        .map_err(|_| FileTableError::FileTooLarge {
            name: *b"INFO_UF2TXT",
            len: info.overflow_len(),
        })?;

        let mut index = SectorBuffer::new();
        write!(
            index,
            "<!doctype html>\n<html><body><script>\nlocation.replace(\"{}\");\n</script></body></html>\n",
            config.index_url
        )
        .map_err(|_| FileTableError::FileTooLarge {
            name: *b"INDEX   HTM",
            len: index.overflow_len(),
        })?;

        Ok(Self { info, index })
    }

    pub fn info_uf2(&self) -> &[u8] {
        self.info.as_bytes()
    }

    pub fn index_htm(&self) -> &[u8] {
        self.index.as_bytes()
    }

    /// The standard file table: `INFO_UF2.TXT`, `INDEX.HTM` and `CURRENT.UF2`.
    pub fn entries(&self) -> [FileEntry<'_>; 3] {
        [
            FileEntry::new(*b"INFO_UF2TXT", FileContent::Inline(self.info_uf2())),
            FileEntry::new(*b"INDEX   HTM", FileContent::Inline(self.index_htm())),
            FileEntry::new(*b"CURRENT UF2", FileContent::Firmware),
        ]
    }
}

/// A sector sized text buffer that fails instead of truncating.
struct SectorBuffer {
    bytes: [u8; SECTOR_SIZE],
    len: usize,
    overflow: usize,
}

impl SectorBuffer {
    fn new() -> Self {
        Self {
            bytes: [0; SECTOR_SIZE],
            len: 0,
            overflow: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn overflow_len(&self) -> usize {
        self.len + self.overflow
    }
}

impl Write for SectorBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let remaining = SECTOR_SIZE - self.len;
        if s.len() > remaining || self.overflow > 0 {
            self.overflow += s.len();
            return Err(fmt::Error);
        }
        self.bytes[self.len..][..s.len()].copy_from_slice(s.as_bytes());
        self.len += s.len();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTableError {
    /// The table is empty or its last entry is not the firmware.
    MissingFirmware,
    /// A firmware entry appears before the end of the table.
    MisplacedFirmware(usize),
    /// Inline content does not fit into a single sector.
    FileTooLarge { name: [u8; NAME_LEN], len: usize },
    /// The name is not a valid upper case 8.3 name.
    InvalidName,
}

impl fmt::Display for FileTableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileTableError::MissingFirmware => {
                f.write_str("the last file table entry must be the firmware")
            }
            FileTableError::MisplacedFirmware(index) => {
                write!(f, "firmware entry at index {index} is not the last entry")
            }
            FileTableError::FileTooLarge { name, len } => write!(
                f,
                "`{}` has {len} bytes, more than one {SECTOR_SIZE} byte sector",
                name.escape_ascii()
            ),
            FileTableError::InvalidName => f.write_str("invalid 8.3 file name"),
        }
    }
}
