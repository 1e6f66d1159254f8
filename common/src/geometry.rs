//! Layout of the virtual FAT16 volume.
//!
//! The volume is laid out as
//!
//! ```text
//! | boot sector | FAT 0 | FAT 1 | root directory | clusters ... |
//! ```
//!
//! with one sector per cluster. Every boundary is derived from the total sector
//! count and the root directory capacity; nothing is stored.

use core::fmt;

pub const SECTOR_SIZE: usize = 512;
pub const SECTORS_PER_CLUSTER: u32 = 1;
pub const RESERVED_SECTORS: u32 = 1;
pub const FAT_COPIES: u32 = 2;
pub const DIR_ENTRY_SIZE: usize = 32;
pub const DIR_ENTRIES_PER_SECTOR: usize = SECTOR_SIZE / DIR_ENTRY_SIZE;
pub const FAT_ENTRY_SIZE: usize = 2;
pub const FAT_ENTRIES_PER_SECTOR: u32 = (SECTOR_SIZE / FAT_ENTRY_SIZE) as u32;

/// Smallest accepted cluster count.
///
/// FAT16 starts at 0x0FF5 clusters, but several FAT drivers are off by a few
/// clusters, so stay 32 clusters clear of both limits.
pub const MIN_CLUSTER_COUNT: u32 = 0x1015;
/// Exclusive upper bound of the cluster count, 32 below the FAT32 threshold 0xFFF5.
pub const MAX_CLUSTER_COUNT: u32 = 0xFFD5;

const _: () = assert!(SECTOR_SIZE == 512);
const _: () = assert!(SECTORS_PER_CLUSTER == 1);
const _: () = assert!(FAT_COPIES == 2);
const _: () = assert!(DIR_ENTRY_SIZE == 32);
const _: () = assert!(SECTOR_SIZE % DIR_ENTRY_SIZE == 0);
const _: () = assert!(SECTOR_SIZE * SECTORS_PER_CLUSTER as usize <= 32 * 1024);
const _: () = assert!(FAT_ENTRIES_PER_SECTOR == 256);

/// The derived layout constants of the volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    total_sectors: u32,
    root_dir_entries: u16,
    sectors_per_fat: u32,
    root_dir_sectors: u32,
    cluster_count: u32,
}

/// The area of the volume a sector belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    BootSector,
    /// A sector of either FAT copy; `sector` is relative to the start of that copy.
    Fat { copy: u32, sector: u32 },
    /// A sector of the root directory, relative to its start.
    RootDirectory { sector: u32 },
    /// A sector of the cluster heap; `cluster_offset` 0 is cluster number 2.
    Data { cluster_offset: u32 },
    OutOfRange,
}

impl Geometry {
    /// Derives the layout and checks every FAT16 constraint.
    ///
    /// `dir_entries` is the number of root directory entries that will be
    /// populated, including the volume label.
    pub fn new(
        total_sectors: u32,
        root_dir_entries: u16,
        dir_entries: usize,
    ) -> Result<Self, GeometryError> {
        if root_dir_entries == 0 || root_dir_entries as usize % DIR_ENTRIES_PER_SECTOR != 0 {
            return Err(GeometryError::RootDirectoryMisaligned(root_dir_entries));
        }
        // the directory must end with an unused entry, which marks its end
        if dir_entries >= DIR_ENTRIES_PER_SECTOR || dir_entries >= root_dir_entries as usize {
            return Err(GeometryError::DirectoryOverflow {
                entries: dir_entries,
            });
        }

        // the FAT may be larger than the cluster count requires
        let sectors_per_fat = total_sectors.div_ceil(FAT_ENTRIES_PER_SECTOR);
        let root_dir_sectors = root_dir_entries as u32 / DIR_ENTRIES_PER_SECTOR as u32;
        let metadata_sectors = RESERVED_SECTORS + FAT_COPIES * sectors_per_fat + root_dir_sectors;
        let cluster_count = total_sectors.saturating_sub(metadata_sectors) / SECTORS_PER_CLUSTER;
        if !(MIN_CLUSTER_COUNT..MAX_CLUSTER_COUNT).contains(&cluster_count) {
            return Err(GeometryError::ClusterCount(cluster_count));
        }

        Ok(Self {
            total_sectors,
            root_dir_entries,
            sectors_per_fat,
            root_dir_sectors,
            cluster_count,
        })
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn root_dir_entries(&self) -> u16 {
        self.root_dir_entries
    }

    pub fn sectors_per_fat(&self) -> u32 {
        self.sectors_per_fat
    }

    pub fn root_dir_sectors(&self) -> u32 {
        self.root_dir_sectors
    }

    pub fn cluster_count(&self) -> u32 {
        self.cluster_count
    }

    pub fn fat0_start(&self) -> u32 {
        RESERVED_SECTORS
    }

    pub fn fat1_start(&self) -> u32 {
        self.fat0_start() + self.sectors_per_fat
    }

    pub fn root_dir_start(&self) -> u32 {
        self.fat1_start() + self.sectors_per_fat
    }

    pub fn data_start(&self) -> u32 {
        self.root_dir_start() + self.root_dir_sectors
    }

    /// Classifies the given sector index.
    pub fn region(&self, sector: u32) -> Region {
        if sector == 0 {
            Region::BootSector
        } else if sector < self.fat0_start() {
            // there are no other reserved sectors
            Region::OutOfRange
        } else if sector < self.root_dir_start() {
            let sector = sector - self.fat0_start();
            Region::Fat {
                copy: sector / self.sectors_per_fat,
                sector: sector % self.sectors_per_fat,
            }
        } else if sector < self.data_start() {
            Region::RootDirectory {
                sector: sector - self.root_dir_start(),
            }
        } else if sector < self.total_sectors {
            Region::Data {
                cluster_offset: (sector - self.data_start()) / SECTORS_PER_CLUSTER,
            }
        } else {
            Region::OutOfRange
        }
    }
}

/// A volume layout that no FAT16 reader would accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// The cluster count lies outside `MIN_CLUSTER_COUNT..MAX_CLUSTER_COUNT`.
    ClusterCount(u32),
    /// The root directory capacity is zero or not a whole number of sectors.
    RootDirectoryMisaligned(u16),
    /// The label and files do not fit into the first root directory sector.
    DirectoryOverflow { entries: usize },
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::ClusterCount(count) => write!(
                f,
                "cluster count {count:#x} is outside the FAT16 range \
                 {MIN_CLUSTER_COUNT:#x}..{MAX_CLUSTER_COUNT:#x}"
            ),
            GeometryError::RootDirectoryMisaligned(entries) => write!(
                f,
                "root directory capacity {entries} is not a non-zero multiple of \
                 {DIR_ENTRIES_PER_SECTOR}"
            ),
            GeometryError::DirectoryOverflow { entries } => write!(
                f,
                "{entries} directory entries leave no unused entry in the first \
                 root directory sector"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_board_layout() {
        let geometry = Geometry::new(0x10109, 64, 4).unwrap();
        assert_eq!(geometry.sectors_per_fat(), 258);
        assert_eq!(geometry.root_dir_sectors(), 4);
        assert_eq!(geometry.fat0_start(), 1);
        assert_eq!(geometry.fat1_start(), 259);
        assert_eq!(geometry.root_dir_start(), 517);
        assert_eq!(geometry.data_start(), 521);
        assert_eq!(geometry.cluster_count(), 0x10109 - 521);
    }

    #[test]
    fn regions() {
        let geometry = Geometry::new(8000, 64, 4).unwrap();
        assert_eq!(geometry.sectors_per_fat(), 32);
        assert_eq!(geometry.region(0), Region::BootSector);
        assert_eq!(geometry.region(1), Region::Fat { copy: 0, sector: 0 });
        assert_eq!(geometry.region(32), Region::Fat { copy: 0, sector: 31 });
        assert_eq!(geometry.region(33), Region::Fat { copy: 1, sector: 0 });
        assert_eq!(geometry.region(65), Region::RootDirectory { sector: 0 });
        assert_eq!(geometry.region(68), Region::RootDirectory { sector: 3 });
        assert_eq!(geometry.region(69), Region::Data { cluster_offset: 0 });
        assert_eq!(
            geometry.region(7999),
            Region::Data {
                cluster_offset: 7930
            }
        );
        assert_eq!(geometry.region(8000), Region::OutOfRange);
    }

    #[test]
    fn cluster_count_limits() {
        // 4160 - 1 - 2 * 17 - 4 = 4121 = 0x1019
        assert!(Geometry::new(4160, 64, 4).is_ok());
        assert_eq!(
            Geometry::new(4150, 64, 4),
            Err(GeometryError::ClusterCount(4111))
        );
        assert_eq!(
            Geometry::new(100, 64, 4),
            Err(GeometryError::ClusterCount(93))
        );
        assert!(matches!(
            Geometry::new(0x10500, 64, 4),
            Err(GeometryError::ClusterCount(_))
        ));
    }

    #[test]
    fn directory_capacity() {
        assert_eq!(
            Geometry::new(8000, 60, 4),
            Err(GeometryError::RootDirectoryMisaligned(60))
        );
        assert_eq!(
            Geometry::new(8000, 0, 1),
            Err(GeometryError::RootDirectoryMisaligned(0))
        );
        assert!(Geometry::new(8000, 16, 15).is_ok());
        assert!(Geometry::new(8000, 16, 16).is_err());
        assert!(Geometry::new(8000, 64, 16).is_err());
        assert!(Geometry::new(8000, 64, 15).is_ok());
    }
}
