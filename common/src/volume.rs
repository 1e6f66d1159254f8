use crate::{
    boot_sector::write_boot_sector,
    directory::{DosTimestamp, RootDirectory},
    fat::write_fat_sector,
    file_table::{space_padded, FileContent, FileEntry, FileTable, FileTableError, NAME_LEN},
    flash::{checked_range, Flash, FlashError},
    geometry::{Geometry, GeometryError, Region, SECTOR_SIZE},
    uf2::{self, Block, BlockHeader, MAX_PAYLOAD_SIZE},
    write::{WriteOutcome, WriteState},
};
use core::fmt;
use uf2_bootloader_boot_config::BoardConfig;

/// The virtual FAT16 drive.
///
/// Owns everything a sector read or write depends on: the validated layout, the
/// file table and the flash partition holding the firmware. Reads are computed
/// from scratch on every call; the only mutable state of an upload lives in the
/// [`WriteState`] the caller passes to [`GhostFat::write_block`].
pub struct GhostFat<'a, F> {
    geometry: Geometry,
    files: FileTable<'a>,
    volume_label: [u8; NAME_LEN],
    timestamp: DosTimestamp,
    family_id: u32,
    payload_chunk_size: u32,
    firmware_blocks: u32,
    flash: F,
}

impl<'a, F: Flash> GhostFat<'a, F> {
    /// Validates the configuration and creates the drive.
    ///
    /// Fails if the resulting volume would not be a valid FAT16 volume or the
    /// firmware view of `flash` does not fit into it.
    pub fn new(
        config: &BoardConfig,
        files: &'a [FileEntry<'a>],
        flash: F,
    ) -> Result<Self, VolumeError> {
        let files = FileTable::new(files)?;
        // the volume label occupies one directory entry
        let geometry = Geometry::new(config.total_sectors, config.root_dir_entries, files.len() + 1)?;

        if config.volume_label.len() > NAME_LEN || !config.volume_label.is_ascii() {
            return Err(VolumeError::InvalidVolumeLabel);
        }

        let payload_chunk_size = config.payload_chunk_size;
        if payload_chunk_size == 0 || payload_chunk_size as usize > MAX_PAYLOAD_SIZE {
            return Err(VolumeError::InvalidPayloadChunkSize(payload_chunk_size));
        }
        let flash_size = flash.size();
        if flash_size == 0 || flash_size % payload_chunk_size != 0 {
            return Err(VolumeError::FlashSizeMisaligned {
                flash_size,
                payload_chunk_size,
            });
        }

        let firmware_blocks = flash_size / payload_chunk_size;
        let available = geometry.cluster_count() - files.inline_count() as u32;
        if firmware_blocks > available {
            return Err(VolumeError::FirmwareTooLarge {
                blocks: firmware_blocks,
                available,
            });
        }

        log::info!(
            "Virtual drive: {} sectors, {} per FAT, {} clusters, data at sector {}",
            geometry.total_sectors(),
            geometry.sectors_per_fat(),
            geometry.cluster_count(),
            geometry.data_start()
        );
        log::info!(
            "Firmware: {:#x} bytes of flash as {} UF2 blocks",
            flash_size,
            firmware_blocks
        );

        Ok(Self {
            geometry,
            files,
            volume_label: space_padded(config.volume_label.as_bytes()),
            timestamp: config.build_timestamp.into(),
            family_id: config.family_id,
            payload_chunk_size,
            firmware_blocks,
            flash,
        })
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn files(&self) -> &FileTable<'a> {
        &self.files
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    pub fn into_flash(self) -> F {
        self.flash
    }

    /// Number of UF2 blocks in `CURRENT.UF2`, one per payload chunk of flash.
    pub fn firmware_blocks(&self) -> u32 {
        self.firmware_blocks
    }

    /// Size of `CURRENT.UF2` in bytes.
    pub fn firmware_size(&self) -> u32 {
        self.firmware_blocks * SECTOR_SIZE as u32
    }

    /// Fills `out` with the content of sector `sector`.
    ///
    /// Sectors past the end of the volume read as zeros.
    pub fn read_block(&self, sector: u32, out: &mut [u8; SECTOR_SIZE]) {
        out.fill(0);

        match self.geometry.region(sector) {
            Region::BootSector => write_boot_sector(&self.geometry, &self.volume_label, out),
            Region::Fat { sector, .. } => {
                write_fat_sector(&self.files, self.firmware_blocks, sector, out)
            }
            Region::RootDirectory { sector } => RootDirectory {
                files: &self.files,
                volume_label: &self.volume_label,
                timestamp: self.timestamp,
                firmware_size: self.firmware_size(),
            }
            .write_sector(sector, out),
            Region::Data { cluster_offset } => self.read_cluster(cluster_offset, out),
            Region::OutOfRange => {
                log::warn!("Read of sector {} beyond the end of the volume", sector)
            }
        }
    }

    fn read_cluster(&self, cluster_offset: u32, out: &mut [u8; SECTOR_SIZE]) {
        let index = cluster_offset as usize;
        if index < self.files.inline_count() {
            if let Some(FileContent::Inline(bytes)) = self.files.get(index).map(|f| f.content()) {
                out[..bytes.len()].copy_from_slice(bytes);
            }
        } else {
            let block_no = cluster_offset - self.files.inline_count() as u32;
            self.read_firmware_block(block_no, out);
        }
    }

    /// Synthesizes block `block_no` of `CURRENT.UF2` from flash.
    fn read_firmware_block(&self, block_no: u32, out: &mut [u8; SECTOR_SIZE]) {
        // past the end of the firmware the file has no more blocks
        if block_no >= self.firmware_blocks {
            return;
        }
        let addr = block_no * self.payload_chunk_size;
        let header = BlockHeader {
            flags: uf2::flags::FAMILY_ID_PRESENT,
            target_addr: addr,
            payload_size: self.payload_chunk_size,
            block_no,
            num_blocks: self.firmware_blocks,
            family_id: self.family_id,
        };
        header.write_to(out);

        let payload = &mut uf2::payload_mut(out)[..self.payload_chunk_size as usize];
        if let Err(err) = self.flash.read(addr, payload) {
            log::error!("Failed to read flash at {:#x}: {}", addr, err);
            out.fill(0);
        }
    }

    /// Offers a sector write from the host.
    ///
    /// Sectors that are not UF2 blocks for main flash are rejected without
    /// touching `state`; hosts routinely write filesystem metadata. Payloads of
    /// blocks for this board's family are programmed right away, before the
    /// block is recorded, so a busy flash leaves `state` unchanged. Any other
    /// flash failure is logged and the block is still recorded. Once the last
    /// block of the upload is recorded, the flash is flushed.
    pub fn write_block<const N: usize, const M: u32>(
        &mut self,
        sector: u32,
        data: &[u8; SECTOR_SIZE],
        state: &mut WriteState<N, M>,
    ) -> WriteOutcome {
        let block = match Block::parse(data) {
            Ok(block) if block.header.is_flashable() => block,
            Ok(_) => {
                log::trace!("Sector {}: UF2 block not meant for main flash", sector);
                return WriteOutcome::Rejected;
            }
            Err(err) => {
                log::trace!("Sector {}: {}", sector, err);
                return WriteOutcome::Rejected;
            }
        };

        if block.header.family_id == self.family_id {
            match self.program(&block) {
                Ok(()) => {}
                Err(FlashError::Busy) => return WriteOutcome::RetryLater,
                Err(err) => log::error!(
                    "Failed to program block {} at {:#x}: {}",
                    block.header.block_no,
                    block.header.target_addr,
                    err
                ),
            }
        } else {
            log::debug!(
                "Block {} is for family {:#x}, not programming it",
                block.header.block_no,
                block.header.family_id
            );
        }

        let was_complete = state.is_complete();
        state.record(&block.header);
        if !was_complete && state.is_complete() {
            log::info!("Upload complete: {} blocks written", state.num_written());
            if let Err(err) = self.flash.flush() {
                log::error!("Failed to flush flash: {}", err);
            }
        }
        WriteOutcome::Accepted
    }

    fn program(&mut self, block: &Block) -> Result<(), FlashError> {
        let addr = block.header.target_addr;
        if checked_range(self.flash.size(), addr, block.payload.len()).is_err() {
            log::warn!(
                "Block {} targets {:#x}..{:#x}, outside of the flash partition",
                block.header.block_no,
                addr,
                u64::from(addr) + block.payload.len() as u64
            );
            return Ok(());
        }
        self.flash.write(addr, block.payload)
    }
}

/// A configuration that can't be presented as a volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeError {
    Geometry(GeometryError),
    FileTable(FileTableError),
    /// The label is longer than 11 characters or not ASCII.
    InvalidVolumeLabel,
    /// The chunk size is zero or doesn't fit into a UF2 block.
    InvalidPayloadChunkSize(u32),
    /// The flash is empty or not a whole number of payload chunks.
    FlashSizeMisaligned {
        flash_size: u32,
        payload_chunk_size: u32,
    },
    /// `CURRENT.UF2` needs more clusters than the volume has left.
    FirmwareTooLarge { blocks: u32, available: u32 },
}

impl From<GeometryError> for VolumeError {
    fn from(err: GeometryError) -> Self {
        VolumeError::Geometry(err)
    }
}

impl From<FileTableError> for VolumeError {
    fn from(err: FileTableError) -> Self {
        VolumeError::FileTable(err)
    }
}

impl fmt::Display for VolumeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeError::Geometry(err) => write!(f, "invalid volume geometry: {err}"),
            VolumeError::FileTable(err) => write!(f, "invalid file table: {err}"),
            VolumeError::InvalidVolumeLabel => {
                f.write_str("volume label must be at most 11 ASCII characters")
            }
            VolumeError::InvalidPayloadChunkSize(size) => write!(
                f,
                "payload chunk size {size} is not within 1..={MAX_PAYLOAD_SIZE}"
            ),
            VolumeError::FlashSizeMisaligned {
                flash_size,
                payload_chunk_size,
            } => write!(
                f,
                "flash size {flash_size:#x} is not a non-zero multiple of the \
                 {payload_chunk_size} byte payload chunk"
            ),
            VolumeError::FirmwareTooLarge { blocks, available } => write!(
                f,
                "firmware needs {blocks} clusters but only {available} are available"
            ),
        }
    }
}
