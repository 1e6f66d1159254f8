/*!
Host-side tooling for the UF2 mass storage bootloader.

The drive itself lives in the `uf2-bootloader-common` crate and runs on the
device. This crate drives it from a regular operating system: it converts
firmware binaries to UF2 files, dumps the virtual drive into a raw FAT16 image
that can be mounted or inspected, and simulates a host copying a UF2 file onto
the drive.

## Usage

```no_run
use std::path::Path;
use uf2_bootloader::DriveImageBuilder;

let mut builder = DriveImageBuilder::new(Path::new("firmware.bin").to_owned());
builder.set_flash_size(1024 * 1024);
builder.create_drive_image(Path::new("drive.img")).unwrap();
```
*/

use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use uf2_bootloader_common::{file_table::FileEntry, Flash, GhostFat};

pub use uf2_bootloader_boot_config::{BoardConfig, BuildTimestamp, LevelFilter};
pub use uf2_bootloader_common::{WriteOutcome, WriteState};

pub use crate::config::ConfigFile;
pub use crate::file_data_source::FileDataSource;
pub use crate::flash::MemoryFlash;

pub mod config;
pub mod fat;
pub mod flash;
pub mod uf2_file;
pub mod upload;

mod file_data_source;

/// Creates the virtual drive for `config`, mapping its error into [`anyhow`].
pub fn open_drive<'a, F: Flash>(
    config: &BoardConfig,
    files: &'a [FileEntry<'a>],
    flash: F,
) -> anyhow::Result<GhostFat<'a, F>> {
    GhostFat::new(config, files, flash).map_err(|err| anyhow!("invalid drive configuration: {err}"))
}

/// Loads the board configuration at `path`, or the built-in defaults.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<ConfigFile> {
    match path {
        Some(path) => ConfigFile::load(path),
        None => Ok(ConfigFile::from_json("{}")),
    }
}

/// Rounds `len` up to a whole number of payload chunks.
pub fn flash_size_for(len: u64, payload_chunk_size: u32) -> anyhow::Result<u32> {
    let chunk = u64::from(payload_chunk_size.max(1));
    let blocks = ((len + chunk - 1) / chunk).max(1);
    u32::try_from(blocks * chunk).context("firmware does not fit into a 32 bit address space")
}

/// Builds an image of the virtual drive as it appears with a given firmware
/// flashed.
pub struct DriveImageBuilder {
    firmware: FileDataSource,
    flash_size: Option<u32>,
    config_file: Option<PathBuf>,
}

impl DriveImageBuilder {
    /// Starts a drive image for the given raw firmware binary.
    pub fn new(firmware: PathBuf) -> Self {
        Self::from_source(FileDataSource::File(firmware))
    }

    /// Starts a drive image for firmware that is already in memory.
    pub fn from_firmware(firmware: Vec<u8>) -> Self {
        Self::from_source(FileDataSource::Data(firmware))
    }

    fn from_source(firmware: FileDataSource) -> Self {
        Self {
            firmware,
            flash_size: None,
            config_file: None,
        }
    }

    /// Sets the size of the flash partition.
    ///
    /// Defaults to the firmware size rounded up to a whole payload chunk.
    pub fn set_flash_size(&mut self, flash_size: u32) -> &mut Self {
        self.flash_size = Some(flash_size);
        self
    }

    /// Reads the board configuration from a JSON file instead of using the defaults.
    pub fn set_config_file(&mut self, path: &Path) -> &mut Self {
        self.config_file = Some(path.to_owned());
        self
    }

    fn flash(&self, config: &BoardConfig) -> anyhow::Result<MemoryFlash> {
        let firmware = self
            .firmware
            .read_all()
            .context("failed to read firmware")?;
        let flash_size = match self.flash_size {
            Some(size) => size,
            None => flash_size_for(firmware.len() as u64, config.payload_chunk_size)?,
        };
        MemoryFlash::with_firmware(&firmware, flash_size)
    }

    /// Writes a raw FAT16 image of the drive to `out_path`.
    pub fn create_drive_image(&self, out_path: &Path) -> anyhow::Result<()> {
        let config_file = load_config(self.config_file.as_deref())?;
        let config = config_file.board_config()?;
        let flash = self.flash(&config)?;

        let files = uf2_bootloader_common::file_table::StandardFiles::new(&config)
            .map_err(|err| anyhow!("failed to render drive files: {err}"))?;
        let entries = files.entries();
        let drive = open_drive(&config, &entries, flash)?;

        fat::create_drive_image(&drive, out_path)
            .with_context(|| format!("failed to create drive image at `{}`", out_path.display()))
    }
}
