use anyhow::{bail, Context};
use std::{fs, path::Path};
use uf2_bootloader_common::{flash::checked_range, Flash, FlashError};

/// Value of erased NOR flash.
pub const ERASED: u8 = 0xFF;

/// An in-memory flash partition.
///
/// Can be told to report [`FlashError::Busy`] for a number of writes to
/// exercise the retry path of the drive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryFlash {
    bytes: Vec<u8>,
    busy_writes: u32,
    flushes: u32,
}

impl MemoryFlash {
    /// Creates an erased partition of `size` bytes.
    pub fn erased(size: u32) -> Self {
        Self::from_bytes(vec![ERASED; size as usize])
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            busy_writes: 0,
            flushes: 0,
        }
    }

    /// Creates a partition of `size` bytes holding `firmware` at its start.
    pub fn with_firmware(firmware: &[u8], size: u32) -> anyhow::Result<Self> {
        if firmware.len() > size as usize {
            bail!(
                "firmware of {} bytes does not fit into a {} byte flash partition",
                firmware.len(),
                size
            );
        }
        let mut flash = Self::erased(size);
        flash.bytes[..firmware.len()].copy_from_slice(firmware);
        Ok(flash)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path)
            .with_context(|| format!("failed to read flash image `{}`", path.display()))?;
        Ok(Self::from_bytes(bytes))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, &self.bytes)
            .with_context(|| format!("failed to write flash image `{}`", path.display()))
    }

    /// Makes the next `count` writes fail with [`FlashError::Busy`].
    pub fn inject_busy_writes(&mut self, count: u32) {
        self.busy_writes = count;
    }

    /// How often the partition was flushed.
    pub fn flushes(&self) -> u32 {
        self.flushes
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl Flash for MemoryFlash {
    fn size(&self) -> u32 {
        u32::try_from(self.bytes.len()).unwrap_or(u32::MAX)
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let range = checked_range(self.size(), addr, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        if self.busy_writes > 0 {
            self.busy_writes -= 1;
            return Err(FlashError::Busy);
        }
        let range = checked_range(self.size(), addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), FlashError> {
        self.flushes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn firmware_is_padded_with_erased_bytes() {
        let flash = MemoryFlash::with_firmware(&[1, 2, 3], 8).unwrap();
        assert_eq!(flash.as_bytes(), &[1, 2, 3, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(MemoryFlash::with_firmware(&[0; 9], 8).is_err());
    }

    #[test]
    fn busy_writes_are_not_applied() {
        let mut flash = MemoryFlash::erased(4);
        flash.inject_busy_writes(1);
        assert_eq!(flash.write(0, &[0]), Err(FlashError::Busy));
        assert_eq!(flash.as_bytes(), &[0xFF; 4]);
        flash.write(0, &[0]).unwrap();
        assert_eq!(flash.as_bytes(), &[0, 0xFF, 0xFF, 0xFF]);
    }
}
