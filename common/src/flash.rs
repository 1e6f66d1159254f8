use core::fmt;

/// The flash partition that receives the firmware.
///
/// Addresses are relative to the start of the partition. Callers check ranges
/// against [`Flash::size`] before reading or writing.
pub trait Flash {
    /// Size of the partition in bytes.
    fn size(&self) -> u32;

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Programs `data` at `addr`.
    ///
    /// Returns [`FlashError::Busy`] if the write can't be accepted right now; the
    /// same data will be offered again later.
    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError>;

    /// Commits buffered writes. Called once an upload is complete.
    fn flush(&mut self) -> Result<(), FlashError> {
        Ok(())
    }
}

impl<F: Flash + ?Sized> Flash for &mut F {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        (**self).read(addr, buf)
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        (**self).write(addr, data)
    }

    fn flush(&mut self) -> Result<(), FlashError> {
        (**self).flush()
    }
}

/// A flash partition backed by a byte slice, e.g. a RAM staging buffer.
#[derive(Debug)]
pub struct SliceFlash<'a> {
    bytes: &'a mut [u8],
}

impl<'a> SliceFlash<'a> {
    pub fn new(bytes: &'a mut [u8]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.bytes
    }
}

impl Flash for SliceFlash<'_> {
    fn size(&self) -> u32 {
        u32::try_from(self.bytes.len()).unwrap_or(u32::MAX)
    }

    fn read(&self, addr: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let range = checked_range(self.size(), addr, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write(&mut self, addr: u32, data: &[u8]) -> Result<(), FlashError> {
        let range = checked_range(self.size(), addr, data.len())?;
        self.bytes[range].copy_from_slice(data);
        Ok(())
    }
}

/// Returns the byte range `addr..addr + len` if it lies within a partition of `size` bytes.
pub fn checked_range(size: u32, addr: u32, len: usize) -> Result<core::ops::Range<usize>, FlashError> {
    let out_of_bounds = FlashError::OutOfBounds { addr, len };
    let start = addr as usize;
    let end = start.checked_add(len).ok_or(out_of_bounds)?;
    if end > size as usize {
        return Err(out_of_bounds);
    }
    Ok(start..end)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// The flash is still busy with an earlier operation.
    Busy,
    OutOfBounds { addr: u32, len: usize },
    /// The flash driver reported a failure.
    Device,
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashError::Busy => f.write_str("flash is busy"),
            FlashError::OutOfBounds { addr, len } => {
                write!(f, "{len} bytes at {addr:#x} exceed the flash partition")
            }
            FlashError::Device => f.write_str("flash device error"),
        }
    }
}
