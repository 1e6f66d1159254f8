//! Reading and writing UF2 files, i.e. sequences of UF2 blocks.

use thiserror::Error;
use uf2_bootloader_common::uf2::{
    flags, Block, BlockError, BlockHeader, BLOCK_SIZE, MAX_PAYLOAD_SIZE,
};

/// Largest flash image [`extract_image`] reassembles.
pub const MAX_IMAGE_SIZE: u64 = 64 * 1024 * 1024;

/// Parameters for wrapping a raw firmware binary into UF2 blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Flash address of the first firmware byte.
    pub base_address: u32,
    pub family_id: u32,
    /// Firmware bytes per block.
    pub payload_size: u32,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            base_address: 0,
            family_id: 0xBFDD_4EEE,
            payload_size: 256,
        }
    }
}

/// Wraps `firmware` into a UF2 file.
///
/// Every block carries the family id; the last block's payload is zero padded
/// to `payload_size`.
pub fn convert_to_uf2(firmware: &[u8], options: &ConvertOptions) -> Result<Vec<u8>, Uf2FileError> {
    let payload_size = options.payload_size;
    if payload_size == 0 || payload_size as usize > MAX_PAYLOAD_SIZE {
        return Err(Uf2FileError::InvalidPayloadSize(payload_size));
    }
    let end = u64::from(options.base_address) + firmware.len() as u64;
    if end > u64::from(u32::MAX) + 1 {
        return Err(Uf2FileError::AddressOverflow {
            base: options.base_address,
            len: firmware.len(),
        });
    }

    let chunks = firmware.chunks(payload_size as usize);
    let num_blocks = chunks.len() as u32;
    let mut out = vec![0; chunks.len() * BLOCK_SIZE];
    let mut payload = vec![0; payload_size as usize];

    for ((block_no, chunk), raw) in chunks.enumerate().zip(out.chunks_exact_mut(BLOCK_SIZE)) {
        payload.fill(0);
        payload[..chunk.len()].copy_from_slice(chunk);

        let block = Block {
            header: BlockHeader {
                flags: flags::FAMILY_ID_PRESENT,
                target_addr: options.base_address + block_no as u32 * payload_size,
                payload_size,
                block_no: block_no as u32,
                num_blocks,
                family_id: options.family_id,
            },
            payload: &payload,
        };
        let raw: &mut [u8; BLOCK_SIZE] = raw
            .try_into()
            .map_err(|_| Uf2FileError::NotBlockAligned(firmware.len()))?;
        block
            .encode(raw)
            .map_err(|reason| Uf2FileError::InvalidBlock {
                index: block_no,
                reason,
            })?;
    }
    Ok(out)
}

/// Splits a UF2 file into its raw 512 byte sectors.
pub fn sectors(file: &[u8]) -> Result<impl Iterator<Item = &[u8; BLOCK_SIZE]>, Uf2FileError> {
    if file.len() % BLOCK_SIZE != 0 {
        return Err(Uf2FileError::NotBlockAligned(file.len()));
    }
    Ok(file
        .chunks_exact(BLOCK_SIZE)
        .filter_map(|chunk| <&[u8; BLOCK_SIZE]>::try_from(chunk).ok()))
}

/// Parses every block of a UF2 file.
pub fn parse_uf2(file: &[u8]) -> Result<Vec<Block<'_>>, Uf2FileError> {
    sectors(file)?
        .enumerate()
        .map(|(index, raw)| {
            Block::parse(raw).map_err(|reason| Uf2FileError::InvalidBlock { index, reason })
        })
        .collect()
}

/// Reassembles the flash content described by a UF2 file.
///
/// Only blocks of `family_id` that are meant for main flash are used. Returns
/// the lowest target address and the bytes from there on; gaps are filled with
/// `fill`. Images spanning more than [`MAX_IMAGE_SIZE`] bytes are refused.
pub fn extract_image(file: &[u8], family_id: u32, fill: u8) -> Result<(u32, Vec<u8>), Uf2FileError> {
    let blocks: Vec<_> = parse_uf2(file)?
        .into_iter()
        .filter(|block| block.header.is_flashable() && block.header.family_id == family_id)
        .collect();

    let Some(base) = blocks.iter().map(|block| block.header.target_addr).min() else {
        return Ok((0, Vec::new()));
    };
    let end = blocks
        .iter()
        .map(|block| u64::from(block.header.target_addr) + block.payload.len() as u64)
        .max()
        .unwrap_or(u64::from(base));
    if end - u64::from(base) > MAX_IMAGE_SIZE {
        return Err(Uf2FileError::ImageTooLarge { base, end });
    }

    let mut image = vec![fill; (end - u64::from(base)) as usize];
    for block in blocks {
        let offset = (block.header.target_addr - base) as usize;
        image[offset..][..block.payload.len()].copy_from_slice(block.payload);
    }
    Ok((base, image))
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Uf2FileError {
    #[error("UF2 file length {0} is not a multiple of {BLOCK_SIZE} bytes")]
    NotBlockAligned(usize),

    #[error("block {index} is not a valid UF2 block: {reason}")]
    InvalidBlock { index: usize, reason: BlockError },

    #[error("payload size {0} is not within 1..={MAX_PAYLOAD_SIZE}")]
    InvalidPayloadSize(u32),

    #[error("blocks span {base:#x}..{end:#x}, more than {MAX_IMAGE_SIZE} bytes")]
    ImageTooLarge { base: u32, end: u64 },

    #[error("{len} bytes at {base:#x} exceed the 32 bit address space")]
    AddressOverflow { base: u32, len: usize },
}
