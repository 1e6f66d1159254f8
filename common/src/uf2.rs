//! Encoding and decoding of UF2 blocks.
//!
//! A UF2 block is exactly one 512 byte sector. All fields are little endian:
//!
//! | offset | size | field                                   |
//! |--------|------|-----------------------------------------|
//! | 0      | 4    | first magic, `0x0A324655` ("UF2\n")     |
//! | 4      | 4    | second magic, `0x9E5D5157`              |
//! | 8      | 4    | flags                                   |
//! | 12     | 4    | target address in flash                 |
//! | 16     | 4    | number of payload bytes used            |
//! | 20     | 4    | sequential block number, starts at 0    |
//! | 24     | 4    | total number of blocks in the file      |
//! | 28     | 4    | family id (or file size, see flags)     |
//! | 32     | 476  | payload, zero padded                    |
//! | 508    | 4    | final magic, `0x0AB16F30`               |
//!
//! See <https://github.com/microsoft/uf2> for the full format description.

use core::fmt;

/// Size of an encoded block in bytes.
pub const BLOCK_SIZE: usize = 512;
/// Maximum number of payload bytes that fit into one block.
pub const MAX_PAYLOAD_SIZE: usize = 476;

pub const MAGIC_START0: u32 = 0x0A32_4655;
pub const MAGIC_START1: u32 = 0x9E5D_5157;
pub const MAGIC_END: u32 = 0x0AB1_6F30;

/// Bits of the `flags` field.
pub mod flags {
    /// The block must not be written to main flash.
    pub const NOT_MAIN_FLASH: u32 = 0x0000_0001;
    /// The block is part of a file container; `family_id` holds the file size.
    pub const FILE_CONTAINER: u32 = 0x0000_1000;
    /// The `family_id` field is valid.
    pub const FAMILY_ID_PRESENT: u32 = 0x0000_2000;
    /// The payload carries an MD5 checksum of the region at its end.
    pub const MD5_CHECKSUM_PRESENT: u32 = 0x0000_4000;
    /// Extension tags follow the payload.
    pub const EXTENSION_TAGS_PRESENT: u32 = 0x0000_8000;
}

mod offsets {
    pub const MAGIC_START0: usize = 0;
    pub const MAGIC_START1: usize = 4;
    pub const FLAGS: usize = 8;
    pub const TARGET_ADDR: usize = 12;
    pub const PAYLOAD_SIZE: usize = 16;
    pub const BLOCK_NO: usize = 20;
    pub const NUM_BLOCKS: usize = 24;
    pub const FAMILY_ID: usize = 28;
    pub const DATA: usize = 32;
    pub const MAGIC_END: usize = 508;
}

const _: () = assert!(offsets::DATA + MAX_PAYLOAD_SIZE == offsets::MAGIC_END);
const _: () = assert!(offsets::MAGIC_END + 4 == BLOCK_SIZE);

/// The metadata of a UF2 block, i.e. everything except magics and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockHeader {
    pub flags: u32,
    pub target_addr: u32,
    pub payload_size: u32,
    pub block_no: u32,
    pub num_blocks: u32,
    pub family_id: u32,
}

impl BlockHeader {
    /// Parses the header of the given block, checking all three magics and the payload size.
    pub fn parse(raw: &[u8; BLOCK_SIZE]) -> Result<Self, BlockError> {
        if read_u32(raw, offsets::MAGIC_START0) != MAGIC_START0
            || read_u32(raw, offsets::MAGIC_START1) != MAGIC_START1
            || read_u32(raw, offsets::MAGIC_END) != MAGIC_END
        {
            return Err(BlockError::BadMagic);
        }

        let header = Self {
            flags: read_u32(raw, offsets::FLAGS),
            target_addr: read_u32(raw, offsets::TARGET_ADDR),
            payload_size: read_u32(raw, offsets::PAYLOAD_SIZE),
            block_no: read_u32(raw, offsets::BLOCK_NO),
            num_blocks: read_u32(raw, offsets::NUM_BLOCKS),
            family_id: read_u32(raw, offsets::FAMILY_ID),
        };
        if header.payload_size as usize > MAX_PAYLOAD_SIZE {
            return Err(BlockError::PayloadTooLarge(header.payload_size));
        }
        Ok(header)
    }

    pub fn has_flag(&self, flag: u32) -> bool {
        self.flags & flag != 0
    }

    /// Whether the block carries a family id and is meant for main flash.
    ///
    /// Only such blocks are accepted by the bootloader.
    pub fn is_flashable(&self) -> bool {
        self.has_flag(flags::FAMILY_ID_PRESENT) && !self.has_flag(flags::NOT_MAIN_FLASH)
    }

    /// Writes the magics and this header into `out`.
    ///
    /// The payload area is left untouched, so callers can fill it in place through
    /// [`payload_mut`].
    pub fn write_to(&self, out: &mut [u8; BLOCK_SIZE]) {
        write_u32(out, offsets::MAGIC_START0, MAGIC_START0);
        write_u32(out, offsets::MAGIC_START1, MAGIC_START1);
        write_u32(out, offsets::FLAGS, self.flags);
        write_u32(out, offsets::TARGET_ADDR, self.target_addr);
        write_u32(out, offsets::PAYLOAD_SIZE, self.payload_size);
        write_u32(out, offsets::BLOCK_NO, self.block_no);
        write_u32(out, offsets::NUM_BLOCKS, self.num_blocks);
        write_u32(out, offsets::FAMILY_ID, self.family_id);
        write_u32(out, offsets::MAGIC_END, MAGIC_END);
    }
}

/// A decoded UF2 block borrowing its payload from the raw sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block<'a> {
    pub header: BlockHeader,
    pub payload: &'a [u8],
}

impl<'a> Block<'a> {
    pub fn parse(raw: &'a [u8; BLOCK_SIZE]) -> Result<Self, BlockError> {
        let header = BlockHeader::parse(raw)?;
        let payload = &raw[offsets::DATA..][..header.payload_size as usize];
        Ok(Self { header, payload })
    }

    /// Encodes the block into `out`, zero-padding the unused payload area.
    ///
    /// The `payload_size` field is taken from the length of `payload`.
    pub fn encode(&self, out: &mut [u8; BLOCK_SIZE]) -> Result<(), BlockError> {
        if self.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(BlockError::PayloadTooLarge(self.payload.len() as u32));
        }
        out.fill(0);
        let header = BlockHeader {
            payload_size: self.payload.len() as u32,
            ..self.header
        };
        header.write_to(out);
        out[offsets::DATA..][..self.payload.len()].copy_from_slice(self.payload);
        Ok(())
    }
}

/// Returns the full payload area of an encoded block.
pub fn payload_mut(raw: &mut [u8; BLOCK_SIZE]) -> &mut [u8] {
    &mut raw[offsets::DATA..offsets::MAGIC_END]
}

/// Reasons why a sector is not a valid UF2 block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockError {
    /// One of the three magic numbers does not match.
    BadMagic,
    /// The payload size exceeds the 476 bytes available in a block.
    PayloadTooLarge(u32),
}

impl fmt::Display for BlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockError::BadMagic => f.write_str("magic numbers do not match a UF2 block"),
            BlockError::PayloadTooLarge(size) => write!(
                f,
                "payload size {size} exceeds the maximum of {MAX_PAYLOAD_SIZE} bytes"
            ),
        }
    }
}

fn read_u32(raw: &[u8], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&raw[offset..][..4]);
    u32::from_le_bytes(bytes)
}

fn write_u32(raw: &mut [u8], offset: usize, value: u32) {
    raw[offset..][..4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> [u8; BLOCK_SIZE] {
        let payload = [0xA5; 256];
        let block = Block {
            header: BlockHeader {
                flags: flags::FAMILY_ID_PRESENT,
                target_addr: 0x1000,
                payload_size: 0,
                block_no: 16,
                num_blocks: 32,
                family_id: 0xBFDD_4EEE,
            },
            payload: &payload,
        };
        let mut raw = [0xFF; BLOCK_SIZE];
        block.encode(&mut raw).unwrap();
        raw
    }

    #[test]
    fn encode_places_fields_at_fixed_offsets() {
        let raw = sample_block();
        assert_eq!(&raw[0..4], &[0x55, 0x46, 0x32, 0x0A]);
        assert_eq!(&raw[4..8], &0x9E5D_5157u32.to_le_bytes());
        assert_eq!(&raw[8..12], &0x2000u32.to_le_bytes());
        assert_eq!(&raw[12..16], &0x1000u32.to_le_bytes());
        assert_eq!(&raw[16..20], &256u32.to_le_bytes());
        assert_eq!(&raw[20..24], &16u32.to_le_bytes());
        assert_eq!(&raw[24..28], &32u32.to_le_bytes());
        assert_eq!(&raw[28..32], &0xBFDD_4EEEu32.to_le_bytes());
        assert!(raw[32..288].iter().all(|&b| b == 0xA5));
        assert!(raw[288..508].iter().all(|&b| b == 0));
        assert_eq!(&raw[508..512], &[0x30, 0x6F, 0xB1, 0x0A]);
    }

    #[test]
    fn parse_borrows_payload() {
        let raw = sample_block();
        let block = Block::parse(&raw).unwrap();
        assert_eq!(block.header.block_no, 16);
        assert_eq!(block.header.payload_size, 256);
        assert_eq!(block.payload.len(), 256);
        assert!(block.header.is_flashable());
    }

    #[test]
    fn parse_rejects_each_bad_magic() {
        for offset in [0, 4, 508] {
            let mut raw = sample_block();
            raw[offset] ^= 0xFF;
            assert_eq!(Block::parse(&raw), Err(BlockError::BadMagic));
        }
        assert_eq!(Block::parse(&[0; BLOCK_SIZE]), Err(BlockError::BadMagic));
    }

    #[test]
    fn parse_rejects_oversized_payload() {
        let mut raw = sample_block();
        raw[16..20].copy_from_slice(&477u32.to_le_bytes());
        assert_eq!(Block::parse(&raw), Err(BlockError::PayloadTooLarge(477)));
    }

    #[test]
    fn flashable_requires_family_and_main_flash() {
        let mut header = BlockHeader::default();
        assert!(!header.is_flashable());
        header.flags = flags::FAMILY_ID_PRESENT | flags::MD5_CHECKSUM_PRESENT;
        assert!(header.is_flashable());
        header.flags |= flags::NOT_MAIN_FLASH;
        assert!(!header.is_flashable());
    }
}
