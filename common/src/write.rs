//! Progress tracking of a UF2 upload.
//!
//! Hosts write the blocks of a UF2 file in whatever order their filesystem
//! driver chooses, may write some of them twice, and interleave them with
//! unrelated filesystem metadata. The state below only records which block
//! numbers have been seen, so any delivery order of the same blocks converges
//! to the same state.

use crate::uf2::BlockHeader;

/// Largest flash image the default write state can track, 4 MiB in 256 byte blocks.
pub const DEFAULT_MAX_BLOCKS: u32 = 4 * 1024 * 1024 / 256 + 100;
pub const DEFAULT_MASK_BYTES: usize = DEFAULT_MAX_BLOCKS as usize / 8 + 1;

/// The result of offering a sector write to the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The sector is not a UF2 block for main flash. It is ignored and the
    /// state is unchanged.
    Rejected,
    /// The block was validated and recorded.
    Accepted,
    /// The flash can't take the payload yet. Nothing was recorded and the same
    /// sector must be written again.
    RetryLater,
}

/// The number of blocks an upload consists of, as declared by its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TotalBlocks {
    /// No block with a non-zero total has been seen yet.
    Unknown,
    Known(u32),
    /// Blocks declared different totals, or more blocks than can be tracked.
    /// Completion is never reported for this session.
    Inconsistent,
}

/// The state of one upload session.
///
/// `MASK_BYTES` sizes the bitmask and `MAX_BLOCKS` caps the capacity within it:
/// blocks numbered [`WriteState::max_blocks`] and above are never tracked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteState<
    const MASK_BYTES: usize = DEFAULT_MASK_BYTES,
    const MAX_BLOCKS: u32 = DEFAULT_MAX_BLOCKS,
> {
    total: TotalBlocks,
    written_mask: [u8; MASK_BYTES],
    num_written: u32,
}

impl<const MASK_BYTES: usize, const MAX_BLOCKS: u32> Default
    for WriteState<MASK_BYTES, MAX_BLOCKS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const MASK_BYTES: usize, const MAX_BLOCKS: u32> WriteState<MASK_BYTES, MAX_BLOCKS> {
    pub const fn new() -> Self {
        Self {
            total: TotalBlocks::Unknown,
            written_mask: [0; MASK_BYTES],
            num_written: 0,
        }
    }

    /// The number of blocks this state can track, `MAX_BLOCKS` unless the
    /// bitmask is smaller.
    pub const fn max_blocks() -> u32 {
        let mask_bits = (MASK_BYTES * 8) as u32;
        if MAX_BLOCKS < mask_bits {
            MAX_BLOCKS
        } else {
            mask_bits
        }
    }

    pub fn total(&self) -> TotalBlocks {
        self.total
    }

    /// Number of distinct blocks recorded so far.
    pub fn num_written(&self) -> u32 {
        self.num_written
    }

    pub fn is_written(&self, block_no: u32) -> bool {
        match Self::mask_position(block_no) {
            Some((byte, bit)) => self.written_mask[byte] & bit != 0,
            None => false,
        }
    }

    /// Whether every block of the upload has been recorded.
    pub fn is_complete(&self) -> bool {
        match self.total {
            TotalBlocks::Known(total) => self.num_written >= total,
            TotalBlocks::Unknown | TotalBlocks::Inconsistent => false,
        }
    }

    /// Folds a validated block into the state.
    ///
    /// Returns `true` if the block number was not recorded before. Blocks that
    /// don't declare a total are not tracked.
    pub fn record(&mut self, header: &BlockHeader) -> bool {
        if header.num_blocks == 0 {
            return false;
        }
        self.learn_total(header.num_blocks);

        let Some((byte, bit)) = Self::mask_position(header.block_no) else {
            return false;
        };
        if self.written_mask[byte] & bit != 0 {
            return false;
        }
        self.written_mask[byte] |= bit;
        self.num_written += 1;
        true
    }

    fn learn_total(&mut self, declared: u32) {
        let learned = match self.total {
            TotalBlocks::Known(total) if total == declared => return,
            TotalBlocks::Unknown if declared < Self::max_blocks() => TotalBlocks::Known(declared),
            TotalBlocks::Unknown | TotalBlocks::Known(_) | TotalBlocks::Inconsistent => {
                TotalBlocks::Inconsistent
            }
        };
        match learned {
            TotalBlocks::Known(total) => log::debug!("Upload consists of {} blocks", total),
            _ if self.total != TotalBlocks::Inconsistent => log::warn!(
                "Block declares {} blocks in total, disabling completion detection",
                declared
            ),
            _ => {}
        }
        self.total = learned;
    }

    fn mask_position(block_no: u32) -> Option<(usize, u8)> {
        if block_no >= Self::max_blocks() {
            return None;
        }
        Some(((block_no / 8) as usize, 1 << (block_no % 8)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type SmallState = WriteState<4>;

    fn header(block_no: u32, num_blocks: u32) -> BlockHeader {
        BlockHeader {
            block_no,
            num_blocks,
            ..BlockHeader::default()
        }
    }

    #[test]
    fn duplicates_count_once() {
        let mut state = SmallState::new();
        assert!(state.record(&header(3, 5)));
        assert!(!state.record(&header(3, 5)));
        assert_eq!(state.num_written(), 1);
        assert!(state.is_written(3));
        assert!(!state.is_written(2));
        assert_eq!(state.total(), TotalBlocks::Known(5));
    }

    #[test]
    fn completes_after_all_blocks() {
        let mut state = SmallState::new();
        for block_no in [4, 0, 2, 2, 1] {
            state.record(&header(block_no, 5));
            assert!(!state.is_complete());
        }
        state.record(&header(3, 5));
        assert!(state.is_complete());
        assert_eq!(state.num_written(), 5);
    }

    #[test]
    fn any_order_converges() {
        let in_order = {
            let mut state = SmallState::new();
            for block_no in 0..20 {
                state.record(&header(block_no, 20));
            }
            state
        };

        let mut reversed = SmallState::new();
        for block_no in (0..20).rev() {
            reversed.record(&header(block_no, 20));
        }
        assert_eq!(reversed, in_order);

        let mut interleaved = SmallState::new();
        for block_no in (0..20).step_by(2).chain((0..20).rev()).chain(0..5) {
            interleaved.record(&header(block_no, 20));
        }
        assert_eq!(interleaved, in_order);
        assert!(in_order.is_complete());
    }

    #[test]
    fn zero_total_is_not_tracked() {
        let mut state = SmallState::new();
        assert!(!state.record(&header(0, 0)));
        assert_eq!(state, SmallState::new());
    }

    #[test]
    fn conflicting_totals_disable_completion() {
        let mut state = SmallState::new();
        state.record(&header(0, 2));
        state.record(&header(1, 3));
        assert_eq!(state.total(), TotalBlocks::Inconsistent);
        state.record(&header(2, 3));
        assert_eq!(state.total(), TotalBlocks::Inconsistent);
        assert_eq!(state.num_written(), 3);
        assert!(!state.is_complete());
    }

    #[test]
    fn oversized_totals_disable_completion() {
        assert_eq!(SmallState::max_blocks(), 32);
        let mut state = SmallState::new();
        state.record(&header(0, 32));
        assert_eq!(state.total(), TotalBlocks::Inconsistent);
        assert_eq!(state.num_written(), 1);

        let mut state = SmallState::new();
        state.record(&header(0, 31));
        assert_eq!(state.total(), TotalBlocks::Known(31));
    }

    #[test]
    fn block_numbers_beyond_capacity_are_ignored() {
        let mut state = SmallState::new();
        assert!(!state.record(&header(32, 10)));
        assert!(!state.is_written(32));
        assert_eq!(state.num_written(), 0);
        assert_eq!(state.total(), TotalBlocks::Known(10));
    }

    #[test]
    fn default_capacity_is_exact() {
        assert_eq!(DEFAULT_MASK_BYTES, 2061);
        assert_eq!(WriteState::<DEFAULT_MASK_BYTES>::max_blocks(), DEFAULT_MAX_BLOCKS);

        let mut state: WriteState = WriteState::new();
        state.record(&header(0, DEFAULT_MAX_BLOCKS));
        assert_eq!(state.total(), TotalBlocks::Inconsistent);

        let mut state: WriteState = WriteState::new();
        state.record(&header(0, DEFAULT_MAX_BLOCKS - 1));
        assert_eq!(state.total(), TotalBlocks::Known(DEFAULT_MAX_BLOCKS - 1));
        // the mask has room for 16488 bits, the cap still applies
        assert!(!state.record(&header(DEFAULT_MAX_BLOCKS, DEFAULT_MAX_BLOCKS - 1)));
        assert!(!state.is_written(DEFAULT_MAX_BLOCKS));
    }

    #[test]
    fn capacity_below_the_mask_size() {
        let mut state = WriteState::<4, 30>::new();
        assert_eq!(WriteState::<4, 30>::max_blocks(), 30);
        assert!(!state.record(&header(30, 10)));
        state.record(&header(29, 30));
        assert_eq!(state.total(), TotalBlocks::Inconsistent);
        assert!(state.is_written(29));
    }
}
