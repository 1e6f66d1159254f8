use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use uf2_bootloader::{
    open_drive,
    uf2_file::{self, convert_to_uf2, ConvertOptions},
    upload::copy_to_drive,
    BoardConfig, MemoryFlash, WriteOutcome, WriteState,
};
use uf2_bootloader_common::{file_table::StandardFiles, TotalBlocks, SECTOR_SIZE};

const FLASH_SIZE: u32 = 64 * 1024;
const FIRMWARE_LEN: usize = 40_000;
// ceil(40_000 / 256)
const FIRMWARE_BLOCKS: u32 = 157;

fn small_config() -> BoardConfig<'static> {
    let mut config = BoardConfig::default();
    config.total_sectors = 8000;
    config
}

fn random_firmware(seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut firmware = vec![0; FIRMWARE_LEN];
    rng.fill(&mut firmware[..]);
    firmware
}

fn uf2_for(firmware: &[u8]) -> Vec<u8> {
    convert_to_uf2(firmware, &ConvertOptions::default()).unwrap()
}

fn assert_flashed(flash: &MemoryFlash, firmware: &[u8]) {
    let bytes = flash.as_bytes();
    assert_eq!(&bytes[..firmware.len()], firmware);
    // the last block is zero padded, the rest of the flash stays erased
    let padded_end = FIRMWARE_BLOCKS as usize * 256;
    assert!(bytes[firmware.len()..padded_end].iter().all(|&b| b == 0));
    assert!(bytes[padded_end..].iter().all(|&b| b == 0xFF));
}

#[test]
fn sequential_upload() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let mut drive = open_drive(&config, &entries, MemoryFlash::erased(FLASH_SIZE)).unwrap();

    let firmware = random_firmware(1);
    let mut state: WriteState = WriteState::new();
    let report = copy_to_drive(&mut drive, &uf2_for(&firmware), &mut state).unwrap();

    assert_eq!(report.accepted, FIRMWARE_BLOCKS);
    assert_eq!(report.rejected, 0);
    assert_eq!(report.retries, 0);
    assert!(report.complete);
    assert_eq!(state.total(), TotalBlocks::Known(FIRMWARE_BLOCKS));

    let flash = drive.into_flash();
    assert_flashed(&flash, &firmware);
    assert_eq!(flash.flushes(), 1);
}

#[test]
fn delivery_order_does_not_matter() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let firmware = random_firmware(2);
    let uf2 = uf2_for(&firmware);
    let sectors: Vec<&[u8; SECTOR_SIZE]> = uf2_file::sectors(&uf2).unwrap().collect();

    let mut rng = StdRng::seed_from_u64(0x5EED);
    for round in 0..4 {
        let mut order = sectors.clone();
        match round {
            0 => order.reverse(),
            _ => {
                order.shuffle(&mut rng);
                // hosts may write the same sector more than once
                let repeats: Vec<_> = order.choose_multiple(&mut rng, 20).copied().collect();
                order.extend(repeats);
                order.shuffle(&mut rng);
            }
        }

        let mut drive = open_drive(&config, &entries, MemoryFlash::erased(FLASH_SIZE)).unwrap();
        let mut state: WriteState = WriteState::new();
        let data_start = drive.geometry().data_start();
        for (index, sector) in order.iter().enumerate() {
            assert!(!state.is_complete() || index >= sectors.len());
            let outcome = drive.write_block(data_start + index as u32, sector, &mut state);
            assert_eq!(outcome, WriteOutcome::Accepted);
        }

        assert!(state.is_complete(), "round {}", round);
        assert_eq!(state.num_written(), FIRMWARE_BLOCKS);
        let flash = drive.into_flash();
        assert_flashed(&flash, &firmware);
        assert_eq!(flash.flushes(), 1, "round {}", round);
    }
}

#[test]
fn busy_flash_is_retried() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let mut flash = MemoryFlash::erased(FLASH_SIZE);
    flash.inject_busy_writes(3);
    let mut drive = open_drive(&config, &entries, flash).unwrap();

    let firmware = random_firmware(3);
    let mut state: WriteState = WriteState::new();
    let report = copy_to_drive(&mut drive, &uf2_for(&firmware), &mut state).unwrap();

    assert_eq!(report.retries, 3);
    assert_eq!(report.accepted, FIRMWARE_BLOCKS);
    assert!(report.complete);
    assert_flashed(drive.flash(), &firmware);
}

#[test]
fn busy_write_leaves_state_untouched() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let mut flash = MemoryFlash::erased(FLASH_SIZE);
    flash.inject_busy_writes(1);
    let mut drive = open_drive(&config, &entries, flash).unwrap();

    let uf2 = uf2_for(&random_firmware(4));
    let first = uf2_file::sectors(&uf2).unwrap().next().unwrap();
    let mut state: WriteState = WriteState::new();
    let before = state.clone();

    assert_eq!(drive.write_block(100, first, &mut state), WriteOutcome::RetryLater);
    assert_eq!(state, before);
    assert_eq!(drive.write_block(100, first, &mut state), WriteOutcome::Accepted);
    assert!(state.is_written(0));
}

#[test]
fn foreign_family_is_tracked_but_not_flashed() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let mut drive = open_drive(&config, &entries, MemoryFlash::erased(FLASH_SIZE)).unwrap();

    let options = ConvertOptions {
        family_id: 0x1234_5678,
        ..ConvertOptions::default()
    };
    let uf2 = convert_to_uf2(&random_firmware(5), &options).unwrap();
    let mut state: WriteState = WriteState::new();
    let report = copy_to_drive(&mut drive, &uf2, &mut state).unwrap();

    assert!(report.complete);
    assert_eq!(report.accepted, FIRMWARE_BLOCKS);
    assert!(drive.flash().as_bytes().iter().all(|&b| b == 0xFF));
}

#[test]
fn filesystem_metadata_writes_are_rejected() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let mut drive = open_drive(&config, &entries, MemoryFlash::erased(FLASH_SIZE)).unwrap();

    let mut junk = vec![0; 4 * SECTOR_SIZE];
    junk[SECTOR_SIZE..2 * SECTOR_SIZE].fill(0xE5);
    let mut state: WriteState = WriteState::new();
    let report = copy_to_drive(&mut drive, &junk, &mut state).unwrap();

    assert_eq!(report.rejected, 4);
    assert_eq!(report.accepted, 0);
    assert!(!report.complete);
    assert_eq!(state.total(), TotalBlocks::Unknown);
    assert_eq!(drive.flash().flushes(), 0);
}

#[test]
fn current_uf2_can_be_flashed_onto_another_board() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let source_flash = MemoryFlash::with_firmware(&random_firmware(6), FLASH_SIZE).unwrap();
    let source = open_drive(&config, &entries, source_flash).unwrap();

    // read CURRENT.UF2 straight from the data region of the source drive
    let first_sector = source.geometry().data_start() + source.files().inline_count() as u32;
    let mut current = vec![0; source.firmware_size() as usize];
    for (index, chunk) in current.chunks_exact_mut(SECTOR_SIZE).enumerate() {
        let sector: &mut [u8; SECTOR_SIZE] = chunk.try_into().unwrap();
        source.read_block(first_sector + index as u32, sector);
    }

    let mut target = open_drive(&config, &entries, MemoryFlash::erased(FLASH_SIZE)).unwrap();
    let mut state: WriteState = WriteState::new();
    let report = copy_to_drive(&mut target, &current, &mut state).unwrap();

    assert!(report.complete);
    assert_eq!(report.accepted, FLASH_SIZE / 256);
    assert_eq!(target.flash().as_bytes(), source.flash().as_bytes());
}
