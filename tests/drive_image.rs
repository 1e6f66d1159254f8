use std::io::Cursor;
use uf2_bootloader::{
    fat::{self, inspect_drive_image, write_drive},
    open_drive, uf2_file, BoardConfig, DriveImageBuilder, MemoryFlash,
};
use uf2_bootloader_common::file_table::StandardFiles;

const FLASH_SIZE: u32 = 64 * 1024;

fn small_config() -> BoardConfig<'static> {
    let mut config = BoardConfig::default();
    config.total_sectors = 8000;
    config
}

fn firmware(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

#[test]
fn fat_driver_lists_the_standard_files() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let flash = MemoryFlash::with_firmware(&firmware(10_000), FLASH_SIZE).unwrap();
    let drive = open_drive(&config, &entries, flash).unwrap();

    let mut image = Vec::new();
    write_drive(&drive, &mut image).unwrap();
    assert_eq!(image.len(), 8000 * 512);

    let listing = inspect_drive_image(Cursor::new(image)).unwrap();
    assert_eq!(listing.label, "ESP32SBOOT");

    let names: Vec<_> = listing.files.iter().map(|file| file.name.as_str()).collect();
    assert_eq!(names, ["INFO_UF2.TXT", "INDEX.HTM", "CURRENT.UF2"]);

    let info = listing.file("INFO_UF2.TXT").unwrap();
    assert_eq!(
        info.contents,
        b"UF2 Bootloader 0.0.0\r\nModel: Espressif saola\r\nBoard-ID: adafruit-test-board\r\n"
    );
    let index = String::from_utf8(listing.file("INDEX.HTM").unwrap().contents.clone()).unwrap();
    assert!(index.contains("location.replace(\"https://adafruit.com\")"));

    let current = listing.file("CURRENT.UF2").unwrap();
    assert_eq!(current.contents.len(), 256 * 512);
}

#[test]
fn current_uf2_reproduces_the_flash() {
    let config = small_config();
    let files = StandardFiles::new(&config).unwrap();
    let entries = files.entries();
    let flash = MemoryFlash::with_firmware(&firmware(30_000), FLASH_SIZE).unwrap();
    let expected = flash.as_bytes().to_vec();
    let drive = open_drive(&config, &entries, flash).unwrap();

    let mut image = Vec::new();
    write_drive(&drive, &mut image).unwrap();
    let listing = inspect_drive_image(Cursor::new(image)).unwrap();
    let current = &listing.file("CURRENT.UF2").unwrap().contents;

    let blocks = uf2_file::parse_uf2(current).unwrap();
    assert_eq!(blocks.len(), 256);
    for (block_no, block) in blocks.iter().enumerate() {
        assert_eq!(block.header.block_no, block_no as u32);
        assert_eq!(block.header.num_blocks, 256);
        assert_eq!(block.header.family_id, config.family_id);
    }

    let (base, flash_content) = uf2_file::extract_image(current, config.family_id, 0).unwrap();
    assert_eq!(base, 0);
    assert_eq!(flash_content, expected);
}

#[test]
fn builder_writes_an_image_file() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("board.json");
    std::fs::write(
        &config_path,
        r#"{ "volume_label": "FEATHERBOOT", "board_id": "feather-s2", "total_sectors": 8000 }"#,
    )
    .unwrap();
    let out_path = dir.path().join("drive.img");

    let mut builder = DriveImageBuilder::from_firmware(firmware(1000));
    builder.set_config_file(&config_path);
    builder.create_drive_image(&out_path).unwrap();

    let listing = inspect_drive_image(fat::open_drive_image(&out_path).unwrap()).unwrap();
    assert_eq!(listing.label, "FEATHERBOOT");
    let info = String::from_utf8(listing.file("INFO_UF2.TXT").unwrap().contents.clone()).unwrap();
    assert!(info.contains("Board-ID: feather-s2"));
    // 1000 bytes round up to four chunks of 256 bytes
    assert_eq!(listing.file("CURRENT.UF2").unwrap().contents.len(), 4 * 512);
}

#[test]
fn builder_rejects_invalid_geometry() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("board.json");
    std::fs::write(&config_path, r#"{ "total_sectors": 100 }"#).unwrap();

    let mut builder = DriveImageBuilder::from_firmware(firmware(1000));
    builder.set_config_file(&config_path);
    let err = builder
        .create_drive_image(&dir.path().join("drive.img"))
        .unwrap_err();
    assert!(format!("{err:#}").contains("invalid drive configuration"));
    assert!(!dir.path().join("drive.img").exists());
}
