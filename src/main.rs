use anyhow::{anyhow, Context};
use argh::FromArgs;
use std::{
    fmt, fs,
    io::{self, Write as _},
    path::{Path, PathBuf},
    process::exit,
};
use uf2_bootloader::{
    fat, load_config, open_drive, uf2_file, upload, BoardConfig, DriveImageBuilder,
    LevelFilter, MemoryFlash, WriteState,
};
use uf2_bootloader_common::{file_table::StandardFiles, logger};

#[derive(FromArgs)]
/// Tools for the UF2 mass storage bootloader
struct Arguments {
    /// board configuration JSON file, defaults are used if omitted
    #[argh(option)]
    config: Option<PathBuf>,

    /// log debug output
    #[argh(switch, short = 'v')]
    verbose: bool,

    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Convert(ConvertArguments),
    Image(ImageArguments),
    Flash(FlashArguments),
    Info(InfoArguments),
}

#[derive(FromArgs)]
/// Wrap a raw firmware binary into a UF2 file
#[argh(subcommand, name = "convert")]
struct ConvertArguments {
    /// the firmware binary
    #[argh(positional)]
    input: PathBuf,

    /// path of the UF2 file, defaults to the input with a `uf2` extension
    #[argh(option, short = 'o')]
    output: Option<PathBuf>,

    /// flash address of the first firmware byte
    #[argh(option, default = "0", from_str_fn(parse_number))]
    base: u32,

    /// family id, defaults to the one of the board configuration
    #[argh(option, from_str_fn(parse_number))]
    family: Option<u32>,

    /// firmware bytes per block, defaults to the payload chunk size of the board configuration
    #[argh(option, from_str_fn(parse_number))]
    payload_size: Option<u32>,
}

#[derive(FromArgs)]
/// Dump the virtual drive for a firmware binary into a raw FAT16 image
#[argh(subcommand, name = "image")]
struct ImageArguments {
    /// the firmware binary
    #[argh(positional)]
    firmware: PathBuf,

    /// size of the flash partition
    #[argh(option, from_str_fn(parse_number))]
    flash_size: Option<u32>,

    /// path of the drive image
    #[argh(option, short = 'o')]
    output: PathBuf,
}

#[derive(FromArgs)]
/// Copy a UF2 file onto a simulated drive and store the resulting flash
#[argh(subcommand, name = "flash")]
struct FlashArguments {
    /// the UF2 file
    #[argh(positional)]
    uf2: PathBuf,

    /// flash dump to update, created erased if it does not exist
    #[argh(option)]
    flash_image: PathBuf,

    /// size of a newly created flash dump
    #[argh(option, default = "4 * 1024 * 1024", from_str_fn(parse_number))]
    flash_size: u32,
}

#[derive(FromArgs)]
/// List the files of a drive image
#[argh(subcommand, name = "info")]
struct InfoArguments {
    /// the drive image
    #[argh(positional)]
    image: PathBuf,
}

/// Parses decimal or `0x` prefixed hexadecimal numbers.
fn parse_number(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };
    parsed.map_err(|err| format!("invalid number `{}`: {}", value, err))
}

fn main() {
    let args: Arguments = argh::from_env();

    match run(args) {
        Err(err) => {
            eprintln!("ERROR: {:?}", err);
            exit(1);
        }
        Ok(()) => {}
    }
}

fn run(args: Arguments) -> anyhow::Result<()> {
    let config_file = load_config(args.config.as_deref())?;
    let config = config_file.board_config()?;

    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        config.log_level
    };
    let sink: &'static mut StderrSink = Box::leak(Box::new(StderrSink));
    logger::init_logger(sink, level).map_err(|err| anyhow!("failed to set up logging: {err}"))?;

    match args.command {
        Command::Convert(cmd) => convert(&config, cmd),
        Command::Image(cmd) => image(args.config.as_deref(), cmd),
        Command::Flash(cmd) => flash(&config, cmd),
        Command::Info(cmd) => info(&config, cmd),
    }
}

fn convert(config: &BoardConfig, cmd: ConvertArguments) -> anyhow::Result<()> {
    let firmware = fs::read(&cmd.input)
        .with_context(|| format!("failed to read firmware `{}`", cmd.input.display()))?;
    let options = uf2_file::ConvertOptions {
        base_address: cmd.base,
        family_id: cmd.family.unwrap_or(config.family_id),
        payload_size: cmd.payload_size.unwrap_or(config.payload_chunk_size),
    };
    let uf2 = uf2_file::convert_to_uf2(&firmware, &options)
        .with_context(|| format!("failed to convert `{}`", cmd.input.display()))?;

    let output = cmd.output.unwrap_or_else(|| cmd.input.with_extension("uf2"));
    fs::write(&output, &uf2)
        .with_context(|| format!("failed to write UF2 file `{}`", output.display()))?;
    log::info!(
        "Wrote {} blocks to {}",
        uf2.len() / uf2_bootloader_common::uf2::BLOCK_SIZE,
        output.display()
    );
    Ok(())
}

fn image(config: Option<&Path>, cmd: ImageArguments) -> anyhow::Result<()> {
    let mut builder = DriveImageBuilder::new(cmd.firmware);
    if let Some(path) = config {
        builder.set_config_file(path);
    }
    if let Some(flash_size) = cmd.flash_size {
        builder.set_flash_size(flash_size);
    }
    builder.create_drive_image(&cmd.output)?;
    log::info!("Created drive image at {}", cmd.output.display());
    Ok(())
}

fn flash(config: &BoardConfig, cmd: FlashArguments) -> anyhow::Result<()> {
    let uf2 = fs::read(&cmd.uf2)
        .with_context(|| format!("failed to read UF2 file `{}`", cmd.uf2.display()))?;
    let flash = if cmd.flash_image.exists() {
        MemoryFlash::load(&cmd.flash_image)?
    } else {
        MemoryFlash::erased(cmd.flash_size)
    };

    let files = StandardFiles::new(config).map_err(|err| anyhow!("failed to render drive files: {err}"))?;
    let entries = files.entries();
    let mut drive = open_drive(config, &entries, flash)?;
    let mut state: WriteState = WriteState::new();
    let report = upload::copy_to_drive(&mut drive, &uf2, &mut state)?;
    if !report.complete {
        log::warn!(
            "Upload incomplete: {} blocks of {:?} written",
            state.num_written(),
            state.total()
        );
    }

    drive.into_flash().save(&cmd.flash_image)
}

fn info(config: &BoardConfig, cmd: InfoArguments) -> anyhow::Result<()> {
    let listing = fat::inspect_drive_image(fat::open_drive_image(&cmd.image)?)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    writeln!(out, "Volume: {}", listing.label)?;
    for file in &listing.files {
        writeln!(out, "{:>10}  {}", file.contents.len(), file.name)?;
    }
    if let Some(current) = listing.file("CURRENT.UF2") {
        let (base, image) = uf2_file::extract_image(&current.contents, config.family_id, 0xFF)
            .context("CURRENT.UF2 is not a valid UF2 file")?;
        writeln!(out, "Firmware: {:#x} bytes at {:#x}", image.len(), base)?;
    }
    Ok(())
}

/// Forwards log output to stderr.
struct StderrSink;

impl fmt::Write for StderrSink {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        io::stderr().write_all(s.as_bytes()).map_err(|_| fmt::Error)
    }
}
