use anyhow::Context;
use std::{
    fs,
    io::{self, BufWriter, Read, Seek, Write},
    path::Path,
};
use tempfile::NamedTempFile;
use uf2_bootloader_common::{Flash, GhostFat, SECTOR_SIZE};

/// Streams every sector of `drive` into `out`, producing a raw FAT16 image.
pub fn write_drive<F: Flash, W: Write>(drive: &GhostFat<'_, F>, out: &mut W) -> io::Result<()> {
    let mut sector = [0; SECTOR_SIZE];
    for sector_no in 0..drive.geometry().total_sectors() {
        drive.read_block(sector_no, &mut sector);
        out.write_all(&sector)?;
    }
    out.flush()
}

/// Dumps `drive` into an image file at `out_path`.
///
/// The image is assembled in a temporary file next to `out_path` and only moved
/// into place once it is complete.
pub fn create_drive_image<F: Flash>(drive: &GhostFat<'_, F>, out_path: &Path) -> anyhow::Result<()> {
    let out_dir = match out_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let out_file = NamedTempFile::new_in(out_dir).context("failed to create temp file")?;
    {
        let mut writer = BufWriter::new(out_file.as_file());
        write_drive(drive, &mut writer).context("failed to write drive image")?;
    }
    out_file
        .persist(out_path)
        .with_context(|| format!("failed to move drive image to `{}`", out_path.display()))?;
    Ok(())
}

/// A file found in the root directory of a drive image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListedFile {
    pub name: String,
    pub contents: Vec<u8>,
}

/// What a FAT driver sees when mounting a drive image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveListing {
    pub label: String,
    pub files: Vec<ListedFile>,
}

impl DriveListing {
    pub fn file(&self, name: &str) -> Option<&ListedFile> {
        self.files.iter().find(|file| file.name.eq_ignore_ascii_case(name))
    }
}

/// Mounts a drive image with an independent FAT implementation and reads back
/// its root directory.
pub fn inspect_drive_image<S: Read + Write + Seek>(storage: S) -> anyhow::Result<DriveListing> {
    let filesystem = fatfs::FileSystem::new(storage, fatfs::FsOptions::new())
        .context("failed to open FAT file system of drive image")?;
    let label = filesystem.volume_label().trim_end().to_owned();

    let mut files = Vec::new();
    for entry in filesystem.root_dir().iter() {
        let entry = entry.context("failed to read root directory entry")?;
        if !entry.is_file() || entry.attributes().contains(fatfs::FileAttributes::VOLUME_ID) {
            continue;
        }
        let name = entry.file_name();
        let mut contents = Vec::new();
        entry
            .to_file()
            .read_to_end(&mut contents)
            .with_context(|| format!("failed to read `{}` from drive image", name))?;
        files.push(ListedFile { name, contents });
    }

    Ok(DriveListing { label, files })
}

/// Opens an existing drive image file for [`inspect_drive_image`].
pub fn open_drive_image(path: &Path) -> anyhow::Result<fs::File> {
    fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .with_context(|| format!("failed to open drive image `{}`", path.display()))
}
