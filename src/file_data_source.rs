use anyhow::Context;
use core::fmt::{Debug, Formatter};
use std::fs;
use std::path::PathBuf;

/// Where a firmware image or flash dump comes from.
#[derive(Clone)]
pub enum FileDataSource {
    File(PathBuf),
    Data(Vec<u8>),
}

impl Debug for FileDataSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            FileDataSource::File(file) => {
                f.write_fmt(format_args!("data source: File {}", file.display()))
            }
            FileDataSource::Data(d) => {
                f.write_fmt(format_args!("data source: {} raw bytes ", d.len()))
            }
        }
    }
}

impl FileDataSource {
    /// Reads the complete content into memory.
    pub fn read_all(&self) -> anyhow::Result<Vec<u8>> {
        match self {
            FileDataSource::File(path) => {
                fs::read(path).with_context(|| format!("failed to read `{}`", path.display()))
            }
            FileDataSource::Data(contents) => Ok(contents.clone()),
        }
    }
}
