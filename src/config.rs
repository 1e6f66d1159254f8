use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
};
use uf2_bootloader_boot_config::BoardConfig;

/// A board configuration JSON file, kept in memory so that the parsed
/// [`BoardConfig`] can borrow its strings.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    path: PathBuf,
    json: String,
}

impl ConfigFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file `{}`", path.display()))?;
        Ok(Self {
            path: path.to_owned(),
            json,
        })
    }

    pub fn from_json(json: impl Into<String>) -> Self {
        Self {
            path: PathBuf::from("<inline>"),
            json: json.into(),
        }
    }

    /// Parses the file; fields that are not present keep their default value.
    pub fn board_config(&self) -> anyhow::Result<BoardConfig<'_>> {
        serde_json::from_str(&self.json)
            .with_context(|| format!("failed to parse config file `{}`", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uf2_bootloader_boot_config::LevelFilter;

    #[test]
    fn partial_config() {
        let file = ConfigFile::from_json(
            r#"{ "board_id": "feather-s2", "payload_chunk_size": 128, "log_level": "Warn" }"#,
        );
        let config = file.board_config().unwrap();
        assert_eq!(config.board_id, "feather-s2");
        assert_eq!(config.payload_chunk_size, 128);
        assert_eq!(config.log_level, LevelFilter::Warn);
        assert_eq!(config.volume_label, BoardConfig::default().volume_label);
    }

    #[test]
    fn invalid_config_names_the_file() {
        let file = ConfigFile::from_json(r#"{ "total_sectors": -1 }"#);
        let err = file.board_config().unwrap_err();
        assert!(format!("{err:#}").contains("<inline>"));
    }
}
