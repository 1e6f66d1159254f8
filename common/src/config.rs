use core::fmt;
use uf2_bootloader_boot_config::BoardConfig;

/// Deserializes a board configuration from JSON.
///
/// Strings are borrowed from `json`, so they must not contain escape sequences.
/// Missing fields keep their default value.
pub fn parse_board_config(json: &[u8]) -> Result<BoardConfig<'_>, ConfigError> {
    serde_json_core::from_slice(json)
        .map(|(config, _consumed)| config)
        .map_err(ConfigError)
}

/// The board configuration is not valid JSON or has fields of the wrong type.
#[derive(Debug)]
pub struct ConfigError(serde_json_core::de::Error);

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid board configuration: {}", self.0)
    }
}
