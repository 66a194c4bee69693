//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use crate::config::schema::CaptureConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Parse a capture configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CaptureConfig, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Load a capture configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CaptureConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}
