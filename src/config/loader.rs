//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::bootstrap::ExitCode;
use crate::config::schema::RegistryConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    Validation(Vec<ValidationError>),
}

impl ConfigError {
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::Io(_) | Self::Parse(_) => ExitCode::ConfigLoadFailed,
            Self::Validation(_) => ExitCode::ConfigInvalid,
        }
    }
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<RegistryConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: RegistryConfig = toml::from_str(&content)?;

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}
