//! Configuration management for mediabatch.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every section implements `Default`, so a partial file only
//! overrides what it names.

mod extensions;
mod options;
mod types;
mod validate;

pub use extensions::*;
pub use options::*;
pub use types::*;
pub(crate) use validate::require_captures;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for mediabatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Command-line batch defaults
    pub batch: BatchConfig,

    /// Cooperative scheduling
    pub scheduler: SchedulerConfig,

    /// External programs
    pub tools: ToolsConfig,

    /// Check pipeline
    pub pipeline: PipelineConfig,

    /// Supported file kinds
    pub extensions: ExtensionTable,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.mediabatch.mediabatch/config.toml
    /// - Linux: ~/.config/mediabatch/config.toml
    ///
    /// Falls back to ~/.mediabatch/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "mediabatch", "mediabatch")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".mediabatch").join("config.toml")
            })
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}
