//! User settings and preferences
//!
//! Manages application settings stored in ~/.pgview/config.toml

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Rows fetched when a table is selected
    #[serde(default = "default_row_limit")]
    pub default_row_limit: usize,

    /// Schema whose tables are listed
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Where exported CSV files go (current directory when unset)
    #[serde(default)]
    pub export_dir: Option<PathBuf>,

    /// Fallback log filter when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_row_limit() -> usize {
    100
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_row_limit: default_row_limit(),
            schema: default_schema(),
            export_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Get the config directory path (~/.pgview/)
    pub fn config_dir() -> ConfigResult<PathBuf> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".pgview"))
    }

    /// Resolve the path an export should be written to
    pub fn export_path(&self, file_name: &str) -> PathBuf {
        match &self.export_dir {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    fn check(self) -> ConfigResult<Self> {
        if self.default_row_limit == 0 {
            return Err(ConfigError::Invalid(
                "default_row_limit must be greater than 0".to_string(),
            ));
        }
        if self.schema.trim().is_empty() {
            return Err(ConfigError::Invalid("schema must not be empty".to_string()));
        }
        Ok(self)
    }
}

/// Load settings from ~/.pgview/config.toml, or defaults if it doesn't exist
pub fn load_settings() -> ConfigResult<Settings> {
    let path = Settings::config_dir()?.join("config.toml");
    load_settings_from(&path)
}

/// Load settings from an explicit file, or defaults if it doesn't exist
pub fn load_settings_from(path: &Path) -> ConfigResult<Settings> {
    if !path.exists() {
        return Ok(Settings::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_settings(&content)
}

/// The loaded settings, or defaults when loading failed. The settings file
/// is optional, so a failure is only worth a warning.
pub fn or_default(loaded: ConfigResult<Settings>) -> Settings {
    loaded.unwrap_or_else(|e| {
        warn!("Using default settings: {}", e);
        Settings::default()
    })
}

/// Parse settings from TOML text
pub fn parse_settings(content: &str) -> ConfigResult<Settings> {
    let settings: Settings = toml::from_str(content)?;
    settings.check()
}
