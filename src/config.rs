//! Local settings, stored as flat key-value pairs in a TOML file

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::currency;
use crate::error::ConfigError;

pub const APP_DIR: &str = "recipe-costing";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Empty string disables persistence
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            gemini_api_key: None,
            gemini_model: DEFAULT_MODEL.to_string(),
            database: None,
        }
    }
}

/// `<config dir>/recipe-costing/settings.toml`, or a relative file if the
/// platform has no config directory.
pub fn default_settings_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("settings.toml"))
}

pub fn default_database_path() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR).join("recipes.db"))
        .unwrap_or_else(|| PathBuf::from("recipes.db"))
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let settings: Settings = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        if currency::find(&settings.currency).is_none() {
            warn!("Unknown currency '{}' in settings; amounts will use '$'", settings.currency);
        }
        Ok(settings)
    }

    /// Like [`Settings::load`], but an unreadable or malformed file is
    /// logged and replaced by the defaults so costing keeps working.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            warn!("{}; using default settings", e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let text = toml::to_string_pretty(self)?;
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, text).map_err(write_err)?;
        info!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Set one key by name. Currency codes are upper-cased.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "currency" => self.currency = value.trim().to_ascii_uppercase(),
            "gemini_api_key" => {
                self.gemini_api_key = Some(value.trim().to_string()).filter(|v| !v.is_empty())
            }
            "gemini_model" => self.gemini_model = value.trim().to_string(),
            "database" => self.database = Some(value.trim().to_string()),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// The API key to use, preferring the environment over the file.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.gemini_api_key.clone())
    }

    /// Where the recipe store lives, or `None` when persistence is disabled.
    pub fn database_path(&self) -> Option<PathBuf> {
        match self.database.as_deref() {
            None => Some(default_database_path()),
            Some(p) if p.trim().is_empty() => None,
            Some(p) => Some(PathBuf::from(p)),
        }
    }
}
