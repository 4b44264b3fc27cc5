//! Installer settings.
//!
//! `SettingsManager` persists [`Settings`] as pretty JSON at
//! `<config_dir>/strix-install/settings.json`. Every field has a default, so
//! a partial or older file still loads. The first run writes the defaults out;
//! a file that does not parse is reported and the run uses defaults.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::events::DEFAULT_QUEUE_CAPACITY;
use crate::log_collector::default_log_dir;
use crate::state_store::{StateStore, APP_CONFIG_DIR};

const SETTINGS_FILE_NAME: &str = "settings.json";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// State file override; `None` means the per-user default.
    pub state_path: Option<PathBuf>,
    /// Log directory override; `None` means the per-user default.
    pub log_dir: Option<PathBuf>,
    /// Per-subscriber event queue capacity.
    pub event_queue_capacity: usize,
    pub skip_installed: bool,
    /// Prompt on the console. When false every prompt takes its default.
    pub interactive: bool,
    pub debug_logging: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            state_path: None,
            log_dir: None,
            event_queue_capacity: DEFAULT_QUEUE_CAPACITY,
            skip_installed: false,
            interactive: true,
            debug_logging: false,
        }
    }
}

impl Settings {
    pub fn resolved_log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(default_log_dir)
    }

    /// The configured state file, or the per-user default if one can be found.
    pub fn resolved_state_path(&self) -> Option<PathBuf> {
        self.state_path
            .clone()
            .or_else(|| StateStore::default_path().ok())
    }

    pub fn log_level(&self) -> log::LevelFilter {
        if self.debug_logging {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        }
    }
}

pub struct SettingsManager;

impl SettingsManager {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_CONFIG_DIR).join(SETTINGS_FILE_NAME))
    }

    /// Load from the per-user path. See [`SettingsManager::load_from`].
    pub fn load() -> Result<Settings, ConfigError> {
        let path = Self::default_path().ok_or(ConfigError::NoConfigDir)?;
        Self::load_from(&path)
    }

    /// Load from `path`. On first run (no file yet) the defaults are written
    /// there so they can be edited. An unreadable or invalid file is an error;
    /// callers fall back to `Settings::default()` and report it.
    pub fn load_from(path: &Path) -> Result<Settings, ConfigError> {
        if let Some(settings) = Self::try_load_from(path)? {
            return Ok(settings);
        }
        let settings = Settings::default();
        Self::save_to(&settings, path)?;
        log::info!("[Config] wrote default settings to {}", path.display());
        Ok(settings)
    }

    /// Read `path` without side effects; `Ok(None)` when the file does not exist.
    pub fn try_load_from(path: &Path) -> Result<Option<Settings>, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ConfigError::IoError(e)),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save_to(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
