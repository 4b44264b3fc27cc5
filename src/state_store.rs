//! Persisted install state: which stages have been installed or skipped on
//! this machine, so a re-run can skip finished work and re-offer the rest.
//!
//! The store only mutates memory; callers decide when to [`StateStore::save`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::StateError;

/// Directory under the per-user config dir shared by state and settings.
pub const APP_CONFIG_DIR: &str = "strix-install";
const STATE_FILE_NAME: &str = "state.json";

/// On-disk record. Field names are camelCase in the JSON file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallState {
    pub first_run_complete: bool,
    pub installed_stages: Vec<String>,
    pub skipped_stages: Vec<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub device_name: String,
    pub installer_version: String,
}

#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
    state: InstallState,
}

impl StateStore {
    /// `<config_dir>/strix-install/state.json`.
    pub fn default_path() -> Result<PathBuf, StateError> {
        let base = dirs::config_dir().ok_or(StateError::NoConfigDir)?;
        Ok(base.join(APP_CONFIG_DIR).join(STATE_FILE_NAME))
    }

    /// A fresh, unsaved store at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        StateStore {
            path: path.into(),
            state: InstallState::default(),
        }
    }

    /// Load from `path`. A missing file is a first run, not an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<InstallState>(&content)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("[State] no state file at {}, treating as first run", path.display());
                InstallState::default()
            }
            Err(e) => return Err(StateError::Io(e)),
        };
        Ok(StateStore { path, state })
    }

    pub fn load_default() -> Result<Self, StateError> {
        Self::load(Self::default_path()?)
    }

    /// Stamp the current time and write the whole state, creating the parent
    /// directory if needed. The file is owner-only on Unix.
    pub fn save(&mut self) -> Result<(), StateError> {
        self.state.timestamp = Some(Utc::now());
        let content = serde_json::to_string_pretty(&self.state)?;

        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir)?;

        let mut staged = tempfile::NamedTempFile::new_in(dir)?;
        staged.write_all(content.as_bytes())?;
        staged.write_all(b"\n")?;
        staged.flush()?;
        set_owner_only(staged.path())?;
        staged.persist(&self.path).map_err(|e| StateError::Io(e.error))?;

        log::debug!("[State] saved {}", self.path.display());
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn state(&self) -> &InstallState {
        &self.state
    }

    pub fn is_first_run(&self) -> bool {
        !self.state.first_run_complete
    }

    pub fn mark_first_run_complete(&mut self) {
        self.state.first_run_complete = true;
    }

    /// Record `id` as installed, clearing any earlier skip. Idempotent.
    pub fn add_installed_stage(&mut self, id: &str) {
        self.state.skipped_stages.retain(|s| s != id);
        if !self.is_stage_installed(id) {
            self.state.installed_stages.push(id.to_string());
        }
    }

    /// Record `id` as skipped. Idempotent.
    pub fn add_skipped_stage(&mut self, id: &str) {
        if !self.is_stage_skipped(id) {
            self.state.skipped_stages.push(id.to_string());
        }
    }

    pub fn is_stage_installed(&self, id: &str) -> bool {
        self.state.installed_stages.iter().any(|s| s == id)
    }

    pub fn is_stage_skipped(&self, id: &str) -> bool {
        self.state.skipped_stages.iter().any(|s| s == id)
    }

    pub fn installed_stages(&self) -> &[String] {
        &self.state.installed_stages
    }

    pub fn skipped_stages(&self) -> &[String] {
        &self.state.skipped_stages
    }

    pub fn set_device_name(&mut self, name: impl Into<String>) {
        self.state.device_name = name.into();
    }

    pub fn set_installer_version(&mut self, version: impl Into<String>) {
        self.state.installer_version = version.into();
    }
}

#[cfg(unix)]
fn set_owner_only(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn set_owner_only(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_store_is_first_run() {
        let store = StateStore::new("/nonexistent/state.json");
        assert!(store.is_first_run());
        assert!(store.installed_stages().is_empty());
    }

    #[test]
    fn test_installed_clears_skipped() {
        let mut store = StateStore::new("unused.json");
        store.add_skipped_stage("thermal");
        store.add_skipped_stage("thermal");
        assert_eq!(store.skipped_stages(), ["thermal".to_string()]);

        store.add_installed_stage("thermal");
        store.add_installed_stage("thermal");
        assert!(!store.is_stage_skipped("thermal"));
        assert_eq!(store.installed_stages(), ["thermal".to_string()]);
    }

    #[test]
    fn test_json_uses_camel_case() {
        let mut store = StateStore::new("unused.json");
        store.mark_first_run_complete();
        store.add_installed_stage("kernel");
        let json = serde_json::to_string(store.state()).unwrap();
        assert!(json.contains("\"firstRunComplete\":true"));
        assert!(json.contains("\"installedStages\":[\"kernel\"]"));
        assert!(json.contains("\"installerVersion\""));
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let state: InstallState = serde_json::from_str(r#"{"installedStages":["kernel"]}"#).unwrap();
        assert!(!state.first_run_complete);
        assert_eq!(state.installed_stages, vec!["kernel".to_string()]);
        assert!(state.timestamp.is_none());
    }
}
