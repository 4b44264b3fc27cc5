//! GRUB defaults editing.
//!
//! Edits are computed on the file contents in memory (pure, unit tested) and
//! then installed over `/etc/default/grub` with `sudo install`, so the file is
//! never rewritten through a shell-interpolated `sed` expression.

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::exec_sudo;
use crate::error::StageError;

pub const DEFAULT_GRUB_CONFIG: &str = "/etc/default/grub";
pub const GRUB_CFG_OUTPUT: &str = "/boot/grub/grub.cfg";

static CMDLINE_DEFAULT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^GRUB_CMDLINE_LINUX_DEFAULT=["']([^"']*)["']"#)
        .expect("Invalid GRUB_CMDLINE_LINUX_DEFAULT regex")
});

/// Current value of `GRUB_CMDLINE_LINUX_DEFAULT`, if the key is present.
pub fn cmdline_params(contents: &str) -> Option<&str> {
    CMDLINE_DEFAULT
        .captures(contents)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Return `contents` with `param` appended to the default command line, or
/// `None` if the parameter is already present.
///
/// Presence is checked per whitespace-separated token, so adding `iommu=pt`
/// does not match an existing `amd_iommu=pt`.
pub fn with_cmdline_param(contents: &str, param: &str) -> Result<Option<String>, StageError> {
    let caps = CMDLINE_DEFAULT.captures(contents).ok_or_else(|| {
        StageError::Failed("could not find GRUB_CMDLINE_LINUX_DEFAULT".to_string())
    })?;
    let current = caps.get(1).map(|m| m.as_str()).unwrap_or_default();

    if current.split_whitespace().any(|token| token == param) {
        return Ok(None);
    }

    let updated_params = format!("{} {}", current, param).trim().to_string();
    let whole = caps.get(0).map(|m| m.range()).unwrap_or(0..0);
    let mut updated = String::with_capacity(contents.len() + param.len() + 1);
    updated.push_str(&contents[..whole.start]);
    updated.push_str(&format!("GRUB_CMDLINE_LINUX_DEFAULT=\"{}\"", updated_params));
    updated.push_str(&contents[whole.end..]);
    Ok(Some(updated))
}

/// Bootloader defaults file plus the privileged operations around it.
#[derive(Debug, Clone)]
pub struct Grub {
    config_path: PathBuf,
}

impl Default for Grub {
    fn default() -> Self {
        Grub::new(DEFAULT_GRUB_CONFIG)
    }
}

impl Grub {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Grub {
            config_path: config_path.into(),
        }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub async fn read(&self) -> Result<String, StageError> {
        tokio::fs::read_to_string(&self.config_path)
            .await
            .map_err(|e| StageError::Io(format!("{}: {}", self.config_path.display(), e)))
    }

    /// Copy the config next to itself with a timestamp suffix; returns the copy's path.
    pub async fn backup(&self) -> Result<PathBuf, StageError> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let backup = PathBuf::from(format!("{}.backup-{}", self.config_path.display(), stamp));
        let source = self.config_path.to_string_lossy().into_owned();
        let target = backup.to_string_lossy().into_owned();
        exec_sudo("cp", &[source.as_str(), target.as_str()]).await?;
        Ok(backup)
    }

    pub async fn restore(&self, backup: &Path) -> Result<(), StageError> {
        let source = backup.to_string_lossy().into_owned();
        let target = self.config_path.to_string_lossy().into_owned();
        exec_sudo("cp", &[source.as_str(), target.as_str()]).await?;
        Ok(())
    }

    /// Append `param` to the default command line. Returns false if it was already set.
    pub async fn add_cmdline_param(&self, param: &str) -> Result<bool, StageError> {
        let contents = self.read().await?;
        match with_cmdline_param(&contents, param)? {
            Some(updated) => {
                self.install_contents(&updated).await?;
                log::info!("[Grub] added kernel parameter {}", param);
                Ok(true)
            }
            None => {
                log::debug!("[Grub] kernel parameter {} already present", param);
                Ok(false)
            }
        }
    }

    /// Regenerate grub.cfg.
    pub async fn update(&self) -> Result<(), StageError> {
        exec_sudo("grub-mkconfig", &["-o", GRUB_CFG_OUTPUT]).await?;
        Ok(())
    }

    async fn install_contents(&self, contents: &str) -> Result<(), StageError> {
        let mut staged = tempfile::NamedTempFile::new()?;
        staged.write_all(contents.as_bytes())?;
        staged.flush()?;
        let source = staged.path().to_string_lossy().into_owned();
        let target = self.config_path.to_string_lossy().into_owned();
        exec_sudo("install", &["-m", "644", source.as_str(), target.as_str()]).await?;
        Ok(())
    }
}

/// The running kernel's command line.
pub async fn current_cmdline() -> Result<String, StageError> {
    let raw = tokio::fs::read_to_string("/proc/cmdline").await?;
    Ok(raw.trim().to_string())
}
