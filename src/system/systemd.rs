//! systemctl wrappers.

use super::{exec_sudo, run};
use crate::error::StageError;

pub async fn enable(service: &str) -> Result<(), StageError> {
    exec_sudo("systemctl", &["enable", service]).await?;
    Ok(())
}

pub async fn enable_now(service: &str) -> Result<(), StageError> {
    exec_sudo("systemctl", &["enable", "--now", service]).await?;
    Ok(())
}

pub async fn disable_now(service: &str) -> Result<(), StageError> {
    exec_sudo("systemctl", &["disable", "--now", service]).await?;
    Ok(())
}

pub async fn is_active(service: &str) -> bool {
    matches!(run("systemctl", &["is-active", service]).await, Ok(out) if out.stdout_trimmed() == "active")
}

pub async fn is_enabled(service: &str) -> bool {
    matches!(run("systemctl", &["is-enabled", service]).await, Ok(out) if out.stdout_trimmed() == "enabled")
}

pub async fn daemon_reload() -> Result<(), StageError> {
    exec_sudo("systemctl", &["daemon-reload"]).await?;
    Ok(())
}
