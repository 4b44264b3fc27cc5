//! pacman and AUR (yay) package operations.

use super::{exec, exec_shell_sudo, exec_sudo, invoking_user, run};
use crate::error::StageError;

/// Install packages, skipping ones already up to date.
pub async fn install(packages: &[&str]) -> Result<(), StageError> {
    let mut args = vec!["-S", "--needed", "--noconfirm"];
    args.extend_from_slice(packages);
    exec_sudo("pacman", &args).await?;
    Ok(())
}

/// Full system upgrade.
pub async fn update() -> Result<(), StageError> {
    exec_sudo("pacman", &["-Syu", "--noconfirm"]).await?;
    Ok(())
}

pub async fn remove(packages: &[&str]) -> Result<(), StageError> {
    let mut args = vec!["-Rns", "--noconfirm"];
    args.extend_from_slice(packages);
    exec_sudo("pacman", &args).await?;
    Ok(())
}

pub async fn is_installed(package: &str) -> bool {
    matches!(run("pacman", &["-Q", package]).await, Ok(out) if out.success())
}

/// Installed version of `package`, e.g. `25.3.1-1`.
pub async fn version_of(package: &str) -> Result<String, StageError> {
    let output = run("pacman", &["-Q", package]).await?;
    if !output.success() {
        return Err(StageError::Requirement(format!("package not installed: {}", package)));
    }
    parse_query_version(&output.stdout)
        .map(str::to_string)
        .ok_or_else(|| StageError::Failed(format!("could not parse version for {}", package)))
}

/// Second field of `pacman -Q` output (`"mesa 25.3.1-1"` -> `"25.3.1-1"`).
pub fn parse_query_version(stdout: &str) -> Option<&str> {
    stdout.split_whitespace().nth(1)
}

/// Remove orphaned dependencies. Returns how many were listed for removal.
pub async fn clean_orphans() -> Result<usize, StageError> {
    let orphans = run("pacman", &["-Qtdq"]).await?;
    let count = orphans.stdout.lines().filter(|l| !l.trim().is_empty()).count();
    if !orphans.success() || count == 0 {
        return Ok(0);
    }
    exec_shell_sudo("pacman -Rns --noconfirm $(pacman -Qtdq)").await?;
    Ok(count)
}

pub async fn clean_cache() -> Result<(), StageError> {
    exec_shell_sudo("yes | pacman -Scc").await?;
    Ok(())
}

/// Install AUR packages with yay as the invoking (non-root) user.
pub async fn yay_install(packages: &[&str]) -> Result<(), StageError> {
    let user = invoking_user()
        .ok_or_else(|| StageError::Failed("cannot determine the invoking user for yay".to_string()))?;
    let mut args = vec!["-u", user.as_str(), "yay", "-S", "--needed", "--noconfirm"];
    args.extend_from_slice(packages);
    exec("sudo", &args).await?;
    Ok(())
}
