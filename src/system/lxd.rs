//! LXD daemon and container operations.

use std::time::Duration;

use super::{exec, exec_sudo, run, ExecOutput};
use crate::context::CancelToken;
use crate::error::StageError;

pub const ARCH_IMAGE: &str = "images:archlinux/current";

const NETWORK_PROBE_ATTEMPTS: u32 = 30;
const NETWORK_PROBE_INTERVAL: Duration = Duration::from_secs(1);

/// `lxd init --auto`.
pub async fn init_auto() -> Result<(), StageError> {
    exec_sudo("lxd", &["init", "--auto"]).await?;
    Ok(())
}

pub async fn add_user_to_group(user: &str) -> Result<(), StageError> {
    exec_sudo("usermod", &["-aG", "lxd", user]).await?;
    Ok(())
}

pub async fn is_user_in_group(user: &str) -> bool {
    match run("groups", &[user]).await {
        Ok(out) if out.success() => out.stdout.split_whitespace().any(|g| g == "lxd"),
        _ => false,
    }
}

pub async fn container_exists(name: &str) -> bool {
    matches!(run("lxc", &["info", name]).await, Ok(out) if out.success())
}

pub async fn launch(image: &str, name: &str) -> Result<(), StageError> {
    exec("lxc", &["launch", image, name]).await?;
    Ok(())
}

pub async fn delete(name: &str, force: bool) -> Result<(), StageError> {
    let mut args = vec!["delete", name];
    if force {
        args.push("--force");
    }
    exec("lxc", &args).await?;
    Ok(())
}

/// Run a command inside a container.
pub async fn exec_in(name: &str, command: &[&str]) -> Result<ExecOutput, StageError> {
    let mut args = vec!["exec", name, "--"];
    args.extend_from_slice(command);
    exec("lxc", &args).await
}

pub async fn profile_set(key: &str, value: &str) -> Result<(), StageError> {
    exec("lxc", &["profile", "set", "default", key, value]).await?;
    Ok(())
}

/// Attach the host GPU to the default profile. An existing device is fine.
pub async fn add_gpu_device() -> Result<(), StageError> {
    let output = run("lxc", &["profile", "device", "add", "default", "gpu", "gpu", "gid=110"]).await?;
    if output.success() || output.stderr.contains("already exists") {
        Ok(())
    } else {
        Err(StageError::Command {
            cmd: output.command,
            reason: output.stderr.trim().to_string(),
        })
    }
}

pub async fn enable_nesting() -> Result<(), StageError> {
    profile_set("security.nesting", "true").await
}

/// Poll until the container can reach the internet, giving up after ~30s or on cancel.
pub async fn wait_for_network(name: &str, cancel: &CancelToken) -> Result<(), StageError> {
    for _ in 0..NETWORK_PROBE_ATTEMPTS {
        if exec_in(name, &["ping", "-c1", "-W1", "1.1.1.1"]).await.is_ok() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(StageError::Cancelled),
            _ = tokio::time::sleep(NETWORK_PROBE_INTERVAL) => {}
        }
    }
    Err(StageError::Failed(format!(
        "container {} did not get network connectivity",
        name
    )))
}
