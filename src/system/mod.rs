/// System module: async command execution and the OS collaborators stages call into.
///
/// Every helper runs through [`exec`]/[`run`] so command lines, exit codes and
/// stderr land in the session log the same way regardless of which stage
/// issued them.

pub mod grub;
pub mod lxd;
pub mod pacman;
pub mod systemd;
pub mod versions;

use tokio::process::Command;

use crate::error::StageError;

/// High-level milestones go to the "parsed" target so the LogCollector can
/// keep them in a separate, readable log.
#[macro_export]
macro_rules! log_parsed {
    ($($arg:tt)*) => {{
        let msg = format!($($arg)*);
        $crate::log::info!(target: "parsed", "{}", msg);
    }}
}

/// Captured result of one finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub command: String,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Trimmed stdout, the common case for single-value queries.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        let status = match self.exit_code {
            Some(code) => format!("exit status {}", code),
            None => "terminated by signal".to_string(),
        };
        if stderr.is_empty() {
            status
        } else {
            format!("{}: {}", status, stderr)
        }
    }
}

/// Run a command to completion and capture its output.
///
/// Only a spawn failure is an error here; callers inspect the exit code.
pub async fn run(program: &str, args: &[&str]) -> Result<ExecOutput, StageError> {
    let command = std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ");
    log::debug!("[System] exec: {}", command);

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| StageError::Command {
            cmd: command.clone(),
            reason: format!("failed to spawn: {}", e),
        })?;

    let result = ExecOutput {
        command,
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if !result.stderr.trim().is_empty() {
        log::debug!("[System] [{}] stderr: {}", program, result.stderr.trim());
    }
    Ok(result)
}

/// Run a command and treat a non-zero exit as [`StageError::Command`].
pub async fn exec(program: &str, args: &[&str]) -> Result<ExecOutput, StageError> {
    let output = run(program, args).await?;
    if output.success() {
        Ok(output)
    } else {
        log::warn!("[System] command failed: {} ({})", output.command, output.failure_reason());
        Err(StageError::Command {
            reason: output.failure_reason(),
            cmd: output.command,
        })
    }
}

pub async fn exec_sudo(program: &str, args: &[&str]) -> Result<ExecOutput, StageError> {
    let mut sudo_args = Vec::with_capacity(args.len() + 1);
    sudo_args.push(program);
    sudo_args.extend_from_slice(args);
    exec("sudo", &sudo_args).await
}

pub async fn exec_shell(script: &str) -> Result<ExecOutput, StageError> {
    exec("bash", &["-c", script]).await
}

pub async fn exec_shell_sudo(script: &str) -> Result<ExecOutput, StageError> {
    exec_sudo("bash", &["-c", script]).await
}

/// True if `name` resolves on PATH.
pub async fn command_exists(name: &str) -> bool {
    match Command::new("which").arg(name).output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

/// Kernel release of the running system, e.g. `6.18.2-1-cachyos`.
pub async fn kernel_release() -> Result<String, StageError> {
    let output = exec("uname", &["-r"]).await?;
    Ok(output.stdout_trimmed().to_string())
}

/// Login name of the operator behind sudo, falling back to `$USER`.
pub fn invoking_user() -> Option<String> {
    std::env::var("SUDO_USER")
        .ok()
        .or_else(|| std::env::var("USER").ok())
        .filter(|u| !u.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_exec_captures_stdout() {
        let output = exec("echo", &["hello"]).await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout_trimmed(), "hello");
        assert_eq!(output.command, "echo hello");
    }

    #[tokio::test]
    async fn test_exec_nonzero_exit_is_command_error() {
        let err = exec_shell("echo nope >&2; exit 3").await.unwrap_err();
        match err {
            StageError::Command { cmd, reason } => {
                assert_eq!(cmd, "bash -c echo nope >&2; exit 3");
                assert_eq!(reason, "exit status 3: nope");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_run_reports_missing_binary() {
        let err = run("definitely-not-a-real-binary-xyz", &[]).await.unwrap_err();
        assert!(matches!(err, StageError::Command { .. }));
    }
}
