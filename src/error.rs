//! Unified error type hierarchy for StrixForge
//!
//! Provides structured error handling with StageError, EngineError, StateError,
//! HardwareError, QuirkError and ConfigError.

use std::io;
use thiserror::Error;

/// Errors raised by a stage body (or by the command helpers it calls).
///
/// Kept `Clone` so a failed [`crate::models::StageResult`] can be handed to
/// every event-bus subscriber.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// OS command failed (e.g., pacman, grub-mkconfig, lxc)
    #[error("Command '{cmd}' failed: {reason}")]
    Command { cmd: String, reason: String },

    /// A version or environment requirement is not met
    #[error("Requirement not met: {0}")]
    Requirement(String),

    /// File I/O error (read/write)
    #[error("I/O error: {0}")]
    Io(String),

    /// Generic stage failure
    #[error("{0}")]
    Failed(String),

    /// The stage observed cancellation and stopped early
    #[error("Stage cancelled")]
    Cancelled,
}

impl StageError {
    /// Get a user-facing error message suitable for UI display
    pub fn user_message(&self) -> String {
        match self {
            StageError::Command { cmd, reason } => {
                format!("Failed to execute '{}': {}", cmd, reason)
            }
            StageError::Requirement(msg) => format!("Requirement not met: {}", msg),
            StageError::Io(msg) => format!("File operation failed: {}", msg),
            StageError::Failed(msg) => msg.clone(),
            StageError::Cancelled => "Stage was cancelled".to_string(),
        }
    }
}

impl From<io::Error> for StageError {
    fn from(e: io::Error) -> Self {
        StageError::Io(e.to_string())
    }
}

impl From<String> for StageError {
    fn from(s: String) -> Self {
        StageError::Failed(s)
    }
}

impl From<&str> for StageError {
    fn from(s: &str) -> Self {
        StageError::Failed(s.to_string())
    }
}

/// Errors returned by [`crate::orchestrator::Engine::run`].
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Run cancelled before stage '{next_stage}'")]
    Cancelled { next_stage: String },

    #[error("Stage '{stage_id}' failed: {source}")]
    StageFailed {
        stage_id: String,
        #[source]
        source: StageError,
    },

    #[error("Platform validation failed: {0}")]
    Validation(String),

    #[error("Invalid stage transition for '{stage_id}': {from} -> {to}")]
    InvalidTransition {
        stage_id: String,
        from: &'static str,
        to: &'static str,
    },

    #[error("State persistence failed: {0}")]
    State(#[from] StateError),
}

impl EngineError {
    /// True for the cancellation variant, which callers usually report differently.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, EngineError::Cancelled { .. })
    }

    /// The stage error behind a `StageFailed`, if any.
    pub fn stage_error(&self) -> Option<&StageError> {
        match self {
            EngineError::StageFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Persisted run-state errors. A missing file is never one of these.
#[derive(Error, Debug)]
pub enum StateError {
    #[error("IO error during state operations: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid JSON in state file: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Could not determine the per-user configuration directory")]
    NoConfigDir,
}

/// Hardware detection errors.
#[derive(Error, Debug)]
pub enum HardwareError {
    #[error("DMI information unavailable: {0}")]
    DmiUnavailable(String),

    #[error("IO error during hardware detection: {0}")]
    IoError(#[from] io::Error),
}

/// Device quirk application errors. Always non-fatal to a run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuirkError {
    #[error("No handler registered for quirk '{0}'")]
    NoHandler(String),

    #[error("Quirk '{id}' failed: {reason}")]
    Failed { id: String, reason: String },
}

/// Settings file parsing errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid JSON in config: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("IO error during config operations: {0}")]
    IoError(#[from] io::Error),

    #[error("No per-user config directory")]
    NoConfigDir,
}

/// Top-level result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_error_display() {
        let err = StageError::Command {
            cmd: "pacman -Syu".to_string(),
            reason: "exit status 1".to_string(),
        };
        assert_eq!(err.to_string(), "Command 'pacman -Syu' failed: exit status 1");
        assert_eq!(
            err.user_message(),
            "Failed to execute 'pacman -Syu': exit status 1"
        );
    }

    #[test]
    fn test_stage_error_from_str() {
        let err: StageError = "boom".into();
        assert_eq!(err, StageError::Failed("boom".to_string()));
    }

    #[test]
    fn test_engine_error_exposes_stage_error() {
        let err = EngineError::StageFailed {
            stage_id: "kernel".to_string(),
            source: StageError::Requirement("kernel 6.18+".to_string()),
        };
        assert!(!err.is_cancelled());
        assert_eq!(
            err.stage_error(),
            Some(&StageError::Requirement("kernel 6.18+".to_string()))
        );
        assert_eq!(
            err.to_string(),
            "Stage 'kernel' failed: Requirement not met: kernel 6.18+"
        );
    }

    #[test]
    fn test_cancelled_is_distinct() {
        let err = EngineError::Cancelled {
            next_stage: "lxd".to_string(),
        };
        assert!(err.is_cancelled());
        assert!(err.stage_error().is_none());
    }

    #[test]
    fn test_quirk_error_display() {
        let err = QuirkError::NoHandler("tdp-tool".to_string());
        assert_eq!(err.to_string(), "No handler registered for quirk 'tdp-tool'");
    }
}
