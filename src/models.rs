//! Core data types for StrixForge.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::error::StageError;

/// Stage status enumeration - discrete states in a stage's lifecycle.
///
/// The orchestrator moves every stage from `Pending` to exactly one terminal
/// state per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::Running => "running",
            StageStatus::Success => "success",
            StageStatus::Failed => "failed",
            StageStatus::Skipped => "skipped",
        }
    }

    /// Success, Failed and Skipped are final for the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StageStatus::Success | StageStatus::Failed | StageStatus::Skipped
        )
    }

    /// Get all valid transitions FROM this status.
    pub fn valid_next(&self) -> &'static [StageStatus] {
        match self {
            StageStatus::Pending => &[StageStatus::Running, StageStatus::Skipped],
            StageStatus::Running => &[StageStatus::Success, StageStatus::Failed],
            StageStatus::Success | StageStatus::Failed | StageStatus::Skipped => &[],
        }
    }

    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        self.valid_next().contains(&next)
    }
}

impl fmt::Display for StageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable snapshot of a stage's identity, carried in events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageInfo {
    pub id: String,
    pub name: String,
    pub description: String,
    pub optional: bool,
}

/// Severity of a UI log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Info => log::Level::Info,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Error => log::Level::Error,
        }
    }
}

/// A single log message captured while a stage ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub level: LogLevel,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        LogEntry {
            time: Local::now(),
            level,
            message: message.into(),
        }
    }
}

/// Outcome of one stage in one run. `error` is present iff `status` is Failed.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult {
    pub stage_id: String,
    pub stage_name: String,
    pub status: StageStatus,
    pub duration: Duration,
    pub error: Option<StageError>,
    pub logs: Vec<LogEntry>,
}

impl StageResult {
    /// A stage that was declined or skipped by policy. Never ran.
    pub fn skipped(info: &StageInfo) -> Self {
        StageResult {
            stage_id: info.id.clone(),
            stage_name: info.name.clone(),
            status: StageStatus::Skipped,
            duration: Duration::ZERO,
            error: None,
            logs: Vec::new(),
        }
    }

    /// Classify a finished execution: Success if `outcome` is Ok, Failed otherwise.
    pub fn finished(
        info: &StageInfo,
        duration: Duration,
        outcome: Result<(), StageError>,
        logs: Vec<LogEntry>,
    ) -> Self {
        let (status, error) = match outcome {
            Ok(()) => (StageStatus::Success, None),
            Err(e) => (StageStatus::Failed, Some(e)),
        };
        StageResult {
            stage_id: info.id.clone(),
            stage_name: info.name.clone(),
            status,
            duration,
            error,
            logs,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StageStatus::Failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> StageInfo {
        StageInfo {
            id: "graphics".to_string(),
            name: "Graphics Stack".to_string(),
            description: "Install Mesa".to_string(),
            optional: false,
        }
    }

    #[test]
    fn test_status_transitions() {
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Pending.can_transition_to(StageStatus::Skipped));
        assert!(StageStatus::Running.can_transition_to(StageStatus::Failed));
        assert!(!StageStatus::Pending.can_transition_to(StageStatus::Success));
        assert!(!StageStatus::Success.can_transition_to(StageStatus::Running));
        assert!(StageStatus::Skipped.is_terminal());
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&StageStatus::Skipped).unwrap();
        assert_eq!(json, "\"skipped\"");
    }

    #[test]
    fn test_finished_classifies_outcome() {
        let ok = StageResult::finished(&info(), Duration::from_millis(5), Ok(()), vec![]);
        assert_eq!(ok.status, StageStatus::Success);
        assert!(ok.error.is_none());

        let failed = StageResult::finished(
            &info(),
            Duration::from_millis(5),
            Err(StageError::Failed("mesa too old".to_string())),
            vec![],
        );
        assert!(failed.is_failed());
        assert_eq!(failed.error, Some(StageError::Failed("mesa too old".to_string())));
    }

    #[test]
    fn test_skipped_has_no_error() {
        let result = StageResult::skipped(&info());
        assert_eq!(result.status, StageStatus::Skipped);
        assert_eq!(result.duration, Duration::ZERO);
        assert!(result.error.is_none());
    }

    #[test]
    fn test_log_level_maps_to_log_crate() {
        assert_eq!(log::Level::from(LogLevel::Warn), log::Level::Warn);
        assert_eq!(LogLevel::Error.to_string(), "ERROR");
    }
}
