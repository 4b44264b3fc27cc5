//! Run-state board: the live status of every declared stage during a run.
//!
//! Maintained by the engine behind an `Arc<RwLock<_>>` so front ends can poll
//! progress while the run is in flight. Every status change goes through
//! [`RunState::transition`], which rejects moves the stage lifecycle does not
//! allow.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::models::StageStatus;

/// Status of one stage on the board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSlot {
    pub id: String,
    pub status: StageStatus,
}

/// Per-status counts for a finished or in-flight run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub running: usize,
    pub pending: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunState {
    stages: Vec<StageSlot>,
    started_at: Option<DateTime<Local>>,
    last_update: Option<DateTime<Local>>,
}

impl RunState {
    /// Board for a new run; every stage starts Pending.
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let now = Local::now();
        RunState {
            stages: ids
                .into_iter()
                .map(|id| StageSlot {
                    id: id.into(),
                    status: StageStatus::Pending,
                })
                .collect(),
            started_at: Some(now),
            last_update: Some(now),
        }
    }

    /// Move `id` to `next`, enforcing the lifecycle.
    pub fn transition(&mut self, id: &str, next: StageStatus) -> Result<()> {
        let slot = self
            .stages
            .iter_mut()
            .find(|slot| slot.id == id)
            .ok_or_else(|| EngineError::InvalidTransition {
                stage_id: id.to_string(),
                from: "undeclared",
                to: next.as_str(),
            })?;

        if !slot.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition {
                stage_id: id.to_string(),
                from: slot.status.as_str(),
                to: next.as_str(),
            });
        }

        slot.status = next;
        self.last_update = Some(Local::now());
        Ok(())
    }

    pub fn status_of(&self, id: &str) -> Option<StageStatus> {
        self.stages.iter().find(|s| s.id == id).map(|s| s.status)
    }

    pub fn stages(&self) -> &[StageSlot] {
        &self.stages
    }

    /// The stage currently Running, if any.
    pub fn current(&self) -> Option<&str> {
        self.stages
            .iter()
            .find(|s| s.status == StageStatus::Running)
            .map(|s| s.id.as_str())
    }

    /// Share of stages in a terminal state, 0-100. An empty board is complete.
    pub fn progress_percent(&self) -> u8 {
        if self.stages.is_empty() {
            return 100;
        }
        let done = self.stages.iter().filter(|s| s.status.is_terminal()).count();
        ((done * 100) / self.stages.len()) as u8
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for slot in &self.stages {
            match slot.status {
                StageStatus::Success => summary.succeeded += 1,
                StageStatus::Failed => summary.failed += 1,
                StageStatus::Skipped => summary.skipped += 1,
                StageStatus::Running => summary.running += 1,
                StageStatus::Pending => summary.pending += 1,
            }
        }
        summary
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        self.started_at
    }

    pub fn last_update(&self) -> Option<DateTime<Local>> {
        self.last_update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_board_is_all_pending() {
        let board = RunState::new(["kernel", "graphics", "cleanup"]);
        assert_eq!(board.summary().pending, 3);
        assert_eq!(board.progress_percent(), 0);
        assert!(board.current().is_none());
    }

    #[test]
    fn test_legal_lifecycle() {
        let mut board = RunState::new(["kernel", "cleanup"]);
        board.transition("kernel", StageStatus::Running).unwrap();
        assert_eq!(board.current(), Some("kernel"));
        board.transition("kernel", StageStatus::Success).unwrap();
        board.transition("cleanup", StageStatus::Skipped).unwrap();

        assert_eq!(board.progress_percent(), 100);
        let summary = board.summary();
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.skipped, 1);
    }

    #[test]
    fn test_illegal_transition_rejected() {
        let mut board = RunState::new(["kernel"]);
        let err = board.transition("kernel", StageStatus::Success).unwrap_err();
        match err {
            EngineError::InvalidTransition { from, to, .. } => {
                assert_eq!(from, "pending");
                assert_eq!(to, "success");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        // Status untouched
        assert_eq!(board.status_of("kernel"), Some(StageStatus::Pending));
    }

    #[test]
    fn test_unknown_stage_rejected() {
        let mut board = RunState::new(["kernel"]);
        assert!(board.transition("nope", StageStatus::Running).is_err());
        assert_eq!(board.status_of("nope"), None);
    }

    #[test]
    fn test_progress_counts_terminal_only() {
        let mut board = RunState::new(["a", "b", "c", "d"]);
        board.transition("a", StageStatus::Running).unwrap();
        board.transition("a", StageStatus::Failed).unwrap();
        board.transition("b", StageStatus::Running).unwrap();
        assert_eq!(board.progress_percent(), 25);
    }
}
