//! Stage orchestration: drives a platform's stage list end to end.
//!
//! The engine is strictly sequential. For each declared stage it checks for
//! cancellation, applies the skip policy (already installed, optional stage
//! declined), runs the stage while capturing its log lines, publishes
//! lifecycle events, and records the result. The first failure halts the run.

mod capture;
pub mod state;

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

pub use state::{RunState, RunSummary, StageSlot};

use crate::context::RunContext;
use crate::error::{EngineError, Result};
use crate::events::{Event, EventBus};
use crate::log_parsed;
use crate::models::{LogLevel, StageInfo, StageResult, StageStatus};
use crate::stage::{Platform, Stage};
use crate::state_store::StateStore;
use crate::ui::Ui;
use capture::CapturingUi;

/// Why a stage did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SkipReason {
    AlreadyInstalled,
    Declined,
}

pub struct Engine {
    platform: Arc<dyn Platform>,
    ui: Arc<dyn Ui>,
    ctx: RunContext,
    skip_installed: bool,
    state_store: Option<StateStore>,
    results: Vec<StageResult>,
    run_state: Arc<RwLock<RunState>>,
}

impl Engine {
    pub fn new(platform: Arc<dyn Platform>, ui: Arc<dyn Ui>, ctx: RunContext) -> Self {
        Engine {
            platform,
            ui,
            ctx,
            skip_installed: false,
            state_store: None,
            results: Vec::new(),
            run_state: Arc::new(RwLock::new(RunState::default())),
        }
    }

    /// Report stages as executed without invoking their bodies.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.ctx = self.ctx.clone().with_dry_run(dry_run);
    }

    pub fn is_dry_run(&self) -> bool {
        self.ctx.is_dry_run()
    }

    /// Attach a state store; finished stages are recorded and saved as they complete.
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.state_store = Some(store);
        self
    }

    /// Skip, without prompting, any stage the state store lists as installed.
    pub fn skip_installed(mut self, skip: bool) -> Self {
        self.skip_installed = skip;
        self
    }

    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        self.ctx.bus()
    }

    /// Results accumulated by the last run, in execution order.
    pub fn results(&self) -> &[StageResult] {
        &self.results
    }

    /// Snapshot of the run-state board.
    pub async fn run_state(&self) -> RunState {
        self.run_state.read().await.clone()
    }

    /// Shared handle to the board, for front ends polling during a run.
    pub fn run_state_handle(&self) -> Arc<RwLock<RunState>> {
        Arc::clone(&self.run_state)
    }

    pub fn state_store(&self) -> Option<&StateStore> {
        self.state_store.as_ref()
    }

    pub fn state_store_mut(&mut self) -> Option<&mut StateStore> {
        self.state_store.as_mut()
    }

    pub fn into_state_store(self) -> Option<StateStore> {
        self.state_store
    }

    /// Execute every stage in declared order.
    ///
    /// Returns the first failed stage's error, a cancellation error if the
    /// run was cancelled between stages, or a validation error if the
    /// platform refused to start. Results recorded before an early return
    /// stay available through [`Engine::results`].
    pub async fn run(&mut self) -> Result<()> {
        self.results.clear();
        let stages = self.platform.stages();
        *self.run_state.write().await = RunState::new(stages.iter().map(|s| s.id().to_string()));

        if let Err(e) = self.platform.validate().await {
            let message = e.user_message();
            self.ui.log(LogLevel::Error, &format!("Platform validation failed: {}", message));
            log::error!("[Engine] platform '{}' validation failed: {}", self.platform.name(), message);
            return Err(EngineError::Validation(message));
        }

        let total = stages.len();
        log_parsed!(
            "RUN START: {} ({} stages{})",
            self.platform.name(),
            total,
            if self.ctx.is_dry_run() { ", dry run" } else { "" }
        );

        for (index, stage) in stages.iter().enumerate() {
            let info = stage.info();

            self.check_cancelled(&info)?;
            let skip = self.skip_reason(&info).await;
            // A prompt left open at cancellation resolves to its default
            self.check_cancelled(&info)?;

            if let Some(reason) = skip {
                self.record_skip(&info, reason).await?;
                continue;
            }

            let result = self.execute(stage.as_ref(), &info, index + 1, total).await?;
            let failed = result.is_failed();
            let error = result.error.clone();
            self.results.push(result);

            if failed {
                if !self.ctx.is_dry_run() {
                    self.roll_back(stage.as_ref(), &info).await;
                }
                let source = error.unwrap_or_else(|| "stage failed".into());
                log_parsed!("RUN HALTED at stage '{}': {}", info.id, source);
                return Err(EngineError::StageFailed {
                    stage_id: info.id,
                    source,
                });
            }
        }

        log_parsed!("RUN COMPLETE: {} stages processed", self.results.len());
        Ok(())
    }

    fn check_cancelled(&self, info: &StageInfo) -> Result<()> {
        if !self.ctx.is_cancelled() {
            return Ok(());
        }
        self.ui.log(
            LogLevel::Warn,
            &format!("Run cancelled before {}", info.name),
        );
        log_parsed!("RUN CANCELLED before stage '{}'", info.id);
        Err(EngineError::Cancelled {
            next_stage: info.id.clone(),
        })
    }

    async fn skip_reason(&self, info: &StageInfo) -> Option<SkipReason> {
        let store = self.state_store.as_ref();

        if self.skip_installed && store.map_or(false, |s| s.is_stage_installed(&info.id)) {
            return Some(SkipReason::AlreadyInstalled);
        }

        if info.optional {
            let previously_skipped = store.map_or(false, |s| s.is_stage_skipped(&info.id));
            let question = if previously_skipped {
                format!("Run optional stage: {}? (skipped last time)", info.name)
            } else {
                format!("Run optional stage: {}?", info.name)
            };
            if !self.ui.confirm(&question, true).await {
                return Some(SkipReason::Declined);
            }
        }

        None
    }

    async fn record_skip(&mut self, info: &StageInfo, reason: SkipReason) -> Result<()> {
        let note = match reason {
            SkipReason::AlreadyInstalled => "already installed",
            SkipReason::Declined => "declined",
        };
        self.ui.log(LogLevel::Info, &format!("Skipping: {} ({})", info.name, note));
        log::info!("[Engine] skipping stage '{}': {}", info.id, note);

        self.run_state.write().await.transition(&info.id, StageStatus::Skipped)?;

        let result = StageResult::skipped(info);
        self.ui.stage_complete(&result);
        self.ctx.bus().publish(Event::StageCompleted {
            stage: info.clone(),
            result: result.clone(),
        });
        self.results.push(result);

        if reason == SkipReason::Declined && !self.ctx.is_dry_run() {
            if let Some(store) = self.state_store.as_mut() {
                store.add_skipped_stage(&info.id);
            }
            self.persist();
        }
        Ok(())
    }

    async fn execute(
        &mut self,
        stage: &dyn Stage,
        info: &StageInfo,
        number: usize,
        total: usize,
    ) -> Result<StageResult> {
        self.ui.log(
            LogLevel::Info,
            &format!("[{}/{}] Starting: {}", number, total, info.name),
        );
        log_parsed!("STAGE START [{}/{}]: {}", number, total, info.id);
        self.run_state.write().await.transition(&info.id, StageStatus::Running)?;
        self.ui.stage_start(info);
        self.ctx.bus().publish(Event::StageStarted { stage: info.clone() });

        let started = Instant::now();
        let (outcome, logs) = if self.ctx.is_dry_run() {
            self.ui.log(LogLevel::Info, "[DRY RUN] Would execute stage");
            (Ok(()), Vec::new())
        } else {
            let capture = CapturingUi::new(self.ui.as_ref());
            let outcome = stage.run(&self.ctx, &capture).await;
            (outcome, capture.into_entries())
        };
        let result = StageResult::finished(info, started.elapsed(), outcome, logs);

        match &result.error {
            Some(err) => {
                self.ui.log(
                    LogLevel::Error,
                    &format!("Failed: {} - {}", info.name, err.user_message()),
                );
                log::error!("[Engine] stage '{}' failed: {}", info.id, err);
            }
            None => {
                self.ui.log(
                    LogLevel::Info,
                    &format!("Complete: {} ({}s)", info.name, result.duration.as_secs()),
                );
                log_parsed!("STAGE COMPLETE: {} in {:.1}s", info.id, result.duration.as_secs_f64());
            }
        }

        self.run_state.write().await.transition(&info.id, result.status)?;
        self.ui.stage_complete(&result);
        self.ctx.bus().publish(Event::StageCompleted {
            stage: info.clone(),
            result: result.clone(),
        });

        if result.status == StageStatus::Success && !self.ctx.is_dry_run() {
            if let Some(store) = self.state_store.as_mut() {
                store.add_installed_stage(&info.id);
            }
            self.persist();
        }

        Ok(result)
    }

    async fn roll_back(&self, stage: &dyn Stage, info: &StageInfo) {
        log::info!("[Engine] rolling back stage '{}'", info.id);
        if let Err(e) = stage.rollback(&self.ctx).await {
            self.ui.log(
                LogLevel::Warn,
                &format!("Rollback of {} failed: {}", info.name, e.user_message()),
            );
            log::warn!("[Engine] rollback of '{}' failed: {}", info.id, e);
        }
    }

    /// Save the attached store; failures are reported and the run continues.
    fn persist(&mut self) {
        let Some(store) = self.state_store.as_mut() else {
            return;
        };
        if let Err(e) = store.save() {
            log::warn!("[Engine] could not save state to {}: {}", store.path().display(), e);
            self.ui.log(LogLevel::Warn, &format!("Could not save install state: {}", e));
        }
    }
}
