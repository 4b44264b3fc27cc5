//! Stage and platform contracts consumed by the engine.

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use crate::context::RunContext;
use crate::device::Device;
use crate::error::{HardwareError, StageError};
use crate::models::StageInfo;
use crate::ui::Ui;

/// One unit of the installation pipeline.
///
/// Identifiers are persisted in the state file, so they must stay stable
/// across releases.
pub trait Stage: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    fn optional(&self) -> bool {
        false
    }

    fn run<'a>(&'a self, ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>>;

    /// Undo what a failed `run` left behind. Called at most once, only for the
    /// stage that failed.
    fn rollback<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<(), StageError>> {
        futures::future::ready(Ok(())).boxed()
    }

    fn info(&self) -> StageInfo {
        StageInfo {
            id: self.id().to_string(),
            name: self.name().to_string(),
            description: self.description().to_string(),
            optional: self.optional(),
        }
    }
}

/// A target machine family: how to detect it and which stages configure it.
pub trait Platform: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self) -> BoxFuture<'_, Result<Device, HardwareError>>;

    /// The full, ordered stage list.
    fn stages(&self) -> Vec<Arc<dyn Stage>>;

    /// Prerequisite check run before the first stage.
    fn validate(&self) -> BoxFuture<'_, Result<(), StageError>> {
        futures::future::ready(Ok(())).boxed()
    }
}
