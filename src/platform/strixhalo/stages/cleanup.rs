use futures::future::{BoxFuture, FutureExt};

use crate::context::RunContext;
use crate::error::StageError;
use crate::stage::Stage;
use crate::system::pacman;
use crate::ui::Ui;

/// Orphan removal and package cache cleanup. Never fails the run.
pub struct CleanupStage;

impl CleanupStage {
    async fn clean(&self, ui: &dyn Ui) -> Result<(), StageError> {
        ui.progress(30, "Removing orphaned packages...");
        match pacman::clean_orphans().await {
            Ok(0) => ui.info("✓ No orphaned packages"),
            Ok(n) => ui.info(&format!("✓ Removed {} orphaned package(s)", n)),
            Err(e) => ui.warn(&format!("Orphan cleanup failed: {}", e.user_message())),
        }

        ui.progress(70, "Cleaning package cache...");
        match pacman::clean_cache().await {
            Ok(()) => ui.info("✓ Package cache cleaned"),
            Err(e) => ui.warn(&format!("Cache cleanup had issues: {}", e.user_message())),
        }

        ui.progress(100, "Cleanup complete");
        Ok(())
    }
}

impl Stage for CleanupStage {
    fn id(&self) -> &str {
        "cleanup"
    }

    fn name(&self) -> &str {
        "Cleanup"
    }

    fn description(&self) -> &str {
        "Remove orphaned packages, clean package cache"
    }

    fn optional(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.clean(ui).boxed()
    }
}
