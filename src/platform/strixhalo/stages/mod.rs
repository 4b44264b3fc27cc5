//! The Strix Halo stage bodies, in pipeline order.
//!
//! Each stage is a thin sequence of calls into [`crate::system`]; progress is
//! reported through the [`crate::ui::Ui`] handed to `run`.

mod apps;
mod cleanup;
mod graphics;
mod kernel;
mod lxd;
mod system;
mod thermal;
mod validate;
mod workspace;

pub use apps::AppsStage;
pub use cleanup::CleanupStage;
pub use graphics::GraphicsStage;
pub use kernel::KernelStage;
pub use lxd::LxdStage;
pub use system::SystemStage;
pub use thermal::ThermalStage;
pub use validate::ValidateStage;
pub use workspace::WorkspaceStage;

use crate::context::RunContext;
use crate::error::StageError;
use crate::system::versions::version_at_least;

use super::MIN_KERNEL;

/// Bail out of a long stage body once the run has been cancelled.
pub(crate) fn ensure_not_cancelled(ctx: &RunContext) -> Result<(), StageError> {
    if ctx.is_cancelled() {
        Err(StageError::Cancelled)
    } else {
        Ok(())
    }
}

/// True if a `uname -r` style release satisfies the minimum kernel.
pub(crate) fn kernel_supported(release: &str) -> bool {
    version_at_least(release, MIN_KERNEL)
}
