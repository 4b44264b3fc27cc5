//! AMD Strix Halo (gfx1151) machines.

pub mod stages;

use futures::future::{BoxFuture, FutureExt};
use std::sync::Arc;

use crate::device::{self, Device, QuirkRegistry};
use crate::error::{HardwareError, StageError};
use crate::stage::{Platform, Stage};
use crate::system;

pub const PLATFORM_NAME: &str = "AMD Strix Halo (gfx1151)";

/// Minimum versions the iGPU needs.
pub const MIN_KERNEL: &str = "6.18";
pub const MIN_MESA: &str = "25.3";
pub const MIN_LLVM: &str = "21";

#[derive(Debug, Clone)]
pub struct StrixHaloPlatform {
    quirks: QuirkRegistry,
}

impl Default for StrixHaloPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl StrixHaloPlatform {
    pub fn new() -> Self {
        StrixHaloPlatform {
            quirks: QuirkRegistry::builtin(),
        }
    }

    /// Use a custom quirk registry for the kernel stage.
    pub fn with_quirks(quirks: QuirkRegistry) -> Self {
        StrixHaloPlatform { quirks }
    }
}

impl Platform for StrixHaloPlatform {
    fn name(&self) -> &str {
        PLATFORM_NAME
    }

    fn detect(&self) -> BoxFuture<'_, Result<Device, HardwareError>> {
        device::detect_device().boxed()
    }

    fn stages(&self) -> Vec<Arc<dyn Stage>> {
        vec![
            Arc::new(stages::KernelStage::new(self.quirks.clone())),
            Arc::new(stages::GraphicsStage),
            Arc::new(stages::SystemStage),
            Arc::new(stages::LxdStage),
            Arc::new(stages::ThermalStage),
            Arc::new(stages::CleanupStage),
            Arc::new(stages::ValidateStage),
            Arc::new(stages::AppsStage),
            Arc::new(stages::WorkspaceStage::default()),
        ]
    }

    /// Everything here drives pacman, so a non-Arch host is refused up front.
    fn validate(&self) -> BoxFuture<'_, Result<(), StageError>> {
        async {
            if system::command_exists("pacman").await {
                Ok(())
            } else {
                Err(StageError::Requirement(
                    "pacman not found; an Arch-based distribution is required".to_string(),
                ))
            }
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_and_optionality() {
        let platform = StrixHaloPlatform::new();
        let stages = platform.stages();
        let ids: Vec<&str> = stages.iter().map(|s| s.id()).collect();
        assert_eq!(
            ids,
            ["kernel", "graphics", "system", "lxd", "thermal", "cleanup", "validate", "apps", "workspace"]
        );

        let optional: Vec<&str> = stages.iter().filter(|s| s.optional()).map(|s| s.id()).collect();
        assert_eq!(optional, ["thermal", "cleanup", "apps", "workspace"]);
    }

    #[test]
    fn test_stage_ids_unique() {
        let stages = StrixHaloPlatform::new().stages();
        let mut ids: Vec<String> = stages.iter().map(|s| s.id().to_string()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), stages.len());
    }
}
