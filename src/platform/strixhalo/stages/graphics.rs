use futures::future::{BoxFuture, FutureExt};

use crate::context::RunContext;
use crate::error::StageError;
use crate::platform::strixhalo::{MIN_LLVM, MIN_MESA};
use crate::stage::Stage;
use crate::system::{self, pacman, versions::version_at_least};
use crate::ui::Ui;

const PACKAGES: &[&str] = &[
    "mesa",
    "lib32-mesa",
    "mesa-utils",
    "vulkan-radeon",
    "lib32-vulkan-radeon",
    "vulkan-tools",
    "linux-firmware",
    "llvm",
    "lib32-llvm",
];

/// Mesa, Vulkan, LLVM and firmware.
pub struct GraphicsStage;

impl GraphicsStage {
    async fn install(&self, ui: &dyn Ui) -> Result<(), StageError> {
        ui.progress(10, "Installing graphics packages...");
        pacman::install(PACKAGES).await?;
        ui.info("✓ Graphics packages installed");

        ui.progress(50, "Verifying Mesa version...");
        let mesa = pacman::version_of("mesa").await?;
        ui.info(&format!("Mesa version: {}", mesa));
        if !version_at_least(&mesa, MIN_MESA) {
            return Err(StageError::Requirement(format!("Mesa {}+ required, found {}", MIN_MESA, mesa)));
        }
        ui.info("✓ Mesa version meets requirements");

        ui.progress(70, "Verifying LLVM version...");
        match pacman::version_of("llvm").await {
            Ok(llvm) => {
                ui.info(&format!("LLVM version: {}", llvm));
                if !version_at_least(&llvm, MIN_LLVM) {
                    return Err(StageError::Requirement(format!(
                        "LLVM {}.x required, found {}",
                        MIN_LLVM, llvm
                    )));
                }
                ui.info("✓ LLVM version meets requirements");
            }
            Err(e) => ui.warn(&format!("Could not verify LLVM version: {}", e.user_message())),
        }

        ui.progress(90, "Checking Vulkan...");
        match system::run("vulkaninfo", &["--summary"]).await {
            Ok(out) if out.success() => ui.info("✓ Vulkan is functional"),
            _ => ui.warn("vulkaninfo check failed - Vulkan may not be working"),
        }

        ui.progress(100, "Graphics stack complete");
        Ok(())
    }
}

impl Stage for GraphicsStage {
    fn id(&self) -> &str {
        "graphics"
    }

    fn name(&self) -> &str {
        "Graphics Stack"
    }

    fn description(&self) -> &str {
        "Install Mesa 25.3+, Vulkan, LLVM 21.x, firmware"
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.install(ui).boxed()
    }
}
