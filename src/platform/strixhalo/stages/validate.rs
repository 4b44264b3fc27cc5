use futures::future::{BoxFuture, FutureExt};

use super::kernel_supported;
use crate::context::RunContext;
use crate::error::StageError;
use crate::models::LogLevel;
use crate::platform::strixhalo::MIN_KERNEL;
use crate::stage::Stage;
use crate::system::{self, grub, systemd};
use crate::ui::Ui;

/// Post-install checks. Counts hard failures and reports them together.
pub struct ValidateStage;

/// True if glxinfo output names an AMD renderer.
fn is_amd_renderer(glxinfo: &str) -> bool {
    glxinfo.contains("AMD") || glxinfo.contains("Radeon")
}

impl ValidateStage {
    async fn check(&self, ui: &dyn Ui) -> Result<(), StageError> {
        let mut failures = 0usize;

        ui.progress(10, "Checking kernel version...");
        match system::kernel_release().await {
            Ok(release) if kernel_supported(&release) => {
                ui.info(&format!("✓ Kernel {} meets requirements", release));
            }
            Ok(release) => {
                ui.log(
                    LogLevel::Error,
                    &format!("✗ Kernel {} does not meet {}+ requirement", release, MIN_KERNEL),
                );
                failures += 1;
            }
            Err(e) => {
                ui.log(
                    LogLevel::Error,
                    &format!("✗ Could not get kernel version: {}", e.user_message()),
                );
                failures += 1;
            }
        }

        // The running cmdline only changes after a reboot, so this is a warning
        ui.progress(25, "Checking kernel parameters...");
        let iommu = grub::current_cmdline()
            .await
            .map(|cmdline| cmdline.split_whitespace().any(|t| t == "iommu=pt"))
            .unwrap_or(false);
        if iommu {
            ui.info("✓ IOMMU passthrough enabled");
        } else {
            ui.warn("✗ iommu=pt not in current cmdline (reboot may be needed)");
        }

        ui.progress(40, "Checking GPU...");
        match system::run("glxinfo", &["-B"]).await {
            Ok(out) if out.success() => {
                if is_amd_renderer(&out.stdout) {
                    ui.info("✓ AMD GPU detected in OpenGL renderer");
                } else {
                    ui.warn("✗ AMD GPU not detected in OpenGL renderer");
                    failures += 1;
                }
            }
            _ => ui.warn("✗ glxinfo not available"),
        }

        ui.progress(55, "Checking Vulkan...");
        match system::run("vulkaninfo", &["--summary"]).await {
            Ok(out) if out.success() => ui.info("✓ Vulkan is functional"),
            _ => {
                ui.warn("✗ Vulkan check failed");
                failures += 1;
            }
        }

        ui.progress(70, "Checking LXD service...");
        if systemd::is_active("lxd.socket").await {
            ui.info("✓ LXD socket is active");
        } else {
            ui.log(LogLevel::Error, "✗ LXD socket is not running");
            failures += 1;
        }

        ui.progress(85, "Testing LXD access...");
        match system::run("lxc", &["list"]).await {
            Ok(out) if out.success() => ui.info("✓ LXD access working"),
            _ => ui.warn("✗ Cannot run 'lxc list' - may need to log out/in for group changes"),
        }

        ui.progress(100, "Validation complete");

        if failures > 0 {
            return Err(StageError::Failed(format!("{} validation checks failed", failures)));
        }
        ui.info("All validation checks passed!");
        Ok(())
    }
}

impl Stage for ValidateStage {
    fn id(&self) -> &str {
        "validate"
    }

    fn name(&self) -> &str {
        "Validation"
    }

    fn description(&self) -> &str {
        "Verify kernel, GPU, IOMMU, and LXD configuration"
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.check(ui).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_amd_renderer_detection() {
        assert!(is_amd_renderer("OpenGL renderer string: AMD Radeon 8060S Graphics (radeonsi, gfx1151)"));
        assert!(!is_amd_renderer("OpenGL renderer string: llvmpipe (LLVM 21.1.0, 256 bits)"));
    }
}
