use futures::future::{BoxFuture, FutureExt};
use std::path::PathBuf;
use std::sync::Mutex;

use super::kernel_supported;
use crate::context::RunContext;
use crate::device::{apply_device_quirks, detect_ram_gb, QuirkRegistry};
use crate::error::StageError;
use crate::platform::strixhalo::MIN_KERNEL;
use crate::stage::Stage;
use crate::system::{self, grub::Grub, systemd};
use crate::ui::Ui;

/// Above this much RAM, zram competes with the iGPU's GTT and is turned off.
const ZRAM_DISABLE_THRESHOLD_GB: u32 = 64;
const ZRAM_SERVICE: &str = "zram-generator@zram0.service";

const KERNEL_PARAMS: &[&str] = &["iommu=pt", "amd_pstate=active"];

/// Kernel version gate, GRUB command line, and device quirks.
pub struct KernelStage {
    grub: Grub,
    quirks: QuirkRegistry,
    backup: Mutex<Option<PathBuf>>,
}

impl KernelStage {
    pub fn new(quirks: QuirkRegistry) -> Self {
        KernelStage {
            grub: Grub::default(),
            quirks,
            backup: Mutex::new(None),
        }
    }

    fn remember_backup(&self, path: PathBuf) {
        if let Ok(mut slot) = self.backup.lock() {
            *slot = Some(path);
        }
    }

    fn take_backup(&self) -> Option<PathBuf> {
        self.backup.lock().ok().and_then(|mut slot| slot.take())
    }

    async fn configure(&self, ctx: &RunContext, ui: &dyn Ui) -> Result<(), StageError> {
        ui.progress(10, "Checking kernel version...");
        let release = system::kernel_release().await?;
        ui.info(&format!("Kernel version: {}", release));
        if !kernel_supported(&release) {
            return Err(StageError::Requirement(format!(
                "kernel {}+ required, found {}. Please update your kernel",
                MIN_KERNEL, release
            )));
        }
        ui.info("✓ Kernel version meets requirements");

        ui.progress(25, "Backing up GRUB configuration...");
        match self.grub.backup().await {
            Ok(path) => {
                ui.info(&format!("GRUB backup: {}", path.display()));
                self.remember_backup(path);
            }
            Err(e) => ui.warn(&format!("Could not backup GRUB: {}", e.user_message())),
        }

        ui.progress(40, "Configuring kernel parameters...");
        for param in KERNEL_PARAMS {
            match self.grub.add_cmdline_param(param).await {
                Ok(true) => ui.info(&format!("✓ Added {}", param)),
                Ok(false) => ui.info(&format!("✓ {} already set", param)),
                Err(e) => ui.warn(&format!("Could not add {}: {}", param, e.user_message())),
            }
        }

        ui.progress(60, "Applying device quirks...");
        match ctx.device() {
            Some(device) => {
                let report = apply_device_quirks(device, &self.quirks, ctx, ui).await;
                if !report.all_applied() {
                    ui.warn(&format!("{} quirk(s) could not be applied", report.failed.len()));
                }
            }
            None => ui.warn("Device not identified, skipping device quirks"),
        }

        ui.progress(75, "Checking ZRAM config...");
        let ram_gb = detect_ram_gb();
        if ram_gb == 0 {
            ui.warn("Could not determine system RAM. Skipping ZRAM optimization.");
        } else if ram_gb >= ZRAM_DISABLE_THRESHOLD_GB {
            ui.info(&format!(
                "High memory system ({} GB) detected. Disabling ZRAM to prevent GTT conflicts.",
                ram_gb
            ));
            match systemd::disable_now(ZRAM_SERVICE).await {
                Ok(()) => ui.info("✓ ZRAM disabled"),
                Err(e) => ui.warn(&format!(
                    "Failed to disable ZRAM (might not be active): {}",
                    e.user_message()
                )),
            }
        } else {
            ui.info(&format!("System memory {} GB < {}GB. Keeping ZRAM enabled.", ram_gb, ZRAM_DISABLE_THRESHOLD_GB));
        }

        ui.progress(90, "Updating GRUB configuration...");
        self.grub.update().await?;

        ui.progress(100, "Kernel configuration complete");
        ui.info("NOTE: Reboot may be required for kernel parameter changes");
        Ok(())
    }
}

impl Stage for KernelStage {
    fn id(&self) -> &str {
        "kernel"
    }

    fn name(&self) -> &str {
        "Kernel Configuration"
    }

    fn description(&self) -> &str {
        "Verify kernel version, configure GRUB, apply device quirks"
    }

    fn run<'a>(&'a self, ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.configure(ctx, ui).boxed()
    }

    /// Put the pre-run GRUB defaults back and regenerate grub.cfg.
    fn rollback<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<(), StageError>> {
        async move {
            let Some(backup) = self.take_backup() else {
                log::info!("[Kernel] no GRUB backup taken, nothing to restore");
                return Ok(());
            };
            log::info!("[Kernel] restoring GRUB defaults from {}", backup.display());
            self.grub.restore(&backup).await?;
            self.grub.update().await
        }
        .boxed()
    }
}
