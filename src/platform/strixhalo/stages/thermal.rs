use futures::future::{BoxFuture, FutureExt};

use crate::context::RunContext;
use crate::error::StageError;
use crate::stage::Stage;
use crate::system::{self, pacman};
use crate::ui::Ui;

/// lm_sensors and fancontrol. Fan curves are left to `pwmconfig`.
pub struct ThermalStage;

impl ThermalStage {
    async fn setup(&self, ui: &dyn Ui) -> Result<(), StageError> {
        ui.progress(10, "Installing thermal monitoring packages...");
        pacman::install(&["lm_sensors", "fancontrol"]).await?;
        ui.info("✓ lm_sensors and fancontrol installed");

        ui.progress(40, "Detecting temperature sensors...");
        match system::exec_shell_sudo("yes '' | sensors-detect --auto").await {
            Ok(_) => ui.info("✓ Sensors detected"),
            Err(e) => ui.warn(&format!("sensors-detect had issues: {}", e.user_message())),
        }

        ui.progress(60, "Loading sensor modules...");
        if let Err(e) = system::exec_sudo("systemctl", &["restart", "systemd-modules-load"]).await {
            log::debug!("[Thermal] module reload failed: {}", e);
        }

        ui.progress(75, "Testing sensors...");
        match system::exec("sensors", &[]).await {
            Ok(_) => ui.info("✓ Sensors responding"),
            Err(_) => ui.warn("Could not read sensors"),
        }

        ui.progress(90, "Fan control ready...");
        ui.info("To configure fan curves, run: sudo pwmconfig");
        ui.info("Then enable the service: sudo systemctl enable --now fancontrol");

        ui.progress(100, "Thermal setup complete");
        Ok(())
    }
}

impl Stage for ThermalStage {
    fn id(&self) -> &str {
        "thermal"
    }

    fn name(&self) -> &str {
        "Fan & Thermal Control"
    }

    fn description(&self) -> &str {
        "Install lm_sensors and fancontrol for case fan management"
    }

    fn optional(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.setup(ui).boxed()
    }
}
