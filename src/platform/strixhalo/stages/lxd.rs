use futures::future::{BoxFuture, FutureExt};

use crate::context::RunContext;
use crate::error::StageError;
use crate::stage::Stage;
use crate::system::{self, lxd, pacman, systemd};
use crate::ui::Ui;

/// LXD with the host GPU passed through and nesting enabled.
pub struct LxdStage;

impl LxdStage {
    async fn setup(&self, ui: &dyn Ui) -> Result<(), StageError> {
        let user = system::invoking_user()
            .ok_or_else(|| StageError::Failed("could not determine current user".to_string()))?;

        ui.progress(10, "Installing LXD...");
        pacman::install(&["lxd"]).await?;
        ui.info("✓ LXD installed");

        ui.progress(25, "Enabling LXD service...");
        systemd::enable_now("lxd.socket").await?;
        ui.info("✓ LXD service enabled");

        ui.progress(40, "Configuring user permissions...");
        if lxd::is_user_in_group(&user).await {
            ui.info(&format!("✓ User {} already in lxd group", user));
        } else {
            lxd::add_user_to_group(&user).await?;
            ui.info(&format!("✓ Added {} to lxd group", user));
            ui.warn("NOTE: Log out and back in for group changes to take effect");
        }

        // Re-running init on an initialized daemon fails; that is fine
        ui.progress(55, "Initializing LXD...");
        match lxd::init_auto().await {
            Ok(()) => ui.info("✓ LXD initialized"),
            Err(e) => ui.warn(&format!("LXD init warning: {}", e.user_message())),
        }

        ui.progress(70, "Configuring GPU passthrough...");
        match lxd::add_gpu_device().await {
            Ok(()) => ui.info("✓ GPU passthrough configured"),
            Err(e) => ui.warn(&format!("GPU device config warning: {}", e.user_message())),
        }

        ui.progress(85, "Enabling container nesting...");
        match lxd::enable_nesting().await {
            Ok(()) => ui.info("✓ Container nesting enabled"),
            Err(e) => ui.warn(&format!("Nesting config warning: {}", e.user_message())),
        }

        ui.progress(100, "LXD setup complete");
        Ok(())
    }
}

impl Stage for LxdStage {
    fn id(&self) -> &str {
        "lxd"
    }

    fn name(&self) -> &str {
        "LXD Containerization"
    }

    fn description(&self) -> &str {
        "Install LXD, configure GPU passthrough, enable nesting"
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.setup(ui).boxed()
    }
}
