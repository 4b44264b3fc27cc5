use futures::future::{BoxFuture, FutureExt};

use crate::context::RunContext;
use crate::error::StageError;
use crate::stage::Stage;
use crate::system::{self, pacman};
use crate::ui::Ui;

const ESSENTIALS: &[&str] = &[
    "base-devel",
    "git",
    "wget",
    "curl",
    "vim",
    "neovim",
    "btop",
    "fastfetch",
];

/// Mirror ranking, full upgrade, essential tools.
pub struct SystemStage;

impl SystemStage {
    async fn rank_mirrors(&self, ui: &dyn Ui) {
        let outcome = if system::command_exists("cachyos-rate-mirrors").await {
            ui.info("Running CachyOS mirror ranking...");
            system::exec_sudo("cachyos-rate-mirrors", &[]).await
        } else if system::command_exists("rate-mirrors").await {
            ui.info("Running rate-mirrors...");
            system::exec_shell_sudo("rate-mirrors --save /etc/pacman.d/mirrorlist arch").await
        } else {
            ui.info("Mirror ranking tools not found, skipping");
            return;
        };

        match outcome {
            Ok(_) => ui.info("✓ Mirrors optimized"),
            Err(e) => ui.warn(&format!("Mirror ranking failed: {}", e.user_message())),
        }
    }

    async fn update(&self, ui: &dyn Ui) -> Result<(), StageError> {
        ui.progress(10, "Checking for mirror optimization...");
        self.rank_mirrors(ui).await;

        ui.progress(30, "Updating system packages...");
        pacman::update().await?;
        ui.info("✓ System updated");

        ui.progress(60, "Installing essential packages...");
        pacman::install(ESSENTIALS).await?;
        ui.info("✓ Essential packages installed");

        ui.progress(100, "System update complete");
        Ok(())
    }
}

impl Stage for SystemStage {
    fn id(&self) -> &str {
        "system"
    }

    fn name(&self) -> &str {
        "System Update"
    }

    fn description(&self) -> &str {
        "Update mirrors, system packages, install essentials"
    }

    fn run<'a>(&'a self, _ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.update(ui).boxed()
    }
}
