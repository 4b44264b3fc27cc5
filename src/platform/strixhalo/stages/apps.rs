use futures::future::{BoxFuture, FutureExt};

use super::ensure_not_cancelled;
use crate::context::RunContext;
use crate::error::StageError;
use crate::stage::Stage;
use crate::system::pacman;
use crate::ui::Ui;

const OFFICIAL_PACKAGES: &[&str] = &["firefox", "vlc", "signal-desktop"];

/// (package, display name) pairs offered one by one from the AUR.
const AUR_PACKAGES: &[(&str, &str)] = &[
    ("google-chrome", "Google Chrome"),
    ("ungoogled-chromium-bin", "Ungoogled Chromium"),
    ("helium", "Helium Browser"),
    ("onlyoffice-bin", "OnlyOffice"),
];

/// Desktop applications. Individual package failures are warnings.
pub struct AppsStage;

impl AppsStage {
    async fn install(&self, ctx: &RunContext, ui: &dyn Ui) -> Result<(), StageError> {
        ui.progress(5, "Setting up AUR helper...");
        if !pacman::is_installed("yay").await {
            match pacman::install(&["yay"]).await {
                Ok(()) => ui.info("✓ yay installed"),
                Err(e) => ui.warn(&format!("Could not install yay: {}", e.user_message())),
            }
        }

        ui.progress(15, "Installing browsers and utilities...");
        match pacman::install(OFFICIAL_PACKAGES).await {
            Ok(()) => ui.info("✓ Firefox, VLC, Signal installed"),
            Err(e) => ui.warn(&format!("Some official packages failed: {}", e.user_message())),
        }

        ui.progress(40, "AUR packages...");
        for &(package, name) in AUR_PACKAGES {
            ensure_not_cancelled(ctx)?;
            if !ui.confirm(&format!("Install {}?", name), false).await {
                continue;
            }
            ui.info(&format!("Installing {}...", name));
            match pacman::yay_install(&[package]).await {
                Ok(()) => ui.info(&format!("✓ {} installed", name)),
                Err(e) => ui.warn(&format!("Failed to install {}: {}", name, e.user_message())),
            }
        }

        ui.progress(100, "Desktop software installation complete");
        Ok(())
    }
}

impl Stage for AppsStage {
    fn id(&self) -> &str {
        "apps"
    }

    fn name(&self) -> &str {
        "Desktop Software"
    }

    fn description(&self) -> &str {
        "Install browsers, office suite, and utilities"
    }

    fn optional(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.install(ctx, ui).boxed()
    }
}
