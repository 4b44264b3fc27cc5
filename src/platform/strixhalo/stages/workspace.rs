use futures::future::{BoxFuture, FutureExt};
use std::sync::Mutex;

use super::ensure_not_cancelled;
use crate::context::RunContext;
use crate::error::StageError;
use crate::stage::Stage;
use crate::system::lxd;
use crate::ui::Ui;

const COMFYUI_REPO: &str = "https://github.com/comfyanonymous/ComfyUI";
const COMFYUI_DIR: &str = "/opt/ComfyUI";

/// One container to provision: name, packages, and where its progress band starts.
struct Workspace {
    name: &'static str,
    packages: &'static [&'static str],
    progress_start: u8,
}

const AI_LAB: Workspace = Workspace {
    name: "ai-lab",
    packages: &[
        "rocm-hip-sdk",
        "python-pytorch-rocm",
        "python-numpy",
        "python-pip",
        "git",
        "base-devel",
        "fastfetch",
        "vim",
        "ollama",
    ],
    progress_start: 10,
};

const DEV_LAB: Workspace = Workspace {
    name: "dev-lab",
    packages: &[
        "base-devel",
        "git",
        "rust",
        "go",
        "nodejs",
        "npm",
        "python",
        "python-pip",
        "vim",
        "neovim",
        "fastfetch",
    ],
    progress_start: 55,
};

/// ai-lab and dev-lab LXD containers.
///
/// Containers that already exist are left alone. Rollback deletes only the
/// containers this run launched.
#[derive(Default)]
pub struct WorkspaceStage {
    created: Mutex<Vec<String>>,
}

impl WorkspaceStage {
    fn record_created(&self, name: &str) {
        if let Ok(mut created) = self.created.lock() {
            created.push(name.to_string());
        }
    }

    fn take_created(&self) -> Vec<String> {
        self.created
            .lock()
            .map(|mut created| std::mem::take(&mut *created))
            .unwrap_or_default()
    }

    /// Returns false if the container was already there.
    async fn provision(&self, ws: &Workspace, ctx: &RunContext, ui: &dyn Ui) -> Result<bool, StageError> {
        if lxd::container_exists(ws.name).await {
            ui.info(&format!("Container {} already exists, skipping creation", ws.name));
            return Ok(false);
        }

        ui.progress(ws.progress_start, &format!("Creating {} container...", ws.name));
        ui.info(&format!("Launching {} container from archlinux image...", ws.name));
        lxd::launch(lxd::ARCH_IMAGE, ws.name)
            .await
            .map_err(|e| StageError::Failed(format!("failed to create {}: {}", ws.name, e.user_message())))?;
        self.record_created(ws.name);

        ui.progress(ws.progress_start + 5, "Waiting for container network...");
        match lxd::wait_for_network(ws.name, ctx.cancel_token()).await {
            Ok(()) => {}
            Err(StageError::Cancelled) => return Err(StageError::Cancelled),
            Err(_) => ui.warn("Network wait timed out, continuing anyway"),
        }

        for (i, &package) in ws.packages.iter().enumerate() {
            ensure_not_cancelled(ctx)?;
            let percent = ws.progress_start + 10 + (i as u8) * 2;
            ui.progress(percent, &format!("Installing {}...", package));
            if let Err(e) = lxd::exec_in(ws.name, &["pacman", "-S", "--needed", "--noconfirm", package]).await {
                ui.warn(&format!("Failed to install {}: {}", package, e.user_message()));
            }
        }
        Ok(true)
    }

    async fn install_comfyui(&self, ui: &dyn Ui) {
        ui.progress(48, "Cloning ComfyUI...");
        if let Err(e) = lxd::exec_in(AI_LAB.name, &["git", "clone", COMFYUI_REPO, COMFYUI_DIR]).await {
            ui.warn(&format!("Failed to clone ComfyUI: {}", e.user_message()));
            return;
        }

        ui.progress(50, "Installing ComfyUI dependencies...");
        let requirements = format!("{}/requirements.txt", COMFYUI_DIR);
        if let Err(e) = lxd::exec_in(AI_LAB.name, &["pip", "install", "-r", requirements.as_str()]).await {
            ui.warn(&format!("ComfyUI dependencies incomplete: {}", e.user_message()));
        }
        ui.info(&format!("✓ ComfyUI installed at {}", COMFYUI_DIR));
    }

    async fn create(&self, ctx: &RunContext, ui: &dyn Ui) -> Result<(), StageError> {
        if self.provision(&AI_LAB, ctx, ui).await? {
            self.install_comfyui(ui).await;
            ui.info("✓ ai-lab container ready");
            ui.info("  Run 'ollama pull llama3.2' to download a model");
            ui.info("  Run 'python /opt/ComfyUI/main.py' to start ComfyUI");
        }

        if self.provision(&DEV_LAB, ctx, ui).await? {
            ui.info("✓ dev-lab container ready");
        }

        ui.progress(100, "Workspaces ready");
        Ok(())
    }
}

impl Stage for WorkspaceStage {
    fn id(&self) -> &str {
        "workspace"
    }

    fn name(&self) -> &str {
        "AI & Dev Workspaces"
    }

    fn description(&self) -> &str {
        "Create ai-lab (ROCm/PyTorch) and dev-lab (Rust/Go) containers"
    }

    fn optional(&self) -> bool {
        true
    }

    fn run<'a>(&'a self, ctx: &'a RunContext, ui: &'a dyn Ui) -> BoxFuture<'a, Result<(), StageError>> {
        self.create(ctx, ui).boxed()
    }

    fn rollback<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<(), StageError>> {
        async move {
            let mut first_error = None;
            for name in self.take_created() {
                log::info!("[Workspace] deleting partially provisioned container {}", name);
                if let Err(e) = lxd::delete(&name, true).await {
                    log::warn!("[Workspace] could not delete {}: {}", name, e);
                    first_error.get_or_insert(e);
                }
            }
            first_error.map_or(Ok(()), Err)
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_bands_stay_in_range() {
        for ws in [&AI_LAB, &DEV_LAB] {
            let last = ws.progress_start as usize + 10 + (ws.packages.len() - 1) * 2;
            assert!(last <= 100, "{} overflows progress", ws.name);
        }
        // ai-lab must finish before dev-lab starts
        assert!(AI_LAB.progress_start as usize + 10 + AI_LAB.packages.len() * 2 <= DEV_LAB.progress_start as usize);
    }

    #[test]
    fn test_rollback_list_drains() {
        let stage = WorkspaceStage::default();
        stage.record_created("ai-lab");
        assert_eq!(stage.take_created(), vec!["ai-lab".to_string()]);
        assert!(stage.take_created().is_empty());
    }
}
