//! Quirk application.
//!
//! Quirks on a [`Device`] are data. The registry maps an Auto quirk's id to
//! the async action that performs it, so the device model stays serializable
//! and the actions stay swappable in tests.

use futures::future::{BoxFuture, FutureExt};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::context::RunContext;
use crate::device::Device;
use crate::error::{QuirkError, StageError};
use crate::models::LogLevel;
use crate::system::{grub::Grub, pacman};
use crate::ui::Ui;

/// Async action behind an Auto quirk.
pub type QuirkHandler =
    Arc<dyn for<'a> Fn(&'a RunContext) -> BoxFuture<'a, Result<(), StageError>> + Send + Sync>;

#[derive(Clone, Default)]
pub struct QuirkRegistry {
    handlers: HashMap<String, QuirkHandler>,
}

impl fmt::Debug for QuirkRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        ids.sort_unstable();
        f.debug_struct("QuirkRegistry").field("handlers", &ids).finish()
    }
}

impl QuirkRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handlers for every Auto quirk the known devices declare.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("e610-blacklist", blacklist_e610);
        registry.register("tdp-tool", install_ryzenadj);
        registry
    }

    /// Register (or replace) the handler for `id`.
    pub fn register<F>(&mut self, id: impl Into<String>, handler: F)
    where
        F: for<'a> Fn(&'a RunContext) -> BoxFuture<'a, Result<(), StageError>> + Send + Sync + 'static,
    {
        self.handlers.insert(id.into(), Arc::new(handler));
    }

    pub fn get(&self, id: &str) -> Option<&QuirkHandler> {
        self.handlers.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.handlers.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

fn blacklist_e610(_ctx: &RunContext) -> BoxFuture<'_, Result<(), StageError>> {
    async move {
        Grub::default()
            .add_cmdline_param("modprobe.blacklist=ice")
            .await
            .map(|_| ())
    }
    .boxed()
}

fn install_ryzenadj(_ctx: &RunContext) -> BoxFuture<'_, Result<(), StageError>> {
    async move {
        // Not in the official repos; comes from the AUR
        if pacman::is_installed("ryzenadj").await {
            return Ok(());
        }
        pacman::yay_install(&["ryzenadj"]).await
    }
    .boxed()
}

/// What happened to each of a device's quirks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuirkReport {
    pub applied: Vec<String>,
    pub failed: Vec<QuirkError>,
    pub advisories: Vec<String>,
}

impl QuirkReport {
    pub fn all_applied(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Apply every quirk of `device` in declared order.
///
/// Advisory quirks are surfaced as warnings. Auto quirks run their registered
/// handler; a missing handler or a failing one is reported in the returned
/// [`QuirkReport`] and logged, never propagated. In a dry run nothing executes.
pub async fn apply_device_quirks(
    device: &Device,
    registry: &QuirkRegistry,
    ctx: &RunContext,
    ui: &dyn Ui,
) -> QuirkReport {
    let mut report = QuirkReport::default();

    for quirk in device.quirks() {
        if !quirk.is_auto() {
            ui.log(LogLevel::Warn, &format!("ADVISORY: {}", quirk.description));
            report.advisories.push(quirk.id.clone());
            continue;
        }

        if ctx.is_dry_run() {
            ui.info(&format!("[DRY RUN] Would apply quirk: {}", quirk.description));
            continue;
        }

        let Some(handler) = registry.get(&quirk.id) else {
            log::warn!("[Quirks] no handler for '{}' on {}", quirk.id, device.name());
            ui.warn(&format!("No handler for quirk: {}", quirk.id));
            report.failed.push(QuirkError::NoHandler(quirk.id.clone()));
            continue;
        };

        ui.info(&format!("Applying quirk: {}", quirk.description));
        match handler(ctx).await {
            Ok(()) => {
                log::info!("[Quirks] applied '{}'", quirk.id);
                report.applied.push(quirk.id.clone());
            }
            Err(e) => {
                ui.warn(&format!("Quirk failed: {}", e.user_message()));
                log::warn!("[Quirks] '{}' failed: {}", quirk.id, e);
                report.failed.push(QuirkError::Failed {
                    id: quirk.id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }

    report
}
