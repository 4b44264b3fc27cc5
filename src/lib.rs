//! StrixForge: staged post-install configurator for AMD Strix Halo machines.
//!
//! A [`Platform`] supplies an ordered list of [`Stage`]s; the [`Engine`] runs
//! them one at a time against a [`Ui`], publishing lifecycle events on an
//! [`EventBus`] and recording what finished in a [`StateStore`] so a re-run
//! can pick up where the last one stopped.
//!
//! Modules:
//! - **error**: error enums per concern
//! - **models**: stage status, results, log entries
//! - **context**: run context and cancellation
//! - **events**: bounded fan-out event bus
//! - **stage**: Stage and Platform contracts
//! - **orchestrator**: the engine and run-state board
//! - **ui**: UI contract, console front ends, prompt rendezvous
//! - **device**: device model, DMI detection, quirk handlers
//! - **state_store**: persisted install state
//! - **config**: installer settings
//! - **system**: OS command helpers (pacman, systemd, grub, lxd)
//! - **platform**: concrete platforms
//! - **log_collector**: session log files

pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod events;
pub mod log_collector;
pub mod models;
pub mod orchestrator;
pub mod platform;
pub mod stage;
pub mod state_store;
pub mod system;
pub mod ui;

// Re-export the log crate for macro usage
pub use log;

pub use config::{Settings, SettingsManager};
pub use context::{cancel_pair, CancelHandle, CancelToken, RunContext};
pub use device::{Device, DeviceKind, Quirk, QuirkKind, QuirkRegistry};
pub use error::{
    ConfigError, EngineError, HardwareError, QuirkError, Result, StageError, StateError,
};
pub use events::{Event, EventBus, Subscription};
pub use log_collector::{LogCollector, LogLine};
pub use models::{LogEntry, LogLevel, StageInfo, StageResult, StageStatus};
pub use orchestrator::{Engine, RunState, RunSummary};
pub use platform::StrixHaloPlatform;
pub use stage::{Platform, Stage};
pub use state_store::{InstallState, StateStore};
pub use ui::{AutoUi, ConsoleFrontend, EventUi, NullUi, Ui};

/// Installer version recorded in the state file.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
