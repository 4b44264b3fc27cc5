//! UI contract and the front ends shipped with the crate.
//!
//! The engine talks to exactly one [`Ui`]. Notifications are synchronous and
//! must not block; the three prompt operations return futures so an
//! asynchronous front end can answer them from its own loop (see
//! [`rendezvous::EventUi`]).

pub mod console;
pub mod rendezvous;

use futures::future::{BoxFuture, FutureExt};
use std::sync::Mutex;

use crate::models::{LogLevel, StageInfo, StageResult, StageStatus};

pub use console::ConsoleFrontend;
pub use rendezvous::{EventUi, PromptKind, PromptReply, PromptRequest, PromptResponder};

/// Capabilities every front end provides to the engine and to stage bodies.
pub trait Ui: Send + Sync {
    fn stage_start(&self, stage: &StageInfo);
    fn stage_complete(&self, result: &StageResult);
    fn progress(&self, percent: u8, message: &str);
    fn log(&self, level: LogLevel, message: &str);

    fn confirm<'a>(&'a self, message: &'a str, default_yes: bool) -> BoxFuture<'a, bool>;
    fn select<'a>(&'a self, message: &'a str, options: &'a [String]) -> BoxFuture<'a, usize>;
    fn input<'a>(&'a self, message: &'a str, default_value: &'a str) -> BoxFuture<'a, String>;

    fn info(&self, message: &str) {
        self.log(LogLevel::Info, message);
    }

    fn warn(&self, message: &str) {
        self.log(LogLevel::Warn, message);
    }
}

/// Discards everything; prompts resolve to their defaults.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullUi;

impl Ui for NullUi {
    fn stage_start(&self, _stage: &StageInfo) {}
    fn stage_complete(&self, _result: &StageResult) {}
    fn progress(&self, _percent: u8, _message: &str) {}
    fn log(&self, _level: LogLevel, _message: &str) {}

    fn confirm<'a>(&'a self, _message: &'a str, default_yes: bool) -> BoxFuture<'a, bool> {
        futures::future::ready(default_yes).boxed()
    }

    fn select<'a>(&'a self, _message: &'a str, _options: &'a [String]) -> BoxFuture<'a, usize> {
        futures::future::ready(0).boxed()
    }

    fn input<'a>(&'a self, _message: &'a str, default_value: &'a str) -> BoxFuture<'a, String> {
        futures::future::ready(default_value.to_string()).boxed()
    }
}

/// Unattended console mode: prints a line per notification, answers every
/// prompt with its default.
#[derive(Debug, Default)]
pub struct AutoUi {
    last_percent: Mutex<Option<u8>>,
}

impl AutoUi {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn status_glyph(status: StageStatus) -> &'static str {
    match status {
        StageStatus::Success => "✓",
        StageStatus::Failed => "✗",
        StageStatus::Skipped => "-",
        StageStatus::Pending | StageStatus::Running => "…",
    }
}

impl Ui for AutoUi {
    fn stage_start(&self, stage: &StageInfo) {
        if let Ok(mut last) = self.last_percent.lock() {
            *last = None;
        }
        println!("==> {}: {}", stage.name, stage.description);
    }

    fn stage_complete(&self, result: &StageResult) {
        match &result.error {
            Some(err) => println!(
                "  {} {} failed after {:.1}s: {}",
                status_glyph(result.status),
                result.stage_name,
                result.duration.as_secs_f64(),
                err.user_message()
            ),
            None => println!(
                "  {} {} ({}, {:.1}s)",
                status_glyph(result.status),
                result.stage_name,
                result.status,
                result.duration.as_secs_f64()
            ),
        }
    }

    fn progress(&self, percent: u8, message: &str) {
        // Repeated percentages are noise in a scrolling terminal
        if let Ok(mut last) = self.last_percent.lock() {
            if *last == Some(percent) {
                return;
            }
            *last = Some(percent);
        }
        log::debug!("[Progress] {}% {}", percent, message);
        println!("  [{:>3}%] {}", percent.min(100), message);
    }

    fn log(&self, level: LogLevel, message: &str) {
        println!("  [{}] {}", level, message);
    }

    fn confirm<'a>(&'a self, message: &'a str, default_yes: bool) -> BoxFuture<'a, bool> {
        println!("  ? {} -> {}", message, if default_yes { "yes" } else { "no" });
        futures::future::ready(default_yes).boxed()
    }

    fn select<'a>(&'a self, message: &'a str, options: &'a [String]) -> BoxFuture<'a, usize> {
        if let Some(first) = options.first() {
            println!("  ? {} -> {}", message, first);
        }
        futures::future::ready(0).boxed()
    }

    fn input<'a>(&'a self, message: &'a str, default_value: &'a str) -> BoxFuture<'a, String> {
        println!("  ? {} -> {}", message, default_value);
        futures::future::ready(default_value.to_string()).boxed()
    }
}
